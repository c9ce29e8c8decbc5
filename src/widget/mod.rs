//! Widget windows
//!
//! Small floating readouts addressed by a caller-assigned identifier:
//! - Idempotent create-or-focus
//! - Geometry, stacking, opacity and visibility mutators
//! - Parameter merge with full content reload

mod registry;
mod url;


pub use registry::{CreateOutcome, CreateWidget, WidgetGeometry, WidgetRecord, WidgetRegistry};
pub use url::{build_widget_url, parse_widget_query};
