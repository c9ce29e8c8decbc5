//! Platform presentation strategies
//!
//! Stacking levels, title-bar chrome and pointer forwarding differ per
//! platform. One strategy is selected at startup and consulted everywhere
//! instead of branching on the OS at each call site.

use super::{StackingLevel, WindowKind, WindowSpec};

/// Per-platform presentation decisions
pub trait PresentationStrategy: Send + Sync {
    /// Platform name, for logs
    fn platform(&self) -> &'static str;

    /// Level used for overlays and for re-asserting their stacking
    fn overlay_level(&self) -> StackingLevel;

    /// Level used for widgets created with always-on-top
    fn widget_level(&self) -> StackingLevel;

    /// Whether pass-through windows can still receive hover/move events
    fn forwards_pointer_events(&self) -> bool;

    /// Whether changing the pointer mode can reset stacking order
    fn pointer_change_resets_stacking(&self) -> bool {
        true
    }

    /// Apply platform chrome suppression to a spec
    fn decorate(&self, spec: &mut WindowSpec) {
        if let Some(level) = spec.always_on_top {
            spec.always_on_top = Some(match spec.kind {
                WindowKind::Overlay => self.overlay_level(),
                WindowKind::Widget => level.max_with(self.widget_level()),
            });
        }
    }
}

impl StackingLevel {
    fn rank(&self) -> u8 {
        match self {
            StackingLevel::Normal => 0,
            StackingLevel::Floating => 1,
            StackingLevel::ScreenSaver => 2,
        }
    }

    /// The higher of two levels
    pub fn max_with(self, other: StackingLevel) -> StackingLevel {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

/// Windows: screen-saver level survives fullscreen games taking focus
#[derive(Debug, Default)]
pub struct WindowsPresentation;

impl PresentationStrategy for WindowsPresentation {
    fn platform(&self) -> &'static str {
        "windows"
    }

    fn overlay_level(&self) -> StackingLevel {
        StackingLevel::ScreenSaver
    }

    fn widget_level(&self) -> StackingLevel {
        StackingLevel::ScreenSaver
    }

    fn forwards_pointer_events(&self) -> bool {
        true
    }
}

/// macOS: floating level, traffic lights hidden, visible on every Space
#[derive(Debug, Default)]
pub struct MacOsPresentation;

impl PresentationStrategy for MacOsPresentation {
    fn platform(&self) -> &'static str {
        "macos"
    }

    fn overlay_level(&self) -> StackingLevel {
        StackingLevel::ScreenSaver
    }

    fn widget_level(&self) -> StackingLevel {
        StackingLevel::Floating
    }

    fn forwards_pointer_events(&self) -> bool {
        true
    }

    fn decorate(&self, spec: &mut WindowSpec) {
        spec.hide_title_buttons = true;
        spec.visible_on_all_workspaces = true;
        if spec.always_on_top.is_some() {
            spec.always_on_top = Some(match spec.kind {
                WindowKind::Overlay => self.overlay_level(),
                WindowKind::Widget => self.widget_level(),
            });
        }
    }
}

/// Linux and everything else: plain always-on-top, no event forwarding
#[derive(Debug, Default)]
pub struct LinuxPresentation;

impl PresentationStrategy for LinuxPresentation {
    fn platform(&self) -> &'static str {
        "linux"
    }

    fn overlay_level(&self) -> StackingLevel {
        StackingLevel::Floating
    }

    fn widget_level(&self) -> StackingLevel {
        StackingLevel::Floating
    }

    fn forwards_pointer_events(&self) -> bool {
        false
    }

    fn pointer_change_resets_stacking(&self) -> bool {
        false
    }
}

/// Strategy for a named platform (`std::env::consts::OS` values)
pub fn for_platform(os: &str) -> Box<dyn PresentationStrategy> {
    match os {
        "windows" => Box::new(WindowsPresentation),
        "macos" => Box::new(MacOsPresentation),
        _ => Box::new(LinuxPresentation),
    }
}

/// Strategy for the platform this binary runs on
pub fn for_current_platform() -> Box<dyn PresentationStrategy> {
    let strategy = for_platform(std::env::consts::OS);
    tracing::debug!("Using {} presentation strategy", strategy.platform());
    strategy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_selection() {
        assert_eq!(for_platform("windows").platform(), "windows");
        assert_eq!(for_platform("macos").platform(), "macos");
        assert_eq!(for_platform("linux").platform(), "linux");
        assert_eq!(for_platform("freebsd").platform(), "linux");
    }

    #[test]
    fn test_macos_hides_title_buttons() {
        let mut spec = WindowSpec::frameless(WindowKind::Widget, "widget-a", "widget.html");
        spec.always_on_top = Some(StackingLevel::Normal);
        MacOsPresentation.decorate(&mut spec);

        assert!(spec.hide_title_buttons);
        assert!(spec.visible_on_all_workspaces);
        assert_eq!(spec.always_on_top, Some(StackingLevel::Floating));
    }

    #[test]
    fn test_non_topmost_widget_stays_normal() {
        let mut spec = WindowSpec::frameless(WindowKind::Widget, "widget-a", "widget.html");
        WindowsPresentation.decorate(&mut spec);
        assert_eq!(spec.always_on_top, None);
        assert!(!spec.hide_title_buttons);
    }

    #[test]
    fn test_overlay_gets_overlay_level() {
        let mut spec = WindowSpec::frameless(WindowKind::Overlay, "overlay-1", "overlay.html");
        spec.always_on_top = Some(StackingLevel::Normal);
        WindowsPresentation.decorate(&mut spec);
        assert_eq!(spec.always_on_top, Some(StackingLevel::ScreenSaver));
    }

    #[test]
    fn test_max_with() {
        assert_eq!(
            StackingLevel::Normal.max_with(StackingLevel::Floating),
            StackingLevel::Floating
        );
        assert_eq!(
            StackingLevel::ScreenSaver.max_with(StackingLevel::Floating),
            StackingLevel::ScreenSaver
        );
    }
}
