//! Typed commands decoded from `(channel, payload)` pairs

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::{is_allowed, GatewayError, MAX_WINDOW_EDGE};
use crate::core::error::{ConfigError, Result};
use crate::widget::WidgetGeometry;

/// A validated request for the core
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    WidgetCreate {
        id: String,
        widget_type: String,
        geometry: WidgetGeometry,
        always_on_top: Option<bool>,
        params: IndexMap<String, Value>,
    },
    WidgetClose { id: String },
    WidgetGet { id: String },
    WidgetListAll,
    WidgetSetPosition { id: String, x: i32, y: i32 },
    WidgetSetSize { id: String, width: u32, height: u32 },
    WidgetSetAlwaysOnTop { id: String, always_on_top: bool },
    WidgetSetOpacity { id: String, opacity: f64 },
    WidgetSetVisible { id: String, visible: bool },
    WidgetUpdateParams { id: String, params: IndexMap<String, Value> },
    WidgetRegisterForUpdates { id: String },
    DisplayListAll,
    /// `None` resolves to the caller's own display
    DisplayCloseWindowFor { id: Option<String> },
    DisplayCreateWindowFor { id: String },
    /// `state: None` toggles; `target: None` means the caller's window
    AppToggleClickThrough { target: Option<String>, state: Option<bool> },
    AppGetClickThrough { target: Option<String> },
    AppSetAutoCreate { enabled: bool },
    AppGetAutoCreate,
    AppWindowReady,
    TelemetryIngest { sample: Value },
    TelemetrySetConnectivity { connected: bool },
    TelemetryGetLatest,
    TelemetryGetConnectivity,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateArgs {
    id: String,
    #[serde(rename = "type")]
    widget_type: String,
    #[serde(default)]
    geometry: WidgetGeometry,
    #[serde(default)]
    always_on_top: Option<bool>,
    #[serde(default)]
    params: IndexMap<String, Value>,
}

#[derive(Deserialize)]
struct IdArgs {
    id: String,
}

#[derive(Deserialize)]
struct OptionalIdArgs {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
struct PositionArgs {
    id: String,
    x: i32,
    y: i32,
}

#[derive(Deserialize)]
struct SizeArgs {
    id: String,
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlwaysOnTopArgs {
    id: String,
    always_on_top: bool,
}

#[derive(Deserialize)]
struct OpacityArgs {
    id: String,
    opacity: f64,
}

#[derive(Deserialize)]
struct VisibleArgs {
    id: String,
    visible: bool,
}

#[derive(Deserialize)]
struct ParamsArgs {
    id: String,
    params: IndexMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClickThroughArgs {
    #[serde(default)]
    target_window: Option<String>,
    #[serde(default)]
    state: Option<bool>,
}

#[derive(Deserialize)]
struct StateArgs {
    state: bool,
}

#[derive(Deserialize)]
struct ConnectivityArgs {
    connected: bool,
}

impl Command {
    /// Decode and validate one inbound command
    pub fn decode(channel: &str, payload: Value) -> Result<Command> {
        if !is_allowed(channel) {
            tracing::warn!("Rejected command on unknown channel '{}'", channel);
            return Err(GatewayError::Forbidden(channel.to_string()).into());
        }

        let command = match channel {
            "widget.create" => {
                let a: CreateArgs = args(channel, payload)?;
                Command::WidgetCreate {
                    id: a.id,
                    widget_type: a.widget_type,
                    geometry: a.geometry,
                    always_on_top: a.always_on_top,
                    params: a.params,
                }
            }
            "widget.close" => Command::WidgetClose {
                id: args::<IdArgs>(channel, payload)?.id,
            },
            "widget.get" => Command::WidgetGet {
                id: args::<IdArgs>(channel, payload)?.id,
            },
            "widget.listAll" => Command::WidgetListAll,
            "widget.setPosition" => {
                let a: PositionArgs = args(channel, payload)?;
                Command::WidgetSetPosition { id: a.id, x: a.x, y: a.y }
            }
            "widget.setSize" => {
                let a: SizeArgs = args(channel, payload)?;
                Command::WidgetSetSize {
                    id: a.id,
                    width: a.width,
                    height: a.height,
                }
            }
            "widget.setAlwaysOnTop" => {
                let a: AlwaysOnTopArgs = args(channel, payload)?;
                Command::WidgetSetAlwaysOnTop {
                    id: a.id,
                    always_on_top: a.always_on_top,
                }
            }
            "widget.setOpacity" => {
                let a: OpacityArgs = args(channel, payload)?;
                Command::WidgetSetOpacity {
                    id: a.id,
                    opacity: a.opacity,
                }
            }
            "widget.setVisible" => {
                let a: VisibleArgs = args(channel, payload)?;
                Command::WidgetSetVisible {
                    id: a.id,
                    visible: a.visible,
                }
            }
            "widget.updateParams" => {
                let a: ParamsArgs = args(channel, payload)?;
                Command::WidgetUpdateParams {
                    id: a.id,
                    params: a.params,
                }
            }
            "widget.registerForUpdates" => Command::WidgetRegisterForUpdates {
                id: args::<IdArgs>(channel, payload)?.id,
            },
            "display.listAll" => Command::DisplayListAll,
            "display.closeWindowFor" => Command::DisplayCloseWindowFor {
                id: args::<OptionalIdArgs>(channel, or_empty(payload))?.id,
            },
            "display.createWindowFor" => Command::DisplayCreateWindowFor {
                id: args::<IdArgs>(channel, payload)?.id,
            },
            "app.toggleClickThrough" => {
                let a: ClickThroughArgs = args(channel, or_empty(payload))?;
                Command::AppToggleClickThrough {
                    target: a.target_window,
                    state: a.state,
                }
            }
            "app.getClickThrough" => Command::AppGetClickThrough {
                target: args::<ClickThroughArgs>(channel, or_empty(payload))?.target_window,
            },
            "app.toggleAutoCreateForNewDisplays" => Command::AppSetAutoCreate {
                enabled: args::<StateArgs>(channel, payload)?.state,
            },
            "app.getAutoCreateForNewDisplays" => Command::AppGetAutoCreate,
            "app.windowReady" => Command::AppWindowReady,
            "telemetry.ingest" => Command::TelemetryIngest { sample: payload },
            "telemetry.setConnectivity" => Command::TelemetrySetConnectivity {
                connected: args::<ConnectivityArgs>(channel, payload)?.connected,
            },
            "telemetry.getLatest" => Command::TelemetryGetLatest,
            "telemetry.getConnectivity" => Command::TelemetryGetConnectivity,
            other => return Err(GatewayError::Forbidden(other.to_string()).into()),
        };

        command.validate()?;
        Ok(command)
    }

    /// Boundary validation of identifiers, geometry and opacity
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::WidgetCreate { id, geometry, .. } => {
                require_id(id)?;
                if let Some(width) = geometry.width {
                    check_edge("width", width)?;
                }
                if let Some(height) = geometry.height {
                    check_edge("height", height)?;
                }
            }
            Command::WidgetSetSize { id, width, height } => {
                require_id(id)?;
                check_edge("width", *width)?;
                check_edge("height", *height)?;
            }
            Command::WidgetSetOpacity { id, opacity } => {
                require_id(id)?;
                if !opacity.is_finite() || !(0.0..=1.0).contains(opacity) {
                    return Err(ConfigError::invalid("opacity", opacity).into());
                }
            }
            Command::WidgetClose { id }
            | Command::WidgetGet { id }
            | Command::WidgetSetPosition { id, .. }
            | Command::WidgetSetAlwaysOnTop { id, .. }
            | Command::WidgetSetVisible { id, .. }
            | Command::WidgetUpdateParams { id, .. }
            | Command::WidgetRegisterForUpdates { id }
            | Command::DisplayCreateWindowFor { id } => require_id(id)?,
            _ => {}
        }
        Ok(())
    }

    pub fn is_fire_and_forget(&self) -> bool {
        matches!(
            self,
            Command::WidgetRegisterForUpdates { .. }
                | Command::AppWindowReady
                | Command::TelemetryIngest { .. }
                | Command::TelemetrySetConnectivity { .. }
        )
    }
}

fn args<T: DeserializeOwned>(channel: &str, payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| {
        GatewayError::Decode {
            channel: channel.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Treat a missing payload as an empty object for all-optional arguments
fn or_empty(payload: Value) -> Value {
    if payload.is_null() {
        Value::Object(Default::default())
    } else {
        payload
    }
}

fn require_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(ConfigError::invalid("id", "<empty>").into());
    }
    Ok(())
}

fn check_edge(field: &str, value: u32) -> Result<()> {
    if value == 0 || value > MAX_WINDOW_EDGE {
        return Err(ConfigError::invalid(field, value).into());
    }
    Ok(())
}
