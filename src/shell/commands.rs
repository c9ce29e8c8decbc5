//! Tauri commands exposed to window content
//!
//! Window content reaches the core through exactly two commands; the channel
//! name inside the payload is checked against the gateway allow-list.

use serde_json::Value;
use tauri::State;

use crate::gateway::Caller;
use crate::runtime::RuntimeHandle;

/// Request/response entry; always resolves with a JSON body
#[tauri::command]
pub async fn core_invoke(
    window: tauri::Window,
    runtime: State<'_, RuntimeHandle>,
    channel: String,
    payload: Option<Value>,
) -> Result<Value, String> {
    let caller = Caller::window(window.label());
    Ok(runtime
        .invoke(caller, &channel, payload.unwrap_or(Value::Null))
        .await)
}

/// Fire-and-forget entry
#[tauri::command]
pub fn core_notify(
    window: tauri::Window,
    runtime: State<'_, RuntimeHandle>,
    channel: String,
    payload: Option<Value>,
) -> Result<(), String> {
    runtime
        .notify(
            Caller::window(window.label()),
            &channel,
            payload.unwrap_or(Value::Null),
        )
        .map_err(|e| e.to_string())
}
