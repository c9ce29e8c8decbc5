//! Monitor enumeration through Tauri

use tauri::Monitor;

use crate::core::error::{Result, WindowError};
use crate::display::{DisplayInfo, DisplaySource};
use crate::window::Bounds;

/// Enumerates monitors through any live window (the hidden main window)
pub struct TauriDisplaySource {
    window: tauri::Window,
}

impl TauriDisplaySource {
    pub fn new(window: tauri::Window) -> Self {
        Self { window }
    }
}

impl DisplaySource for TauriDisplaySource {
    fn enumerate(&self) -> Result<Vec<DisplayInfo>> {
        let monitors = self
            .window
            .available_monitors()
            .map_err(|e| WindowError::Platform(e.to_string()))?;
        let primary = self
            .window
            .primary_monitor()
            .map_err(|e| WindowError::Platform(e.to_string()))?
            .map(|m| bounds_of(&m));

        Ok(monitors
            .iter()
            .map(|monitor| {
                let bounds = bounds_of(monitor);
                let name = monitor.name().cloned();
                DisplayInfo {
                    id: display_id(name.as_deref(), &bounds),
                    bounds,
                    is_primary: primary == Some(bounds),
                    scale_factor: monitor.scale_factor(),
                    name,
                }
            })
            .collect())
    }
}

fn bounds_of(monitor: &Monitor) -> Bounds {
    let position = monitor.position();
    let size = monitor.size();
    Bounds::new(position.x, position.y, size.width, size.height)
}

/// Monitor name when the platform reports one, else its origin
fn display_id(name: Option<&str>, bounds: &Bounds) -> String {
    match name {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => format!("display-{}-{}", bounds.x, bounds.y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_id_falls_back_to_origin() {
        let bounds = Bounds::new(-1920, 0, 1920, 1080);
        assert_eq!(display_id(Some("\\\\.\\DISPLAY2"), &bounds), "\\\\.\\DISPLAY2");
        assert_eq!(display_id(Some("  "), &bounds), "display--1920-0");
        assert_eq!(display_id(None, &bounds), "display--1920-0");
    }
}
