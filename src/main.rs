//! Telemetry Overlay
//!
//! Main entry point for the Tauri application.

#![cfg_attr(
    all(not(debug_assertions), target_os = "windows"),
    windows_subsystem = "windows"
)]

use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use tauri::{AppHandle, Manager, RunEvent};

use telemetry_overlay::broadcast::SysinfoMemoryProbe;
use telemetry_overlay::click_through::ClickThroughShortcut;
use telemetry_overlay::display::{spawn_display_poller, DisplaySource};
use telemetry_overlay::feed::spawn_feed;
use telemetry_overlay::logging::LoggingSystem;
use telemetry_overlay::shell::{
    core_invoke, core_notify, TauriDisplaySource, TauriShortcuts, TauriWindowFactory,
};
use telemetry_overlay::window::{for_current_platform, lifecycle_channel};
use telemetry_overlay::{AppConfig, ConfigStore, OverlayContext, Runtime, RuntimeHandle};

fn main() -> anyhow::Result<()> {
    let store = ConfigStore::new(ConfigStore::default_path());
    let (config, config_error) = match store.load_or_default() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // Keep the logging system alive so the file writer keeps flushing
    let _logging_system = match LoggingSystem::init(config.logging.clone()) {
        Ok(system) => Some(system),
        Err(e) => {
            eprintln!("Failed to initialize logging system: {}. Using basic logging.", e);
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                )
                .init();
            None
        }
    };

    if let Some(e) = config_error {
        tracing::warn!(
            "Configuration at {:?} unusable, running with defaults: {}",
            store.path(),
            e
        );
    }
    tracing::info!("Starting telemetry overlay...");

    // One tokio runtime shared by Tauri and the overlay tasks
    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    tauri::async_runtime::set(tokio_runtime.handle().clone());
    let _enter = tokio_runtime.enter();

    let app = tauri::Builder::default()
        .setup(move |app| setup(app, config))
        .invoke_handler(tauri::generate_handler![core_invoke, core_notify])
        .build(tauri::generate_context!())
        .context("error while building tauri application")?;

    app.run(|app_handle, event| {
        if let RunEvent::Exit = event {
            release_shortcut(app_handle);
            let Some(runtime) = app_handle.try_state::<RuntimeHandle>() else {
                return;
            };
            match tauri::async_runtime::block_on(runtime.shutdown()) {
                Ok(closed) => tracing::info!("Shut down, {} window(s) closed", closed),
                Err(e) => tracing::debug!("Runtime already stopped: {}", e),
            }
        }
    });

    Ok(())
}

fn setup(app: &mut tauri::App, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let main_window = app
        .get_window("main")
        .ok_or("main window missing from tauri.conf.json")?;
    let source: Arc<dyn DisplaySource> = Arc::new(TauriDisplaySource::new(main_window));
    let displays = source.enumerate()?;

    let (bus, lifecycle_rx) = lifecycle_channel();
    let mut context = OverlayContext::new(
        config.clone(),
        bus,
        Box::new(TauriWindowFactory::new(app.handle())),
        for_current_platform(),
        Box::new(SysinfoMemoryProbe::new()),
    );
    let overlays = context.start(displays.clone());
    tracing::info!(
        "Created {} overlay(s) for {} display(s)",
        overlays,
        displays.len()
    );

    let (runtime, handle) = Runtime::new(context, lifecycle_rx);
    tauri::async_runtime::spawn(runtime.run());

    let events = handle.clone();
    spawn_display_poller(
        source,
        displays,
        config.display_poll_interval(),
        handle.cancellation_token(),
        move |event| events.display_event(event),
    );
    spawn_feed(&config.feed, handle.clone(), handle.cancellation_token());

    let mut shortcut = ClickThroughShortcut::new(config.click_through_shortcut.as_str());
    let toggle = handle.clone();
    let registered = shortcut.register(&mut TauriShortcuts::new(app.handle()), move || {
        if toggle.toggle_click_through_all().is_err() {
            tracing::debug!("Click-through shortcut pressed after shutdown");
        }
    });
    if let Err(e) = registered {
        tracing::warn!("Click-through shortcut unavailable: {}", e);
    }

    app.manage(Mutex::new(shortcut));
    app.manage(handle);
    Ok(())
}

fn release_shortcut(app: &AppHandle) {
    let Some(shortcut) = app.try_state::<Mutex<ClickThroughShortcut>>() else {
        return;
    };
    let mut shortcut = shortcut.lock();
    if let Err(e) = shortcut.unregister(&mut TauriShortcuts::new(app.clone())) {
        tracing::warn!("Failed to release shortcut {}: {}", shortcut.accelerator(), e);
    }
}
