//! Build script for the telemetry overlay
//!
//! Runs the Tauri build step when the desktop shell is enabled.

fn main() {
    #[cfg(feature = "desktop")]
    tauri_build::build();

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=tauri.conf.json");
}
