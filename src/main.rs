//! Main application for the Video Downloader GUI

// egui window and view state
mod app;
// Download directory, cookie file and extractor location
mod config;
// Fetch-info and download orchestration
mod downloader;
// Error taxonomy
mod error;
// yt-dlp boundary
mod extractor;
// Format list construction
mod formats;
// Data models shared between tasks and the UI
mod model;
// Progress relay and progress line parsing
mod progress;
// Thumbnail fetching module
mod thumbnail;

use app::DownloaderApp;
use config::AppConfig;

use eframe::egui::Visuals;
// OnceCell for single-time runtime initialization
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tokio::runtime::Runtime;

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Program entry point: initializes logging and runtime, then launches the GUI
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Log at info unless RUST_LOG says otherwise
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Create the Tokio runtime once and store it globally
    let rt = RUNTIME.get_or_try_init(|| Runtime::new().map(Arc::new))?;
    let handle = rt.handle().clone();
    // Default paths: ~/Downloads and assets/cookies.txt
    let config = AppConfig::default();
    log::info!("Downloads will be saved to {}", config.download_dir.display());

    // Configure default native options for the egui window
    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Video Downloader",
        options,
        Box::new(move |cc| {
            // Use dark theme visuals
            cc.egui_ctx.set_visuals(Visuals::dark());
            // Instantiate the app with its own event channel and dispatcher
            Box::new(DownloaderApp::new(&cc.egui_ctx, handle, config))
        }),
    )?;
    Ok(())
}
