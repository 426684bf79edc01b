//! Fetch-info and download requests, run off the UI thread.
//!
//! Background tasks never touch widget state. They push [`UiEvent`]s through a
//! [`UiSender`] and the frame loop applies them in order.

use std::{path::Path, sync::Arc};

use eframe::egui;
use tokio::{
    runtime::Handle,
    sync::mpsc::{unbounded_channel, UnboundedSender},
};

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::extractor::{DownloadOptions, ExtractionClient, FormatSelection, InfoOptions};
use crate::formats::build_format_options;
use crate::model::UiEvent;
use crate::progress::relay;
use crate::thumbnail::fetch_thumbnail;

/// Sites that refuse requests without a matching referer and browser user agent
struct SiteOverride {
    host: &'static str,
    referer: &'static str,
    user_agent: &'static str,
}

const SITE_OVERRIDES: &[SiteOverride] = &[SiteOverride {
    host: "snackvideo.com",
    referer: "https://snackvideo.com/",
    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
}];

/// Ordered, thread-safe handle for posting events to the UI loop
#[derive(Clone)]
pub struct UiSender {
    tx: UnboundedSender<UiEvent>,
    repaint: Option<egui::Context>,
}

impl UiSender {
    pub fn new(tx: UnboundedSender<UiEvent>, repaint: Option<egui::Context>) -> Self {
        Self { tx, repaint }
    }

    pub fn send(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("UI is gone, dropping event");
            return;
        }
        if let Some(ctx) = &self.repaint {
            ctx.request_repaint();
        }
    }

    pub fn status(&self, text: impl Into<String>) {
        self.send(UiEvent::Status(text.into()));
    }
}

/// Resets the progress bar when dropped, whichever way the download ends.
///
/// If no outcome was reported (the download task unwound), it posts one first.
struct ProgressReset {
    ui: UiSender,
    reported: bool,
}

impl ProgressReset {
    fn new(ui: &UiSender) -> Self {
        Self {
            ui: ui.clone(),
            reported: false,
        }
    }

    fn report(&mut self, status: String) {
        self.ui.status(status);
        self.reported = true;
    }
}

impl Drop for ProgressReset {
    fn drop(&mut self) {
        if !self.reported {
            log::error!("Download task ended without reporting an outcome");
            self.ui.status(AppError::Download("download was interrupted".into()).user_message());
        }
        self.ui.send(UiEvent::ResetProgress);
    }
}

/// Trims the input; an empty URL is rejected before any work is spawned.
pub fn validate_url(input: &str) -> Result<String> {
    let url = input.trim();
    if url.is_empty() {
        return Err(AppError::Validation("Please enter a valid URL".to_string()));
    }
    Ok(url.to_string())
}

/// Maps a [`FormatOption`](crate::model::FormatOption) selector to yt-dlp format syntax.
pub fn format_selection(selector: &str) -> FormatSelection {
    match selector {
        "thumbnail" => FormatSelection::ThumbnailOnly,
        "audio" => FormatSelection::Format("bestaudio".to_string()),
        "bestvideo" => FormatSelection::Format("bestvideo+bestaudio/best".to_string()),
        id => FormatSelection::Format(format!("{id}+bestaudio/best")),
    }
}

/// Full option set for downloading `url` as `selector`.
pub fn download_options(config: &AppConfig, url: &str, selector: &str) -> DownloadOptions {
    let lower = url.to_lowercase();
    let site = SITE_OVERRIDES.iter().find(|s| lower.contains(s.host));

    DownloadOptions {
        output_path_template: config.output_path_template(),
        noplaylist: true,
        cookie_file: config.usable_cookie_file().map(Path::to_path_buf),
        selection: format_selection(selector),
        referer: site.map(|s| s.referer.to_string()),
        user_agent: site.map(|s| s.user_agent.to_string()),
    }
}

/// Creates the download directory if it is missing.
pub fn ensure_download_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        AppError::Download(format!("cannot create {}: {e}", dir.display()))
    })
}

/// Fetches metadata for `url` and posts the option list (or the failure) to the UI.
///
/// Returns the thumbnail URL to load, if the extractor reported one.
pub async fn fetch_info_task<C: ExtractionClient>(
    client: &C,
    url: &str,
    ui: &UiSender,
) -> Option<String> {
    // Both the fetch and the listing can fail; handle them as one outcome
    let listed = async {
        let info = client.fetch_info(url, &InfoOptions::default()).await?;
        let options = build_format_options(&info.formats)?;
        Ok::<_, AppError>((info, options))
    }
    .await;

    match listed {
        Ok((info, options)) => {
            // Formats first, then the prompt, so the label never points at an empty list
            log::info!(
                "Listed {} options for {}",
                options.len(),
                info.title.as_deref().unwrap_or(url)
            );
            ui.send(UiEvent::Formats {
                url: url.to_string(),
                options,
            });
            ui.status("Select a format to download");
            info.thumbnail
        }
        Err(e) => {
            log::error!("Error fetching video info: {e}");
            ui.status(e.user_message());
            None
        }
    }
}

/// Downloads `url` as `selector`, relaying progress to the UI.
///
/// Exactly one outcome message is posted, followed by a progress reset.
pub async fn download_task<C: ExtractionClient>(
    client: &C,
    config: &AppConfig,
    url: &str,
    selector: &str,
    ui: &UiSender,
) -> Result<()> {
    // Armed before any work so every exit path resets the bar
    let mut guard = ProgressReset::new(ui);

    let outcome = run_download(client, config, url, selector, ui).await;
    match &outcome {
        Ok(()) => {
            log::info!("Downloaded {url} ({selector}) into {}", config.download_dir.display());
            guard.report("Download completed successfully!".to_string());
        }
        Err(e) => {
            log::error!("Error during download: {e}");
            guard.report(e.user_message());
        }
    }
    // Dropping the guard here posts the reset after the outcome
    outcome
}

async fn run_download<C: ExtractionClient>(
    client: &C,
    config: &AppConfig,
    url: &str,
    selector: &str,
    ui: &UiSender,
) -> Result<()> {
    // The destination must exist before yt-dlp writes into it
    ensure_download_dir(&config.download_dir)?;
    let options = download_options(config, url, selector);

    // Progress flows extractor -> relay -> UI, in the order it was produced
    let (progress_tx, mut progress_rx) = unbounded_channel();
    let forward = async {
        while let Some(event) = progress_rx.recv().await {
            ui.send(UiEvent::Progress(relay(&event)));
        }
    };
    // The forwarder finishes once the download drops its sender
    let (result, ()) = tokio::join!(client.download(url, &options, progress_tx), forward);
    result
}

/// Fire-and-forget task spawner for the two UI requests.
///
/// Each request gets its own task with no cancellation and no timeout.
/// Overlapping requests are not coordinated.
pub struct Dispatcher<C> {
    runtime: Handle,
    client: Arc<C>,
    ui: UiSender,
}

impl<C: ExtractionClient> Dispatcher<C> {
    pub fn new(runtime: Handle, client: C, ui: UiSender) -> Self {
        Self {
            runtime,
            client: Arc::new(client),
            ui,
        }
    }

    /// Validates `input` and starts a metadata fetch; validation errors return immediately.
    pub fn fetch_info(&self, input: &str) -> Result<()> {
        let url = validate_url(input)?;
        self.ui.status("Fetching video info...");

        // Fire and forget: the task reports through `ui` and nothing awaits it
        let client = Arc::clone(&self.client);
        let ui = self.ui.clone();
        self.runtime.spawn(async move {
            // Thumbnail HTTP fetch is blocking, keep it off the async workers
            if let Some(thumb_url) = fetch_info_task(client.as_ref(), &url, &ui).await {
                tokio::task::spawn_blocking(move || {
                    if let Some(img) = fetch_thumbnail(&thumb_url) {
                        ui.send(UiEvent::Thumbnail(img));
                    }
                });
            }
        });
        Ok(())
    }

    /// Starts downloading `url` as `selector` with a snapshot of `config`.
    pub fn download(&self, url: &str, selector: &str, config: AppConfig) {
        let client = Arc::clone(&self.client);
        let ui = self.ui.clone();
        let url = url.to_string();
        let selector = selector.to_string();
        self.runtime.spawn(async move {
            // Outcome already reached the UI; the Result is only for callers that await
            let _ = download_task(client.as_ref(), &config, &url, &selector, &ui).await;
        });
    }
}
