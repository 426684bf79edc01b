//! egui front end: owns every piece of widget state and applies background events.

use eframe::{egui, App, Frame};
use egui::{ColorImage, TextureOptions};
use rfd::FileDialog;
use tokio::{
    runtime::Handle,
    sync::mpsc::{unbounded_channel, UnboundedReceiver},
};

use crate::config::AppConfig;
use crate::downloader::{Dispatcher, UiSender};
use crate::extractor::YtDlp;
use crate::model::{FormatOption, UiEvent};

/// Everything the window shows, mutated only on the UI thread
pub struct ViewState {
    /// Text in the URL field
    pub url_input: String,
    /// Status label text
    pub status: String,
    /// Progress bar position in `[0, 1]`
    pub progress: f32,
    /// URL the listed formats belong to
    pub formats_url: String,
    /// Buttons in the format list
    pub formats: Vec<FormatOption>,
    /// Decoded thumbnail waiting to be uploaded as a texture
    pub pending_thumbnail: Option<ColorImage>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            url_input: String::new(),
            status: "No download in progress".to_string(),
            progress: 0.0,
            formats_url: String::new(),
            formats: Vec::new(),
            pending_thumbnail: None,
        }
    }
}

impl ViewState {
    /// Applies one background event.
    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Status(text) => self.status = text,
            UiEvent::Progress(update) => {
                self.status = update.label;
                if let Some(fraction) = update.fraction {
                    self.progress = fraction;
                }
            }
            UiEvent::Formats { url, options } => {
                self.formats_url = url;
                self.formats = options;
            }
            UiEvent::Thumbnail(img) => self.pending_thumbnail = Some(img),
            UiEvent::ResetProgress => self.progress = 0.0,
        }
    }
}

/// The downloader window
pub struct DownloaderApp {
    state: ViewState,
    config: AppConfig,
    thumbnail: Option<egui::TextureHandle>,
    ui_rx: UnboundedReceiver<UiEvent>,
    dispatcher: Dispatcher<YtDlp>,
}

impl DownloaderApp {
    pub fn new(ctx: &egui::Context, runtime: Handle, config: AppConfig) -> Self {
        // Background tasks write into `tx`; only this app reads `ui_rx`
        let (tx, ui_rx) = unbounded_channel();
        let ui = UiSender::new(tx, Some(ctx.clone()));
        // Locate yt-dlp once; every request reuses it
        let client = YtDlp::from_config(&config);
        log::info!("Using extractor at {}", client.binary().display());

        Self {
            state: ViewState::default(),
            config,
            thumbnail: None,
            ui_rx,
            dispatcher: Dispatcher::new(runtime, client, ui),
        }
    }
}

impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        // 1️⃣ Apply everything the background tasks posted since the last frame
        while let Ok(event) = self.ui_rx.try_recv() {
            self.state.apply(event);
        }
        // Upload a newly decoded thumbnail as a texture, replacing the old one
        if let Some(img) = self.state.pending_thumbnail.take() {
            self.thumbnail = Some(ctx.load_texture("thumbnail", img, TextureOptions::default()));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            // 2️⃣ URL input and fetch button
            ui.add(
                egui::TextEdit::singleline(&mut self.state.url_input)
                    .hint_text("Enter Video URL")
                    .desired_width(f32::INFINITY),
            );
            if ui.add_sized([120.0, 32.0], egui::Button::new("Download")).clicked() {
                // Validation errors show up right away; no task is started
                if let Err(e) = self.dispatcher.fetch_info(&self.state.url_input) {
                    self.state.status = e.user_message();
                }
            }

            // Folder selection
            ui.horizontal(|ui| {
                ui.label("Save to:");
                ui.label(self.config.download_dir.display().to_string());
                if ui.button("Browse…").clicked() {
                    if let Some(folder) = FileDialog::new()
                        .set_directory(&self.config.download_dir)
                        .pick_folder()
                    {
                        // Takes effect for downloads started from now on
                        self.config.download_dir = folder;
                    }
                }
            });

            // 3️⃣ Status and progress
            ui.label(&self.state.status);
            ui.add(egui::ProgressBar::new(self.state.progress).show_percentage());

            // Thumbnail preview, capped in height
            if let Some(tex) = &self.thumbnail {
                ui.add(egui::Image::new(tex).max_height(200.0));
            }

            // 4️⃣ Format buttons, each bound to its selector and URL
            // Remember the click and dispatch after the list is drawn
            let mut chosen: Option<String> = None;
            egui::ScrollArea::vertical()
                .auto_shrink([false; 2])
                .show(ui, |ui| {
                    for option in &self.state.formats {
                        let button = egui::Button::new(&option.label);
                        if ui.add_sized([ui.available_width(), 40.0], button).clicked() {
                            chosen = Some(option.selector.clone());
                        }
                    }
                });
            if let Some(selector) = chosen {
                self.dispatcher
                    .download(&self.state.formats_url, &selector, self.config.clone());
            }
        });
    }
}
