use eframe::egui::ColorImage;

/// One encoding reported by the extractor for a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    /// Extractor format id; `None` when the extractor omitted it
    pub selector: Option<String>,
    /// Whether the stream carries video at all
    pub video_codec_present: bool,
    /// Vertical resolution in pixels, if known
    pub height_px: Option<u32>,
    /// Exact file size in bytes, if known
    pub file_size_bytes: Option<u64>,
}

/// A choice shown to the user as a button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOption {
    /// Pseudo-format name or extractor format id handed back on download
    pub selector: String,
    /// Button caption
    pub label: String,
}

impl FormatOption {
    pub fn new(selector: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            label: label.into(),
        }
    }
}

/// Phase of a download as reported by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Downloading,
    Finished,
}

/// A single progress report produced while a download runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
}

/// Label text plus progress-bar position to apply on the UI thread
#[derive(Debug, Clone, PartialEq)]
pub struct UiUpdate {
    pub label: String,
    /// New bar position in `[0, 1]`; `None` leaves the bar where it is
    pub fraction: Option<f32>,
}

/// Immutable messages from background tasks to the UI loop
pub enum UiEvent {
    /// Replace the status label
    Status(String),
    /// Apply a relayed progress update
    Progress(UiUpdate),
    /// Show a freshly listed set of formats for `url`
    Formats {
        url: String,
        options: Vec<FormatOption>,
    },
    /// Decoded thumbnail ready for upload as a texture
    Thumbnail(ColorImage),
    /// Put the progress bar back to zero
    ResetProgress,
}
