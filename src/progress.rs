use crate::model::{ProgressEvent, ProgressStatus, UiUpdate};

/// Prefix marking our progress lines in the extractor's stdout
pub const PROGRESS_PREFIX: &str = "vidgrab-progress|";

/// Template handed to `yt-dlp --progress-template`; fields are `|`-separated
pub const PROGRESS_TEMPLATE: &str = "download:vidgrab-progress|%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Maps one progress event to the label and bar position the UI should show.
///
/// Pure, so it can run on whichever task receives the event.
pub fn relay(event: &ProgressEvent) -> UiUpdate {
    match event.status {
        ProgressStatus::Finished => UiUpdate {
            label: "Download finished".to_string(),
            fraction: None,
        },
        ProgressStatus::Downloading => {
            let downloaded_mb = event.downloaded_bytes / BYTES_PER_MB;
            match event.total_bytes.filter(|&t| t > 0) {
                Some(total) => {
                    let ratio = (event.downloaded_bytes as f64 / total as f64).clamp(0.0, 1.0);
                    UiUpdate {
                        label: format!(
                            "Downloading: {:.2}% ({} MB of {} MB)",
                            ratio * 100.0,
                            downloaded_mb,
                            total / BYTES_PER_MB
                        ),
                        fraction: Some(ratio as f32),
                    }
                }
                None => UiUpdate {
                    label: format!("Downloading: {downloaded_mb} MB downloaded"),
                    fraction: None,
                },
            }
        }
    }
}

/// Parses a line produced by [`PROGRESS_TEMPLATE`]; anything else yields `None`.
pub fn parse_progress_from_line(line: &str) -> Option<ProgressEvent> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.split('|');

    let status = match fields.next()?.trim() {
        "downloading" => ProgressStatus::Downloading,
        "finished" => ProgressStatus::Finished,
        _ => return None,
    };
    let downloaded_bytes = fields.next().and_then(parse_bytes).unwrap_or(0);
    let total_bytes = fields.next().and_then(parse_bytes);

    Some(ProgressEvent {
        status,
        downloaded_bytes,
        total_bytes,
    })
}

// yt-dlp prints "NA" for missing fields and sometimes floats for byte counts
fn parse_bytes(field: &str) -> Option<u64> {
    let field = field.trim();
    if let Ok(v) = field.parse::<u64>() {
        return Some(v);
    }
    field
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
}
