//! Turns the extractor's raw format list into the buttons shown to the user.

use std::collections::HashSet;

use crate::error::{AppError, Result};
use crate::model::{FormatDescriptor, FormatOption};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Builds the ordered option list: three fixed pseudo-formats, then one entry
/// per distinct resolution (first occurrence wins).
///
/// An empty descriptor list gets a single "Best Available Video" fallback.
/// A descriptor without a selector fails the whole call.
pub fn build_format_options(descriptors: &[FormatDescriptor]) -> Result<Vec<FormatOption>> {
    let mut options = vec![
        FormatOption::new("thumbnail", "Download Thumbnail"),
        FormatOption::new("audio", "Best Audio"),
        FormatOption::new("bestvideo", "Best Video"),
    ];

    if descriptors.is_empty() {
        options.push(FormatOption::new("bestvideo", "Best Available Video"));
        return Ok(options);
    }

    // `None` is the "unknown resolution" key
    let mut seen: HashSet<Option<u32>> = HashSet::new();
    for (index, descriptor) in descriptors.iter().enumerate() {
        let selector = match descriptor.selector.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => {
                return Err(AppError::InvalidFormatData(format!(
                    "format #{index} has no format id"
                )));
            }
        };

        if !descriptor.video_codec_present {
            continue;
        }
        if seen.insert(descriptor.height_px) {
            options.push(FormatOption::new(
                selector,
                format!(
                    "{} - {} (.mp4)",
                    resolution_label(descriptor.height_px),
                    size_label(descriptor.file_size_bytes)
                ),
            ));
        }
    }

    Ok(options)
}

/// Whole megabytes, rounded down, or "Unknown size".
pub fn size_label(file_size_bytes: Option<u64>) -> String {
    match file_size_bytes {
        Some(bytes) if bytes > 0 => format!("{} MB", bytes / BYTES_PER_MB),
        _ => "Unknown size".to_string(),
    }
}

// A missing height renders as 0p
fn resolution_label(height_px: Option<u32>) -> String {
    format!("{}p", height_px.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(selector: &str, height: Option<u32>, size: Option<u64>) -> FormatDescriptor {
        FormatDescriptor {
            selector: Some(selector.to_string()),
            video_codec_present: true,
            height_px: height,
            file_size_bytes: size,
        }
    }

    fn audio(selector: &str) -> FormatDescriptor {
        FormatDescriptor {
            selector: Some(selector.to_string()),
            video_codec_present: false,
            height_px: None,
            file_size_bytes: Some(3 * BYTES_PER_MB),
        }
    }

    fn selectors(options: &[FormatOption]) -> Vec<&str> {
        options.iter().map(|o| o.selector.as_str()).collect()
    }

    #[test]
    fn fixed_options_come_first() {
        let options = build_format_options(&[
            video("137", Some(1080), None),
            audio("140"),
            video("22", Some(720), Some(10_485_760)),
        ])
        .unwrap();

        assert_eq!(&selectors(&options)[..3], ["thumbnail", "audio", "bestvideo"]);
        assert_eq!(options[0].label, "Download Thumbnail");
        assert_eq!(options[1].label, "Best Audio");
        assert_eq!(options[2].label, "Best Video");
        assert_eq!(selectors(&options)[3..], ["137", "22"]);
    }

    #[test]
    fn empty_list_gets_fallback() {
        let options = build_format_options(&[]).unwrap();
        assert_eq!(options.len(), 4);
        assert_eq!(options[3], FormatOption::new("bestvideo", "Best Available Video"));
    }

    #[test]
    fn audio_only_list_has_just_the_fixed_options() {
        let options = build_format_options(&[audio("140"), audio("251")]).unwrap();
        assert_eq!(options.len(), 3);
    }

    #[test]
    fn first_descriptor_per_resolution_wins() {
        let options = build_format_options(&[
            video("136", Some(720), Some(5 * BYTES_PER_MB)),
            video("247", Some(720), Some(8 * BYTES_PER_MB)),
            video("135", Some(480), None),
            video("244", Some(480), Some(BYTES_PER_MB)),
        ])
        .unwrap();

        assert_eq!(options.len(), 5);
        assert_eq!(options[3], FormatOption::new("136", "720p - 5 MB (.mp4)"));
        assert_eq!(options[4], FormatOption::new("135", "480p - Unknown size (.mp4)"));
    }

    #[test]
    fn unknown_resolutions_share_one_entry() {
        let options = build_format_options(&[
            video("hls-1", None, None),
            video("hls-2", None, Some(BYTES_PER_MB)),
        ])
        .unwrap();

        assert_eq!(options.len(), 4);
        assert_eq!(options[3].selector, "hls-1");
        assert_eq!(options[3].label, "0p - Unknown size (.mp4)");
    }

    #[test]
    fn missing_selector_fails_the_call() {
        let mut broken = video("x", Some(360), None);
        broken.selector = None;

        let err = build_format_options(&[video("18", Some(360), None), broken]).unwrap_err();
        assert!(matches!(err, AppError::InvalidFormatData(_)));
    }

    #[test]
    fn blank_selector_on_audio_stream_also_fails() {
        let mut broken = audio("140");
        broken.selector = Some("  ".into());
        assert!(build_format_options(&[broken]).is_err());
    }

    #[test]
    fn size_labels() {
        assert_eq!(size_label(Some(10_485_760)), "10 MB");
        assert_eq!(size_label(Some(10_485_759)), "9 MB");
        assert_eq!(size_label(None), "Unknown size");
        assert_eq!(size_label(Some(0)), "Unknown size");
    }
}
