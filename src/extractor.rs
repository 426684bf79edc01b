//! Boundary to the extraction library (yt-dlp run as a child process).

use std::{
    fs::File,
    future::Future,
    io::Write,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use rust_embed::RustEmbed;
use serde::Deserialize;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
    sync::mpsc::UnboundedSender,
};

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::model::{FormatDescriptor, ProgressEvent};
use crate::progress::{parse_progress_from_line, PROGRESS_TEMPLATE};

#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Asset;

/// Knobs for a metadata-only request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoOptions {
    pub quiet: bool,
    pub no_warnings: bool,
    pub noplaylist: bool,
    pub extract_flat: bool,
}

impl Default for InfoOptions {
    fn default() -> Self {
        Self {
            quiet: true,
            no_warnings: true,
            noplaylist: true,
            extract_flat: true,
        }
    }
}

/// What the extractor should fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSelection {
    /// Skip the media, write only the thumbnail
    ThumbnailOnly,
    /// A yt-dlp format expression such as `bestvideo+bestaudio/best`
    Format(String),
}

/// Knobs for a download request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub output_path_template: String,
    pub noplaylist: bool,
    pub cookie_file: Option<PathBuf>,
    pub selection: FormatSelection,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

/// Metadata returned by a fetch-info call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoInfo {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    /// Empty when the extractor returned no format list
    pub formats: Vec<FormatDescriptor>,
}

/// The two blocking calls the application makes into the extraction library.
pub trait ExtractionClient: Send + Sync + 'static {
    /// Resolves `url` into metadata without downloading anything.
    fn fetch_info(
        &self,
        url: &str,
        options: &InfoOptions,
    ) -> impl Future<Output = Result<VideoInfo>> + Send;

    /// Downloads `url` to disk, pushing progress events into `progress_tx`.
    ///
    /// The sender is dropped when the download ends.
    fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        progress_tx: UnboundedSender<ProgressEvent>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// yt-dlp driven through its command line
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
}

impl YtDlp {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Uses the configured executable, else the embedded one, else `yt-dlp` from `PATH`.
    pub fn from_config(config: &AppConfig) -> Self {
        if let Some(path) = &config.ytdlp_path {
            return Self::new(path);
        }
        let bin = if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" };
        match unpack_embedded(bin) {
            Ok(Some(path)) => Self::new(path),
            Ok(None) => Self::new(bin),
            Err(e) => {
                log::warn!("Could not unpack embedded {bin}, falling back to PATH: {e}");
                Self::new(bin)
            }
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

// Writes the embedded executable to the temp dir once; `None` if not embedded
fn unpack_embedded(bin: &str) -> std::io::Result<Option<PathBuf>> {
    let Some(data) = Asset::get(bin) else {
        return Ok(None);
    };
    let tmp = std::env::temp_dir().join(bin);
    if !tmp.exists() {
        let mut f = File::create(&tmp)?;
        f.write_all(&data.data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o755))?;
        }
    }
    Ok(Some(tmp))
}

impl ExtractionClient for YtDlp {
    async fn fetch_info(&self, url: &str, options: &InfoOptions) -> Result<VideoInfo> {
        let args = info_args(options, url);
        log::debug!("Running {} {:?}", self.binary.display(), args);

        // Collect stdout (the JSON document) and stderr in one go
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                AppError::Extraction(format!("could not run {}: {e}", self.binary.display()))
            })?;

        // A non-zero exit carries the reason on stderr
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Extraction(failure_reason(&stderr, output.status)));
        }
        parse_video_info(&output.stdout)
    }

    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        progress_tx: UnboundedSender<ProgressEvent>,
    ) -> Result<()> {
        let args = download_args(options, url);
        log::debug!("Running {} {:?}", self.binary.display(), args);

        // Spawn yt-dlp with both pipes captured; an early return kills it
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AppError::Download(format!("could not run {}: {e}", self.binary.display()))
            })?;

        // Take ownership of the pipes so they can be read independently
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Download("yt-dlp stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Download("yt-dlp stderr was not captured".into()))?;

        // Drain stderr alongside stdout so neither pipe fills up
        let stderr_reader = tokio::spawn(async move {
            let mut buf = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::debug!("yt-dlp: {line}");
                buf.push_str(&line);
                buf.push('\n');
            }
            buf
        });

        // Read stdout line by line, forwarding every progress line we recognise
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| AppError::Download(format!("reading yt-dlp output: {e}")))?
        {
            match parse_progress_from_line(&line) {
                Some(event) => {
                    // Receiver gone only means nobody is watching any more
                    let _ = progress_tx.send(event);
                }
                None => log::trace!("yt-dlp: {line}"),
            }
        }

        // stdout closed: wait for the exit code and the collected stderr
        let status = child
            .wait()
            .await
            .map_err(|e| AppError::Download(format!("waiting for yt-dlp: {e}")))?;
        let stderr = stderr_reader.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(AppError::Download(failure_reason(&stderr, status)))
        }
    }
}

/// Command line for a metadata-only request.
pub fn info_args(options: &InfoOptions, url: &str) -> Vec<String> {
    let mut args = vec!["--dump-single-json".to_owned(), "--skip-download".to_owned()];
    if options.quiet {
        args.push("--quiet".to_owned());
    }
    if options.no_warnings {
        args.push("--no-warnings".to_owned());
    }
    if options.noplaylist {
        args.push("--no-playlist".to_owned());
    }
    if options.extract_flat {
        args.push("--flat-playlist".to_owned());
    }
    args.push("--".to_owned());
    args.push(url.to_owned());
    args
}

/// Command line for a download request.
pub fn download_args(options: &DownloadOptions, url: &str) -> Vec<String> {
    let mut args = vec![
        "--newline".to_owned(),
        "--progress".to_owned(),
        "--progress-template".to_owned(),
        PROGRESS_TEMPLATE.to_owned(),
        "-o".to_owned(),
        options.output_path_template.clone(),
    ];
    if options.noplaylist {
        args.push("--no-playlist".to_owned());
    }
    if let Some(cookies) = &options.cookie_file {
        args.push("--cookies".to_owned());
        args.push(cookies.to_string_lossy().into_owned());
    }
    match &options.selection {
        FormatSelection::ThumbnailOnly => {
            args.push("--skip-download".to_owned());
            args.push("--write-thumbnail".to_owned());
        }
        FormatSelection::Format(expr) => {
            args.push("-f".to_owned());
            args.push(expr.clone());
        }
    }
    if let Some(referer) = &options.referer {
        args.push("--referer".to_owned());
        args.push(referer.clone());
    }
    if let Some(ua) = &options.user_agent {
        args.push("--user-agent".to_owned());
        args.push(ua.clone());
    }
    args.push("--".to_owned());
    args.push(url.to_owned());
    args
}

#[derive(Deserialize)]
struct RawInfo {
    title: Option<String>,
    thumbnail: Option<String>,
    formats: Option<Vec<RawFormat>>,
}

#[derive(Deserialize)]
struct RawFormat {
    format_id: Option<String>,
    /// Outer `None`: key absent. `Some(None)`: explicit `null`
    #[serde(default, deserialize_with = "present_field")]
    vcodec: Option<Option<String>>,
    height: Option<f64>,
    filesize: Option<f64>,
}

// Wraps whatever is there in `Some`, so a `null` is told apart from a missing key
fn present_field<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl From<RawFormat> for FormatDescriptor {
    fn from(raw: RawFormat) -> Self {
        FormatDescriptor {
            selector: raw.format_id,
            // Only a missing key or the literal "none" means audio-only; null is an unknown codec
            video_codec_present: match raw.vcodec {
                None => false,
                Some(Some(codec)) => codec != "none",
                Some(None) => true,
            },
            height_px: raw.height.filter(|h| *h >= 0.0).map(|h| h as u32),
            file_size_bytes: raw.filesize.filter(|s| *s >= 0.0).map(|s| s as u64),
        }
    }
}

/// Parses the `--dump-single-json` document.
pub fn parse_video_info(json: &[u8]) -> Result<VideoInfo> {
    let raw: RawInfo = serde_json::from_slice(json)
        .map_err(|e| AppError::Extraction(format!("yt-dlp returned invalid JSON: {e}")))?;
    Ok(VideoInfo {
        title: raw.title,
        thumbnail: raw.thumbnail.filter(|t| !t.is_empty()),
        formats: raw
            .formats
            .unwrap_or_default()
            .into_iter()
            .map(FormatDescriptor::from)
            .collect(),
    })
}

// Last non-empty stderr line, without yt-dlp's "ERROR: " tag
fn failure_reason(stderr: &str, status: ExitStatus) -> String {
    stderr
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .map(|l| l.strip_prefix("ERROR:").unwrap_or(l).trim().to_string())
        .unwrap_or_else(|| format!("yt-dlp exited with {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(selection: FormatSelection) -> DownloadOptions {
        DownloadOptions {
            output_path_template: "/dl/%(title)s.%(ext)s".into(),
            noplaylist: true,
            cookie_file: None,
            selection,
            referer: None,
            user_agent: None,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn info_args_cover_every_knob() {
        let args = info_args(&InfoOptions::default(), "https://example.com/watch?v=abc");
        for flag in ["--dump-single-json", "--quiet", "--no-warnings", "--no-playlist", "--flat-playlist"] {
            assert!(args.iter().any(|a| a == flag), "missing {flag}");
        }
        assert_eq!(args.last().unwrap(), "https://example.com/watch?v=abc");
    }

    #[test]
    fn info_args_respect_disabled_knobs() {
        let opts = InfoOptions {
            quiet: false,
            extract_flat: false,
            ..InfoOptions::default()
        };
        let args = info_args(&opts, "u");
        assert!(!args.iter().any(|a| a == "--quiet" || a == "--flat-playlist"));
    }

    #[test]
    fn download_args_for_format() {
        let mut opts = options(FormatSelection::Format("22+bestaudio/best".into()));
        opts.cookie_file = Some(PathBuf::from("assets/cookies.txt"));
        opts.referer = Some("https://snackvideo.com/".into());
        opts.user_agent = Some("UA".into());

        let args = download_args(&opts, "https://snackvideo.com/x");
        assert_eq!(value_after(&args, "-f"), Some("22+bestaudio/best"));
        assert_eq!(value_after(&args, "-o"), Some("/dl/%(title)s.%(ext)s"));
        assert_eq!(value_after(&args, "--cookies"), Some("assets/cookies.txt"));
        assert_eq!(value_after(&args, "--referer"), Some("https://snackvideo.com/"));
        assert_eq!(value_after(&args, "--user-agent"), Some("UA"));
        assert_eq!(value_after(&args, "--progress-template"), Some(PROGRESS_TEMPLATE));
        assert!(args.iter().any(|a| a == "--no-playlist"));
        assert!(!args.iter().any(|a| a == "--skip-download"));
    }

    #[test]
    fn download_args_for_thumbnail() {
        let args = download_args(&options(FormatSelection::ThumbnailOnly), "u");
        assert!(args.iter().any(|a| a == "--skip-download"));
        assert!(args.iter().any(|a| a == "--write-thumbnail"));
        assert_eq!(value_after(&args, "-f"), None);
        assert_eq!(value_after(&args, "--cookies"), None);
    }

    #[test]
    fn parses_formats_and_thumbnail() {
        let json = serde_json::json!({
            "title": "Clip",
            "thumbnail": "https://i.example.com/abc.jpg",
            "formats": [
                { "format_id": "140", "vcodec": "none", "acodec": "mp4a.40.2", "filesize": 3_000_000 },
                { "format_id": "22", "vcodec": "avc1.64001F", "height": 720, "filesize": 10_485_760 },
                { "format_id": "hls", "height": null }
            ]
        });
        let info = parse_video_info(json.to_string().as_bytes()).unwrap();

        assert_eq!(info.title.as_deref(), Some("Clip"));
        assert_eq!(info.thumbnail.as_deref(), Some("https://i.example.com/abc.jpg"));
        assert_eq!(info.formats.len(), 3);
        assert!(!info.formats[0].video_codec_present);
        assert_eq!(
            info.formats[1],
            FormatDescriptor {
                selector: Some("22".into()),
                video_codec_present: true,
                height_px: Some(720),
                file_size_bytes: Some(10_485_760),
            }
        );
        assert!(!info.formats[2].video_codec_present);
    }

    #[test]
    fn null_codec_still_counts_as_video() {
        let json = br#"{"formats": [
            {"format_id": "http-720", "vcodec": null, "height": 720, "filesize": 10485760}
        ]}"#;
        let info = parse_video_info(json).unwrap();
        assert!(info.formats[0].video_codec_present);

        let options = crate::formats::build_format_options(&info.formats).unwrap();
        assert_eq!(options.len(), 4);
        assert_eq!(options[3].selector, "http-720");
        assert_eq!(options[3].label, "720p - 10 MB (.mp4)");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_output_kills_the_child() {
        use std::os::unix::fs::PermissionsExt;
        use tokio::sync::mpsc::unbounded_channel;

        // Stand-in extractor: emits invalid UTF-8, then would leave a marker behind
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("still-running");
        let script = dir.path().join("fake-yt-dlp");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nprintf '\\377\\376\\n'\nsleep 1\ntouch '{}'\n",
                marker.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let (tx, _rx) = unbounded_channel();
        let err = YtDlp::new(&script)
            .download("u", &options(FormatSelection::ThumbnailOnly), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Download(_)));

        std::thread::sleep(std::time::Duration::from_millis(1500));
        assert!(!marker.exists());
    }

    #[test]
    fn missing_format_list_is_empty() {
        let info = parse_video_info(br#"{"title": "x", "thumbnail": ""}"#).unwrap();
        assert!(info.formats.is_empty());
        assert_eq!(info.thumbnail, None);
    }

    #[test]
    fn garbage_json_is_an_extraction_error() {
        let err = parse_video_info(b"not json").unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
    }

    #[test]
    fn missing_format_id_is_kept_as_none() {
        let info = parse_video_info(br#"{"formats": [{"vcodec": "vp9", "height": 360}]}"#).unwrap();
        assert_eq!(info.formats[0].selector, None);
    }
}
