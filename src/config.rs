use std::path::{Path, PathBuf};

/// File name template appended to the download directory
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Cookie file handed to the extractor for authenticated sites
pub const DEFAULT_COOKIE_FILE: &str = "assets/cookies.txt";

/// Paths and knobs shared by every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Where finished downloads land (created on demand)
    pub download_dir: PathBuf,
    /// yt-dlp output template relative to `download_dir`
    pub output_template: String,
    /// Netscape-format cookie file, used only if present and non-empty
    pub cookie_file: PathBuf,
    /// Explicit yt-dlp executable; otherwise embedded binary or `PATH`
    pub ytdlp_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            output_template: DEFAULT_OUTPUT_TEMPLATE.to_string(),
            cookie_file: PathBuf::from(DEFAULT_COOKIE_FILE),
            ytdlp_path: None,
        }
    }
}

impl AppConfig {
    /// Full output template, e.g. `/home/me/Downloads/%(title)s.%(ext)s`.
    pub fn output_path_template(&self) -> String {
        self.download_dir
            .join(&self.output_template)
            .to_string_lossy()
            .into_owned()
    }

    /// The cookie file, if there is anything in it worth passing along.
    pub fn usable_cookie_file(&self) -> Option<&Path> {
        match std::fs::metadata(&self.cookie_file) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Some(self.cookie_file.as_path()),
            _ => None,
        }
    }
}

/// `~/Downloads`, or `./downloads` when there is no home directory.
pub fn default_download_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("Downloads"))
        .unwrap_or_else(|| PathBuf::from("./downloads"))
}
