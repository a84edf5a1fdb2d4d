//! Template retrieval.
//!
//! Blocking: a template is fetched once, before any processing starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::OnceCell;
use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::FetchError;

/// Anything that can turn a template locator into workbook bytes.
pub trait TemplateSource {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("tgrid/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Where a locator points.
#[derive(Debug, Clone, PartialEq)]
enum Location {
    Http(Url),
    File(PathBuf),
}

fn locate(locator: &str) -> Result<Location, FetchError> {
    let trimmed = locator.trim();
    if trimmed.is_empty() {
        return Err(FetchError::InvalidLocator(locator.to_string()));
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        let url = Url::parse(trimmed).map_err(|e| FetchError::InvalidLocator(format!("{trimmed}: {e}")))?;
        return Ok(Location::Http(url));
    }
    if lower.starts_with("file://") {
        let path = Url::parse(trimmed)
            .ok()
            .and_then(|url| url.to_file_path().ok())
            .ok_or_else(|| FetchError::InvalidLocator(trimmed.to_string()))?;
        return Ok(Location::File(path));
    }
    Ok(Location::File(PathBuf::from(trimmed)))
}

/// Filesystem paths, `file://` URLs, and `http(s)://` URLs.
pub struct DefaultSource {
    options: FetchOptions,
    http: OnceCell<reqwest::blocking::Client>,
}

impl DefaultSource {
    pub fn new(options: FetchOptions) -> Self {
        Self { options, http: OnceCell::new() }
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, FetchError> {
        self.http.get_or_try_init(|| {
            reqwest::blocking::Client::builder()
                .user_agent(self.options.user_agent.clone())
                .timeout(self.options.timeout)
                .build()
                .map_err(|e| FetchError::Network(e.to_string()))
        })
    }

    fn fetch_http(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client()?
            .get(url.clone())
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Http {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl Default for DefaultSource {
    fn default() -> Self {
        Self::new(FetchOptions::default())
    }
}

impl TemplateSource for DefaultSource {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        let bytes = match locate(locator)? {
            Location::Http(url) => self.fetch_http(&url)?,
            Location::File(path) => read_file(&path)?,
        };
        log::info!("fetched template {locator} ({} bytes)", bytes.len());
        Ok(bytes)
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, FetchError> {
    std::fs::read(path).map_err(|e| FetchError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// File name of the template a locator points at (`"achievement.xlsx"`).
///
/// Query strings and fragments are ignored; URL paths are percent-decoded.
/// Falls back to `"template.xlsx"` when the locator has no final segment.
pub fn template_name(locator: &str) -> String {
    let name = match locate(locator) {
        Ok(Location::Http(url)) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned()),
        Ok(Location::File(path)) => path.file_name().map(|n| n.to_string_lossy().into_owned()),
        Err(_) => None,
    };
    name.map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "template.xlsx".to_string())
}
