use std::fmt;

use tallygrid_recon::ReconError;

/// Template retrieval failure.
#[derive(Debug)]
pub enum FetchError {
    /// Locator is neither a path nor a supported URL
    InvalidLocator(String),
    /// Local file missing or unreadable
    Io { path: String, message: String },
    /// Connection, TLS, timeout, or body read failure
    Network(String),
    /// Server answered with a non-success status
    Http { status: u16, url: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::InvalidLocator(loc) => write!(f, "invalid template locator: {loc}"),
            FetchError::Io { path, message } => write!(f, "cannot read template {path}: {message}"),
            FetchError::Network(msg) => write!(f, "template download failed: {msg}"),
            FetchError::Http { status, url } => write!(f, "template download failed: HTTP {status} from {url}"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Workbook bytes could not be read or written as xlsx.
#[derive(Debug)]
pub enum XlsxError {
    Open(String),
    NoSheets,
    Sheet { name: String, message: String },
    /// The xlsx package (zip parts) could not be read for formatting
    Package(String),
    Write(String),
}

impl fmt::Display for XlsxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XlsxError::Open(msg) => write!(f, "failed to open workbook: {msg}"),
            XlsxError::NoSheets => write!(f, "workbook contains no sheets"),
            XlsxError::Sheet { name, message } => write!(f, "failed to read sheet '{name}': {message}"),
            XlsxError::Package(msg) => write!(f, "failed to read workbook package: {msg}"),
            XlsxError::Write(msg) => write!(f, "failed to write workbook: {msg}"),
        }
    }
}

impl std::error::Error for XlsxError {}

/// Any fatal failure of a report build.
#[derive(Debug)]
pub enum ReportError {
    Fetch(FetchError),
    Xlsx(XlsxError),
    Recon(ReconError),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Fetch(e) => e.fmt(f),
            ReportError::Xlsx(e) => e.fmt(f),
            ReportError::Recon(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Fetch(e) => Some(e),
            ReportError::Xlsx(e) => Some(e),
            ReportError::Recon(e) => Some(e),
        }
    }
}

impl From<FetchError> for ReportError {
    fn from(e: FetchError) -> Self {
        ReportError::Fetch(e)
    }
}

impl From<XlsxError> for ReportError {
    fn from(e: XlsxError) -> Self {
        ReportError::Xlsx(e)
    }
}

impl From<ReconError> for ReportError {
    fn from(e: ReconError) -> Self {
        ReportError::Recon(e)
    }
}
