// Template fetch, Excel import/export, and the report-building facade

pub mod error;
pub mod fetch;
pub mod report;
pub mod xlsx;
pub mod xlsx_styles;

pub use error::{FetchError, ReportError, XlsxError};
pub use fetch::{template_name, DefaultSource, FetchOptions, TemplateSource};
pub use report::{build_report, ReportOutput, ReportRequest, ReportSummary};
