//! One report build: fetch the template, merge the payload, serialize.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tallygrid_recon::{report_file_name, run, RawPayload, ReconConfig};

use crate::error::ReportError;
use crate::fetch::{template_name, TemplateSource};
use crate::xlsx::{export_bytes, import_bytes};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    /// File path, `file://` URL, or `http(s)://` URL of the template.
    #[serde(alias = "templateUrl")]
    pub template: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub record_count: usize,
    pub filled_cells: usize,
    pub sheets_updated: usize,
    /// Names behind `sheets_updated`, in first-write order.
    pub updated_sheet_names: Vec<String>,
    pub skipped_records: usize,
    pub template_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReportOutput {
    pub workbook_bytes: Vec<u8>,
    pub file_name: String,
    pub summary: ReportSummary,
}

/// Build a filled report. Fetch, template and schema failures are fatal;
/// unresolvable records are only counted.
pub fn build_report(
    source: &dyn TemplateSource,
    request: &ReportRequest,
    config: &ReconConfig,
) -> Result<ReportOutput, ReportError> {
    let bytes = source.fetch(&request.template)?;
    let mut workbook = import_bytes(&bytes)?;

    let payload = RawPayload::from_value(request.payload.clone());
    let recon = run(&mut workbook, &payload, config)?;
    let workbook_bytes = export_bytes(&workbook)?;

    let template_name = template_name(&request.template);
    let file_name = report_file_name(
        &template_name,
        request.start_date.as_deref(),
        request.end_date.as_deref(),
    );

    Ok(ReportOutput {
        workbook_bytes,
        file_name,
        summary: ReportSummary {
            record_count: recon.record_count,
            filled_cells: recon.filled_cells,
            sheets_updated: recon.sheets_updated.len(),
            updated_sheet_names: recon.sheets_updated,
            skipped_records: recon.skipped_records,
            template_name,
            start_date: request.start_date.clone(),
            end_date: request.end_date.clone(),
        },
    })
}
