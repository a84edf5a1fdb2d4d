//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                                  |
//! |---------|------------------|----------------------------------------------|
//! | 0       | Universal        | Success                                      |
//! | 1       | Universal        | General error (unspecified)                  |
//! | 2       | Universal        | CLI usage error (bad args, missing file)     |
//! | 3-9     | config           | Settings file problems                       |
//! | 10-19   | fetch            | Template download / read                     |
//! | 20-29   | template         | Template format and schema                   |
//! | 30-39   | report           | Payload input and report output              |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use tallygrid_io::{FetchError, ReportError};
use tallygrid_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Config (3-9)
// =============================================================================

/// Settings file unreadable, malformed, or out of range.
pub const EXIT_CONFIG: u8 = 3;

// =============================================================================
// Fetch (10-19)
// =============================================================================

/// Template file missing or unreadable, or network failure.
pub const EXIT_FETCH: u8 = 10;

/// Template server answered with a non-success status.
pub const EXIT_FETCH_HTTP: u8 = 11;

// =============================================================================
// Template (20-29)
// =============================================================================

/// Template bytes are not a readable workbook.
pub const EXIT_TEMPLATE_FORMAT: u8 = 20;

/// No sheet has a recognizable item header.
pub const EXIT_TEMPLATE_UNRECOGNIZED: u8 = 21;

// =============================================================================
// Report (30-39)
// =============================================================================

/// Payload missing or not valid JSON.
pub const EXIT_PAYLOAD: u8 = 30;

/// Report could not be written.
pub const EXIT_OUTPUT: u8 = 31;

/// Map a report build error to its exit code.
pub fn report_exit_code(err: &ReportError) -> u8 {
    match err {
        ReportError::Fetch(FetchError::Http { .. }) => EXIT_FETCH_HTTP,
        ReportError::Fetch(_) => EXIT_FETCH,
        ReportError::Xlsx(_) => EXIT_TEMPLATE_FORMAT,
        ReportError::Recon(ReconError::TemplateNotRecognized { .. }) => EXIT_TEMPLATE_UNRECOGNIZED,
        ReportError::Recon(_) => EXIT_CONFIG,
    }
}
