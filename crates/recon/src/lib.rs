//! `tallygrid-recon`: achievement report reconciliation.
//!
//! Pure engine crate: receives a loaded template workbook and a JSON payload
//! of unknown shape, fills the template in place, returns a run summary.
//! No CLI or IO dependencies.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod resolve;
pub mod schema;
pub mod tokenize;
pub mod writer;

pub use config::ReconConfig;
pub use engine::{report_file_name, run};
pub use error::ReconError;
pub use extract::RawPayload;
pub use model::{CumulativeSource, Entry, EntryValue, Record, ReconSummary};
