// Configuration loading

pub mod settings;

pub use settings::{ConfigError, FetchSettings, OutputSettings, Settings};
