use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty label, zero scan depth, etc.).
    ConfigValidation(String),
    /// No sheet in the template has a recognizable header row.
    TemplateNotRecognized { sheets: Vec<String> },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::TemplateNotRecognized { sheets } => {
                if sheets.is_empty() {
                    write!(f, "template format not recognized: workbook has no sheets")
                } else {
                    write!(
                        f,
                        "template format not recognized: no item header found on sheets {}",
                        sheets.join(", ")
                    )
                }
            }
        }
    }
}

impl std::error::Error for ReconError {}
