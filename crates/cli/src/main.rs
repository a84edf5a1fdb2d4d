// TallyGrid CLI - fill achievement report templates from JSON payloads

mod exit_codes;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use serde_json::json;

use tallygrid_config::Settings;
use tallygrid_engine::cell_id::col_to_letters;
use tallygrid_io::xlsx::import_bytes;
use tallygrid_io::{build_report, DefaultSource, FetchOptions, ReportRequest, TemplateSource};
use tallygrid_recon::schema::{build_sheet_context, HeaderLabels, SheetContext};
use tallygrid_recon::tokenize::tokenize;

use exit_codes::{
    report_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_FETCH, EXIT_OUTPUT, EXIT_PAYLOAD, EXIT_SUCCESS,
    EXIT_TEMPLATE_FORMAT, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "tgrid")]
#[command(about = "Fill achievement report templates from sales payloads")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Settings file (default: <config dir>/tallygrid/settings.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a JSON payload into a template and write the report
    #[command(after_help = "\
Examples:
  tgrid build -t templates/achievement.xlsx -p sales.json --start 2024-01-01 --end 2024-01-31
  curl -s $API/achievements | tgrid build -t https://cdn.example.com/achievement.xlsx -p - --json")]
    Build {
        /// Template path, file:// URL, or http(s):// URL
        #[arg(long, short = 't')]
        template: String,

        /// Payload JSON file, or - for stdin
        #[arg(long, short = 'p')]
        payload: String,

        /// Start of the reporting period (used in the file name)
        #[arg(long)]
        start: Option<String>,

        /// End of the reporting period (used in the file name)
        #[arg(long)]
        end: Option<String>,

        /// Directory for the report (default: settings output.dir, else .)
        #[arg(long, short = 'o', value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the schema detected on each sheet of a template
    Inspect {
        /// Template path, file:// URL, or http(s):// URL
        #[arg(long, short = 't')]
        template: String,

        /// Only this sheet
        #[arg(long)]
        sheet: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the match tokens of an item description
    Tokens {
        description: String,

        /// Output as JSON array
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Build {
            template,
            payload,
            start,
            end,
            output_dir,
            json,
        } => cmd_build(cli.config.as_deref(), template, payload, start, end, output_dir, json),
        Commands::Inspect { template, sheet, json } => {
            cmd_inspect(cli.config.as_deref(), template, sheet, json)
        }
        Commands::Tokens { description, json } => cmd_tokens(description, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn config(err: tallygrid_config::ConfigError) -> Self {
        Self::new(EXIT_CONFIG, err.to_string())
            .with_hint(format!("check {}", Settings::config_path().display()))
    }

    pub fn report(err: tallygrid_io::ReportError) -> Self {
        let code = report_exit_code(&err);
        let hint = match code {
            exit_codes::EXIT_TEMPLATE_UNRECOGNIZED => {
                Some("run `tgrid inspect -t <template>` to see what each sheet looks like".to_string())
            }
            exit_codes::EXIT_FETCH_HTTP => Some("check the template URL and its access token".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Shared setup
// ============================================================================

fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::usage(format!("config file not found: {}", path.display())));
            }
            Settings::load_from(path).map_err(CliError::config)
        }
        None => Settings::load().map_err(CliError::config),
    }
}

fn template_source(settings: &Settings) -> DefaultSource {
    let mut options = FetchOptions {
        timeout: settings.fetch.timeout(),
        ..FetchOptions::default()
    };
    if let Some(agent) = settings.user_agent() {
        options.user_agent = agent.to_string();
    }
    DefaultSource::new(options)
}

fn read_payload(source: &str) -> Result<serde_json::Value, CliError> {
    let text = if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| CliError::new(EXIT_PAYLOAD, format!("cannot read payload from stdin: {}", e)))?;
        buf
    } else {
        fs::read_to_string(source)
            .map_err(|e| CliError::new(EXIT_PAYLOAD, format!("cannot read payload {}: {}", source, e)))?
    };

    serde_json::from_str(&text)
        .map_err(|e| CliError::new(EXIT_PAYLOAD, format!("payload is not valid JSON: {}", e)))
}

// ============================================================================
// build
// ============================================================================

fn cmd_build(
    config: Option<&Path>,
    template: String,
    payload: String,
    start: Option<String>,
    end: Option<String>,
    output_dir: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let payload = read_payload(&payload)?;

    let request = ReportRequest {
        template,
        payload,
        start_date: start,
        end_date: end,
    };
    let source = template_source(&settings);
    let output = build_report(&source, &request, &settings.recon).map_err(CliError::report)?;

    let dir = output_dir
        .or_else(|| settings.output.dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir)
        .map_err(|e| CliError::new(EXIT_OUTPUT, format!("cannot create {}: {}", dir.display(), e)))?;
    let path = dir.join(&output.file_name);
    fs::write(&path, &output.workbook_bytes)
        .map_err(|e| CliError::new(EXIT_OUTPUT, format!("cannot write {}: {}", path.display(), e)))?;

    let summary = &output.summary;
    if json {
        let doc = json!({
            "output": path.display().to_string(),
            "fileName": output.file_name,
            "summary": summary,
        });
        let text = serde_json::to_string_pretty(&doc)
            .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
        println!("{}", text);
    } else {
        println!("wrote {}", path.display());
        println!("  records:  {} ({} skipped)", summary.record_count, summary.skipped_records);
        if summary.updated_sheet_names.is_empty() {
            println!("  cells:    {}", summary.filled_cells);
        } else {
            println!(
                "  cells:    {} on {} sheets ({})",
                summary.filled_cells,
                summary.sheets_updated,
                summary.updated_sheet_names.join(", ")
            );
        }
    }
    Ok(())
}

// ============================================================================
// inspect
// ============================================================================

fn cmd_inspect(
    config: Option<&Path>,
    template: String,
    sheet: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let bytes = template_source(&settings)
        .fetch(&template)
        .map_err(|e| CliError::new(EXIT_FETCH, e.to_string()))?;
    let workbook =
        import_bytes(&bytes).map_err(|e| CliError::new(EXIT_TEMPLATE_FORMAT, e.to_string()))?;

    let names: Vec<String> = match &sheet {
        Some(name) => {
            if workbook.sheet_by_name(name).is_none() {
                return Err(CliError::usage(format!("no sheet named '{}'", name))
                    .with_hint(format!("sheets: {}", workbook.sheet_names().join(", "))));
            }
            vec![name.clone()]
        }
        None => workbook.sheet_names().iter().map(|s| s.to_string()).collect(),
    };

    let labels = HeaderLabels::from_config(&settings.recon);
    let cumulative = tallygrid_recon::engine::find_cumulative_sheet(&workbook, &settings.recon.cumulative_markers);

    let mut reports = Vec::new();
    for name in &names {
        let ctx = build_sheet_context(&workbook, name, &labels);
        let is_cumulative = cumulative.as_deref() == Some(name.as_str());
        if json {
            reports.push(sheet_json(name, ctx.as_ref(), is_cumulative));
        } else {
            print_sheet(name, ctx.as_ref(), is_cumulative);
        }
    }

    if json {
        let text = serde_json::to_string_pretty(&reports)
            .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
        println!("{}", text);
    }
    Ok(())
}

fn sheet_json(name: &str, ctx: Option<&SheetContext>, is_cumulative: bool) -> serde_json::Value {
    match ctx {
        None => json!({ "name": name, "recognized": false, "cumulative": is_cumulative }),
        Some(ctx) => json!({
            "name": name,
            "recognized": true,
            "cumulative": is_cumulative,
            "header_row": ctx.header_row + 1,
            "item_column": col_to_letters(ctx.item_column),
            "territories": ctx.columns,
            "items": ctx.item_row_map.len(),
            "serials": ctx.sr_row_map.len(),
        }),
    }
}

fn print_sheet(name: &str, ctx: Option<&SheetContext>, is_cumulative: bool) {
    let marker = if is_cumulative { " [cumulative]" } else { "" };
    let Some(ctx) = ctx else {
        println!("{}{}: no recognizable header", name, marker);
        return;
    };
    println!("{}{}", name, marker);
    println!("  header row:   {}", ctx.header_row + 1);
    println!("  item column:  {}", col_to_letters(ctx.item_column));
    println!("  items:        {} ({} serials)", ctx.item_row_map.len(), ctx.sr_row_map.len());
    for column in &ctx.columns {
        let total = if column.is_total { "  (total, never written)" } else { "" };
        println!("  {:>4}  {}{}", col_to_letters(column.col), column.header, total);
    }
}

// ============================================================================
// tokens
// ============================================================================

fn cmd_tokens(description: String, json: bool) -> Result<(), CliError> {
    let tokens: Vec<String> = tokenize(&description).into_iter().collect();
    if json {
        let text = serde_json::to_string(&tokens).map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
        println!("{}", text);
    } else if tokens.is_empty() {
        println!("(no tokens)");
    } else {
        println!("{}", tokens.join(" "));
    }
    Ok(())
}
