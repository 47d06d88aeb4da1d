pub mod builder;

use builder::{BuildInput, build_bundle, bundle_dir_name, write_bundle};
use clap::{Parser, Subcommand, ValueEnum};
use intake_server::{ServerConfig, StorageConfig};
use intake_spec::{
    FormDocument, RawValues, ValidationReport, ValueEntry, build_form_view, render_json_ui,
    render_text, validate, values_from_entries,
};
use serde_json::Value;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Intake form tooling",
    long_about = "Serves the intake HTTP API and provides build, preview, and validation helpers for form documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// JSON server configuration file.
        #[arg(long, value_name = "CONFIG", env = "INTAKE_CONFIG")]
        config: Option<PathBuf>,
        /// Listen address (overrides config and INTAKE_BIND).
        #[arg(long, value_name = "ADDR")]
        bind: Option<SocketAddr>,
        /// Persist to this JSON snapshot instead of memory.
        #[arg(long, value_name = "FILE")]
        data_file: Option<PathBuf>,
    },
    /// Validate values against a form document.
    Validate {
        /// Path to the form document JSON (`{form, fields}`).
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        /// Values as an object keyed by field name, or `[{field_id, value}]`.
        #[arg(long, value_name = "VALUES")]
        values: PathBuf,
    },
    /// Show the ordered field list of a form, optionally with values.
    Preview {
        #[arg(long, value_name = "FORM")]
        form: PathBuf,
        #[arg(long, value_name = "VALUES")]
        values: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Build a form document bundle from a JSON description.
    Build {
        /// JSON file with `institution_id`, `name`, `type`, and `fields`.
        #[arg(long, value_name = "INPUT")]
        input: PathBuf,
        /// Root directory for the bundle (defaults to the current directory).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
        /// Overwrite an existing bundle.
        #[arg(long)]
        force: bool,
    },
    /// Print the JSON Schema of the form document format.
    Schema,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            config,
            bind,
            data_file,
        } => run_serve(config, bind, data_file),
        Command::Validate { form, values } => run_validate(form, values),
        Command::Preview {
            form,
            values,
            format,
        } => run_preview(form, values, format),
        Command::Build { input, out, force } => run_build(input, out, force),
        Command::Schema => run_schema(),
    }
}

fn run_serve(
    config_path: Option<PathBuf>,
    bind: Option<SocketAddr>,
    data_file: Option<PathBuf>,
) -> CliResult<()> {
    let mut config = ServerConfig::load(config_path.as_deref())?;
    if let Some(bind) = bind {
        config.bind = bind;
    }
    if let Some(path) = data_file {
        config.storage = StorageConfig::File { path };
    }

    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing::debug!(bind = %config.bind, storage = ?config.storage, "configuration loaded");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(intake_server::serve(config))?;
    Ok(())
}

fn run_validate(form_path: PathBuf, values_path: PathBuf) -> CliResult<()> {
    let document = read_document(&form_path)?;
    let values = read_values(&document, &values_path)?;

    let report = validate(&document.fields, &values);
    println!(
        "Validation result: {}",
        if report.valid { "valid" } else { "invalid" }
    );
    describe_validation(&report);

    if report.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(report: &ValidationReport) {
    if !report.errors.is_empty() {
        println!("Errors:");
        for error in &report.errors {
            println!(
                "  {} - {}",
                error.field_name.as_deref().unwrap_or("<form>"),
                error.message
            );
        }
    }
    if !report.unknown_fields.is_empty() {
        let ids: Vec<String> = report.unknown_fields.iter().map(ToString::to_string).collect();
        println!("Unknown field ids: {}", ids.join(", "));
    }
}

fn run_preview(form_path: PathBuf, values_path: Option<PathBuf>, format: RenderMode) -> CliResult<()> {
    let document = read_document(&form_path)?;
    let (values, report) = match values_path {
        Some(path) => {
            let values = read_values(&document, &path)?;
            let report = validate(&document.fields, &values);
            (values, Some(report))
        }
        None => (RawValues::new(), None),
    };

    let view = build_form_view(&document, &values, report.as_ref());
    match format {
        RenderMode::Text => println!("{}", render_text(&view)),
        RenderMode::Json => println!("{}", serde_json::to_string_pretty(&render_json_ui(&view))?),
    }
    Ok(())
}

fn run_build(input_path: PathBuf, out_dir: Option<PathBuf>, force: bool) -> CliResult<()> {
    let contents = fs::read_to_string(&input_path)?;
    let input: BuildInput = serde_json::from_str(&contents)?;
    let out_root = match out_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let bundle = build_bundle(&input)?;
    let bundle_dir = out_root.join(bundle_dir_name(&bundle.document));
    if bundle_dir.exists() {
        if force {
            fs::remove_dir_all(&bundle_dir)?;
        } else {
            return Err(format!(
                "bundle {} already exists; rerun with --force to overwrite",
                bundle_dir.display()
            )
            .into());
        }
    }

    let bundle_dir = write_bundle(&bundle, &out_root)?;
    println!(
        "Built form '{}' with {} fields at {}",
        bundle.document.form.name,
        bundle.document.fields.len(),
        bundle_dir.display()
    );
    Ok(())
}

fn run_schema() -> CliResult<()> {
    let schema = schemars::schema_for!(FormDocument);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn read_document(path: &Path) -> CliResult<FormDocument> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    Ok(serde_json::from_str(&contents)?)
}

fn read_values(document: &FormDocument, path: &Path) -> CliResult<RawValues> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    values_from_json(document, serde_json::from_str(&contents)?)
}

/// Accepts either an object keyed by field name or a list of
/// `{field_id, value}` entries.
fn values_from_json(document: &FormDocument, raw: Value) -> CliResult<RawValues> {
    match raw {
        Value::Array(_) => {
            let entries: Vec<ValueEntry> = serde_json::from_value(raw)?;
            Ok(values_from_entries(entries)?)
        }
        Value::Object(map) => {
            let mut values = RawValues::new();
            for (name, value) in map {
                let field = document
                    .field_by_name(&name)
                    .ok_or_else(|| format!("form has no field named '{name}'"))?;
                values.insert(field.field_id, value);
            }
            Ok(values)
        }
        _ => Err("values must be a JSON object or an array of {field_id, value}".into()),
    }
}
