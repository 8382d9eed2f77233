use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use hazdoc_io::{CachedCatalog, FilledDocument, FolderSource, TemplateHandle};
use hazdoc_model::{normalize, FieldMap, FieldValue};
use hazdoc_refdata::{CsvDirStore, ReferenceData};

mod config;
mod declare;
mod refdata;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "hazdoc")]
#[command(about = "Fill hazardous-goods declaration templates", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file (default: ./hazdoc.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding the .docx / .xlsx / .xltx templates
    #[arg(long, global = true)]
    templates_dir: Option<PathBuf>,

    /// Folder holding the reference tables as `<sheet name>.csv`
    #[arg(long, global = true)]
    refdata_dir: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available templates
    Templates,
    /// List the field keys a template references
    Placeholders {
        /// Template display name or path
        template: String,
    },
    /// Fill a template from a JSON object of field values
    Fill(FillArgs),
    /// Fill a template from reference data plus declaration input
    Declare(declare::DeclareArgs),
    /// Show or extend the reference tables
    #[command(subcommand)]
    Refdata(refdata::RefdataCommand),
}

#[derive(Args, Debug)]
struct FillArgs {
    /// Template display name or path
    template: String,

    /// JSON file with the field values, `-` for stdin
    #[arg(long)]
    fields: PathBuf,

    /// Output folder (default: `output_dir` from the config)
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

/// Settings for one invocation: the config file with command-line overrides applied.
pub(crate) struct Session {
    pub(crate) config: Config,
    pub(crate) json: bool,
}

#[derive(Serialize)]
struct TemplateEntry<'a> {
    name: &'a str,
    path: &'a Path,
}

#[derive(Serialize)]
struct WrittenDocument<'a> {
    path: &'a Path,
    file_name: &'a str,
    mime_type: &'a str,
    bytes: usize,
}

impl Session {
    fn catalog(&self) -> CachedCatalog<FolderSource> {
        CachedCatalog::new(
            FolderSource::new(&self.config.templates_dir),
            self.config.cache_ttl(),
        )
    }

    pub(crate) fn reference_data(&self) -> ReferenceData<CsvDirStore> {
        ReferenceData::with_ttl(
            CsvDirStore::new(&self.config.refdata_dir),
            self.config.cache_ttl(),
        )
    }

    /// An existing file path is used as is; anything else is a catalog display name.
    pub(crate) fn resolve_template(&self, template: &str) -> Result<TemplateHandle> {
        let path = Path::new(template);
        if path.is_file() {
            return Ok(TemplateHandle::from_path(path));
        }
        match self.catalog().get(template)? {
            Some(handle) => Ok(handle),
            None => bail!(
                "no template named `{template}` in {}",
                self.config.templates_dir.display()
            ),
        }
    }

    pub(crate) fn print_json(&self, value: &impl Serialize) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Persist a filled document and report where it went.
    pub(crate) fn write_output(
        &self,
        document: &FilledDocument,
        out_dir: Option<&Path>,
    ) -> Result<()> {
        let dir = out_dir.unwrap_or(&self.config.output_dir);
        let path = hazdoc_io::write_filled(document, dir)?;
        if self.json {
            self.print_json(&WrittenDocument {
                path: &path,
                file_name: &document.file_name,
                mime_type: document.mime_type,
                bytes: document.bytes.len(),
            })
        } else {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn list_templates(session: &Session) -> Result<()> {
    let templates = session.catalog().list()?;
    if session.json {
        let entries: Vec<TemplateEntry<'_>> = templates
            .values()
            .map(|t| TemplateEntry {
                name: &t.display_name,
                path: &t.path,
            })
            .collect();
        return session.print_json(&entries);
    }
    for template in templates.values() {
        println!("{}\t{}", template.display_name, template.path.display());
    }
    Ok(())
}

fn list_placeholders(session: &Session, template: &str) -> Result<()> {
    let handle = session.resolve_template(template)?;
    let keys = hazdoc_io::placeholders(&handle)?;
    if session.json {
        return session.print_json(&keys);
    }
    for key in keys {
        println!("{key}");
    }
    Ok(())
}

/// Parse a JSON object of field values. Keys are normalized; values must be strings or
/// numbers (`null` counts as an empty string).
fn parse_fields(content: &str) -> Result<FieldMap> {
    let object: serde_json::Map<String, Value> =
        serde_json::from_str(content).context("fields must be a JSON object")?;
    let mut raw = Vec::with_capacity(object.len());
    for (key, value) in &object {
        let value = match value {
            Value::String(text) => FieldValue::Text(text.clone()),
            Value::Number(number) => match number.as_f64() {
                Some(number) => FieldValue::Number(number),
                None => bail!("field `{key}` is not a representable number"),
            },
            Value::Null => FieldValue::Text(String::new()),
            other => bail!("field `{key}` must be a string or a number, got `{other}`"),
        };
        raw.push((key.as_str(), value));
    }
    Ok(normalize(raw))
}

fn read_fields(path: &Path) -> Result<FieldMap> {
    let content = if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("failed to read fields from stdin")?;
        content
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fields from {}", path.display()))?
    };
    parse_fields(&content).with_context(|| format!("invalid fields in {}", path.display()))
}

fn fill(session: &Session, args: FillArgs) -> Result<()> {
    let handle = session.resolve_template(&args.template)?;
    let fields = read_fields(&args.fields)?;
    log::info!("filling {} with {} field(s)", handle.display_name, fields.len());
    let document = hazdoc_io::fill(&handle, &fields)?;
    session.write_output(&document, args.out_dir.as_deref())
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet || cli.json {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.templates_dir {
        config.templates_dir = dir;
    }
    if let Some(dir) = cli.refdata_dir {
        config.refdata_dir = dir;
    }
    let session = Session {
        config,
        json: cli.json,
    };

    match cli.command {
        Command::Templates => list_templates(&session),
        Command::Placeholders { template } => list_placeholders(&session, &template),
        Command::Fill(args) => fill(&session, args),
        Command::Declare(args) => declare::run(&session, args),
        Command::Refdata(command) => refdata::run(&session, command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_and_normalizes_json_fields() {
        let fields =
            parse_fields(r#"{"unno": "1789", "QUANTITY": 2, "MFAG Number": null}"#).unwrap();
        assert_eq!(fields.get("UNNO"), Some(&FieldValue::from("1789")));
        assert_eq!(fields.get("QUANTITY"), Some(&FieldValue::Number(2.0)));
        assert_eq!(fields.get("MFAG_NUMBER"), Some(&FieldValue::from("")));
    }

    #[test]
    fn keeps_the_order_fields_were_written_in() {
        let fields = parse_fields(r#"{"VESSEL": "MSC ANNA", "unno": "1263", "POL": "SGSIN"}"#).unwrap();
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["VESSEL", "UNNO", "POL"]);
    }

    #[test]
    fn rejects_nested_values() {
        assert!(parse_fields(r#"{"SHIPPER": {"name": "ACME"}}"#).is_err());
        assert!(parse_fields(r#"["SHIPPER"]"#).is_err());
    }
}
