use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use schemaform::{
    DataPath, FormDocument, Registry, array::ArrayAction, config::FormConfig,
    config::DEFAULT_CONFIG_FILE,
};
use serde_json::Value;

mod outline;

#[derive(Parser, Debug)]
#[command(name = "schemaform", version, about = "Render and edit schema-driven forms")]
struct Cli {
    /// Form schema (JSON or TOML).
    #[arg(long, global = true)]
    schema: Option<PathBuf>,
    /// UI schema.
    #[arg(long, global = true)]
    ui: Option<PathBuf>,
    /// Current form data.
    #[arg(long, global = true)]
    data: Option<PathBuf>,
    /// Validation error tree.
    #[arg(long, global = true)]
    errors: Option<PathBuf>,
    /// Engine configuration.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the rendered field tree.
    Render {
        #[arg(long, value_enum, default_value_t = RenderFormat::Outline)]
        format: RenderFormat,
    },
    /// Print the data with declared defaults filled in.
    Defaults,
    /// Print the identifier tree.
    Ids,
    /// Apply an array action and print the new data.
    Array {
        /// Slash-separated path of the array field, e.g. `tasks` or `a/0/b`.
        path: String,
        #[command(subcommand)]
        action: ActionArg,
        /// Write the result back to the `--data` file.
        #[arg(long)]
        write: bool,
    },
    /// Print the JSON schema of the configuration file.
    ConfigSchema,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RenderFormat {
    Json,
    Outline,
}

#[derive(Subcommand, Clone, Debug)]
enum ActionArg {
    /// Add a defaulted element.
    Append,
    /// Remove the element at INDEX.
    Remove { index: usize },
    /// Swap two elements.
    Reorder { from: usize, to: usize },
    /// Move an element, shifting the ones in between.
    Sort { from: usize, to: usize },
    /// Replace the whole array with a JSON array.
    Set { value: String },
    /// Replace one element with a JSON value.
    SetItem { index: usize, value: String },
}

impl ActionArg {
    fn into_action(self) -> anyhow::Result<ArrayAction> {
        Ok(match self {
            ActionArg::Append => ArrayAction::Append,
            ActionArg::Remove { index } => ArrayAction::RemoveAt { index },
            ActionArg::Reorder { from, to } => ArrayAction::Reorder { from, to },
            ActionArg::Sort { from, to } => ArrayAction::SortTo { from, to },
            ActionArg::Set { value } => match serde_json::from_str(&value)? {
                Value::Array(value) => ArrayAction::SetWhole { value },
                other => bail!("expected a JSON array, got {other}"),
            },
            ActionArg::SetItem { index, value } => ArrayAction::SetItem {
                index,
                value: Some(serde_json::from_str(&value)?),
            },
        })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match &cli.command {
        Command::ConfigSchema => {
            println!("{}", serde_json::to_string_pretty(&FormConfig::json_schema()?)?);
        }
        Command::Render { format } => {
            let doc = load_document(&cli)?;
            let Some(view) = doc.render(&Registry::new())? else {
                info!("form root is inactive, nothing to render");
                return Ok(());
            };
            match format {
                RenderFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
                RenderFormat::Outline => outline::print(&view),
            }
        }
        Command::Defaults => {
            let doc = load_document(&cli)?;
            println!("{}", serde_json::to_string_pretty(&doc.defaults()?)?);
        }
        Command::Ids => {
            let doc = load_document(&cli)?;
            println!("{}", serde_json::to_string_pretty(&doc.id_tree()?)?);
        }
        Command::Array {
            path,
            action,
            write,
        } => {
            let mut doc = load_document(&cli)?;
            let path = DataPath::parse(path);
            let (data, validate) = doc.apply_array_action(&path, action.clone().into_action()?)?;
            if validate {
                eprintln!("note: existing errors for {path} must be revalidated");
            }
            if *write {
                let Some(target) = &cli.data else {
                    bail!("--write needs --data");
                };
                doc.data = Some(data);
                doc.save_data(target)?;
                info!("data written to {}", target.display());
            } else {
                println!("{}", serde_json::to_string_pretty(&data)?);
            }
        }
    }
    Ok(())
}

fn load_document(cli: &Cli) -> anyhow::Result<FormDocument> {
    let Some(schema) = &cli.schema else {
        bail!("--schema is required");
    };
    let config = FormConfig::load(&cli.config)?;
    let mut doc = FormDocument::load(schema)?;
    if let Some(ui) = &cli.ui {
        doc.load_ui(ui)?;
    }
    if let Some(data) = &cli.data {
        doc.load_data(data)?;
    }
    if let Some(errors) = &cli.errors {
        doc.load_errors(errors)?;
    }
    let base = config_dir(&cli.config);
    doc.apply_config(&config, base)
        .with_context(|| format!("applying {}", cli.config.display()))?;
    debug!(
        "loaded {} with {} fragment(s)",
        schema.display(),
        doc.fragments.len()
    );
    Ok(doc)
}

fn config_dir(config: &Path) -> &Path {
    match config.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
