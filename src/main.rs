//! codefirst CLI: scaffold models, render migrations, create tables.
//!
//! ```bash
//! codefirst generate Admin::User email:string:index age:integer
//! codefirst migration --schema users.json
//! codefirst create-table --schema users.json --database-url sqlite://app.db
//! ```

use clap::{ArgAction, Parser, Subcommand};
use codefirst::generator::{GenerateOptions, ModelGenerator};
use codefirst::orm::Db;
use codefirst::schema::ModelSchema;
use codefirst::settings::{CONFIG_FILE, Settings};
use codefirst::{ActiveRecordAdapter, Error, Result, template};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "codefirst", about = "Code-first models and migrations for ActiveRecord", version)]
struct Cli {
    /// Settings file (defaults to codefirst.toml in the destination)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a model file and its create-table migration
    Generate {
        /// Model name, optionally namespaced (Admin::User)
        model: String,

        /// Attributes as field[:type][:index]
        attributes: Vec<String>,

        /// Only generate the model file
        #[arg(long)]
        skip_migration: bool,

        /// Parent class of the generated model
        #[arg(long)]
        parent: Option<String>,

        /// Add created_at/updated_at
        #[arg(
            long,
            default_value_t = true,
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = "true",
            action = ArgAction::Set
        )]
        timestamps: bool,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,

        /// Project root to write into
        #[arg(long, default_value = ".")]
        destination: PathBuf,
    },
    /// Print the migration class for a JSON model schema
    Migration {
        #[arg(long)]
        schema: PathBuf,

        /// Migration name (defaults to create_<table>)
        #[arg(long)]
        name: Option<String>,
    },
    /// Create a JSON model schema's table and indices in a database
    CreateTable {
        #[arg(long)]
        schema: PathBuf,

        /// Overrides database_url from the settings
        #[arg(long)]
        database_url: Option<String>,
    },
}

/// Settings plus the file they came from, if any.
fn load_settings(config: Option<&Path>, destination: &Path) -> Result<(Settings, Option<PathBuf>)> {
    match config {
        Some(path) => Ok((Settings::load(path)?, Some(path.to_path_buf()))),
        None => {
            let path = destination.join(CONFIG_FILE);
            let settings = Settings::load_or_default(&path)?;
            Ok((settings, path.exists().then_some(path)))
        }
    }
}

fn init_logging(settings: &Settings) {
    let level = if settings.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    template::set_display_logs(settings.debug);
}

fn read_schema(path: &Path) -> Result<ModelSchema> {
    let source = std::fs::read_to_string(path).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    ModelSchema::from_json(&source)
}

async fn run(cli: Cli) -> Result<()> {
    let destination = match &cli.command {
        Commands::Generate { destination, .. } => destination.clone(),
        _ => PathBuf::from("."),
    };
    let (settings, source) = load_settings(cli.config.as_deref(), &destination)?;
    init_logging(&settings);
    match source {
        Some(path) => log::debug!("Loaded settings from {}", path.display()),
        None => log::debug!("No {} found, using default settings", CONFIG_FILE),
    }
    let adapter = ActiveRecordAdapter::new(settings.migration_version.clone());

    match cli.command {
        Commands::Generate {
            model,
            attributes,
            skip_migration,
            parent,
            timestamps,
            force,
            destination,
        } => {
            let options = GenerateOptions {
                skip_migration,
                parent,
                timestamps,
                force,
            };
            let generator = ModelGenerator::new(adapter, settings.generator.clone());
            for path in generator.generate(&destination, &model, &attributes, &options)? {
                println!("      create  {}", path.display());
            }
        }
        Commands::Migration { schema, name } => {
            let model = read_schema(&schema)?;
            let name = name.unwrap_or_else(|| adapter.create_migration_name(&model));
            print!("{}", adapter.generate_migration_class(&model, &name)?);
        }
        Commands::CreateTable {
            schema,
            database_url,
        } => {
            let model = read_schema(&schema)?;
            let url = database_url.unwrap_or(settings.database_url);
            let executor = adapter.executor(Db::connect(&url).await?);
            executor.create_model_table(&model).await?;
            println!("Created table {}", model.table_name);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
