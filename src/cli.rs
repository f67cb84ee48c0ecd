use crate::config::{Config, ManifestFormat, OpenApiConfig, DEFAULT_CONFIG_FILE};
use crate::openapi_builder::OpenApiBuilder;
use crate::project::Project;
use crate::serializer::{serialize, write_to_file};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, error, info};
use std::path::{Path, PathBuf};

/// Generate route descriptors and JSON schemas from file-based controllers
#[derive(Parser, Debug)]
#[command(name = "openapi-from-controllers")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan the project and write the route manifest
    Generate {
        /// Config file; defaults apply when it does not exist
        #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Manifest path, overriding `routes.output`
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,

        /// Manifest format, overriding `routes.format`
        #[arg(short = 'f', long = "format", value_enum)]
        format: Option<ManifestFormat>,

        /// Also write an OpenAPI document to this path
        #[arg(long = "openapi", value_name = "FILE")]
        openapi: Option<PathBuf>,
    },
    /// Print where the manifest is written
    Output {
        #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

/// Directory that relative paths in `config_path` are resolved against.
fn project_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Load the config and resolve the manifest path against the project.
fn load_config(config_path: &Path) -> Result<(PathBuf, Config)> {
    let config = Config::load(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    Ok((project_dir(config_path), config))
}

/// Run the requested subcommand
pub fn run(args: CliArgs) -> Result<()> {
    debug!("Parsed arguments: {:?}", args);

    match args.command {
        Command::Output { config } => {
            let (base_dir, config) = load_config(&config)?;
            println!("{}", base_dir.join(&config.routes.output).display());
            Ok(())
        }
        Command::Generate {
            config,
            output,
            format,
            openapi,
        } => {
            let (base_dir, mut config) = load_config(&config)?;
            if let Some(output) = output {
                config.routes.output = output;
            }
            if let Some(format) = format {
                config.routes.format = format;
            }
            if let Some(openapi) = openapi {
                let mut openapi_config = config.openapi.take().unwrap_or_default();
                openapi_config.output = openapi;
                config.openapi = Some(openapi_config);
            }
            generate(&base_dir, &config)
        }
    }
}

/// Full workflow: load the project, generate, then write every artifact.
///
/// Nothing is written when generation reports a diagnostic.
pub fn generate(base_dir: &Path, config: &Config) -> Result<()> {
    info!("Starting route generation in {}", base_dir.display());

    // Step 1: Scan, parse and lower the project
    let project = Project::load(base_dir, config)
        .with_context(|| format!("Failed to load project {}", base_dir.display()))?;
    info!("Loaded {} controller units", project.units.len());

    // Step 2: Extract routes and resolve schemas
    let output = match project.generate() {
        Ok(output) => output,
        Err(diagnostics) => {
            for diagnostic in diagnostics.iter() {
                error!("{}", diagnostic);
            }
            anyhow::bail!("generation failed with {} diagnostic(s)", diagnostics.len());
        }
    };
    if output.routes.is_empty() {
        log::warn!("No routes found in the project");
    }

    // Step 3: Write the route manifest
    let manifest_path = base_dir.join(&config.routes.output);
    info!("Serializing manifest to {:?} format...", config.routes.format);
    let content = serialize(&output, config.routes.format)?;
    write_to_file(&content, &manifest_path)?;
    info!("Wrote route manifest to {}", manifest_path.display());

    // Step 4: Optional OpenAPI document
    if let Some(openapi) = &config.openapi {
        write_openapi(base_dir, openapi, &output)?;
    }

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Controller units: {}", project.units.len());
    info!("  - Routes: {}", output.routes.len());
    info!("  - Schemas: {}", output.schemas.len());
    Ok(())
}

fn write_openapi(base_dir: &Path, config: &OpenApiConfig, output: &crate::generator::GenerationOutput) -> Result<()> {
    let document = OpenApiBuilder::from_output(output, config);
    let path = base_dir.join(&config.output);
    let format = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => ManifestFormat::Yaml,
        _ => ManifestFormat::Json,
    };
    write_to_file(&serialize(&document, format)?, &path)?;
    info!("Wrote OpenAPI document to {}", path.display());
    Ok(())
}
