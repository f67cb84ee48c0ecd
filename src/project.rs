//! Loads a controller project from disk into the in-memory model.

use crate::config::Config;
use crate::error::{Diagnostics, Result};
use crate::extractor::{ControllerUnit, UrlRules};
use crate::generator::{GenerationOutput, Generator};
use crate::parser::{AstParser, ParsedFile};
use crate::provider_registry::ProviderRegistry;
use crate::scanner::FileScanner;
use crate::source::{lower_declarations, lower_provider, lower_unit, ProviderReference};
use crate::type_node::TypeCatalog;
use log::{info, warn};
use std::path::Path;

/// Everything a generation run needs, with paths relative to the project.
#[derive(Debug)]
pub struct Project {
    pub catalog: TypeCatalog,
    pub units: Vec<ControllerUnit>,
    pub providers: ProviderRegistry,
    pub rules: UrlRules,
}

impl Project {
    /// Scan, parse and lower the project rooted at `base_dir`.
    ///
    /// Files that fail to parse are skipped with a warning, except
    /// controller units and provider files, whose failure is an error.
    pub fn load(base_dir: &Path, config: &Config) -> Result<Self> {
        let rules = config.url_rules()?;

        info!("Scanning {}...", base_dir.display());
        let scanner = FileScanner::new(base_dir.to_path_buf(), &config.source, &config.controllers.glob)?;
        let scan = scanner.scan();
        info!(
            "Found {} Rust files, {} controller units",
            scan.rust_files.len(),
            scan.controller_units.len()
        );

        let mut parsed: Vec<ParsedFile> = Vec::new();
        for (path, result) in scan
            .rust_files
            .iter()
            .zip(AstParser::parse_files(base_dir, &scan.rust_files))
        {
            match result {
                Ok(file) => parsed.push(file),
                Err(err) if scan.controller_units.contains(path) => return Err(err),
                Err(err) => warn!("Skipping {}: {}", path.display(), err),
            }
        }

        let mut catalog = TypeCatalog::new();
        for file in &parsed {
            catalog.extend(lower_declarations(file));
        }

        let units: Vec<ControllerUnit> = parsed
            .iter()
            .filter(|file| scan.controller_units.contains(&file.path))
            .map(lower_unit)
            .collect();

        let mut providers = ProviderRegistry::new();
        for (alias, reference) in &config.providers {
            let reference = ProviderReference::parse(reference);
            let definition = match parsed.iter().find(|file| file.path == reference.path) {
                Some(file) => lower_provider(alias, &reference, file)?,
                None => {
                    let file = AstParser::parse_in(base_dir, &reference.path)?;
                    catalog.extend(lower_declarations(&file));
                    lower_provider(alias, &reference, &file)?
                }
            };
            providers.register(definition);
        }
        info!(
            "Lowered {} declarations, {} providers",
            catalog.declarations().len(),
            providers.len()
        );

        Ok(Self {
            catalog,
            units,
            providers,
            rules,
        })
    }

    pub fn generate(&self) -> std::result::Result<GenerationOutput, Diagnostics> {
        Generator::new(&self.catalog, &self.providers, self.rules.clone()).run(&self.units)
    }
}
