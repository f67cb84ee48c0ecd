use crate::error::{Error, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Parses Rust source files into `syn` syntax trees.
///
/// Locations in the lowered model are taken from token spans, so the path
/// stored in [`ParsedFile`] is the one diagnostics will print. Use
/// [`AstParser::parse_in`] to keep paths relative to a project directory.
///
/// # Example
///
/// ```no_run
/// use openapi_from_controllers::parser::AstParser;
/// use std::path::Path;
///
/// let parsed = AstParser::parse_in(Path::new("./my-api"), Path::new("src/routes/index.rs")).unwrap();
/// println!("Parsed {} items", parsed.syntax_tree.items.len());
/// ```
pub struct AstParser;

/// A successfully parsed Rust file with its abstract syntax tree.
#[derive(Debug)]
pub struct ParsedFile {
    /// Path the file is reported under
    pub path: PathBuf,
    /// The parsed abstract syntax tree
    pub syntax_tree: syn::File,
}

impl AstParser {
    /// Parse source text already in memory.
    pub fn parse_source(path: impl Into<PathBuf>, content: &str) -> Result<ParsedFile> {
        let path = path.into();
        let syntax_tree = syn::parse_file(content).map_err(|e| {
            let start = e.span().start();
            Error::Parse {
                file: path.clone(),
                message: format!("{} at line {}, column {}", e, start.line, start.column),
            }
        })?;
        debug!("Successfully parsed file: {}", path.display());
        Ok(ParsedFile { path, syntax_tree })
    }

    /// Read and parse a single Rust source file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Parse`]
    /// if it is not valid Rust.
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse_source(path, &content)
    }

    /// Parse `relative` under `base`, reporting it by its relative path.
    pub fn parse_in(base: &Path, relative: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", relative.display());
        let content = fs::read_to_string(base.join(relative))?;
        Self::parse_source(relative, &content)
    }

    /// Parse several files under `base`, continuing past failures.
    ///
    /// Returns one result per input path, in input order.
    pub fn parse_files(base: &Path, paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", paths.len());

        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| {
                Self::parse_in(base, path).map_err(|e| {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    e
                })
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );
        results
    }
}
