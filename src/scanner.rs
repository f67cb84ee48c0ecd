use crate::error::{Error, Result};
use glob::Pattern;
use log::{debug, warn};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// File scanner for a controller project.
///
/// Walks the project directory and keeps the `.rs` files that either live
/// under the source directory or match one of the controller globs. `target`
/// and hidden directories are never entered.
///
/// # Example
///
/// ```no_run
/// use openapi_from_controllers::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-api"), "src", &["src/routes/**/*.rs".to_string()]).unwrap();
/// let result = scanner.scan();
/// println!("Found {} controller units", result.controller_units.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
    source_dir: PathBuf,
    controller_globs: Vec<Pattern>,
}

/// Files discovered by a scan, relative to the project directory and sorted.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Every kept `.rs` file, controller units included
    pub rust_files: Vec<PathBuf>,
    /// Files matching a controller glob
    pub controller_units: Vec<PathBuf>,
    /// Warning messages for paths that could not be read
    pub warnings: Vec<String>,
}

/// `path` with `/` separators, as matched against globs.
fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

impl FileScanner {
    /// Creates a scanner rooted at `root_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a controller glob is malformed.
    pub fn new(root_path: PathBuf, source_dir: impl Into<PathBuf>, controller_globs: &[String]) -> Result<Self> {
        let controller_globs = controller_globs
            .iter()
            .map(|glob| {
                Pattern::new(glob)
                    .map_err(|e| Error::Config(format!("invalid controller glob `{}`: {}", glob, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            root_path,
            source_dir: source_dir.into(),
            controller_globs,
        })
    }

    pub fn is_controller(&self, relative: &Path) -> bool {
        let candidate = slash_path(relative);
        self.controller_globs.iter().any(|glob| glob.matches(&candidate))
    }

    /// Walks the project directory.
    ///
    /// Unreadable entries are logged and recorded as warnings; scanning
    /// continues past them.
    pub fn scan(&self) -> ScanResult {
        let mut result = ScanResult::default();

        for entry in WalkDir::new(&self.root_path)
            .into_iter()
            .filter_entry(|e| {
                if e.path() == self.root_path {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                !file_name.starts_with('.') && file_name != "target"
            })
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    result.warnings.push(warning);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            let relative = path.strip_prefix(&self.root_path).unwrap_or(path).to_path_buf();

            let is_controller = self.is_controller(&relative);
            if !is_controller && !relative.starts_with(&self.source_dir) {
                continue;
            }
            if is_controller {
                debug!("Controller unit: {}", relative.display());
                result.controller_units.push(relative.clone());
            }
            result.rust_files.push(relative);
        }

        result.rust_files.sort();
        result.controller_units.sort();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn default_globs() -> Vec<String> {
        vec!["src/routes/**/*.rs".to_string(), "routes/**/*.rs".to_string()]
    }

    fn scanner(root: &Path) -> FileScanner {
        FileScanner::new(root.to_path_buf(), "src", &default_globs()).unwrap()
    }

    #[test]
    fn test_scan_classifies_controller_units() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("src/routes/users")).unwrap();
        fs::write(root.join("src/lib.rs"), "pub mod models;").unwrap();
        fs::write(root.join("src/models.rs"), "pub struct User;").unwrap();
        fs::write(root.join("src/routes/index.rs"), "pub fn get() {}").unwrap();
        fs::write(root.join("src/routes/users/[id].rs"), "pub fn get() {}").unwrap();
        fs::write(root.join("src/readme.md"), "# README").unwrap();

        let result = scanner(root).scan();

        assert_eq!(result.rust_files.len(), 4);
        assert_eq!(
            result.controller_units,
            vec![
                PathBuf::from("src/routes/index.rs"),
                PathBuf::from("src/routes/users/[id].rs"),
            ]
        );
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = scanner(temp_dir.path()).scan();

        assert!(result.rust_files.is_empty());
        assert!(result.controller_units.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_keeps_controllers_outside_source() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("routes")).unwrap();
        fs::create_dir_all(root.join("tools")).unwrap();
        fs::write(root.join("routes/health.rs"), "pub fn get() {}").unwrap();
        fs::write(root.join("tools/gen.rs"), "fn main() {}").unwrap();

        let result = scanner(root).scan();
        assert_eq!(result.rust_files, vec![PathBuf::from("routes/health.rs")]);
        assert_eq!(result.controller_units, vec![PathBuf::from("routes/health.rs")]);
    }

    #[test]
    fn test_scan_skips_target_and_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("target/src")).unwrap();
        fs::create_dir_all(root.join(".git/src")).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("target/src/build.rs"), "fn main() {}").unwrap();
        fs::write(root.join(".git/src/config.rs"), "// config").unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();

        let result = scanner(root).scan();
        assert_eq!(result.rust_files, vec![PathBuf::from("src/main.rs")]);
    }

    #[test]
    fn test_invalid_glob() {
        let err = FileScanner::new(PathBuf::from("."), "src", &["src/[routes".to_string()])
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
