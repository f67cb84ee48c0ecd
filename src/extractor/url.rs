//! Route URL and controller naming derived from a unit's file path.

use crate::error::{Error, Result};
use heck::ToUpperCamelCase;
use regex::Regex;
use std::path::{Component, Path, PathBuf};

/// File-system routing rules: where controllers live and which leading part
/// of their path is not part of the URL.
#[derive(Debug, Clone)]
pub struct UrlRules {
    root: PathBuf,
    prefix: Regex,
}

impl UrlRules {
    pub fn new(root: impl Into<PathBuf>, prefix: &str) -> Result<Self> {
        let prefix = Regex::new(prefix)
            .map_err(|e| Error::Config(format!("invalid controller prefix `{}`: {}", prefix, e)))?;
        Ok(Self {
            root: root.into(),
            prefix,
        })
    }

    /// `unit` relative to the controllers root, with `/` separators.
    pub fn relative_path(&self, unit: &Path) -> String {
        let relative = unit.strip_prefix(&self.root).unwrap_or(unit);
        relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Route segments of `unit`: prefix, extension and trailing index removed.
    fn route_segments(&self, unit: &Path) -> Vec<String> {
        let relative = self.relative_path(unit);
        let stripped = self.prefix.replace(&relative, "");

        let without_extension = match stripped.rsplit_once('.') {
            Some((stem, extension)) if !extension.contains('/') => stem,
            _ => &*stripped,
        };

        let mut segments: Vec<String> = without_extension
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        if matches!(segments.last().map(String::as_str), Some("index" | "mod")) {
            segments.pop();
        }
        segments
    }

    /// URL pattern for `unit`, e.g. `routes/users/[id].rs` -> `/users/:id`.
    pub fn url(&self, unit: &Path) -> String {
        let segments: Vec<String> = self
            .route_segments(unit)
            .into_iter()
            .map(|segment| {
                match segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                    Some(name) => format!(":{}", name),
                    None => segment,
                }
            })
            .collect();
        format!("/{}", segments.join("/"))
    }

    pub fn controller_name(&self, unit: &Path) -> String {
        let mut name: String = self
            .route_segments(unit)
            .iter()
            .map(|segment| segment.to_upper_camel_case())
            .collect();
        if name.is_empty() {
            name.push_str("Index");
        }
        name.push_str("Controller");
        name
    }
}

/// Names of the `:token` segments of a URL pattern, in order.
pub fn path_tokens(url: &str) -> Vec<String> {
    url.split('/')
        .filter_map(|segment| segment.strip_prefix(':'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "(?:.*src)?/?(?:routes/?)";

    fn rules() -> UrlRules {
        UrlRules::new(".", PREFIX).unwrap()
    }

    #[test]
    fn test_index_maps_to_root() {
        let rules = rules();
        let unit = Path::new("src/routes/index.rs");
        assert_eq!(rules.url(unit), "/");
        assert_eq!(rules.controller_name(unit), "IndexController");
        assert_eq!(rules.relative_path(unit), "src/routes/index.rs");
    }

    #[test]
    fn test_dynamic_segments() {
        let rules = rules();
        let unit = Path::new("src/routes/users/[id].rs");
        assert_eq!(rules.url(unit), "/users/:id");
        assert_eq!(rules.controller_name(unit), "UsersIdController");
        assert_eq!(path_tokens(&rules.url(unit)), vec!["id".to_string()]);
    }

    #[test]
    fn test_nested_index_and_mod() {
        let rules = rules();
        assert_eq!(rules.url(Path::new("routes/blog/index.rs")), "/blog");
        assert_eq!(rules.url(Path::new("src/routes/blog/mod.rs")), "/blog");
        assert_eq!(
            rules.url(Path::new("src/routes/[org]/repos/[repo]/issues.rs")),
            "/:org/repos/:repo/issues"
        );
    }

    #[test]
    fn test_root_is_stripped() {
        let rules = UrlRules::new("/srv/app", PREFIX).unwrap();
        let unit = Path::new("/srv/app/src/routes/health_check.rs");
        assert_eq!(rules.relative_path(unit), "src/routes/health_check.rs");
        assert_eq!(rules.url(unit), "/health_check");
        assert_eq!(rules.controller_name(unit), "HealthCheckController");
    }

    #[test]
    fn test_invalid_prefix() {
        let err = UrlRules::new(".", "(unclosed").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
