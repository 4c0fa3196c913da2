//! Shared partial templates
//!
//! Every file below the partial templates directory is made available to all
//! charts under its path relative to that directory.

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::Result;

/// Partial templates as (name, source) pairs, sorted by name
#[derive(Debug, Clone, Default)]
pub struct Partials {
    templates: Vec<(String, String)>,
}

impl Partials {
    /// Load all files below `dir`
    ///
    /// A directory that does not exist yields no partials and a warning.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            warn!(
                path = %dir.display(),
                "partial templates directory not found, rendering without partials"
            );
            return Ok(Self::default());
        }

        let mut templates = Vec::new();
        for entry in WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let name = template_name(entry.path(), dir);
            let source = std::fs::read_to_string(entry.path())?;
            templates.push((name, source));
        }

        debug!(count = templates.len(), path = %dir.display(), "loaded partial templates");
        Ok(Self { templates })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.templates.iter().map(|(n, s)| (n.as_str(), s.as_str()))
    }
}

/// Template name of `path` below `base`, with `/` separators
pub(crate) fn template_name(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_nested() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("labels")).unwrap();
        std::fs::write(tmp.path().join("labels/common.tpl"), "app: x").unwrap();
        std::fs::write(tmp.path().join("_macros.j2"), "{% macro m() %}{% endmacro %}").unwrap();

        let partials = Partials::load(tmp.path()).unwrap();
        let names: Vec<_> = partials.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["_macros.j2", "labels/common.tpl"]);
    }

    #[test]
    fn test_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let partials = Partials::load(&tmp.path().join("nope")).unwrap();
        assert_eq!(partials.iter().count(), 0);
    }
}
