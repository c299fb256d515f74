use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::errors::ApexError;
use crate::models::TestCase;

/// A YAML file contributing extra test cases to the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogExtension {
    #[serde(default)]
    pub name: Option<String>,
    pub test_cases: Vec<TestCase>,
}

/// Load every `*.yaml` / `*.yml` extension file in `dir`, sorted by path so
/// the resulting catalog order is stable across runs.
pub fn load_extensions(dir: &Path) -> Result<Vec<CatalogExtension>, ApexError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for ext in ["yaml", "yml"] {
        let pattern = dir.join(format!("*.{}", ext));
        let pattern_str = pattern.to_string_lossy();
        for entry in glob::glob(&pattern_str)
            .map_err(|e| ApexError::Config(format!("Invalid glob pattern: {}", e)))?
        {
            let path = entry.map_err(|e| ApexError::Config(format!("Glob error: {}", e)))?;
            paths.push(path);
        }
    }
    paths.sort();

    let mut extensions = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read_to_string(&path)?;
        let extension: CatalogExtension = serde_yaml::from_str(&content).map_err(|e| {
            ApexError::Config(format!("{}: {}", path.display(), e))
        })?;
        info!(
            file = %path.display(),
            test_cases = extension.test_cases.len(),
            "Loaded catalog extension"
        );
        extensions.push(extension);
    }
    Ok(extensions)
}
