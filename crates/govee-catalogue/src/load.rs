//! Catalogue loading from JSON, YAML and files.

use crate::catalogue::Catalogue;
use crate::error::CatalogueError;
use crate::schema::CatalogueRecord;
use std::path::Path;
use tracing::info;

/// Catalogue bundled with the crate.
const BUILTIN_CATALOGUE: &str = include_str!("../data/builtin.json");

/// Source text format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogueFormat {
    Json,
    Yaml,
}

impl CatalogueFormat {
    /// Pick a format from a file extension: `.yaml`/`.yml` are YAML,
    /// everything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                CatalogueFormat::Yaml
            }
            _ => CatalogueFormat::Json,
        }
    }
}

/// Parse and validate catalogue text.
pub fn load(source: &str, format: CatalogueFormat) -> Result<Catalogue, CatalogueError> {
    let record: CatalogueRecord = match format {
        CatalogueFormat::Json => serde_json::from_str(source)
            .map_err(|e| CatalogueError::malformed(format!("invalid JSON: {}", e)))?,
        CatalogueFormat::Yaml => serde_yaml::from_str(source)
            .map_err(|e| CatalogueError::malformed(format!("invalid YAML: {}", e)))?,
    };
    Catalogue::from_records(record)
}

impl Catalogue {
    /// Load from JSON text.
    pub fn from_json(source: &str) -> Result<Self, CatalogueError> {
        load(source, CatalogueFormat::Json)
    }

    /// Load from YAML text.
    pub fn from_yaml(source: &str) -> Result<Self, CatalogueError> {
        load(source, CatalogueFormat::Yaml)
    }

    /// Load from a file, choosing the format by extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogueError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| CatalogueError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalogue = load(&source, CatalogueFormat::from_path(path))?;
        info!(
            path = %path.display(),
            device_types = catalogue.len(),
            "Loaded catalogue"
        );
        Ok(catalogue)
    }

    /// The bundled catalogue of common light models.
    pub fn builtin() -> Result<Self, CatalogueError> {
        Self::from_json(BUILTIN_CATALOGUE)
    }
}
