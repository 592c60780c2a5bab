//! Service-level configuration: language catalogs and request limits.

use std::path::PathBuf;

use topo_core::{CatalogError, ErrorCatalog, LanguageCatalog, DEFAULT_LANGUAGE};

use super::dispatch::DEFAULT_BODY_LIMIT;

/// Configuration for the action-dispatch service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Language used when a request carries no (or an unknown) language header.
    pub default_language: String,
    /// Directory of `<language>.json` error tables merged over the built-ins.
    pub errors_dir: Option<PathBuf>,
    /// Directory of `<language>.json` text tables.
    pub language_dir: Option<PathBuf>,
    /// Maximum request body size in bytes.
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_language: DEFAULT_LANGUAGE.to_string(),
            errors_dir: None,
            language_dir: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Builds the error and text catalogs, loading any configured
    /// directories on top of the built-in tables.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if a configured directory cannot be read or
    /// holds a malformed table.
    pub fn load_catalogs(&self) -> Result<(ErrorCatalog, LanguageCatalog), CatalogError> {
        let mut errors = ErrorCatalog::builtin(&self.default_language);
        if let Some(dir) = &self.errors_dir {
            errors.load_dir(dir)?;
        }

        let mut languages = LanguageCatalog::new(&self.default_language);
        if let Some(dir) = &self.language_dir {
            languages.load_dir(dir)?;
        }

        Ok((errors, languages))
    }
}
