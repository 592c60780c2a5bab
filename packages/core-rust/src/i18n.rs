//! Language-bound error and text catalogs.
//!
//! A catalog holds one table per language. Resolving a language tag never
//! fails: unknown or empty tags fall back to the primary subtag and then to
//! the catalog's default language.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{codes, CcError};

/// Language used when a request carries no (or an unknown) language tag.
pub const DEFAULT_LANGUAGE: &str = "zh-cn";

/// Translates error codes into messages for one language.
pub trait ErrorTranslator: Send + Sync + fmt::Debug {
    /// The language this translator is bound to.
    fn language(&self) -> &str;

    /// Message text for `code`.
    fn message(&self, code: i32) -> String;

    /// Builds a coded error carrying the translated message.
    fn error(&self, code: i32) -> CcError {
        CcError::coded(code, self.message(code))
    }

    /// Like [`ErrorTranslator::error`], filling `{}` placeholders in order.
    fn errorf(&self, code: i32, args: &[&dyn fmt::Display]) -> CcError {
        CcError::coded(code, substitute(&self.message(code), args))
    }
}

/// Looks up display text by key for one language.
pub trait TextTranslator: Send + Sync + fmt::Debug {
    fn language(&self) -> &str;

    /// Text for `key`, or the key itself when no entry exists.
    fn text(&self, key: &str) -> String;

    fn textf(&self, key: &str, args: &[&dyn fmt::Display]) -> String {
        substitute(&self.text(key), args)
    }
}

/// Produces an [`ErrorTranslator`] for a request's language tag.
pub trait ErrorResolver: Send + Sync {
    fn create_default_error(&self, language: &str) -> Arc<dyn ErrorTranslator>;
}

/// Produces a [`TextTranslator`] for a request's language tag.
pub trait LanguageResolver: Send + Sync {
    fn create_default_language(&self, language: &str) -> Arc<dyn TextTranslator>;
}

/// Errors raised while loading catalog files at startup.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("catalog {path} has a non-numeric error code '{key}'")]
    InvalidCode { path: PathBuf, key: String },
}

// ---------------------------------------------------------------------------
// Error catalog
// ---------------------------------------------------------------------------

/// Error messages for a single language.
#[derive(Debug, Clone)]
pub struct LocalizedErrors {
    language: String,
    messages: HashMap<i32, String>,
}

impl ErrorTranslator for LocalizedErrors {
    fn language(&self) -> &str {
        &self.language
    }

    fn message(&self, code: i32) -> String {
        self.messages
            .get(&code)
            .cloned()
            .unwrap_or_else(|| format!("unknown error code {code}"))
    }
}

/// Per-language error message tables.
#[derive(Debug, Clone)]
pub struct ErrorCatalog {
    default_language: String,
    tables: HashMap<String, Arc<LocalizedErrors>>,
}

impl ErrorCatalog {
    /// Catalog with the built-in `en` and `zh-cn` messages.
    #[must_use]
    pub fn builtin(default_language: &str) -> Self {
        let mut catalog = Self {
            default_language: normalize(default_language),
            tables: HashMap::new(),
        };
        for (language, entries) in [("en", BUILTIN_ERRORS_EN), ("zh-cn", BUILTIN_ERRORS_ZH_CN)] {
            catalog.extend(
                language,
                entries.iter().map(|(code, msg)| (*code, (*msg).to_string())),
            );
        }
        catalog
    }

    /// Adds or overrides messages for `language`.
    pub fn extend(&mut self, language: &str, entries: impl IntoIterator<Item = (i32, String)>) {
        let language = normalize(language);
        let mut table = self
            .tables
            .get(&language)
            .map(|t| t.messages.clone())
            .unwrap_or_default();
        table.extend(entries);
        self.tables.insert(
            language.clone(),
            Arc::new(LocalizedErrors {
                language,
                messages: table,
            }),
        );
    }

    /// Merges every `<language>.json` file in `dir` into the catalog. Each
    /// file maps decimal error codes to messages.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the directory or a file cannot be read, a
    /// file is not a JSON object of strings, or a key is not a number.
    pub fn load_dir(&mut self, dir: &Path) -> Result<(), CatalogError> {
        for (language, path, entries) in read_catalog_dir(dir)? {
            let mut parsed = Vec::with_capacity(entries.len());
            for (key, message) in entries {
                let code: i32 = key.trim().parse().map_err(|_| CatalogError::InvalidCode {
                    path: path.clone(),
                    key: key.clone(),
                })?;
                parsed.push((code, message));
            }
            debug!("loaded {} error messages for '{}'", parsed.len(), language);
            self.extend(&language, parsed);
        }
        Ok(())
    }

    #[must_use]
    pub fn languages(&self) -> Vec<&str> {
        let mut langs: Vec<_> = self.tables.keys().map(String::as_str).collect();
        langs.sort_unstable();
        langs
    }
}

impl ErrorResolver for ErrorCatalog {
    fn create_default_error(&self, language: &str) -> Arc<dyn ErrorTranslator> {
        lookup(&self.tables, language, &self.default_language).unwrap_or_else(|| {
            Arc::new(LocalizedErrors {
                language: self.default_language.clone(),
                messages: HashMap::new(),
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Language catalog
// ---------------------------------------------------------------------------

/// Display text for a single language.
#[derive(Debug, Clone)]
pub struct LocalizedText {
    language: String,
    texts: HashMap<String, String>,
}

impl TextTranslator for LocalizedText {
    fn language(&self) -> &str {
        &self.language
    }

    fn text(&self, key: &str) -> String {
        self.texts
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

/// Per-language text tables.
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    default_language: String,
    tables: HashMap<String, Arc<LocalizedText>>,
}

impl LanguageCatalog {
    #[must_use]
    pub fn new(default_language: &str) -> Self {
        Self {
            default_language: normalize(default_language),
            tables: HashMap::new(),
        }
    }

    pub fn extend(&mut self, language: &str, entries: impl IntoIterator<Item = (String, String)>) {
        let language = normalize(language);
        let mut table = self
            .tables
            .get(&language)
            .map(|t| t.texts.clone())
            .unwrap_or_default();
        table.extend(entries);
        self.tables.insert(
            language.clone(),
            Arc::new(LocalizedText {
                language,
                texts: table,
            }),
        );
    }

    /// Merges every `<language>.json` file in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if a file cannot be read or parsed.
    pub fn load_dir(&mut self, dir: &Path) -> Result<(), CatalogError> {
        for (language, _path, entries) in read_catalog_dir(dir)? {
            debug!("loaded {} texts for '{}'", entries.len(), language);
            self.extend(&language, entries);
        }
        Ok(())
    }
}

impl LanguageResolver for LanguageCatalog {
    fn create_default_language(&self, language: &str) -> Arc<dyn TextTranslator> {
        lookup(&self.tables, language, &self.default_language).unwrap_or_else(|| {
            Arc::new(LocalizedText {
                language: self.default_language.clone(),
                texts: HashMap::new(),
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Lower-cases a language tag and uses `-` as the subtag separator.
#[must_use]
pub fn normalize(language: &str) -> String {
    language.trim().to_ascii_lowercase().replace('_', "-")
}

/// Resolution order: exact tag, primary subtag, default language.
fn lookup<T>(
    tables: &HashMap<String, Arc<T>>,
    language: &str,
    default_language: &str,
) -> Option<Arc<T>> {
    let tag = normalize(language);
    if let Some(table) = tables.get(&tag) {
        return Some(Arc::clone(table));
    }
    if let Some((primary, _)) = tag.split_once('-') {
        if let Some(table) = tables.get(primary) {
            return Some(Arc::clone(table));
        }
    }
    if !tag.is_empty() {
        debug!("language '{}' not in catalog, using '{}'", tag, default_language);
    }
    tables.get(default_language).map(Arc::clone)
}

/// Replaces each `{}` in `template` with the next argument.
fn substitute(template: &str, args: &[&dyn fmt::Display]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => out.push_str(&arg.to_string()),
            None => out.push_str("{}"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

type CatalogFile = (String, PathBuf, HashMap<String, String>);

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CatalogError {
    let path = path.to_path_buf();
    move |source| CatalogError::Io { path, source }
}

fn read_catalog_dir(dir: &Path) -> Result<Vec<CatalogFile>, CatalogError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err(dir))? {
        let path = entry.map_err(io_err(dir))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(language) = path.file_stem().and_then(|s| s.to_str()).map(normalize) else {
            warn!("skipping catalog file with unreadable name: {}", path.display());
            continue;
        };
        let raw = std::fs::read_to_string(&path).map_err(io_err(&path))?;
        let entries: HashMap<String, String> =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                path: path.clone(),
                source,
            })?;
        files.push((language, path, entries));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

const BUILTIN_ERRORS_EN: &[(i32, &str)] = &[
    (codes::CC_SYSTEM_BUSY, "system is busy, please try again later"),
    (codes::CC_ERR_COMM_JSON_UNMARSHAL_FAILED, "JSON unmarshal failed"),
    (codes::CC_ERR_COMM_HTTP_READ_BODY_FAILED, "HTTP read body failed"),
    (codes::CC_ERR_COMM_PARAMS_NEED_INT, "the parameter '{}' must be an integer"),
    (codes::CC_ERR_COMM_NOT_FOUND, "the data is not found"),
    (codes::CC_ERR_COMM_DUPLICATE_ITEM, "duplicated item '{}'"),
    (codes::CC_ERR_TOPO_OBJECT_SELECT_FAILED, "failed to search the object '{}'"),
];

const BUILTIN_ERRORS_ZH_CN: &[(i32, &str)] = &[
    (codes::CC_SYSTEM_BUSY, "系统繁忙，请稍后重试"),
    (codes::CC_ERR_COMM_JSON_UNMARSHAL_FAILED, "JSON 解析失败"),
    (codes::CC_ERR_COMM_HTTP_READ_BODY_FAILED, "读取 HTTP 请求体失败"),
    (codes::CC_ERR_COMM_PARAMS_NEED_INT, "参数 '{}' 必须为整数"),
    (codes::CC_ERR_COMM_NOT_FOUND, "数据不存在"),
    (codes::CC_ERR_COMM_DUPLICATE_ITEM, "重复的数据 '{}'"),
    (codes::CC_ERR_TOPO_OBJECT_SELECT_FAILED, "查询模型 '{}' 失败"),
];
