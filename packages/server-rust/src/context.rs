//! Per-request context handed to every resource handler.
//!
//! A [`ContextParams`] is built once per inbound request from its headers
//! and the shared error/language resolvers, then passed by value into the
//! handler. Nothing in it is mutated afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::HeaderMap;
use topo_core::{
    codes, CcError, ErrorResolver, ErrorTranslator, LanguageResolver, TextTranslator,
};

/// Header carrying the caller's tenant (supplier account).
pub const BK_HTTP_HEADER_OWNER_ID: &str = "http_blueking_supplier_id";
/// Header carrying the caller's language tag.
pub const BK_HTTP_HEADER_LANGUAGE: &str = "http_blueking_language";
/// Header carrying the requesting user name.
pub const BK_HTTP_HEADER_USER: &str = "http_blueking_user";

/// Immutable request-scoped context.
#[derive(Clone)]
pub struct ContextParams {
    /// Error translator bound to the request language.
    pub err: Arc<dyn ErrorTranslator>,
    /// Text catalog bound to the request language.
    pub lang: Arc<dyn TextTranslator>,
    /// Raw request headers.
    pub header: HeaderMap,
    /// Tenant identity. Empty when the header is absent.
    pub supplier_account: String,
    /// Requesting user. Empty when the header is absent.
    pub user: String,
}

impl ContextParams {
    /// Builds the context from request headers. Never fails: missing
    /// headers become empty strings and the resolvers fall back to their
    /// default language.
    #[must_use]
    pub fn from_headers(
        header: HeaderMap,
        errors: &dyn ErrorResolver,
        languages: &dyn LanguageResolver,
    ) -> Self {
        let language = header_value(&header, BK_HTTP_HEADER_LANGUAGE);
        let supplier_account = header_value(&header, BK_HTTP_HEADER_OWNER_ID);
        let user = header_value(&header, BK_HTTP_HEADER_USER);

        Self {
            err: errors.create_default_error(&language),
            lang: languages.create_default_language(&language),
            header,
            supplier_account,
            user,
        }
    }
}

impl fmt::Debug for ContextParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextParams")
            .field("language", &self.err.language())
            .field("supplier_account", &self.supplier_account)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Reads a header as a string; absent or non-UTF-8 values read as empty.
#[must_use]
pub fn header_value(header: &HeaderMap, key: &str) -> String {
    header
        .get(key)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Read-only path or query parameter lookup bound to one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

/// Path parameters captured from the route template.
pub type PathParams = Params;
/// Query-string parameters.
pub type QueryParams = Params;

impl Params {
    /// Returns the value of `key`, or `""` when absent.
    #[must_use]
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map_or("", String::as_str)
    }

    /// Parses `key` as an integer.
    ///
    /// # Errors
    ///
    /// Returns a coded `CC_ERR_COMM_PARAMS_NEED_INT` error translated by
    /// `err` when the value is absent or not an integer.
    pub fn get_int(&self, key: &str, err: &dyn ErrorTranslator) -> Result<i64, CcError> {
        self.get(key)
            .trim()
            .parse()
            .map_err(|_| err.errorf(codes::CC_ERR_COMM_PARAMS_NEED_INT, &[&key]))
    }
}

impl From<HashMap<String, String>> for Params {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use topo_core::{ErrorCatalog, LanguageCatalog};

    fn resolvers() -> (ErrorCatalog, LanguageCatalog) {
        (ErrorCatalog::builtin("en"), LanguageCatalog::new("en"))
    }

    #[test]
    fn extracts_identity_and_language_from_headers() {
        let (errors, languages) = resolvers();
        let mut header = HeaderMap::new();
        header.insert(BK_HTTP_HEADER_OWNER_ID, HeaderValue::from_static("0"));
        header.insert(BK_HTTP_HEADER_LANGUAGE, HeaderValue::from_static("zh-CN"));
        header.insert(BK_HTTP_HEADER_USER, HeaderValue::from_static("admin"));

        let ctx = ContextParams::from_headers(header, &errors, &languages);
        assert_eq!(ctx.supplier_account, "0");
        assert_eq!(ctx.user, "admin");
        assert_eq!(ctx.err.language(), "zh-cn");
    }

    #[test]
    fn missing_headers_flow_through_as_empty() {
        let (errors, languages) = resolvers();
        let ctx = ContextParams::from_headers(HeaderMap::new(), &errors, &languages);
        assert_eq!(ctx.supplier_account, "");
        assert_eq!(ctx.user, "");
        assert_eq!(ctx.err.language(), "en");
        assert_eq!(ctx.lang.language(), "en");
    }

    #[test]
    fn params_read_absent_keys_as_empty() {
        let params: Params = [("app_id", "5")].into_iter().collect();
        assert_eq!(params.get("app_id"), "5");
        assert_eq!(params.get("set_id"), "");
    }

    #[test]
    fn get_int_returns_coded_error_on_garbage() {
        let (errors, _) = resolvers();
        let err_translator = errors.create_default_error("en");
        let params: Params = [("app_id", "five")].into_iter().collect();

        let err = params.get_int("app_id", err_translator.as_ref()).unwrap_err();
        assert_eq!(err.code(), codes::CC_ERR_COMM_PARAMS_NEED_INT);
        assert_eq!(err.to_string(), "the parameter 'app_id' must be an integer");
        assert_eq!(params.get_int("missing", err_translator.as_ref()).unwrap_err().code(),
            codes::CC_ERR_COMM_PARAMS_NEED_INT);
    }
}
