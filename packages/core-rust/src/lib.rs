//! Topo Core: dynamic maps, condition builder, coded errors, language
//! catalogs and model metadata shared by the topo server.

pub mod condition;
pub mod errors;
pub mod i18n;
pub mod mapstr;
pub mod metadata;

pub use condition::{Condition, ConditionError, ConditionItem, Operator};
pub use errors::{codes, CcError};
pub use i18n::{
    CatalogError, ErrorCatalog, ErrorResolver, ErrorTranslator, LanguageCatalog, LanguageResolver,
    LocalizedErrors, LocalizedText, TextTranslator, DEFAULT_LANGUAGE,
};
pub use mapstr::{MapStr, MapStrError};
pub use metadata::{fields, Inst, Object, QueryInput};
