//! Error codes and the tagged error type returned by resource handlers and
//! the operation facade.

use crate::mapstr::MapStrError;

/// Numeric error codes shared with API clients.
pub mod codes {
    /// Request succeeded.
    pub const CC_SUCCESS: i32 = 0;
    /// Marker placed in the `message` field of successful responses.
    pub const CC_SUCCESS_STR: &str = "success";
    /// Any failure that carries no code of its own.
    pub const CC_SYSTEM_BUSY: i32 = -1;

    pub const CC_ERR_COMM_JSON_UNMARSHAL_FAILED: i32 = 1_199_000;
    pub const CC_ERR_COMM_HTTP_READ_BODY_FAILED: i32 = 1_199_002;
    pub const CC_ERR_COMM_PARAMS_NEED_INT: i32 = 1_199_003;
    pub const CC_ERR_COMM_NOT_FOUND: i32 = 1_199_005;
    pub const CC_ERR_COMM_DUPLICATE_ITEM: i32 = 1_199_006;
    pub const CC_ERR_TOPO_OBJECT_SELECT_FAILED: i32 = 1_101_001;
}

/// Error returned by resource handlers and facade operations.
///
/// `Coded` errors reach the client with their own code; everything else is
/// reported as [`codes::CC_SYSTEM_BUSY`].
#[derive(Debug, thiserror::Error)]
pub enum CcError {
    #[error("{message}")]
    Coded { code: i32, message: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CcError {
    #[must_use]
    pub fn coded(code: i32, message: impl Into<String>) -> Self {
        Self::Coded {
            code,
            message: message.into(),
        }
    }

    /// Response code for this error.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Coded { code, .. } => *code,
            Self::Internal(_) => codes::CC_SYSTEM_BUSY,
        }
    }
}

impl From<MapStrError> for CcError {
    fn from(err: MapStrError) -> Self {
        Self::Internal(err.into())
    }
}
