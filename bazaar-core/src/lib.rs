pub mod clock;
pub mod identity;
pub mod memory;
pub mod notification;
pub mod repository;
pub mod sequence;

use bazaar_shared::models::{OrderId, OrderStatus, ParseEnumError, ProductId};
use serde::Serialize;

pub use clock::{Clock, FixedClock, SystemClock};
pub use identity::{Principal, Role};
pub use notification::{LogNotifier, Notifier};
pub use repository::{Store, StoreTx};
pub use sequence::{OrderNumberSource, SequentialOrderNumbers};

/// Every caller-facing failure of the fulfillment core.
///
/// Clamping stock to zero is not an error; the ledger logs a warning.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
    #[error("Not eligible: {0}")]
    NotEligible(String),
    #[error("Return already requested for order {0}")]
    DuplicateReturn(OrderId),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },
    #[error("Internal service error: {0}")]
    InternalError(String),
}

/// Machine-distinguishable error kind, stable across message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    IllegalTransition,
    NotEligible,
    DuplicateReturn,
    ValidationError,
    InsufficientStock,
    Internal,
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        CoreError::InternalError(err.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::Unauthorized(_) => ErrorKind::Unauthorized,
            CoreError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            CoreError::NotEligible(_) => ErrorKind::NotEligible,
            CoreError::DuplicateReturn(_) => ErrorKind::DuplicateReturn,
            CoreError::ValidationError(_) => ErrorKind::ValidationError,
            CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CoreError::InternalError(_) => ErrorKind::Internal,
        }
    }
}

impl From<ParseEnumError> for CoreError {
    fn from(err: ParseEnumError) -> Self {
        CoreError::ValidationError(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
