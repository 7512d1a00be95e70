use crate::status::Status;
use std::fmt;

/// Rejected input to a mutation. The store is left untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Required field `{0}` is missing")]
    MissingField(&'static str),
    #[error("Quantity must be a positive number, got {0}")]
    NonPositiveQuantity(f64),
    #[error("Fulfilled quantity {fulfilled} is outside 0..={quantity}")]
    FulfilledOutOfRange { fulfilled: f64, quantity: f64 },
    #[error("Quantity {quantity} is below the {fulfilled} already fulfilled")]
    QuantityBelowFulfilled { quantity: f64, fulfilled: f64 },
    #[error("A purchase needs at least one request")]
    EmptyPurchase,
    #[error("Request {0} is listed more than once")]
    DuplicateRequest(String),
    #[error("Vendor id is missing")]
    MissingVendor,
    #[error("Request {0} does not exist")]
    UnknownRequest(String),
    #[error("Request {id} is {status}, only selected requests can be purchased")]
    NotSelected { id: String, status: Status },
    #[error("Purchase {0} already exists")]
    DuplicatePurchase(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Request,
    Purchase,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => f.write_str("Request"),
            Self::Purchase => f.write_str("Purchase"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },
    #[error("Status change {from} -> {to} is not allowed")]
    InvalidTransition { from: Status, to: Status },
    #[error("Storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("Codec failure: {0}")]
    Codec(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Failed to generate identifier: {0}")]
    Identifier(String),
}

impl EngineError {
    pub(crate) fn request_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: EntityKind::Request,
            id: id.to_string(),
        }
    }

    pub(crate) fn purchase_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: EntityKind::Purchase,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
