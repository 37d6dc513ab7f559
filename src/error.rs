use crate::types::UserId;

pub type Result<T> = std::result::Result<T, ShipmentError>;

#[derive(thiserror::Error, Debug)]
pub enum ShipmentError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("cannot {action} a shipment that is {state}")]
    InvalidState { action: &'static str, state: String },
    #[error("precondition failed: {0}")]
    PreconditionFailed(#[from] Precondition),
    // never carries the expected code
    #[error("delivery code does not match")]
    OtpMismatch,
    #[error("user {actor} is not allowed to {action}")]
    Forbidden { actor: UserId, action: &'static str },
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("failed to encode or decode record: {0}")]
    Codec(String),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("description is empty")]
    MissingDescription,
    #[error("value must be a finite, non-negative amount")]
    InvalidValue,
    #[error("shipment has no client")]
    MissingClient,
    #[error("user {0} is not a client")]
    NotAClient(UserId),
    #[error("user {0} is not a driver")]
    NotADriver(UserId),
    #[error("cancellation reason is empty")]
    EmptyReason,
    #[error("rating {0} is outside 1..=5")]
    RatingOutOfRange(u8),
    #[error("message text is empty")]
    EmptyMessage,
    #[error("message is {len} bytes, the limit is {max}")]
    MessageTooLarge { len: usize, max: usize },
    #[error("signature is {len} bytes, the limit is {max}")]
    SignatureTooLarge { len: usize, max: usize },
    #[error("checklist item name is empty")]
    EmptyChecklistItem,
    #[error("unknown role {0:?}")]
    UnknownRole(String),
    #[error("{0} is required")]
    MissingField(&'static str),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Precondition {
    #[error("no driver is assigned")]
    NoDriverAssigned,
    #[error("checklist items not confirmed: {}", .0.join(", "))]
    ChecklistIncomplete(Vec<String>),
    #[error("shipment has already been rated")]
    AlreadyRated,
}

impl ShipmentError {
    /// Short stable name of the error kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ShipmentError::Validation(_) => "validation",
            ShipmentError::InvalidState { .. } => "invalid_state",
            ShipmentError::PreconditionFailed(_) => "precondition_failed",
            ShipmentError::OtpMismatch => "otp_mismatch",
            ShipmentError::Forbidden { .. } => "forbidden",
            ShipmentError::NotFound(_) => "not_found",
            ShipmentError::Conflict(_) => "conflict",
            ShipmentError::Storage(_) => "storage",
            ShipmentError::Codec(_) => "codec",
            ShipmentError::Config(_) => "config",
        }
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for ShipmentError {
    fn from(value: minicbor::encode::Error<E>) -> Self {
        ShipmentError::Codec(value.to_string())
    }
}

impl From<minicbor::decode::Error> for ShipmentError {
    fn from(value: minicbor::decode::Error) -> Self {
        ShipmentError::Codec(value.to_string())
    }
}
