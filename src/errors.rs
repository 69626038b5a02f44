//! Error types for the fairstake engine
//!
//! One root error with nested categories so the HTTP layer can map a
//! whole category to a status code without matching every variant.

use std::error::Error as StdError;
use std::fmt;

/// Root error type for all engine operations
#[derive(Debug)]
pub enum EngineError {
    /// Request shape / parameter errors
    Validation(ValidationError),

    /// Ownership errors
    Auth(AuthError),

    /// Missing records
    NotFound(NotFoundError),

    /// Session state conflicts
    State(StateError),

    /// Funds and rate-limit exhaustion
    Resource(ResourceError),

    /// Key-value layer errors
    Storage(StorageError),
}

/// Request validation errors
#[derive(Debug)]
pub enum ValidationError {
    InvalidRequest(String),
    BetOutOfRange { amount: f64, min: f64, max: f64 },
    TargetOutOfRange { target: i64 },
    PositionOutOfRange { position: i64 },
    PositionAlreadyRevealed { position: u8 },
    GameTypeUnsupported(String),
}

/// Ownership errors
#[derive(Debug)]
pub enum AuthError {
    NotOwner { game_id: String },
}

/// Missing-record errors
#[derive(Debug)]
pub enum NotFoundError {
    GameNotFound(String),
    SessionExpired(String),
    WalletNotFound(i64),
}

/// Session state conflicts
#[derive(Debug)]
pub enum StateError {
    GameAlreadyEnded(String),
    GameNotActive(String),
}

/// Funds and throttling errors
#[derive(Debug)]
pub enum ResourceError {
    InsufficientBalance { have: f64, need: f64 },
    RateLimited { action: String },
}

/// Key-value layer errors
#[derive(Debug)]
pub enum StorageError {
    Unavailable(String),
    ReadFailed(String),
    WriteFailed(String),
    CorruptedData(String),
    ScriptFailed(String),
}

impl EngineError {
    /// Stable machine-readable code, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(e) => match e {
                ValidationError::InvalidRequest(_) => "invalid_request",
                ValidationError::BetOutOfRange { .. } => "bet_out_of_range",
                ValidationError::TargetOutOfRange { .. } => "target_out_of_range",
                ValidationError::PositionOutOfRange { .. } => "position_out_of_range",
                ValidationError::PositionAlreadyRevealed { .. } => "position_already_revealed",
                ValidationError::GameTypeUnsupported(_) => "game_type_unsupported",
            },
            EngineError::Auth(_) => "unauthorized",
            EngineError::NotFound(e) => match e {
                NotFoundError::GameNotFound(_) => "game_not_found",
                NotFoundError::SessionExpired(_) => "session_expired",
                NotFoundError::WalletNotFound(_) => "wallet_not_found",
            },
            EngineError::State(e) => match e {
                StateError::GameAlreadyEnded(_) => "game_already_ended",
                StateError::GameNotActive(_) => "game_not_active",
            },
            EngineError::Resource(e) => match e {
                ResourceError::InsufficientBalance { .. } => "insufficient_balance",
                ResourceError::RateLimited { .. } => "rate_limited",
            },
            EngineError::Storage(e) => match e {
                StorageError::Unavailable(_) => "kv_unavailable",
                StorageError::ScriptFailed(_) => "script_error",
                _ => "kv_error",
            },
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Validation(e) => write!(f, "Validation error: {}", e),
            EngineError::Auth(e) => write!(f, "Authorization error: {}", e),
            EngineError::NotFound(e) => write!(f, "Not found: {}", e),
            EngineError::State(e) => write!(f, "State conflict: {}", e),
            EngineError::Resource(e) => write!(f, "Resource error: {}", e),
            EngineError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
            ValidationError::BetOutOfRange { amount, min, max } => {
                write!(f, "bet {:.2} outside [{:.0}, {:.0}]", amount, min, max)
            }
            ValidationError::TargetOutOfRange { target } => {
                write!(f, "dice target {} outside [1, 95]", target)
            }
            ValidationError::PositionOutOfRange { position } => {
                write!(f, "position {} outside [0, 24]", position)
            }
            ValidationError::PositionAlreadyRevealed { position } => {
                write!(f, "position {} already revealed", position)
            }
            ValidationError::GameTypeUnsupported(t) => write!(f, "unsupported game type: {}", t),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NotOwner { game_id } => write!(f, "caller does not own game {}", game_id),
        }
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundError::GameNotFound(id) => write!(f, "game not found: {}", id),
            NotFoundError::SessionExpired(id) => write!(f, "session expired: {}", id),
            NotFoundError::WalletNotFound(user) => write!(f, "wallet not found for user {}", user),
        }
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::GameAlreadyEnded(id) => write!(f, "game already ended: {}", id),
            StateError::GameNotActive(id) => write!(f, "game not active: {}", id),
        }
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::InsufficientBalance { have, need } => {
                write!(f, "insufficient balance: have {:.2}, need {:.2}", have, need)
            }
            ResourceError::RateLimited { action } => {
                write!(f, "rate limit exceeded for {}", action)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
            StorageError::ReadFailed(msg) => write!(f, "read failed: {}", msg),
            StorageError::WriteFailed(msg) => write!(f, "write failed: {}", msg),
            StorageError::CorruptedData(msg) => write!(f, "corrupted data: {}", msg),
            StorageError::ScriptFailed(msg) => write!(f, "script failed: {}", msg),
        }
    }
}

impl StdError for EngineError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            EngineError::Validation(e) => Some(e),
            EngineError::Auth(e) => Some(e),
            EngineError::NotFound(e) => Some(e),
            EngineError::State(e) => Some(e),
            EngineError::Resource(e) => Some(e),
            EngineError::Storage(e) => Some(e),
        }
    }
}

impl StdError for ValidationError {}
impl StdError for AuthError {}
impl StdError for NotFoundError {}
impl StdError for StateError {}
impl StdError for ResourceError {}
impl StdError for StorageError {}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        EngineError::Validation(e)
    }
}

impl From<AuthError> for EngineError {
    fn from(e: AuthError) -> Self {
        EngineError::Auth(e)
    }
}

impl From<NotFoundError> for EngineError {
    fn from(e: NotFoundError) -> Self {
        EngineError::NotFound(e)
    }
}

impl From<StateError> for EngineError {
    fn from(e: StateError) -> Self {
        EngineError::State(e)
    }
}

impl From<ResourceError> for EngineError {
    fn from(e: ResourceError) -> Self {
        EngineError::Resource(e)
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        EngineError::Storage(e)
    }
}

impl From<rocksdb::Error> for EngineError {
    fn from(e: rocksdb::Error) -> Self {
        EngineError::Storage(StorageError::Unavailable(e.to_string()))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Storage(StorageError::CorruptedData(e.to_string()))
    }
}

/// Convenience alias used across the engine and store.
pub type EngineResult<T> = Result<T, EngineError>;
