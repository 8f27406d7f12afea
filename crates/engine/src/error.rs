//! The module contains the errors the engine can return.
//!
//! Every variant maps onto one [`ErrorKind`], which is what callers should
//! branch on:
//!
//! - [`Validation`]: an entity could not be constructed; nothing was written.
//! - [`NotFound`]: a referenced record does not exist; the unit of work was
//!   rolled back.
//! - [`Conflict`]: a uniqueness rule was violated (duplicate category name).
//! - [`Persistence`]: the storage layer rejected a read, write or commit.
//! - [`State`]: a unit of work was driven out of sequence.
//! - [`Unexpected`]: anything else.
//!
//!  [`Validation`]: ErrorKind::Validation
//!  [`NotFound`]: ErrorKind::NotFound
//!  [`Conflict`]: ErrorKind::Conflict
//!  [`Persistence`]: ErrorKind::Persistence
//!  [`State`]: ErrorKind::State
//!  [`Unexpected`]: ErrorKind::Unexpected
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Unit of work not started: {0}")]
    UnitOfWorkNotStarted(String),
    #[error("Unit of work misuse: {0}")]
    UnitOfWorkState(String),
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Unexpected error: {0}")]
    Unexpected(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Coarse classification of [`EngineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Persistence,
    State,
    Unexpected,
}

impl EngineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount(_) | Self::Validation(_) => ErrorKind::Validation,
            Self::KeyNotFound(_) => ErrorKind::NotFound,
            Self::ExistingKey(_) => ErrorKind::Conflict,
            Self::Database(DbErr::RecordNotFound(_)) => ErrorKind::NotFound,
            Self::Database(_) => ErrorKind::Persistence,
            Self::UnitOfWorkNotStarted(_) | Self::UnitOfWorkState(_) => ErrorKind::State,
            Self::Configuration(_) | Self::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::UnitOfWorkNotStarted(a), Self::UnitOfWorkNotStarted(b)) => a == b,
            (Self::UnitOfWorkState(a), Self::UnitOfWorkState(b)) => a == b,
            (Self::Configuration(a), Self::Configuration(b)) => a == b,
            (Self::Unexpected(a), Self::Unexpected(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
