use std::fmt;

use crate::persistence::PersistenceError;

/// Which kind of board entry an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Person,
    Task,
    Template,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Person => write!(f, "person"),
            EntityKind::Task => write!(f, "task"),
            EntityKind::Template => write!(f, "template"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} '{id}' already exists")]
    Conflict { kind: EntityKind, id: String },

    #[error("invalid request: {0}")]
    Invalid(String),

    /// The board was removed while the operation was waiting for it.
    #[error("board '{0}' has been removed")]
    Removed(String),

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

impl BoardError {
    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        BoardError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn conflict(kind: EntityKind, id: impl Into<String>) -> Self {
        BoardError::Conflict {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        BoardError::Invalid(message.into())
    }
}

pub type BoardResult<T> = Result<T, BoardError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("cannot open storage: {0}")]
    Storage(#[from] PersistenceError),
}

#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error("maintenance jobs need a running tokio runtime")]
    NoRuntime,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("household '{0}' is already registered")]
    DuplicateHousehold(String),

    #[error("household '{0}' is not registered")]
    UnknownHousehold(String),

    #[error(transparent)]
    Maintenance(#[from] MaintenanceError),
}
