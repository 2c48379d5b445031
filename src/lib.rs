pub mod board;
pub mod board_validation;
pub mod calendar;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod notifier;
pub mod persistence;
pub mod read_model;
pub mod registry;
pub mod rotation;
pub mod store;

#[cfg(feature = "http_api")]
pub mod http_api;

pub use board::{
    BoardSnapshot, ChoreTask, ChoreTemplate, NewTask, NewTemplate, Recurrence, TaskStatus,
    TaskUpdate,
};
pub use config::{HouseholdConfig, ServiceConfig};
pub use error::{BoardError, BoardResult, ConfigError, EntityKind, MaintenanceError, RegistryError};
pub use maintenance::{MaintenanceJob, MaintenanceReport, MaintenanceSchedule, MaintenanceService};
pub use notifier::{BoardChanged, BoardSubscription, UpdateNotifier};
pub use persistence::{BoardPersistence, JsonFileBoardStore, MemoryBoardStore, PersistenceError};
pub use read_model::{HouseholdOverview, HouseholdView};
pub use registry::{BoardDirectory, BoardRegistry};
pub use rotation::{ChoreEvent, MAX_HORIZON_WEEKS, NextChoreDetail, RotationPlan};
pub use store::{BoardDefaults, TaskBoardStore};

#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteBoardStore;
