//! Service configuration, read from TOML.
//!
//! Every section is optional. Values that arrive in a loose shape (member
//! and chore lists written as one comma-separated string, wall-clock times as
//! text) are turned into typed values here, before anything else sees them.

use chrono::{Duration, NaiveTime, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ConfigError;
use crate::maintenance::MaintenanceSchedule;
use crate::persistence::{BoardPersistence, JsonFileBoardStore, MemoryBoardStore};
use crate::rotation::{MAX_HORIZON_WEEKS, RotationPlan};
use crate::store::BoardDefaults;

pub const CONFIG_PATH_ENV: &str = "HOUSEHOLD_CHORES_CONFIG";
pub const DEFAULT_HOUSEHOLD_ID: &str = "home";
pub const DEFAULT_HOUSEHOLD_NAME: &str = "Household Chores";
pub const DEFAULT_MEMBERS: [&str; 2] = ["Alex", "Sam"];
pub const DEFAULT_CHORES: [&str; 4] = [
    "Take out trash",
    "Vacuum living room",
    "Clean kitchen",
    "Laundry",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub schedule: ScheduleConfig,
    pub maintenance: MaintenanceConfig,
    pub households: Vec<HouseholdConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            schedule: ScheduleConfig::default(),
            maintenance: MaintenanceConfig::default(),
            households: vec![HouseholdConfig::default()],
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file named by `HOUSEHOLD_CHORES_CONFIG`, or use the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for household in &self.households {
            if household.id.trim().is_empty() {
                return Err(ConfigError::Invalid("household id must not be empty".into()));
            }
            if !seen.insert(household.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "household '{}' is listed twice",
                    household.id
                )));
            }
        }
        self.schedule.rotation_plan()?;
        self.schedule.refresh_interval()?;
        self.maintenance.schedule()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for `json`, database file for `sqlite`; unused for `memory`.
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolved_path(&self) -> PathBuf {
        match (&self.path, self.backend) {
            (Some(path), _) => path.clone(),
            (None, StorageBackend::Sqlite) => PathBuf::from("household-chores.db"),
            (None, _) => PathBuf::from("household-chores"),
        }
    }

    pub fn open(&self) -> Result<Arc<dyn BoardPersistence>, ConfigError> {
        match self.backend {
            StorageBackend::Memory => Ok(Arc::new(MemoryBoardStore::new())),
            StorageBackend::Json => Ok(Arc::new(JsonFileBoardStore::new(self.resolved_path())?)),
            #[cfg(feature = "sqlite")]
            StorageBackend::Sqlite => Ok(Arc::new(
                crate::persistence::sqlite::SqliteBoardStore::new(self.resolved_path())?,
            )),
            #[cfg(not(feature = "sqlite"))]
            StorageBackend::Sqlite => Err(ConfigError::Invalid(
                "sqlite storage needs the `sqlite` feature".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub chore_time: String,
    pub chore_duration_minutes: i64,
    pub horizon_weeks: u32,
    pub refresh_interval_minutes: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            chore_time: "18:00".to_string(),
            chore_duration_minutes: crate::rotation::DEFAULT_CHORE_DURATION_MINUTES,
            horizon_weeks: crate::rotation::DEFAULT_HORIZON_WEEKS,
            refresh_interval_minutes: 60,
        }
    }
}

impl ScheduleConfig {
    pub fn rotation_plan(&self) -> Result<RotationPlan, ConfigError> {
        if self.chore_duration_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "chore_duration_minutes must be positive".into(),
            ));
        }
        if self.horizon_weeks > MAX_HORIZON_WEEKS {
            return Err(ConfigError::Invalid(format!(
                "horizon_weeks must be at most {MAX_HORIZON_WEEKS}"
            )));
        }
        Ok(RotationPlan {
            chore_time: parse_time(&self.chore_time)?,
            duration: minutes("chore_duration_minutes", self.chore_duration_minutes)?,
            horizon_weeks: self.horizon_weeks,
        })
    }

    pub fn refresh_interval(&self) -> Result<Duration, ConfigError> {
        if self.refresh_interval_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_minutes must be positive".into(),
            ));
        }
        minutes("refresh_interval_minutes", self.refresh_interval_minutes)
    }
}

fn minutes(field: &str, value: i64) -> Result<Duration, ConfigError> {
    Duration::try_minutes(value)
        .ok_or_else(|| ConfigError::Invalid(format!("{field} is out of range")))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub cleanup_time: String,
    pub weekly_refresh_weekday: String,
    pub weekly_refresh_time: String,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            cleanup_time: "03:00".to_string(),
            weekly_refresh_weekday: "Mon".to_string(),
            weekly_refresh_time: "00:30".to_string(),
        }
    }
}

impl MaintenanceConfig {
    pub fn schedule(&self) -> Result<MaintenanceSchedule, ConfigError> {
        let refresh_weekday = self
            .weekly_refresh_weekday
            .trim()
            .parse::<Weekday>()
            .map_err(|_| {
                ConfigError::Invalid(format!(
                    "unknown weekday '{}'",
                    self.weekly_refresh_weekday
                ))
            })?;
        Ok(MaintenanceSchedule {
            cleanup_time: parse_time(&self.cleanup_time)?,
            refresh_weekday,
            refresh_time: parse_time(&self.weekly_refresh_time)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdConfig {
    #[serde(default = "default_household_id")]
    pub id: String,
    #[serde(default = "default_household_name", deserialize_with = "household_name")]
    pub name: String,
    #[serde(default = "default_members", deserialize_with = "members_list")]
    pub members: Vec<String>,
    #[serde(default = "default_chores", deserialize_with = "chores_list")]
    pub chores: Vec<String>,
}

impl Default for HouseholdConfig {
    fn default() -> Self {
        Self {
            id: default_household_id(),
            name: default_household_name(),
            members: default_members(),
            chores: default_chores(),
        }
    }
}

impl HouseholdConfig {
    /// Household with cleaned-up member and chore lists; empty lists fall
    /// back to the defaults.
    pub fn new<M, C>(id: impl Into<String>, name: impl Into<String>, members: M, chores: C) -> Self
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self {
            id: id.into(),
            name: clean_name(&name.into()),
            members: clean_list(members).unwrap_or_else(default_members),
            chores: clean_list(chores).unwrap_or_else(default_chores),
        }
    }

    pub fn board_defaults(&self) -> BoardDefaults {
        BoardDefaults {
            members: self.members.clone(),
            chores: self.chores.clone(),
        }
    }
}

/// `HH:MM` or `HH:MM:SS`.
pub fn parse_time(text: &str) -> Result<NaiveTime, ConfigError> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map_err(|_| ConfigError::Invalid(format!("'{text}' is not a HH:MM time")))
}

/// Split a comma-separated list, trimming entries and dropping blanks.
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn clean_list<I>(items: I) -> Option<Vec<String>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let cleaned: Vec<String> = items
        .into_iter()
        .map(|item| item.as_ref().trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrString {
    List(Vec<String>),
    Delimited(String),
}

impl ListOrString {
    fn into_list(self) -> Option<Vec<String>> {
        match self {
            ListOrString::List(items) => clean_list(items),
            ListOrString::Delimited(text) => clean_list(split_list(&text)),
        }
    }
}

fn clean_name(name: &str) -> String {
    match name.trim() {
        "" => default_household_name(),
        trimmed => trimmed.to_string(),
    }
}

fn household_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(clean_name(&String::deserialize(deserializer)?))
}

fn members_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(ListOrString::deserialize(deserializer)?
        .into_list()
        .unwrap_or_else(default_members))
}

fn chores_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(ListOrString::deserialize(deserializer)?
        .into_list()
        .unwrap_or_else(default_chores))
}

fn default_household_id() -> String {
    DEFAULT_HOUSEHOLD_ID.to_string()
}

fn default_household_name() -> String {
    DEFAULT_HOUSEHOLD_NAME.to_string()
}

fn default_members() -> Vec<String> {
    DEFAULT_MEMBERS.iter().map(|m| m.to_string()).collect()
}

fn default_chores() -> Vec<String> {
    DEFAULT_CHORES.iter().map(|c| c.to_string()).collect()
}
