use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::format_date;
use crate::error::StoreError;
use crate::storage::KeyValueStore;
use crate::worker::Worker;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub last_app_date: String,
    pub route_assignments: String,
    pub map_assignments: String,
    pub attendance_finalized: String,
    pub workers: String,
    pub admin: String,
    pub console_profiles: String,
    pub route_manager_profiles: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            last_app_date: "last-app-date".to_string(),
            route_assignments: "route-assignments".to_string(),
            map_assignments: "map-assignments".to_string(),
            attendance_finalized: "attendance-finalized".to_string(),
            workers: "worker-list".to_string(),
            admin: "admin".to_string(),
            console_profiles: "console-profiles".to_string(),
            route_manager_profiles: "route-manager-profiles".to_string(),
        }
    }
}

/// `<base>_<YYYY-MM-DD>`
pub fn archive_key(base: &str, date: NaiveDate) -> String {
    format!("{base}_{}", format_date(date))
}

/// Route or map assignments for one day. Stored as an object keyed by
/// assignment id; older data may hold a plain array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Assignments {
    Keyed(serde_json::Map<String, Value>),
    Listed(Vec<Value>),
}

impl Assignments {
    pub fn is_empty(&self) -> bool {
        match self {
            Assignments::Keyed(map) => map.is_empty(),
            Assignments::Listed(items) => items.is_empty(),
        }
    }
}

/// The attendance-finalized marker. Any stored value counts; only its truthiness matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendanceFlag(pub Value);

impl AttendanceFlag {
    pub fn is_set(&self) -> bool {
        match &self.0 {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
            Value::String(text) => !text.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

/// Decodes a raw stored value. An explicit `null` reads the same as an absent key.
pub fn decode<T: DeserializeOwned>(key: &str, raw: Option<Value>) -> Result<Option<T>, StoreError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|err| StoreError::decode(key, err)),
    }
}

/// Typed view over the store, one accessor per key.
pub struct Records<'a> {
    store: &'a dyn KeyValueStore,
    keys: &'a StorageKeys,
}

impl<'a> Records<'a> {
    pub fn new(store: &'a dyn KeyValueStore, keys: &'a StorageKeys) -> Self {
        Self { store, keys }
    }

    pub fn keys(&self) -> &StorageKeys {
        self.keys
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        decode(key, self.store.get(key)?)
    }

    pub fn last_app_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        self.read(self.keys.last_app_date.as_str())
    }

    pub fn set_last_app_date(&self, date: NaiveDate) -> Result<(), StoreError> {
        self.store.set(
            self.keys.last_app_date.as_str(),
            Value::String(format_date(date)),
        )
    }

    pub fn route_assignments(&self) -> Result<Option<Assignments>, StoreError> {
        self.read(self.keys.route_assignments.as_str())
    }

    pub fn map_assignments(&self) -> Result<Option<Assignments>, StoreError> {
        self.read(self.keys.map_assignments.as_str())
    }

    pub fn archived_route_assignments(
        &self,
        date: NaiveDate,
    ) -> Result<Option<Assignments>, StoreError> {
        self.read(archive_key(self.keys.route_assignments.as_str(), date).as_str())
    }

    pub fn archived_map_assignments(
        &self,
        date: NaiveDate,
    ) -> Result<Option<Assignments>, StoreError> {
        self.read(archive_key(self.keys.map_assignments.as_str(), date).as_str())
    }

    pub fn attendance_finalized(&self) -> Result<Option<AttendanceFlag>, StoreError> {
        self.read(self.keys.attendance_finalized.as_str())
    }

    pub fn attendance_finalized_on(&self, date: NaiveDate) -> Result<bool, StoreError> {
        let flag: Option<AttendanceFlag> =
            self.read(archive_key(self.keys.attendance_finalized.as_str(), date).as_str())?;
        Ok(flag.is_some_and(|flag| flag.is_set()))
    }

    pub fn workers(&self) -> Result<Vec<Worker>, StoreError> {
        Ok(self.read(self.keys.workers.as_str())?.unwrap_or_default())
    }

    pub fn set_workers(&self, workers: &[Worker]) -> Result<(), StoreError> {
        self.store
            .set(self.keys.workers.as_str(), serde_json::to_value(workers)?)
    }

    pub fn admin_title(&self) -> Result<Option<String>, StoreError> {
        self.read(self.keys.admin.as_str())
    }

    pub fn console_profiles<T: DeserializeOwned>(&self) -> Result<Vec<T>, StoreError> {
        Ok(self
            .read(self.keys.console_profiles.as_str())?
            .unwrap_or_default())
    }

    pub fn route_manager_profiles<T: DeserializeOwned>(&self) -> Result<Vec<T>, StoreError> {
        Ok(self
            .read(self.keys.route_manager_profiles.as_str())?
            .unwrap_or_default())
    }
}
