use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::keys::{Records, StorageKeys};
use crate::storage::KeyValueStore;

pub const UNASSIGNED: &str = "Unassigned";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteManager {
    pub name: String,
    pub initials: String,
}

impl RouteManager {
    pub fn unassigned() -> Self {
        Self {
            name: UNASSIGNED.to_string(),
            initials: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleProfile {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteManagerProfile {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub console_profile_id: Value,
}

impl RouteManagerProfile {
    fn to_route_manager(&self) -> RouteManager {
        let initials: String = [self.first_name.as_str(), self.last_name.as_str()]
            .iter()
            .filter_map(|part| part.chars().next())
            .collect();
        RouteManager {
            name: format!("{} {}", self.first_name, self.last_name),
            initials: initials.to_uppercase(),
        }
    }
}

/// Route managers the logged-in console admin may assign, `Unassigned` first.
pub fn assignable_route_managers(
    store: &dyn KeyValueStore,
    keys: &StorageKeys,
) -> Result<Vec<RouteManager>, StoreError> {
    let records = Records::new(store, keys);
    let mut out = vec![RouteManager::unassigned()];

    let Some(admin_title) = records.admin_title()?.filter(|title| !title.is_empty()) else {
        return Ok(out);
    };

    let consoles: Vec<ConsoleProfile> = records.console_profiles()?;
    let Some(console) = consoles.iter().find(|profile| profile.title == admin_title) else {
        return Ok(out);
    };

    let managers: Vec<RouteManagerProfile> = records.route_manager_profiles()?;
    out.extend(
        managers
            .iter()
            .filter(|profile| !console.id.is_null() && profile.console_profile_id == console.id)
            .map(RouteManagerProfile::to_route_manager),
    );
    Ok(out)
}
