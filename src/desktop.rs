use serde::{Deserialize, Serialize};
use tauri::{Manager, State};
use tracing::info;

use crate::clock::{BusinessCalendar, SystemClock};
use crate::keys::StorageKeys;
use crate::rollover::{DailyRollover, RolloverOutcome};
use crate::roster::{assignable_route_managers, RouteManager};
use crate::storage::{sanitize_key, FileStore, KeyValueStore};

struct DesktopState {
    store: FileStore,
    keys: StorageKeys,
    last_outcome: Option<RolloverOutcome>,
}

#[derive(Serialize)]
struct StorageInfoResult {
    ok: bool,
    path_label: String,
    encrypted: bool,
}

#[derive(Deserialize)]
struct StorageReadRequest {
    name: String,
}

#[derive(Deserialize)]
struct StorageWriteJsonRequest {
    name: String,
    value: serde_json::Value,
}

#[tauri::command]
fn storage_info(state: State<'_, DesktopState>) -> Result<StorageInfoResult, String> {
    Ok(StorageInfoResult {
        ok: true,
        path_label: state.store.path().to_string_lossy().to_string(),
        encrypted: state.store.is_encrypted(),
    })
}

#[tauri::command]
fn storage_read_json(
    state: State<'_, DesktopState>,
    payload: StorageReadRequest,
) -> Result<Option<serde_json::Value>, String> {
    let key = sanitize_key(payload.name.as_str()).map_err(|err| err.to_string())?;
    state.store.get(key.as_str()).map_err(|err| err.to_string())
}

#[tauri::command]
fn storage_write_json(
    state: State<'_, DesktopState>,
    payload: StorageWriteJsonRequest,
) -> Result<bool, String> {
    let key = sanitize_key(payload.name.as_str()).map_err(|err| err.to_string())?;
    state
        .store
        .set(key.as_str(), payload.value)
        .map_err(|err| err.to_string())?;
    Ok(true)
}

#[tauri::command]
fn storage_remove(
    state: State<'_, DesktopState>,
    payload: StorageReadRequest,
) -> Result<bool, String> {
    let key = sanitize_key(payload.name.as_str()).map_err(|err| err.to_string())?;
    state
        .store
        .remove(key.as_str())
        .map_err(|err| err.to_string())?;
    Ok(true)
}

#[tauri::command]
fn rollover_last_outcome(
    state: State<'_, DesktopState>,
) -> Result<Option<RolloverOutcome>, String> {
    Ok(state.last_outcome.clone())
}

#[tauri::command]
fn route_managers_assignable(
    state: State<'_, DesktopState>,
) -> Result<Vec<RouteManager>, String> {
    assignable_route_managers(&state.store, &state.keys).map_err(|err| err.to_string())
}

/// Opens the desktop window. The daily rollover runs in the setup hook, before
/// the frontend can read any key.
pub fn run(
    store: FileStore,
    keys: StorageKeys,
    calendar: BusinessCalendar,
) -> Result<(), tauri::Error> {
    let rollover = DailyRollover::new(keys.clone(), calendar);

    tauri::Builder::default()
        .setup(move |app| {
            let outcome = rollover.run(&store, &SystemClock)?;
            info!(
                today = %outcome.today(),
                path = %store.path().display(),
                "desktop storage ready"
            );
            app.manage(DesktopState {
                store,
                keys,
                last_outcome: Some(outcome),
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            storage_info,
            storage_read_json,
            storage_write_json,
            storage_remove,
            rollover_last_outcome,
            route_managers_assignable
        ])
        .run(tauri::generate_context!())
}
