//! In-memory directory fake for migration tests.
//!
//! Supports the behaviors the real service exhibits that the workflow has
//! to cope with: deletion propagation delay (a deleted record staying
//! visible to lookups for a while), per-serial failure injection, and
//! auth breakage. Mutation and lookup calls are counted so tests can
//! assert that read-only paths stay read-only.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use reseat_core::directory::{DeviceDirectory, DirectoryError, ImportOutcome};
use reseat_core::types::DeviceRecord;

/// Propagation delay long enough to outlast any poll timeout in tests.
pub const NEVER: u32 = u32::MAX;

#[derive(Default)]
struct State {
    records: Vec<DeviceRecord>,
    /// Deleted records still visible to `find`, with the number of
    /// lookups they remain visible for.
    ghosts: HashMap<String, (DeviceRecord, u32)>,
    propagation: HashMap<String, u32>,
    fail_delete: HashMap<String, DirectoryError>,
    fail_create: HashMap<String, DirectoryError>,
    fail_find: HashMap<String, DirectoryError>,
    auth_broken: bool,
    find_calls: u32,
    list_calls: u32,
    delete_calls: u32,
    create_calls: u32,
}

#[derive(Default)]
pub struct FakeDirectory {
    state: Mutex<State>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, serial: &str, group_tag: Option<&str>) -> Self {
        self.push_device(serial, group_tag);
        self
    }

    /// After `delete`, keep the record visible to `find` for the next
    /// `visible_lookups` calls. Use [`NEVER`] for a deletion that never
    /// becomes observable.
    pub fn with_propagation_delay(self, serial: &str, visible_lookups: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .propagation
            .insert(key(serial), visible_lookups);
        self
    }

    pub fn with_delete_error(self, serial: &str, error: DirectoryError) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_delete
            .insert(key(serial), error);
        self
    }

    pub fn with_create_error(self, serial: &str, error: DirectoryError) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_create
            .insert(key(serial), error);
        self
    }

    pub fn with_find_error(self, serial: &str, error: DirectoryError) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_find
            .insert(key(serial), error);
        self
    }

    /// Every subsequent call fails authentication.
    pub fn with_broken_auth(self) -> Self {
        self.state.lock().unwrap().auth_broken = true;
        self
    }

    /// Register a record directly, e.g. a device re-registering at the
    /// source after its record was deleted.
    pub fn push_device(&self, serial: &str, group_tag: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        let record = DeviceRecord {
            serial: serial.to_string(),
            remote_id: format!("remote-{}", key(serial)),
            group_tag: group_tag.map(str::to_owned),
            model: Some("Latitude 5440".to_string()),
            manufacturer: Some("Dell Inc.".to_string()),
        };
        state.records.push(record);
    }

    pub fn contains(&self, serial: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .any(|r| r.matches_serial(serial))
    }

    pub fn group_tag_of(&self, serial: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|r| r.matches_serial(serial))
            .and_then(|r| r.group_tag.clone())
    }

    pub fn find_calls(&self) -> u32 {
        self.state.lock().unwrap().find_calls
    }

    /// Total delete + create calls.
    pub fn mutation_calls(&self) -> u32 {
        let state = self.state.lock().unwrap();
        state.delete_calls + state.create_calls
    }

    fn check_auth(state: &State) -> Result<(), DirectoryError> {
        if state.auth_broken {
            Err(DirectoryError::Auth {
                endpoint: "https://login.invalid/token".to_string(),
                message: "invalid client secret".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn key(serial: &str) -> String {
    serial.to_ascii_lowercase()
}

#[async_trait]
impl DeviceDirectory for FakeDirectory {
    async fn find(&self, serial: &str) -> Result<Option<DeviceRecord>, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.find_calls += 1;
        Self::check_auth(&state)?;
        if let Some(error) = state.fail_find.get(&key(serial)) {
            return Err(error.clone());
        }

        if let Some(record) = state.records.iter().find(|r| r.matches_serial(serial)) {
            return Ok(Some(record.clone()));
        }

        // A deleted record lingers until its propagation delay runs out.
        if let Some((record, remaining)) = state.ghosts.get_mut(&key(serial)) {
            let record = record.clone();
            if *remaining == 0 {
                state.ghosts.remove(&key(serial));
                return Ok(None);
            }
            *remaining -= 1;
            return Ok(Some(record));
        }

        Ok(None)
    }

    async fn list_all(&self) -> Result<Vec<DeviceRecord>, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        Self::check_auth(&state)?;
        Ok(state.records.clone())
    }

    async fn delete(&self, record: &DeviceRecord) -> Result<(), DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;
        Self::check_auth(&state)?;
        if let Some(error) = state.fail_delete.get(&key(&record.serial)) {
            return Err(error.clone());
        }

        let position = state
            .records
            .iter()
            .position(|r| r.remote_id == record.remote_id)
            .ok_or_else(|| DirectoryError::Remote {
                status: 404,
                message: format!("no record with id {}", record.remote_id),
            })?;

        let removed = state.records.remove(position);
        if let Some(delay) = state.propagation.get(&key(&removed.serial)).copied() {
            state.ghosts.insert(key(&removed.serial), (removed, delay));
        }
        Ok(())
    }

    async fn create(
        &self,
        serial: &str,
        group_tag: Option<&str>,
    ) -> Result<ImportOutcome, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        Self::check_auth(&state)?;
        if let Some(error) = state.fail_create.get(&key(serial)) {
            return Err(error.clone());
        }

        if state.records.iter().any(|r| r.matches_serial(serial)) {
            return Ok(ImportOutcome::AlreadyExists);
        }

        let record = DeviceRecord {
            serial: serial.to_string(),
            remote_id: format!("remote-{}", key(serial)),
            group_tag: group_tag.map(str::to_owned),
            model: None,
            manufacturer: None,
        };
        state.records.push(record);
        Ok(ImportOutcome::Created)
    }
}

pub fn remote_error(status: u16, message: &str) -> DirectoryError {
    DirectoryError::Remote {
        status,
        message: message.to_string(),
    }
}
