//! crates/resource_board_core/src/store.rs
//!
//! The Entity Store: every board collection held in memory and mirrored to the
//! storage port after each mutation. All slots are written in a single batch so
//! the next load never observes a subset of a mutation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{
    Helper, Notification, PickupHistoryEntry, PickupRequest, Role, Section, Session,
};
use crate::error::BoardResult;
use crate::ports::{PortError, PortResult, SlotBatch, SlotMap, StorageService};

/// Slot names in durable storage.
pub mod slots {
    pub const HELPERS: &str = "helpers";
    pub const REGISTERED_HELPERS: &str = "registeredHelpers";
    pub const PICKUP_REQUESTS: &str = "pickupRequests";
    pub const PICKUP_HISTORY: &str = "pickupHistory";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const CURRENT_USER: &str = "currentUser";
    pub const ACTIVE_SECTION: &str = "activeSection";
}

/// A snapshot of everything the board knows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardState {
    /// Active listings shown on the map.
    pub helpers: Vec<Helper>,
    pub registered_helpers: Vec<Helper>,
    pub pickup_requests: Vec<PickupRequest>,
    pub pickup_history: Vec<PickupHistoryEntry>,
    pub notifications: Vec<Notification>,
    pub session: Option<Session>,
    pub active_section: Section,
}

pub struct EntityStore {
    storage: Arc<dyn StorageService>,
    state: BoardState,
}

impl EntityStore {
    /// Restores all collections from storage. Absent or malformed slots fall
    /// back to their empty defaults; only a failure of the medium itself is an error.
    pub async fn load(storage: Arc<dyn StorageService>) -> PortResult<Self> {
        let slots = storage.read_slots().await?;
        let state = decode(&slots);
        debug!(
            helpers = state.helpers.len(),
            requests = state.pickup_requests.len(),
            history = state.pickup_history.len(),
            "Board state loaded"
        );
        Ok(Self { storage, state })
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    /// Writes every collection in one batch.
    pub async fn persist_all(&self) -> PortResult<()> {
        self.storage.commit(encode(&self.state)?).await
    }

    /// Runs `mutation` against a working copy, persists the result and only then
    /// makes it current. If either step fails the store is unchanged.
    pub(crate) async fn apply<T, F>(&mut self, mutation: F) -> BoardResult<T>
    where
        F: FnOnce(&mut BoardState) -> BoardResult<T>,
    {
        let mut next = self.state.clone();
        let value = mutation(&mut next)?;
        self.storage.commit(encode(&next)?).await?;
        self.state = next;
        Ok(value)
    }
}

//=========================================================================================
// Slot Encoding
//=========================================================================================

// The session slot has always been written as `{"name":"","role":""}` when
// nobody is logged in, so both fields are read leniently.
#[derive(Serialize, Deserialize, Default)]
struct SessionRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: String,
}

fn encode(state: &BoardState) -> PortResult<SlotBatch> {
    let mut batch = SlotBatch::default();
    put(&mut batch.writes, slots::HELPERS, &state.helpers)?;
    put(
        &mut batch.writes,
        slots::REGISTERED_HELPERS,
        &state.registered_helpers,
    )?;
    put(&mut batch.writes, slots::PICKUP_REQUESTS, &state.pickup_requests)?;
    put(&mut batch.writes, slots::PICKUP_HISTORY, &state.pickup_history)?;
    put(&mut batch.writes, slots::NOTIFICATIONS, &state.notifications)?;

    match &state.session {
        Some(session) => {
            let record = SessionRecord {
                name: session.name.clone(),
                role: session.role.as_str().to_string(),
            };
            put(&mut batch.writes, slots::CURRENT_USER, &record)?;
            batch.writes.insert(
                slots::ACTIVE_SECTION.to_string(),
                state.active_section.as_str().to_string(),
            );
        }
        None => {
            batch.removals.push(slots::CURRENT_USER.to_string());
            batch.removals.push(slots::ACTIVE_SECTION.to_string());
        }
    }
    Ok(batch)
}

fn put<T: Serialize + ?Sized>(writes: &mut SlotMap, key: &str, value: &T) -> PortResult<()> {
    let text = serde_json::to_string(value)
        .map_err(|e| PortError::Unexpected(format!("failed to encode slot {key}: {e}")))?;
    writes.insert(key.to_string(), text);
    Ok(())
}

fn decode(slots: &SlotMap) -> BoardState {
    let session = decode_session(slots);
    let active_section = match (&session, slots.get(slots::ACTIVE_SECTION)) {
        (Some(_), Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(value = %raw, "Ignoring unknown active section");
            Section::default()
        }),
        _ => Section::default(),
    };

    BoardState {
        helpers: decode_list(slots, slots::HELPERS),
        registered_helpers: decode_list(slots, slots::REGISTERED_HELPERS),
        pickup_requests: decode_list(slots, slots::PICKUP_REQUESTS),
        pickup_history: decode_list(slots, slots::PICKUP_HISTORY),
        notifications: decode_list(slots, slots::NOTIFICATIONS),
        session,
        active_section,
    }
}

fn decode_list<T: DeserializeOwned>(slots: &SlotMap, key: &str) -> Vec<T> {
    let Some(raw) = slots.get(key) else {
        return Vec::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(slot = key, error = %e, "Malformed slot, starting from an empty list");
        Vec::new()
    })
}

fn decode_session(slots: &SlotMap) -> Option<Session> {
    let raw = slots.get(slots::CURRENT_USER)?;
    let record: SessionRecord = match serde_json::from_str(raw) {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, "Malformed session slot, starting logged out");
            return None;
        }
    };
    let name = record.name.trim();
    if name.is_empty() {
        return None;
    }
    let role: Role = record.role.parse().ok()?;
    Some(Session {
        name: name.to_string(),
        role,
    })
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::domain::{Coordinates, RequestStatus};
    use crate::testing::MemoryStorage;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn helper(name: &str, resource: &str) -> Helper {
        Helper {
            name: name.to_string(),
            address: "1 \"Quoted\" Lane & <Sons>".to_string(),
            phone: "+44 20 ☎".to_string(),
            resource: Some(resource.to_string()),
            location: Coordinates::new(51.5, -0.1),
        }
    }

    fn populated_state(count: usize) -> BoardState {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let mut state = BoardState::default();
        for i in 0..count {
            let listing = helper(&format!("Helper {i}"), &format!("Soup <{i}> 'hot' \"now\""));
            state.helpers.push(listing.clone());
            state.registered_helpers.push(listing);
            let id = Uuid::now_v7();
            state.pickup_requests.push(PickupRequest {
                id,
                helper_name: format!("Helper {i}"),
                helper_phone: "N/A".to_string(),
                needer_name: "Sam\nNewline".to_string(),
                resource: "Soup".to_string(),
                status: if i % 2 == 0 {
                    RequestStatus::Requested
                } else {
                    RequestStatus::Confirmed
                },
                timestamp: at,
                confirmed_at: (i % 2 == 1).then_some(at),
            });
            state.notifications.push(Notification {
                id,
                helper_name: format!("Helper {i}"),
                message: "Pickup requested by Sam for \"Soup\".".to_string(),
                request_id: id,
                timestamp: at,
            });
            state.pickup_history.push(PickupHistoryEntry {
                id,
                helper_name: format!("Helper {i}"),
                helper_phone: "N/A".to_string(),
                needer_name: "Sam".to_string(),
                resource: "Ünïcødé & <b>bold</b>".to_string(),
                timestamp: at,
            });
        }
        if count > 0 {
            state.session = Some(Session {
                name: "Helper 0".to_string(),
                role: Role::Helper,
            });
            state.active_section = Section::Notifications;
        }
        state
    }

    #[tokio::test]
    async fn persist_all__should_round_trip_zero_one_and_many_entries() {
        for count in [0, 1, 7] {
            // Given
            let storage = Arc::new(MemoryStorage::default());
            let mut store = EntityStore::load(storage.clone()).await.expect("load");
            store.state = populated_state(count);

            // When
            store.persist_all().await.expect("persist");
            let reloaded = EntityStore::load(storage).await.expect("reload");

            // Then
            assert_eq!(reloaded.state(), store.state(), "count = {count}");
        }
    }

    #[tokio::test]
    async fn load__should_default_absent_slots_to_empty() {
        // When
        let store = EntityStore::load(Arc::new(MemoryStorage::default()))
            .await
            .expect("load");

        // Then
        assert_eq!(store.state(), &BoardState::default());
    }

    #[tokio::test]
    async fn load__should_default_malformed_slots_and_keep_valid_ones() {
        // Given
        let mut slots = SlotMap::new();
        slots.insert(slots::HELPERS.to_string(), "{not json".to_string());
        slots.insert(
            slots::REGISTERED_HELPERS.to_string(),
            r#"[{"name":"Asha","address":"x","phone":"1","resource":"Blankets","lat":1.0,"lng":2.0}]"#
                .to_string(),
        );
        slots.insert(slots::CURRENT_USER.to_string(), "42".to_string());
        let storage = Arc::new(MemoryStorage::with_slots(slots));

        // When
        let store = EntityStore::load(storage).await.expect("load");

        // Then
        assert!(store.state().helpers.is_empty());
        assert_eq!(store.state().registered_helpers.len(), 1);
        assert_eq!(store.state().session, None);
    }

    #[tokio::test]
    async fn load__should_treat_blank_session_record_as_logged_out() {
        // Given
        let mut slots = SlotMap::new();
        slots.insert(
            slots::CURRENT_USER.to_string(),
            r#"{"name":"","role":""}"#.to_string(),
        );
        slots.insert(slots::ACTIVE_SECTION.to_string(), "history".to_string());

        // When
        let store = EntityStore::load(Arc::new(MemoryStorage::with_slots(slots)))
            .await
            .expect("load");

        // Then
        assert_eq!(store.state().session, None);
        assert_eq!(store.state().active_section, Section::Map);
    }

    #[tokio::test]
    async fn persist_all__should_remove_session_slots_when_logged_out() {
        // Given
        let mut slots = SlotMap::new();
        slots.insert(
            slots::CURRENT_USER.to_string(),
            r#"{"name":"Sam","role":"user"}"#.to_string(),
        );
        slots.insert(slots::ACTIVE_SECTION.to_string(), "history".to_string());
        let storage = Arc::new(MemoryStorage::with_slots(slots));
        let mut store = EntityStore::load(storage.clone()).await.expect("load");
        assert_eq!(store.state().active_section, Section::History);

        // When
        store
            .apply(|state| {
                state.session = None;
                state.active_section = Section::Map;
                Ok(())
            })
            .await
            .expect("apply");

        // Then
        let stored = storage.snapshot();
        assert!(!stored.contains_key(slots::CURRENT_USER));
        assert!(!stored.contains_key(slots::ACTIVE_SECTION));
        assert!(stored.contains_key(slots::PICKUP_HISTORY));
    }

    #[tokio::test]
    async fn apply__should_leave_state_untouched_when_storage_fails() {
        // Given
        let storage = Arc::new(MemoryStorage::default());
        let mut store = EntityStore::load(storage.clone()).await.expect("load");
        storage.fail_writes(true);

        // When
        let result = store
            .apply(|state| {
                state.helpers.push(helper("Asha", "Blankets"));
                Ok(())
            })
            .await;

        // Then
        assert!(result.is_err());
        assert!(store.state().helpers.is_empty());
    }
}
