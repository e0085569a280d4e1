//! crates/resource_board_core/src/domain.rs
//!
//! Defines the pure, core data structures for the board.
//! The serde field names match the persisted slot layout (camelCase keys,
//! locations stored as flat `lat`/`lng` pairs).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Case-insensitive name comparison used for every identity check on the board.
pub fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// A point on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether the point lies within valid latitude/longitude ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// A named provider of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Helper {
    pub name: String,
    pub address: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(flatten)]
    pub location: Coordinates,
}

impl Helper {
    pub fn is_named(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }

    /// True when this record offers exactly `resource` (case-insensitive).
    pub fn offers(&self, resource: &str) -> bool {
        self.resource
            .as_deref()
            .is_some_and(|own| names_match(own, resource))
    }
}

// Status of a pickup request. The only transition is Requested -> Confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Requested,
    Confirmed,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Requested => f.write_str("requested"),
            RequestStatus::Confirmed => f.write_str("confirmed"),
        }
    }
}

/// A needer's claim on a helper's resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupRequest {
    pub id: Uuid,
    pub helper_name: String,
    pub helper_phone: String,
    pub needer_name: String,
    /// Snapshot of the listing's resource text when the request was made.
    pub resource: String,
    pub status: RequestStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl PickupRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Requested
    }
}

/// An outstanding, helper-facing alert about a pending request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub helper_name: String,
    pub message: String,
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// Immutable archival record of a completed pickup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupHistoryEntry {
    pub id: Uuid,
    pub helper_name: String,
    pub helper_phone: String,
    pub needer_name: String,
    pub resource: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "helper")]
    Helper,
    /// Persisted as `user`, the name the board has always used for needers.
    #[serde(rename = "user")]
    Needer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Helper => "helper",
            Role::Needer => "user",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "helper" => Ok(Role::Helper),
            "user" | "needer" => Ok(Role::Needer),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// The currently logged-in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    pub role: Role,
}

impl Session {
    pub fn is_helper_named(&self, name: &str) -> bool {
        self.role == Role::Helper && names_match(&self.name, name)
    }

    pub fn is_needer_named(&self, name: &str) -> bool {
        self.role == Role::Needer && names_match(&self.name, name)
    }
}

/// The four views of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    #[default]
    Map,
    Post,
    History,
    Notifications,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Map,
        Section::Post,
        Section::History,
        Section::Notifications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Map => "map",
            Section::Post => "post",
            Section::History => "history",
            Section::Notifications => "notifications",
        }
    }

    /// Posting and the notification inbox exist only for helpers.
    pub fn is_helper_only(&self) -> bool {
        matches!(self, Section::Post | Section::Notifications)
    }
}

impl FromStr for Section {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant '{0}'")]
pub struct UnknownVariant(pub String);

/// The user's answer to an "are you sure?" prompt guarding an irreversible action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirmed,
    Declined,
}

impl From<bool> for Decision {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            Decision::Confirmed
        } else {
            Decision::Declined
        }
    }
}

/// Raw registration input, as typed by the helper.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationForm {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub resource: String,
}

/// The fields printed on a pickup receipt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub helper_name: String,
    pub helper_phone: String,
    pub needer_name: String,
    pub resource: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&PickupHistoryEntry> for Receipt {
    fn from(entry: &PickupHistoryEntry) -> Self {
        Self {
            helper_name: entry.helper_name.clone(),
            helper_phone: entry.helper_phone.clone(),
            needer_name: entry.needer_name.clone(),
            resource: entry.resource.clone(),
            timestamp: entry.timestamp,
        }
    }
}
