//! crates/resource_board_core/src/ports.rs
//!
//! Defines the service contracts (traits) the board depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the storage medium, the geocoding provider and the
//! receipt renderer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::domain::{Coordinates, Receipt};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("External lookup failed: {0}")]
    ExternalLookupFailed(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Persistence
//=========================================================================================

/// Named text slots, keyed by slot name.
pub type SlotMap = BTreeMap<String, String>;

/// A set of slot writes and removals that must land together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotBatch {
    pub writes: SlotMap,
    pub removals: Vec<String>,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Returns every slot currently stored. Missing slots are simply absent.
    async fn read_slots(&self) -> PortResult<SlotMap>;

    /// Applies the whole batch atomically: after a crash either all of it is
    /// visible on the next read or none of it is.
    async fn commit(&self, batch: SlotBatch) -> PortResult<()>;
}

//=========================================================================================
// Collaborators
//=========================================================================================

#[async_trait]
pub trait GeocodingService: Send + Sync {
    /// Resolves a free-text address to zero or more candidate coordinates,
    /// best match first.
    async fn geocode(&self, address: &str) -> PortResult<Vec<Coordinates>>;
}

#[async_trait]
pub trait ReceiptRenderingService: Send + Sync {
    /// Renders a printable receipt document. Implementations must escape every
    /// text field against markup injection.
    async fn render_receipt(&self, receipt: &Receipt) -> PortResult<String>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
