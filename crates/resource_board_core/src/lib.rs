pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod ports;
pub mod projection;
pub mod store;

#[cfg(test)]
mod testing;

pub use domain::{
    names_match, Coordinates, Decision, Helper, Notification, PickupHistoryEntry, PickupRequest,
    Receipt, RegistrationForm, RequestStatus, Role, Section, Session,
};
pub use error::{BoardError, BoardResult};
pub use lifecycle::{Board, ConfirmOutcome, Confirmation, LocationSource, Registration};
pub use ports::{
    Clock, GeocodingService, PortError, PortResult, ReceiptRenderingService, SlotBatch, SlotMap,
    StorageService,
};
pub use store::{BoardState, EntityStore};
