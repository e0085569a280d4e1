//! crates/resource_board_core/src/lifecycle.rs
//!
//! The Request Lifecycle Engine. `Board` owns the Entity Store and the
//! collaborator ports and executes every user action against them. Each method
//! validates first, then applies its whole mutation through the store in one
//! persisted step, so an error always means nothing changed.
//!
//! The engine assumes a single writer. Callers sharing a `Board` across tasks
//! must serialise access (the api service keeps it behind a mutex).

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    Coordinates, Decision, Helper, Notification, PickupHistoryEntry, PickupRequest, Receipt,
    RegistrationForm, RequestStatus, Role, Section, Session,
};
use crate::error::{BoardError, BoardResult};
use crate::ports::{Clock, GeocodingService, PortResult, ReceiptRenderingService, StorageService};
use crate::projection;
use crate::store::{BoardState, EntityStore};

const NOT_PROVIDED: &str = "Not provided";
const NOT_AVAILABLE: &str = "N/A";

//=========================================================================================
// Outcomes
//=========================================================================================

/// Where a newly registered helper's coordinates came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    Geocoded,
    /// The lookup succeeded but found nothing; the device location was used.
    NoMatch,
    /// The lookup itself failed; the device location was used.
    LookupFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub helper: Helper,
    pub location_source: LocationSource,
}

impl Registration {
    pub fn message(&self) -> &'static str {
        match self.location_source {
            LocationSource::LookupFailed => {
                "Registered (address geocode failed; saved with fallback location)."
            }
            LocationSource::Geocoded | LocationSource::NoMatch => {
                "Registered successfully! You can login now."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub request: PickupRequest,
    pub entry: PickupHistoryEntry,
    /// Listings (active and registered) removed because they matched the request.
    pub removed_listings: usize,
    /// The rendered receipt, absent if the renderer failed after the commit.
    pub receipt: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    Declined,
    Confirmed(Box<Confirmation>),
}

//=========================================================================================
// The Board
//=========================================================================================

pub struct Board {
    store: EntityStore,
    geocoder: Arc<dyn GeocodingService>,
    receipts: Arc<dyn ReceiptRenderingService>,
    clock: Arc<dyn Clock>,
    device_location: Coordinates,
}

impl Board {
    pub fn new(
        store: EntityStore,
        geocoder: Arc<dyn GeocodingService>,
        receipts: Arc<dyn ReceiptRenderingService>,
        clock: Arc<dyn Clock>,
        device_location: Coordinates,
    ) -> Self {
        Self {
            store,
            geocoder,
            receipts,
            clock,
            device_location,
        }
    }

    /// Loads the store from `storage` and wires up the collaborators.
    pub async fn load(
        storage: Arc<dyn StorageService>,
        geocoder: Arc<dyn GeocodingService>,
        receipts: Arc<dyn ReceiptRenderingService>,
        clock: Arc<dyn Clock>,
        device_location: Coordinates,
    ) -> PortResult<Self> {
        let store = EntityStore::load(storage).await?;
        Ok(Self::new(store, geocoder, receipts, clock, device_location))
    }

    pub fn state(&self) -> &BoardState {
        self.store.state()
    }

    pub fn session(&self) -> Option<&Session> {
        self.state().session.as_ref()
    }

    pub fn active_section(&self) -> Section {
        self.state().active_section
    }

    pub fn device_location(&self) -> Coordinates {
        self.device_location
    }

    fn is_registered(&self, name: &str) -> bool {
        self.state()
            .registered_helpers
            .iter()
            .any(|helper| helper.is_named(name))
    }

    //-------------------------------------------------------------------------------------
    // Identity
    //-------------------------------------------------------------------------------------

    /// Registers a helper and publishes their first listing.
    ///
    /// The address is geocoded; when the lookup finds nothing or fails, the
    /// current device location is used instead and registration still succeeds.
    pub async fn register_helper(&mut self, form: RegistrationForm) -> BoardResult<Registration> {
        let name = form.name.trim();
        let address = form.address.trim();
        let phone = form.phone.trim();
        let resource = form.resource.trim();
        if name.is_empty() || address.is_empty() || phone.is_empty() || resource.is_empty() {
            return Err(BoardError::validation("Please fill all fields."));
        }
        if self.is_registered(name) {
            return Err(BoardError::validation("This name is already registered."));
        }

        let (location, location_source) = match self.geocoder.geocode(address).await {
            Ok(candidates) => match candidates.first() {
                Some(point) => (*point, LocationSource::Geocoded),
                None => (self.device_location, LocationSource::NoMatch),
            },
            Err(e) => {
                warn!(address, error = %e, "Geocoding failed, using device location");
                (self.device_location, LocationSource::LookupFailed)
            }
        };

        let helper = Helper {
            name: name.to_string(),
            address: address.to_string(),
            phone: phone.to_string(),
            resource: Some(resource.to_string()),
            location,
        };
        self.store
            .apply(|state| {
                state.registered_helpers.push(helper.clone());
                state.helpers.push(helper.clone());
                Ok(())
            })
            .await?;

        info!(helper = %helper.name, source = ?location_source, "Helper registered");
        Ok(Registration {
            helper,
            location_source,
        })
    }

    /// Starts a session. A helper session is only granted to a registered name.
    pub async fn login(&mut self, name: &str, role: Role) -> BoardResult<Session> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BoardError::validation("Please enter your name."));
        }
        if role == Role::Helper && !self.is_registered(name) {
            return Err(BoardError::not_authorized(
                "Helper not registered. Please register first.",
            ));
        }

        let session = Session {
            name: name.to_string(),
            role,
        };
        self.store
            .apply(|state| {
                state.session = Some(session.clone());
                state.active_section = Section::Map;
                Ok(())
            })
            .await?;

        info!(name = %session.name, role = role.as_str(), "Session started");
        Ok(session)
    }

    /// Ends the current session. Returns whether anything was cleared.
    pub async fn logout(&mut self, decision: Decision) -> BoardResult<bool> {
        if decision == Decision::Declined {
            return Ok(false);
        }
        self.store
            .apply(|state| {
                let had_session = state.session.take().is_some();
                state.active_section = Section::Map;
                Ok(had_session)
            })
            .await
    }

    //-------------------------------------------------------------------------------------
    // Navigation and device state
    //-------------------------------------------------------------------------------------

    /// Remembers the last opened view so a restart returns to it.
    pub async fn show_section(
        &mut self,
        section: Section,
        session: &Session,
    ) -> BoardResult<Section> {
        if section.is_helper_only() && session.role != Role::Helper {
            return Err(BoardError::not_authorized(format!(
                "Only helpers can open the {} view.",
                section.as_str()
            )));
        }
        self.store
            .apply(|state| {
                state.active_section = section;
                Ok(section)
            })
            .await
    }

    /// Updates the device location used for new posts and as the geocoding fallback.
    pub fn set_device_location(&mut self, location: Coordinates) -> BoardResult<Coordinates> {
        if !location.is_valid() {
            return Err(BoardError::validation("Coordinates out of range."));
        }
        self.device_location = location;
        Ok(location)
    }

    //-------------------------------------------------------------------------------------
    // Listings
    //-------------------------------------------------------------------------------------

    /// Posts (or replaces) the session helper's resource at the device location.
    pub async fn post_resource(&mut self, text: &str, session: &Session) -> BoardResult<Helper> {
        let text = text.trim();
        if text.is_empty() {
            return Err(BoardError::validation("Enter a resource."));
        }
        if session.role != Role::Helper {
            return Err(BoardError::not_authorized("Only helpers can post resources."));
        }

        let location = self.device_location;
        let listing = self
            .store
            .apply(|state| {
                let record = match state
                    .registered_helpers
                    .iter_mut()
                    .find(|h| h.is_named(&session.name))
                {
                    Some(record) => {
                        record.resource = Some(text.to_string());
                        record.location = location;
                        record.clone()
                    }
                    None => {
                        let record = Helper {
                            name: session.name.clone(),
                            address: NOT_PROVIDED.to_string(),
                            phone: NOT_PROVIDED.to_string(),
                            resource: Some(text.to_string()),
                            location,
                        };
                        state.registered_helpers.push(record.clone());
                        record
                    }
                };
                match state.helpers.iter().position(|h| h.is_named(&record.name)) {
                    Some(index) => state.helpers[index] = record.clone(),
                    None => state.helpers.push(record.clone()),
                }
                Ok(record)
            })
            .await?;

        info!(helper = %listing.name, "Resource posted");
        Ok(listing)
    }

    /// Takes the helper's own listing off the board. The registration is kept.
    pub async fn remove_resource(
        &mut self,
        index: usize,
        session: &Session,
        decision: Decision,
    ) -> BoardResult<Option<Helper>> {
        let listing = self
            .state()
            .helpers
            .get(index)
            .ok_or_else(|| BoardError::not_found("Resource not found."))?;
        if !session.is_helper_named(&listing.name) {
            return Err(BoardError::not_authorized(
                "You can only remove your own resources.",
            ));
        }
        if decision == Decision::Declined {
            return Ok(None);
        }

        let removed = self
            .store
            .apply(|state| Ok(state.helpers.remove(index)))
            .await?;
        info!(helper = %removed.name, "Resource removed");
        Ok(Some(removed))
    }

    //-------------------------------------------------------------------------------------
    // Request lifecycle
    //-------------------------------------------------------------------------------------

    /// Files a pickup request against the listing at `helper_index` and notifies
    /// its helper. At most one pending request per (helper, needer) pair is allowed.
    pub async fn request_pickup(
        &mut self,
        helper_index: usize,
        session: &Session,
    ) -> BoardResult<PickupRequest> {
        if session.role != Role::Needer {
            return Err(BoardError::not_authorized("Only needers can request pickup."));
        }

        let id = Uuid::now_v7();
        let timestamp = self.clock.now();
        let request = self
            .store
            .apply(|state| {
                let listing = state
                    .helpers
                    .get(helper_index)
                    .ok_or_else(|| BoardError::not_found("Resource not found."))?;
                if projection::has_pending_request(state, &listing.name, &session.name) {
                    return Err(BoardError::validation(
                        "You already have a pending pickup request with this helper.",
                    ));
                }

                let request = PickupRequest {
                    id,
                    helper_name: listing.name.clone(),
                    helper_phone: or_not_available(Some(listing.phone.as_str())),
                    needer_name: session.name.clone(),
                    resource: or_not_available(listing.resource.as_deref()),
                    status: RequestStatus::Requested,
                    timestamp,
                    confirmed_at: None,
                };
                state.notifications.push(Notification {
                    id,
                    helper_name: request.helper_name.clone(),
                    message: format!(
                        "Pickup requested by {} for \"{}\".",
                        request.needer_name, request.resource
                    ),
                    request_id: id,
                    timestamp,
                });
                state.pickup_requests.push(request.clone());
                Ok(request)
            })
            .await?;

        info!(
            %id,
            helper = %request.helper_name,
            needer = %request.needer_name,
            "Pickup requested"
        );
        Ok(request)
    }

    /// Confirms a pending request on behalf of its helper.
    ///
    /// On confirmation the request is archived to history, every listing whose
    /// (name, resource) text matches the request is taken off the board, the
    /// request's notification is dropped and a receipt is rendered.
    ///
    /// Listings are matched by text, not by identity: if the helper changed the
    /// resource text after the request was made, nothing is removed, and several
    /// identical listings are all removed.
    pub async fn confirm_pickup_request(
        &mut self,
        request_id: Uuid,
        session: &Session,
        decision: Decision,
    ) -> BoardResult<ConfirmOutcome> {
        let request = self
            .state()
            .pickup_requests
            .iter()
            .find(|r| r.id == request_id)
            .ok_or_else(|| BoardError::not_found("Request not found."))?;
        if !session.is_helper_named(&request.helper_name) {
            return Err(BoardError::not_authorized(
                "You are not authorized to confirm this request.",
            ));
        }
        if !request.is_pending() {
            return Err(BoardError::validation(
                "This request has already been confirmed.",
            ));
        }
        if decision == Decision::Declined {
            return Ok(ConfirmOutcome::Declined);
        }

        let confirmed_at = self.clock.now();
        let (request, entry, removed_listings) = self
            .store
            .apply(|state| {
                let stored = state
                    .pickup_requests
                    .iter_mut()
                    .find(|r| r.id == request_id)
                    .ok_or_else(|| BoardError::not_found("Request not found."))?;
                stored.status = RequestStatus::Confirmed;
                stored.confirmed_at = Some(confirmed_at);
                let request = stored.clone();

                let entry = PickupHistoryEntry {
                    id: request.id,
                    helper_name: request.helper_name.clone(),
                    helper_phone: request.helper_phone.clone(),
                    needer_name: request.needer_name.clone(),
                    resource: request.resource.clone(),
                    timestamp: confirmed_at,
                };
                state.pickup_history.push(entry.clone());

                let fulfilled =
                    |h: &Helper| h.is_named(&request.helper_name) && h.offers(&request.resource);
                let before = state.helpers.len() + state.registered_helpers.len();
                state.helpers.retain(|h| !fulfilled(h));
                state.registered_helpers.retain(|h| !fulfilled(h));
                let removed = before - (state.helpers.len() + state.registered_helpers.len());

                state.notifications.retain(|n| n.request_id != request_id);
                Ok((request, entry, removed))
            })
            .await?;

        info!(%request_id, removed_listings, "Pickup confirmed");

        let receipt = match self.receipts.render_receipt(&Receipt::from(&entry)).await {
            Ok(document) => Some(document),
            Err(e) => {
                warn!(%request_id, error = %e, "Receipt rendering failed after confirmation");
                None
            }
        };

        Ok(ConfirmOutcome::Confirmed(Box::new(Confirmation {
            request,
            entry,
            removed_listings,
            receipt,
        })))
    }

    /// Renders the receipt of a past pickup again, for one of its two parties.
    pub async fn reprint_receipt(
        &self,
        history_id: Uuid,
        session: &Session,
    ) -> BoardResult<String> {
        let entry = self
            .state()
            .pickup_history
            .iter()
            .find(|e| e.id == history_id)
            .ok_or_else(|| BoardError::not_found("History entry not found."))?;
        if !projection::can_reprint(entry, session) {
            return Err(BoardError::not_authorized(
                "Only the helper or needer of this pickup can print its receipt.",
            ));
        }
        self.receipts
            .render_receipt(&Receipt::from(entry))
            .await
            .map_err(BoardError::Collaborator)
    }
}

fn or_not_available(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}
