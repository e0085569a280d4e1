//! crates/resource_board_core/src/projection.rs
//!
//! View Projection: pure functions deriving what each view shows from the
//! current board state. Nothing here is cached; callers recompute after every
//! mutation.

use serde::Serialize;

use crate::domain::{
    names_match, Coordinates, Helper, Notification, PickupHistoryEntry, RequestStatus, Role,
    Section, Session,
};
use crate::store::BoardState;

/// Fraction of the marker extent added on each side when fitting the viewport.
pub const BOUNDS_PADDING: f64 = 0.2;

//=========================================================================================
// Listings
//=========================================================================================

/// The action a session is offered on one listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingAction {
    RequestPickup,
    /// A pending request already exists; the affordance is shown disabled.
    Requested,
    RemoveResource,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingView {
    pub index: usize,
    pub helper: Helper,
    pub action: ListingAction,
}

pub fn active_listings(state: &BoardState, session: Option<&Session>) -> Vec<ListingView> {
    state
        .helpers
        .iter()
        .enumerate()
        .map(|(index, helper)| ListingView {
            index,
            helper: helper.clone(),
            action: listing_action(state, helper, session),
        })
        .collect()
}

fn listing_action(state: &BoardState, helper: &Helper, session: Option<&Session>) -> ListingAction {
    match session {
        Some(session) if session.role == Role::Needer => {
            if has_pending_request(state, &helper.name, &session.name) {
                ListingAction::Requested
            } else {
                ListingAction::RequestPickup
            }
        }
        Some(session) if session.is_helper_named(&helper.name) => ListingAction::RemoveResource,
        _ => ListingAction::None,
    }
}

/// Whether `needer` already has a `requested` pickup open against `helper`.
pub fn has_pending_request(state: &BoardState, helper: &str, needer: &str) -> bool {
    state.pickup_requests.iter().any(|request| {
        request.is_pending()
            && names_match(&request.helper_name, helper)
            && names_match(&request.needer_name, needer)
    })
}

//=========================================================================================
// Notifications
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub notification: Notification,
    /// Status of the originating request, if it still exists.
    pub status: Option<RequestStatus>,
    pub can_confirm: bool,
}

/// The inbox of a helper session. Needers have no inbox.
pub fn notifications_for(state: &BoardState, session: &Session) -> Vec<NotificationView> {
    if session.role != Role::Helper {
        return Vec::new();
    }
    state
        .notifications
        .iter()
        .filter(|n| names_match(&n.helper_name, &session.name))
        .map(|notification| {
            let status = state
                .pickup_requests
                .iter()
                .find(|r| r.id == notification.request_id)
                .map(|r| r.status);
            NotificationView {
                notification: notification.clone(),
                status,
                can_confirm: status == Some(RequestStatus::Requested),
            }
        })
        .collect()
}

//=========================================================================================
// History
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub entry: PickupHistoryEntry,
    pub can_reprint: bool,
}

/// Every completed pickup, newest first.
pub fn history_for(state: &BoardState, session: &Session) -> Vec<HistoryView> {
    state
        .pickup_history
        .iter()
        .rev()
        .map(|entry| HistoryView {
            entry: entry.clone(),
            can_reprint: can_reprint(entry, session),
        })
        .collect()
}

/// Only the two parties of a pickup may print its receipt again.
pub fn can_reprint(entry: &PickupHistoryEntry, session: &Session) -> bool {
    session.is_needer_named(&entry.needer_name) || session.is_helper_named(&entry.helper_name)
}

//=========================================================================================
// Map
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub position: Coordinates,
    pub label: String,
    pub popup: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub south_west: Coordinates,
    pub north_east: Coordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub center: Coordinates,
    pub markers: Vec<MapMarker>,
    /// Viewport that fits every marker, padded by [`BOUNDS_PADDING`].
    pub bounds: Bounds,
}

pub fn map_view(state: &BoardState, device_location: Coordinates) -> MapView {
    let mut markers = vec![MapMarker {
        position: device_location,
        label: "Your Location".to_string(),
        popup: "Your Location".to_string(),
    }];
    markers.extend(state.helpers.iter().map(|helper| {
        let phone = if helper.phone.is_empty() {
            "N/A"
        } else {
            helper.phone.as_str()
        };
        MapMarker {
            position: helper.location,
            label: helper.name.clone(),
            popup: format!(
                "{}\n{}\nPhone: {}",
                helper.name,
                helper.resource.as_deref().unwrap_or_default(),
                phone
            ),
        }
    }));

    let bounds = padded_bounds(&markers, device_location);
    MapView {
        center: device_location,
        markers,
        bounds,
    }
}

fn padded_bounds(markers: &[MapMarker], fallback: Coordinates) -> Bounds {
    let mut south_west = fallback;
    let mut north_east = fallback;
    for marker in markers {
        south_west.lat = south_west.lat.min(marker.position.lat);
        south_west.lng = south_west.lng.min(marker.position.lng);
        north_east.lat = north_east.lat.max(marker.position.lat);
        north_east.lng = north_east.lng.max(marker.position.lng);
    }
    let lat_pad = (north_east.lat - south_west.lat) * BOUNDS_PADDING;
    let lng_pad = (north_east.lng - south_west.lng) * BOUNDS_PADDING;
    Bounds {
        south_west: Coordinates::new(south_west.lat - lat_pad, south_west.lng - lng_pad),
        north_east: Coordinates::new(north_east.lat + lat_pad, north_east.lng + lng_pad),
    }
}

//=========================================================================================
// Navigation
//=========================================================================================

/// The views a session can navigate to.
pub fn visible_sections(session: &Session) -> Vec<Section> {
    Section::ALL
        .into_iter()
        .filter(|section| session.role == Role::Helper || !section.is_helper_only())
        .collect()
}
