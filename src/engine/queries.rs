use ulid::Ulid;

use crate::limits::MAX_LIST_RESULTS;
use crate::model::*;

use super::{Engine, EngineError};

/// Conjunctive booking filter; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub location_id: Option<Ulid>,
    pub staff_id: Option<Ulid>,
    pub resource_id: Option<Ulid>,
    pub customer_id: Option<Ulid>,
    pub status: Option<BookingStatus>,
    /// Bookings overlapping this window.
    pub window: Option<Span>,
}

impl BookingFilter {
    fn matches(&self, b: &Booking) -> bool {
        self.location_id.is_none_or(|id| b.location_id == id)
            // A staff filter also finds bookings where they are the second artist.
            && self
                .staff_id
                .is_none_or(|id| b.staff_id == id || b.secondary_artist_id == Some(id))
            && self.resource_id.is_none_or(|id| b.resource_id == id)
            && self.customer_id.is_none_or(|id| b.customer_id == id)
            && self.status.is_none_or(|s| b.status == s)
            && self.window.is_none_or(|w| b.span.overlaps(&w))
    }
}

impl Engine {
    pub fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.bookings
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))
    }

    /// Active (non-terminal) booking behind a kiosk code. Case-insensitive.
    pub fn booking_by_short_code(&self, code: &str) -> Result<Booking, EngineError> {
        let code = code.trim().to_ascii_uppercase();
        let id = self
            .short_codes
            .get(&code)
            .map(|e| *e.value())
            .ok_or(EngineError::UnknownShortCode(code))?;
        self.get_booking(id)
    }

    /// Matching bookings ordered by start time, then id.
    pub fn list_bookings(&self, filter: &BookingFilter) -> Vec<Booking> {
        let mut out: Vec<Booking> = self
            .bookings
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|b| (b.span.start, b.id));
        out.truncate(MAX_LIST_RESULTS);
        out
    }

    pub fn staff_availability(&self, staff_id: Ulid) -> Vec<StaffAvailability> {
        let mut out: Vec<StaffAvailability> = self
            .availability
            .iter()
            .filter(|e| e.staff_id == staff_id)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|a| (a.span.start, a.id));
        out
    }

    pub fn blocks_for_resource(&self, resource_id: Ulid) -> Vec<BookingBlock> {
        let mut out: Vec<BookingBlock> = self
            .blocks
            .iter()
            .filter(|e| e.resource_id == resource_id)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|b| (b.span.start, b.id));
        out
    }
}
