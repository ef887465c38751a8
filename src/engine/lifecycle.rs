use tracing::info;
use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// Move a booking through its lifecycle:
    ///
    /// ```text
    /// pending ──► confirmed
    ///    │            │
    ///    └────┬───────┘
    ///         ▼
    /// completed | cancelled | no_show   (terminal)
    /// ```
    ///
    /// Entering a terminal state frees the booking's staff and resource lanes
    /// immediately.
    pub async fn transition(&self, id: Ulid, target: BookingStatus) -> Result<Booking, EngineError> {
        let lane_ids = self
            .bookings
            .get(&id)
            .map(|b| b.lane_ids())
            .ok_or(EngineError::NotFound(id))?;
        let guards = self.lock_lanes(&lane_ids).await?;

        // Another transition may have won while we waited for the locks.
        let from = self
            .bookings
            .get(&id)
            .map(|b| b.status)
            .ok_or(EngineError::NotFound(id))?;
        if !from.can_transition_to(target) {
            return Err(EngineError::IllegalTransition { from, to: target });
        }

        let event = Event::BookingTransitioned {
            id,
            status: target,
            at: self.now_ms(),
        };
        self.persist_and_apply(event, guards).await?;

        metrics::counter!(
            crate::observability::TRANSITIONS_TOTAL,
            "status" => target.as_str()
        )
        .increment(1);
        info!(booking = %id, %from, to = %target, "booking transitioned");
        self.get_booking(id)
    }

    pub async fn cancel(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.transition(id, BookingStatus::Cancelled).await
    }

    /// Kiosk check-in: confirm the pending booking behind `short_code`.
    pub async fn check_in(&self, short_code: &str) -> Result<Booking, EngineError> {
        let code = short_code.trim().to_ascii_uppercase();
        let id = self
            .short_codes
            .get(&code)
            .map(|e| *e.value())
            .ok_or_else(|| EngineError::UnknownShortCode(code.clone()))?;
        self.transition(id, BookingStatus::Confirmed).await
    }
}
