//! Commit path for every booking channel.
//!
//! Slots and proposals are computed without locks and may be stale by the time
//! a caller commits. `create_booking` write-locks every lane the booking will
//! occupy (ascending id), re-runs the ledger checks against the locked lanes,
//! and only then persists. A lost race leaves no trace.

use std::time::Instant;

use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::{resource_lane_free, staff_lane_free};
use super::ledger::working_windows;
use super::{Engine, EngineError};

/// A fully specified booking, usually built from `propose_assignment`.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub customer_id: Ulid,
    pub service_id: Ulid,
    pub location_id: Ulid,
    pub start: Ms,
    pub assignment: Assignment,
    pub channel: Channel,
    pub deposit_cents: i64,
    pub notes: Option<String>,
}

impl BookingRequest {
    pub fn new(
        customer_id: Ulid,
        service_id: Ulid,
        location_id: Ulid,
        start: Ms,
        assignment: Assignment,
        channel: Channel,
    ) -> Self {
        Self {
            customer_id,
            service_id,
            location_id,
            start,
            assignment,
            channel,
            deposit_cents: 0,
            notes: None,
        }
    }
}

fn bookable_at(staff: &Staff, location_id: Ulid) -> Result<(), EngineError> {
    if staff.location_id != location_id {
        return Err(EngineError::Validation(format!(
            "staff {} does not work at location {location_id}",
            staff.id
        )));
    }
    if !staff.is_bookable() {
        return Err(EngineError::Validation(format!("staff {} is not bookable", staff.id)));
    }
    Ok(())
}

impl Engine {
    pub async fn create_booking(&self, req: BookingRequest) -> Result<Booking, EngineError> {
        let started = Instant::now();
        let location = self.catalog.location(&req.location_id)?;
        let service = self.catalog.service(&req.service_id)?;
        if !service.active {
            return Err(EngineError::Validation(format!("service {} is inactive", service.id)));
        }
        let span = Span {
            start: req.start,
            end: req.start.saturating_add(service.duration_ms()),
        };
        super::allocator::validate_span(&span)?;
        if req.notes.as_ref().is_some_and(|n| n.len() > MAX_NOTES_LEN) {
            return Err(EngineError::LimitExceeded("notes too long"));
        }
        if req.deposit_cents < 0 || req.deposit_cents > service.base_price_cents {
            return Err(EngineError::Validation(
                "deposit must be between zero and the service price".into(),
            ));
        }

        // ── Validate the assignment against the catalog ──
        let assignment = req.assignment;
        let primary = self.catalog.staff(&assignment.staff_id)?;
        bookable_at(&primary, location.id)?;
        let secondary = match (service.requires_dual_artist, assignment.secondary_artist_id) {
            (true, Some(id)) if id == primary.id => {
                return Err(EngineError::Validation(
                    "dual-artist service needs two distinct staff".into(),
                ));
            }
            (true, Some(id)) => {
                let s = self.catalog.staff(&id)?;
                bookable_at(&s, location.id)?;
                Some(s)
            }
            (true, None) => {
                return Err(EngineError::Validation(format!(
                    "{} requires a secondary artist",
                    service.name
                )));
            }
            (false, Some(_)) => {
                return Err(EngineError::Validation(format!(
                    "{} does not take a secondary artist",
                    service.name
                )));
            }
            (false, None) => None,
        };
        let resource = self.catalog.resource(&assignment.resource_id)?;
        if resource.location_id != location.id || !resource.active {
            return Err(EngineError::Validation(format!(
                "resource {} is not available at location {}",
                resource.id, location.id
            )));
        }
        if let Some(kind) = service.required_resource_kind()
            && resource.kind != kind
        {
            return Err(EngineError::Validation(format!(
                "{} requires a {} but {} is a {}",
                service.name,
                kind.as_str(),
                resource.name,
                resource.kind.as_str()
            )));
        }

        // ── Re-check under the lane locks ──
        let mut lane_ids = vec![primary.id, resource.id];
        lane_ids.extend(secondary.as_ref().map(|s| s.id));
        let guards = self.lock_lanes(&lane_ids).await?;

        for guard in guards.iter() {
            if guard.intervals.len() >= MAX_INTERVALS_PER_LANE {
                return Err(EngineError::LimitExceeded("too many intervals on lane"));
            }
            let free = if guard.id == resource.id {
                resource_lane_free(guard, &span)
            } else {
                let staff = std::iter::once(&primary)
                    .chain(secondary.as_ref())
                    .find(|s| s.id == guard.id)
                    .ok_or(EngineError::NotFound(guard.id))?;
                staff_lane_free(guard, &working_windows(staff, &location, &span), &span)
            };
            if !free {
                metrics::counter!(crate::observability::COMMIT_CONFLICTS_TOTAL).increment(1);
                warn!(
                    lane = %guard.id,
                    start = span.start,
                    channel = req.channel.as_str(),
                    "commit lost: slot no longer available"
                );
                return Err(EngineError::SlotNoLongerAvailable);
            }
        }

        // ── Persist ──
        let now = self.now_ms();
        let id = Ulid::new();
        let short_id = self.reserve_short_code(id)?;
        let booking = Booking {
            id,
            short_id,
            customer_id: req.customer_id,
            staff_id: primary.id,
            secondary_artist_id: secondary.as_ref().map(|s| s.id),
            location_id: location.id,
            resource_id: resource.id,
            service_id: service.id,
            span,
            status: req.channel.initial_status(),
            channel: req.channel,
            deposit_cents: req.deposit_cents,
            total_cents: service.base_price_cents,
            is_paid: false,
            notes: req.notes,
            created_at: now,
            updated_at: now,
        };
        let event = Event::BookingCreated {
            booking: booking.clone(),
        };
        // A failed append releases the short code.
        self.persist_and_apply(event, guards).await?;

        metrics::counter!(
            crate::observability::BOOKINGS_COMMITTED_TOTAL,
            "channel" => req.channel.as_str()
        )
        .increment(1);
        metrics::histogram!(crate::observability::COMMIT_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        info!(
            booking = %booking.id,
            short_id = %booking.short_id,
            staff = %booking.staff_id,
            resource = %booking.resource_id,
            start = booking.span.start,
            status = %booking.status,
            "booking committed"
        );
        Ok(booking)
    }

    /// Walk-in booking starting now (to the minute). Proposes and commits in one
    /// go; `NoAvailability` if nothing fits right now. Never retries.
    pub async fn book_walk_in(
        &self,
        customer_id: Ulid,
        location_id: Ulid,
        service_id: Ulid,
    ) -> Result<Booking, EngineError> {
        let service = self.catalog.service(&service_id)?;
        let now = self.now_ms();
        let start = now - now.rem_euclid(MINUTE_MS);
        let span = Span::new(start, start + service.duration_ms());
        let assignment = self
            .propose_assignment(location_id, service_id, span)
            .await?
            .ok_or(EngineError::NoAvailability)?;
        self.create_booking(BookingRequest::new(
            customer_id,
            service_id,
            location_id,
            start,
            assignment,
            Channel::KioskWalkIn,
        ))
        .await
    }
}
