use chrono::{NaiveDate, NaiveTime};
use tracing::{info, warn};
use ulid::Ulid;

use crate::calendar::{local_to_utc, parse_timezone};
use crate::limits::*;
use crate::model::*;

use super::allocator::validate_span;
use super::{Engine, EngineError};

fn validate_name(what: &'static str, name: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::Validation(format!("{what} name must not be empty")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

fn validate_reason(reason: &Option<String>) -> Result<(), EngineError> {
    if reason.as_ref().is_some_and(|r| r.len() > MAX_REASON_LEN) {
        return Err(EngineError::LimitExceeded("reason too long"));
    }
    Ok(())
}

impl Engine {
    fn check_catalog_room(&self) -> Result<(), EngineError> {
        if self.catalog.len() >= MAX_CATALOG_ENTRIES {
            return Err(EngineError::LimitExceeded("too many catalog entries"));
        }
        Ok(())
    }

    // ── Catalog upserts ──────────────────────────────────────

    pub async fn save_location(&self, location: Location) -> Result<(), EngineError> {
        validate_name("location", &location.name)?;
        parse_timezone(&location.timezone)?;
        if !self.catalog.contains_location(&location.id) {
            self.check_catalog_room()?;
        }
        let id = location.id;
        self.persist_and_apply(Event::LocationSaved { location }, Vec::new()).await?;
        info!(location = %id, "location saved");
        Ok(())
    }

    pub async fn save_staff(&self, staff: Staff) -> Result<(), EngineError> {
        validate_name("staff", &staff.display_name)?;
        self.catalog.location(&staff.location_id)?;
        if self.catalog.staff(&staff.id).is_err() {
            self.check_catalog_room()?;
        }
        let id = staff.id;
        self.persist_and_apply(Event::StaffSaved { staff }, Vec::new()).await?;
        info!(staff = %id, "staff saved");
        Ok(())
    }

    pub async fn save_resource(&self, resource: Resource) -> Result<(), EngineError> {
        validate_name("resource", &resource.name)?;
        self.catalog.location(&resource.location_id)?;
        if resource.capacity == 0 {
            return Err(EngineError::Validation("resource capacity must be at least 1".into()));
        }
        if self.catalog.resource(&resource.id).is_err() {
            self.check_catalog_room()?;
        }
        let id = resource.id;
        self.persist_and_apply(Event::ResourceSaved { resource }, Vec::new()).await?;
        info!(resource = %id, "resource saved");
        Ok(())
    }

    pub async fn save_service(&self, service: Service) -> Result<(), EngineError> {
        validate_name("service", &service.name)?;
        if !(1..=MAX_SERVICE_DURATION_MIN).contains(&service.duration_min) {
            return Err(EngineError::Validation(format!(
                "service duration must be 1..={MAX_SERVICE_DURATION_MIN} minutes"
            )));
        }
        if service.base_price_cents < 0 {
            return Err(EngineError::Validation("price must not be negative".into()));
        }
        if self.catalog.service(&service.id).is_err() {
            self.check_catalog_room()?;
        }
        let id = service.id;
        self.persist_and_apply(Event::ServiceSaved { service }, Vec::new()).await?;
        info!(service = %id, "service saved");
        Ok(())
    }

    pub async fn deactivate_staff(&self, id: Ulid) -> Result<(), EngineError> {
        let staff = self.catalog.staff(&id)?;
        self.save_staff(Staff { active: false, ..staff }).await
    }

    pub async fn deactivate_resource(&self, id: Ulid) -> Result<(), EngineError> {
        let resource = self.catalog.resource(&id)?;
        self.save_resource(Resource { active: false, ..resource }).await
    }

    pub async fn deactivate_service(&self, id: Ulid) -> Result<(), EngineError> {
        let service = self.catalog.service(&id)?;
        self.save_service(Service { active: false, ..service }).await
    }

    // ── Staff availability overrides ─────────────────────────

    /// Record a per-date override for a staff member, in location-local time.
    ///
    /// `is_available = false` blocks the window; `true` opens it even outside
    /// the default working pattern. Rows for the same staff member must not
    /// overlap (`Overlap`). Existing bookings inside a new unavailable window
    /// are kept; only future proposals see the block.
    pub async fn set_staff_availability(
        &self,
        staff_id: Ulid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        is_available: bool,
        reason: Option<String>,
    ) -> Result<StaffAvailability, EngineError> {
        validate_reason(&reason)?;
        if start_time >= end_time {
            return Err(EngineError::Validation("start_time must be before end_time".into()));
        }
        let staff = self.catalog.staff(&staff_id)?;
        let tz = self.catalog.location(&staff.location_id)?.tz();
        let start = local_to_utc(tz, date, start_time);
        let end = local_to_utc(tz, date, end_time);
        if start >= end {
            return Err(EngineError::Validation(
                "window vanishes in a daylight-saving transition".into(),
            ));
        }
        let span = Span::new(start, end);
        validate_span(&span)?;

        let guards = self.lock_lanes(&[staff_id]).await?;
        let lane = &guards[0];
        if lane.intervals.len() >= MAX_INTERVALS_PER_LANE {
            return Err(EngineError::LimitExceeded("too many intervals on lane"));
        }
        if let Some(existing) = lane.overlapping(&span).find(|i| i.is_override()) {
            return Err(EngineError::Overlap(existing.id));
        }
        let displaced = lane
            .overlapping(&span)
            .filter(|i| i.kind == IntervalKind::Booking)
            .count();

        let availability = StaffAvailability {
            id: Ulid::new(),
            staff_id,
            date,
            start_time,
            end_time,
            is_available,
            reason,
            span,
        };
        let event = Event::AvailabilitySet {
            availability: availability.clone(),
        };
        self.persist_and_apply(event, guards).await?;

        if !is_available && displaced > 0 {
            warn!(staff = %staff_id, %date, bookings = displaced, "unavailability overlaps existing bookings");
        }
        info!(staff = %staff_id, %date, is_available, "staff availability set");
        Ok(availability)
    }

    pub async fn mark_unavailable(
        &self,
        staff_id: Ulid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        reason: Option<String>,
    ) -> Result<StaffAvailability, EngineError> {
        self.set_staff_availability(staff_id, date, start_time, end_time, false, reason)
            .await
    }

    pub async fn remove_staff_availability(&self, id: Ulid) -> Result<(), EngineError> {
        let staff_id = self
            .availability
            .get(&id)
            .map(|a| a.staff_id)
            .ok_or(EngineError::NotFound(id))?;
        let guards = self.lock_lanes(&[staff_id]).await?;
        if !self.availability.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }
        self.persist_and_apply(Event::AvailabilityRemoved { id, staff_id }, guards).await?;
        info!(availability = %id, staff = %staff_id, "staff availability removed");
        Ok(())
    }

    // ── Resource blocks ──────────────────────────────────────

    /// Hold a resource for maintenance or private use. A block always wins
    /// over future proposals; bookings already in the window are kept.
    pub async fn create_block(
        &self,
        location_id: Ulid,
        resource_id: Ulid,
        span: Span,
        reason: Option<String>,
    ) -> Result<BookingBlock, EngineError> {
        validate_span(&span)?;
        validate_reason(&reason)?;
        let resource = self.catalog.resource(&resource_id)?;
        if resource.location_id != location_id {
            return Err(EngineError::Validation(format!(
                "resource {resource_id} is not at location {location_id}"
            )));
        }

        let guards = self.lock_lanes(&[resource_id]).await?;
        let lane = &guards[0];
        if lane.intervals.len() >= MAX_INTERVALS_PER_LANE {
            return Err(EngineError::LimitExceeded("too many intervals on lane"));
        }
        if let Some(existing) = lane
            .overlapping(&span)
            .find(|i| i.kind == IntervalKind::Block)
        {
            return Err(EngineError::Overlap(existing.id));
        }
        let displaced = lane.booking_count(&span);

        let block = BookingBlock {
            id: Ulid::new(),
            location_id,
            resource_id,
            span,
            reason,
        };
        let event = Event::BlockCreated {
            block: block.clone(),
        };
        self.persist_and_apply(event, guards).await?;

        if displaced > 0 {
            warn!(resource = %resource_id, bookings = displaced, "block overlaps existing bookings");
        }
        info!(block = %block.id, resource = %resource_id, start = span.start, end = span.end, "block created");
        Ok(block)
    }

    pub async fn remove_block(&self, id: Ulid) -> Result<(), EngineError> {
        let resource_id = self
            .blocks
            .get(&id)
            .map(|b| b.resource_id)
            .ok_or(EngineError::NotFound(id))?;
        let guards = self.lock_lanes(&[resource_id]).await?;
        if !self.blocks.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }
        self.persist_and_apply(Event::BlockRemoved { id, resource_id }, guards).await?;
        info!(block = %id, resource = %resource_id, "block removed");
        Ok(())
    }
}
