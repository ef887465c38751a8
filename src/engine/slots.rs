use chrono::NaiveDate;
use tracing::debug;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// Candidate windows for `service` at `location` on a local `date`, ascending.
    ///
    /// Starts step from opening time by `granularity_min` (default: the service
    /// duration) while the whole window still fits before closing. A window is
    /// kept when enough distinct staff and at least one resource are free for
    /// it. Advisory only: commits re-check under lock.
    pub async fn compute_slots(
        &self,
        location_id: Ulid,
        service_id: Ulid,
        date: NaiveDate,
        granularity_min: Option<u32>,
    ) -> Result<Vec<Span>, EngineError> {
        let location = self.catalog.location(&location_id)?;
        let service = self.catalog.service(&service_id)?;
        if !service.active {
            return Err(EngineError::Validation(format!("service {service_id} is inactive")));
        }
        let granularity = granularity_min.unwrap_or(service.duration_min);
        if !(MIN_SLOT_GRANULARITY_MIN..=MAX_SERVICE_DURATION_MIN).contains(&granularity) {
            return Err(EngineError::Validation(format!(
                "granularity must be between {MIN_SLOT_GRANULARITY_MIN} and {MAX_SERVICE_DURATION_MIN} minutes"
            )));
        }

        let Some(open) = location.hours.window_on(location.tz(), date) else {
            return Ok(Vec::new());
        };
        let now = self.now_ms();
        let duration = service.duration_ms();
        let step = granularity as Ms * MINUTE_MS;

        let mut slots = Vec::new();
        let mut start = open.start;
        while start + duration <= open.end {
            if start >= now {
                let window = Span::new(start, start + duration);
                if self.window_has_capacity(&location, &service, window).await? {
                    slots.push(window);
                }
            }
            start += step;
        }
        debug!(%location_id, %service_id, %date, slots = slots.len(), "slots computed");
        Ok(slots)
    }

    async fn window_has_capacity(
        &self,
        location: &Location,
        service: &Service,
        window: Span,
    ) -> Result<bool, EngineError> {
        let staff = self.free_staff_in_location(location.id, window).await?;
        if staff.len() < service.staff_required() {
            return Ok(false);
        }
        let resources = self
            .free_resources_in_location(location.id, window, service.required_resource_kind())
            .await?;
        Ok(!resources.is_empty())
    }
}
