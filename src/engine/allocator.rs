use tracing::debug;
use ulid::Ulid;

use crate::calendar::{local_date, local_day_span};
use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

pub(super) fn validate_span(span: &Span) -> Result<(), EngineError> {
    if span.start >= span.end {
        return Err(EngineError::Validation("window start must be before end".into()));
    }
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("span too wide"));
    }
    Ok(())
}

impl Engine {
    /// Pick concrete staff (two for dual-artist services) and a resource for
    /// an exact window.
    ///
    /// Staff are ranked by non-terminal bookings on the window's local day,
    /// fewest first, then id. Resources rank the service's kind first, then id.
    /// `Ok(None)` is the expected "no availability" answer, not a failure.
    pub async fn propose_assignment(
        &self,
        location_id: Ulid,
        service_id: Ulid,
        span: Span,
    ) -> Result<Option<Assignment>, EngineError> {
        validate_span(&span)?;
        let location = self.catalog.location(&location_id)?;
        let service = self.catalog.service(&service_id)?;
        if !service.active {
            return Err(EngineError::Validation(format!("service {service_id} is inactive")));
        }
        if span.duration_ms() != service.duration_ms() {
            return Err(EngineError::Validation(format!(
                "window is {} min but {} takes {} min",
                span.duration_ms() / MINUTE_MS,
                service.name,
                service.duration_min
            )));
        }

        let staff = self.free_staff_in_location(location_id, span).await?;
        if staff.len() < service.staff_required() {
            debug!(%location_id, %service_id, start = span.start, "no free staff");
            return Ok(None);
        }
        let resources = self
            .free_resources_in_location(location_id, span, service.required_resource_kind())
            .await?;
        let Some(resource) = resources.first() else {
            debug!(%location_id, %service_id, start = span.start, "no free resource");
            return Ok(None);
        };

        let tz = location.tz();
        let day = local_day_span(tz, local_date(tz, span.start));
        let mut ranked = Vec::with_capacity(staff.len());
        for s in staff {
            let load = self.lane(&s.id)?.read().await.booking_count(&day);
            ranked.push((load, s.id));
        }
        ranked.sort();

        let Some(&(_, staff_id)) = ranked.first() else {
            return Ok(None);
        };
        let secondary_artist_id = if service.requires_dual_artist {
            ranked.iter().map(|(_, id)| *id).find(|id| *id != staff_id)
        } else {
            None
        };
        if service.requires_dual_artist && secondary_artist_id.is_none() {
            return Ok(None);
        }

        Ok(Some(Assignment {
            staff_id,
            secondary_artist_id,
            resource_id: resource.id,
        }))
    }
}
