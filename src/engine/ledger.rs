//! Read side of the ledger: is a staff member or a resource free for a window?
//!
//! Lane contents are the source of truth. Staff lanes hold bookings (as primary
//! or secondary artist) and availability overrides; resource lanes hold
//! bookings and administrative blocks. Terminal bookings are removed from lanes
//! on transition, so they never count here.

use ulid::Ulid;

use crate::model::*;

use super::availability::{intersect_intervals, resource_lane_free, staff_lane_free};
use super::{Engine, EngineError};

/// The staff member's default working windows around `span`, in UTC: their
/// own pattern clipped to the location's business hours. Staff without their
/// own pattern follow the business hours.
pub(super) fn working_windows(staff: &Staff, location: &Location, span: &Span) -> Vec<Span> {
    let tz = location.tz();
    let business = location.hours.windows_covering(tz, span);
    match &staff.working_hours {
        Some(own) => intersect_intervals(&own.windows_covering(tz, span), &business),
        None => business,
    }
}

/// Resource ordering used everywhere a resource is picked: the preferred kind
/// first, then id ascending.
pub(super) fn order_resources(resources: &mut [Resource], preferred: ResourceKind) {
    resources.sort_by_key(|r| (r.kind != preferred, r.id));
}

impl Engine {
    pub async fn is_staff_free(&self, staff_id: Ulid, span: Span) -> Result<bool, EngineError> {
        let staff = self.catalog.staff(&staff_id)?;
        let location = self.catalog.location(&staff.location_id)?;
        let working = working_windows(&staff, &location, &span);
        let lane = self.lane(&staff_id)?;
        let guard = lane.read().await;
        Ok(staff_lane_free(&guard, &working, &span))
    }

    pub async fn is_resource_free(&self, resource_id: Ulid, span: Span) -> Result<bool, EngineError> {
        // Existence check; inactive resources still answer.
        self.catalog.resource(&resource_id)?;
        let lane = self.lane(&resource_id)?;
        let guard = lane.read().await;
        Ok(resource_lane_free(&guard, &span))
    }

    /// Bookable staff at the location who are free for `span`, id ascending.
    pub async fn free_staff_in_location(
        &self,
        location_id: Ulid,
        span: Span,
    ) -> Result<Vec<Staff>, EngineError> {
        let location = self.catalog.location(&location_id)?;
        let mut free = Vec::new();
        for staff in self.catalog.bookable_staff_at(location_id) {
            let working = working_windows(&staff, &location, &span);
            let lane = self.lane(&staff.id)?;
            let is_free = staff_lane_free(&*lane.read().await, &working, &span);
            if is_free {
                free.push(staff);
            }
        }
        Ok(free)
    }

    /// Active resources at the location that are free for `span`. `type_filter`
    /// restricts the kind; results put the filtered kind (or `station` when
    /// unfiltered) first, then id ascending.
    pub async fn free_resources_in_location(
        &self,
        location_id: Ulid,
        span: Span,
        type_filter: Option<ResourceKind>,
    ) -> Result<Vec<Resource>, EngineError> {
        self.catalog.location(&location_id)?;
        let mut free = Vec::new();
        for resource in self.catalog.active_resources_at(location_id) {
            if type_filter.is_some_and(|kind| kind != resource.kind) {
                continue;
            }
            let lane = self.lane(&resource.id)?;
            let is_free = resource_lane_free(&*lane.read().await, &span);
            if is_free {
                free.push(resource);
            }
        }
        order_resources(&mut free, type_filter.unwrap_or(ResourceKind::Station));
        Ok(free)
    }
}
