use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

use super::EngineError;

/// Administrator-owned reference data: locations, staff, resources, services.
///
/// Rarely mutated, read by every availability computation. Values are cloned
/// out so no map guard is ever held across an await point.
pub struct Catalog {
    locations: DashMap<Ulid, Location>,
    staff: DashMap<Ulid, Staff>,
    resources: DashMap<Ulid, Resource>,
    services: DashMap<Ulid, Service>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            locations: DashMap::new(),
            staff: DashMap::new(),
            resources: DashMap::new(),
            services: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.locations.len() + self.staff.len() + self.resources.len() + self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Lookups ──────────────────────────────────────────────

    pub fn location(&self, id: &Ulid) -> Result<Location, EngineError> {
        self.locations
            .get(id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(*id))
    }

    pub fn staff(&self, id: &Ulid) -> Result<Staff, EngineError> {
        self.staff
            .get(id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(*id))
    }

    pub fn resource(&self, id: &Ulid) -> Result<Resource, EngineError> {
        self.resources
            .get(id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(*id))
    }

    pub fn service(&self, id: &Ulid) -> Result<Service, EngineError> {
        self.services
            .get(id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(*id))
    }

    pub fn contains_location(&self, id: &Ulid) -> bool {
        self.locations.contains_key(id)
    }

    /// Bookable staff at a location, id ascending.
    pub fn bookable_staff_at(&self, location_id: Ulid) -> Vec<Staff> {
        let mut out: Vec<Staff> = self
            .staff
            .iter()
            .filter(|e| e.location_id == location_id && e.is_bookable())
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|s| s.id);
        out
    }

    /// Active resources at a location, id ascending.
    pub fn active_resources_at(&self, location_id: Ulid) -> Vec<Resource> {
        let mut out: Vec<Resource> = self
            .resources
            .iter()
            .filter(|e| e.location_id == location_id && e.active)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|r| r.id);
        out
    }

    // ── Snapshots (compaction) ───────────────────────────────

    pub fn all_locations(&self) -> Vec<Location> {
        self.locations.iter().map(|e| e.value().clone()).collect()
    }

    pub fn all_staff(&self) -> Vec<Staff> {
        self.staff.iter().map(|e| e.value().clone()).collect()
    }

    pub fn all_resources(&self) -> Vec<Resource> {
        self.resources.iter().map(|e| e.value().clone()).collect()
    }

    pub fn all_services(&self) -> Vec<Service> {
        self.services.iter().map(|e| e.value().clone()).collect()
    }

    // ── Event application ────────────────────────────────────

    /// Apply catalog events; everything else is ignored here.
    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::LocationSaved { location } => {
                self.locations.insert(location.id, location.clone());
            }
            Event::StaffSaved { staff } => {
                self.staff.insert(staff.id, staff.clone());
            }
            Event::ResourceSaved { resource } => {
                self.resources.insert(resource.id, resource.clone());
            }
            Event::ServiceSaved { service } => {
                self.services.insert(service.id, service.clone());
            }
            Event::AvailabilitySet { .. }
            | Event::AvailabilityRemoved { .. }
            | Event::BlockCreated { .. }
            | Event::BlockRemoved { .. }
            | Event::BookingCreated { .. }
            | Event::BookingTransitioned { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{DayHours, WeeklyHours};

    fn staff(location_id: Ulid, role: StaffRole, active: bool) -> Staff {
        Staff {
            id: Ulid::new(),
            location_id,
            role,
            display_name: "x".into(),
            active,
            available_for_booking: true,
            working_hours: None,
        }
    }

    #[test]
    fn bookable_staff_filters_role_location_and_active() {
        let catalog = Catalog::new();
        let here = Ulid::new();
        let there = Ulid::new();
        catalog.apply_event(&Event::LocationSaved {
            location: Location {
                id: here,
                name: "Main".into(),
                timezone: "UTC".into(),
                hours: WeeklyHours::every_day(DayHours::hours(9, 18).unwrap()),
            },
        });
        let artist = staff(here, StaffRole::Artist, true);
        let manager = staff(here, StaffRole::Manager, true);
        for s in [
            artist.clone(),
            manager.clone(),
            staff(here, StaffRole::Admin, true),
            staff(here, StaffRole::Artist, false),
            staff(there, StaffRole::Artist, true),
        ] {
            catalog.apply_event(&Event::StaffSaved { staff: s });
        }

        let ids: Vec<Ulid> = catalog.bookable_staff_at(here).iter().map(|s| s.id).collect();
        let mut expected = vec![artist.id, manager.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn lookups_report_not_found() {
        let catalog = Catalog::default();
        assert!(catalog.is_empty());
        let id = Ulid::new();
        assert!(matches!(catalog.service(&id), Err(EngineError::NotFound(x)) if x == id));
    }
}
