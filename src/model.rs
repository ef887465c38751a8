use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::calendar::WeeklyHours;

/// Unix milliseconds (UTC), the only instant type inside the ledger.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// `[a,b)` and `[c,d)` overlap iff `a < d && c < b`. Touching spans do not.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

// ── Enumerations ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StaffRole {
    Admin,
    Manager,
    Staff,
    Artist,
}

impl StaffRole {
    /// Roles that may be assigned to perform a service.
    pub const BOOKABLE: [StaffRole; 3] = [StaffRole::Artist, StaffRole::Staff, StaffRole::Manager];

    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Admin => "admin",
            StaffRole::Manager => "manager",
            StaffRole::Staff => "staff",
            StaffRole::Artist => "artist",
        }
    }
}

impl FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(StaffRole::Admin),
            "manager" => Ok(StaffRole::Manager),
            "staff" => Ok(StaffRole::Staff),
            "artist" => Ok(StaffRole::Artist),
            other => Err(format!("unknown staff role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Station,
    Room,
    Equipment,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Station => "station",
            ResourceKind::Room => "room",
            ResourceKind::Equipment => "equipment",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "station" | "chair" => Ok(ResourceKind::Station),
            "room" => Ok(ResourceKind::Room),
            "equipment" => Ok(ResourceKind::Equipment),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Terminal bookings no longer occupy their staff or resource.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    pub fn can_transition_to(&self, target: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, target),
            (Pending, Confirmed)
                | (Pending | Confirmed, Cancelled)
                | (Pending | Confirmed, Completed)
                | (Pending | Confirmed, NoShow)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            "no_show" | "noshow" => Ok(BookingStatus::NoShow),
            other => Err(format!("unknown booking status: {other}")),
        }
    }
}

/// Entry point a booking request arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Web,
    KioskWalkIn,
    KioskScheduled,
    StaffConsole,
}

impl Channel {
    pub fn initial_status(&self) -> BookingStatus {
        match self {
            Channel::KioskWalkIn => BookingStatus::Confirmed,
            Channel::Web | Channel::KioskScheduled | Channel::StaffConsole => BookingStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Web => "web",
            Channel::KioskWalkIn => "kiosk_walk_in",
            Channel::KioskScheduled => "kiosk_scheduled",
            Channel::StaffConsole => "staff_console",
        }
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "web" => Ok(Channel::Web),
            "kiosk_walk_in" | "walk_in" => Ok(Channel::KioskWalkIn),
            "kiosk_scheduled" | "kiosk" => Ok(Channel::KioskScheduled),
            "staff_console" | "staff" => Ok(Channel::StaffConsole),
            other => Err(format!("unknown channel: {other}")),
        }
    }
}

// ── Catalog ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: Ulid,
    pub name: String,
    /// IANA name, validated on save.
    pub timezone: String,
    pub hours: WeeklyHours,
}

impl Location {
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub id: Ulid,
    pub location_id: Ulid,
    pub role: StaffRole,
    pub display_name: String,
    pub active: bool,
    pub available_for_booking: bool,
    /// `None` follows the location's business hours.
    pub working_hours: Option<WeeklyHours>,
}

impl Staff {
    pub fn is_bookable(&self) -> bool {
        self.active && self.available_for_booking && StaffRole::BOOKABLE.contains(&self.role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Ulid,
    pub location_id: Ulid,
    pub name: String,
    pub kind: ResourceKind,
    pub capacity: u32,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: Ulid,
    pub name: String,
    pub duration_min: u32,
    pub base_price_cents: i64,
    pub requires_dual_artist: bool,
    /// Explicit resource kind requirement.
    pub resource_kind: Option<ResourceKind>,
    pub active: bool,
}

impl Service {
    pub fn duration_ms(&self) -> Ms {
        self.duration_min as Ms * MINUTE_MS
    }

    pub fn staff_required(&self) -> usize {
        if self.requires_dual_artist { 2 } else { 1 }
    }

    /// Hard resource kind filter: explicit kind, else `room` for dual-artist services.
    pub fn required_resource_kind(&self) -> Option<ResourceKind> {
        match self.resource_kind {
            Some(kind) => Some(kind),
            None if self.requires_dual_artist => Some(ResourceKind::Room),
            None => None,
        }
    }

    /// Kind ranked first when ordering candidate resources.
    pub fn preferred_resource_kind(&self) -> ResourceKind {
        self.required_resource_kind().unwrap_or(ResourceKind::Station)
    }
}

// ── Ledger facts ─────────────────────────────────────────────────

/// A per-date override of a staff member's default working pattern.
/// `is_available = false` is a hard block; `true` widens working hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffAvailability {
    pub id: Ulid,
    pub staff_id: Ulid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub reason: Option<String>,
    /// The local row resolved to UTC in the staff's location timezone.
    pub span: Span,
}

/// Administrative hard hold on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingBlock {
    pub id: Ulid,
    pub location_id: Ulid,
    pub resource_id: Ulid,
    pub span: Span,
    pub reason: Option<String>,
}

/// The staff/resource pairing chosen for one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub staff_id: Ulid,
    pub secondary_artist_id: Option<Ulid>,
    pub resource_id: Ulid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub short_id: String,
    pub customer_id: Ulid,
    pub staff_id: Ulid,
    pub secondary_artist_id: Option<Ulid>,
    pub location_id: Ulid,
    pub resource_id: Ulid,
    pub service_id: Ulid,
    pub span: Span,
    pub status: BookingStatus,
    pub channel: Channel,
    pub deposit_cents: i64,
    pub total_cents: i64,
    pub is_paid: bool,
    pub notes: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Booking {
    /// Every lane (staff and resource) this booking occupies while active.
    pub fn lane_ids(&self) -> Vec<Ulid> {
        let mut ids = vec![self.staff_id, self.resource_id];
        ids.extend(self.secondary_artist_id);
        ids
    }

    pub fn assignment(&self) -> Assignment {
        Assignment {
            staff_id: self.staff_id,
            secondary_artist_id: self.secondary_artist_id,
            resource_id: self.resource_id,
        }
    }
}

// ── Lanes ────────────────────────────────────────────────────────

/// What an interval on a lane represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalKind {
    /// A non-terminal booking.
    Booking,
    /// Administrative block (resource lanes).
    Block,
    /// `is_available = false` row (staff lanes).
    Unavailable,
    /// `is_available = true` row widening working hours (staff lanes).
    Available,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub id: Ulid,
    pub span: Span,
    pub kind: IntervalKind,
}

impl Interval {
    /// Intervals that make the lane busy.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.kind,
            IntervalKind::Booking | IntervalKind::Block | IntervalKind::Unavailable
        )
    }

    pub fn is_override(&self) -> bool {
        matches!(self.kind, IntervalKind::Unavailable | IntervalKind::Available)
    }
}

/// Every interval occupying one staff member or one resource.
#[derive(Debug, Clone)]
pub struct Lane {
    pub id: Ulid,
    /// Sorted by `span.start`.
    pub intervals: Vec<Interval>,
}

impl Lane {
    pub fn new(id: Ulid) -> Self {
        Self {
            id,
            intervals: Vec::new(),
        }
    }

    /// Insert interval maintaining sort order by span.start.
    pub fn insert_interval(&mut self, interval: Interval) {
        let pos = self
            .intervals
            .binary_search_by_key(&interval.span.start, |i| i.span.start)
            .unwrap_or_else(|e| e);
        self.intervals.insert(pos, interval);
    }

    pub fn remove_interval(&mut self, id: Ulid) -> Option<Interval> {
        let pos = self.intervals.iter().position(|i| i.id == id)?;
        Some(self.intervals.remove(pos))
    }

    /// Return only intervals whose span overlaps the query window.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Interval> {
        // Everything at index >= right_bound starts at or after query.end.
        let right_bound = self
            .intervals
            .partition_point(|i| i.span.start < query.end);
        self.intervals[..right_bound]
            .iter()
            .filter(move |i| i.span.end > query.start)
    }

    pub fn booking_count(&self, window: &Span) -> usize {
        self.overlapping(window)
            .filter(|i| i.kind == IntervalKind::Booking)
            .count()
    }
}

// ── WAL records ──────────────────────────────────────────────────

/// Every durable state change. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    LocationSaved {
        location: Location,
    },
    StaffSaved {
        staff: Staff,
    },
    ResourceSaved {
        resource: Resource,
    },
    ServiceSaved {
        service: Service,
    },
    AvailabilitySet {
        availability: StaffAvailability,
    },
    AvailabilityRemoved {
        id: Ulid,
        staff_id: Ulid,
    },
    BlockCreated {
        block: BookingBlock,
    },
    BlockRemoved {
        id: Ulid,
        resource_id: Ulid,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingTransitioned {
        id: Ulid,
        status: BookingStatus,
        at: Ms,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(start: Ms, end: Ms, kind: IntervalKind) -> Interval {
        Interval {
            id: Ulid::new(),
            span: Span::new(start, end),
            kind,
        }
    }

    #[test]
    fn span_overlap_is_half_open() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // back-to-back
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn span_contains_span() {
        let outer = Span::new(100, 400);
        assert!(outer.contains_span(&Span::new(150, 300)));
        assert!(outer.contains_span(&outer));
        assert!(!outer.contains_span(&Span::new(50, 200)));
    }

    #[test]
    fn lane_keeps_intervals_sorted() {
        let mut lane = Lane::new(Ulid::new());
        lane.insert_interval(interval(300, 400, IntervalKind::Booking));
        lane.insert_interval(interval(100, 200, IntervalKind::Unavailable));
        lane.insert_interval(interval(200, 300, IntervalKind::Block));
        let starts: Vec<Ms> = lane.intervals.iter().map(|i| i.span.start).collect();
        assert_eq!(starts, vec![100, 200, 300]);
    }

    #[test]
    fn lane_overlapping_skips_adjacent() {
        let mut lane = Lane::new(Ulid::new());
        lane.insert_interval(interval(100, 200, IntervalKind::Booking));
        lane.insert_interval(interval(450, 600, IntervalKind::Booking));
        lane.insert_interval(interval(1000, 1100, IntervalKind::Booking));

        let hits: Vec<_> = lane.overlapping(&Span::new(200, 450)).collect();
        assert!(hits.is_empty());

        let hits: Vec<_> = lane.overlapping(&Span::new(500, 800)).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].span, Span::new(450, 600));
    }

    #[test]
    fn lane_overlapping_long_interval_spanning_query() {
        let mut lane = Lane::new(Ulid::new());
        lane.insert_interval(interval(0, 10_000, IntervalKind::Block));
        assert_eq!(lane.overlapping(&Span::new(500, 600)).count(), 1);
    }

    #[test]
    fn lane_remove_interval() {
        let mut lane = Lane::new(Ulid::new());
        let keep = interval(0, 50, IntervalKind::Booking);
        let drop = interval(100, 150, IntervalKind::Booking);
        let drop_id = drop.id;
        lane.insert_interval(keep.clone());
        lane.insert_interval(drop);
        assert!(lane.remove_interval(drop_id).is_some());
        assert!(lane.remove_interval(Ulid::new()).is_none());
        assert_eq!(lane.intervals, vec![keep]);
    }

    #[test]
    fn booking_count_only_counts_bookings() {
        let mut lane = Lane::new(Ulid::new());
        lane.insert_interval(interval(0, 10, IntervalKind::Booking));
        lane.insert_interval(interval(20, 30, IntervalKind::Booking));
        lane.insert_interval(interval(40, 50, IntervalKind::Unavailable));
        lane.insert_interval(interval(200, 300, IntervalKind::Booking));
        assert_eq!(lane.booking_count(&Span::new(0, 100)), 2);
    }

    #[test]
    fn legal_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        for from in [Pending, Confirmed] {
            assert!(from.can_transition_to(Cancelled));
            assert!(from.can_transition_to(Completed));
            assert!(from.can_transition_to(NoShow));
        }
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Confirmed.can_transition_to(Confirmed));
        for terminal in [Completed, Cancelled, NoShow] {
            assert!(terminal.is_terminal());
            for target in [Pending, Confirmed, Completed, Cancelled, NoShow] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn channel_initial_status() {
        assert_eq!(Channel::KioskWalkIn.initial_status(), BookingStatus::Confirmed);
        assert_eq!(Channel::Web.initial_status(), BookingStatus::Pending);
        assert_eq!(Channel::KioskScheduled.initial_status(), BookingStatus::Pending);
        assert_eq!(Channel::StaffConsole.initial_status(), BookingStatus::Pending);
    }

    #[test]
    fn dual_artist_service_requires_room() {
        let mut service = Service {
            id: Ulid::new(),
            name: "Bridal".into(),
            duration_min: 90,
            base_price_cents: 30_000,
            requires_dual_artist: true,
            resource_kind: None,
            active: true,
        };
        assert_eq!(service.staff_required(), 2);
        assert_eq!(service.required_resource_kind(), Some(ResourceKind::Room));

        service.requires_dual_artist = false;
        assert_eq!(service.required_resource_kind(), None);
        assert_eq!(service.preferred_resource_kind(), ResourceKind::Station);

        service.resource_kind = Some(ResourceKind::Equipment);
        assert_eq!(service.required_resource_kind(), Some(ResourceKind::Equipment));
    }

    #[test]
    fn status_parse_roundtrips_display() {
        for s in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
            BookingStatus::NoShow,
        ] {
            assert_eq!(s.to_string().parse::<BookingStatus>().unwrap(), s);
        }
        assert!("archived".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingTransitioned {
            id: Ulid::new(),
            status: BookingStatus::Cancelled,
            at: 1_000,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
