mod admin;
mod allocator;
mod availability;
mod compact;
mod error;
mod guard;
mod ledger;
mod lifecycle;
mod queries;
mod short_code;
mod slots;
mod store;

pub use availability::{merge_overlapping, subtract_intervals};
pub use error::{EngineError, ErrorKind};
pub use guard::BookingRequest;
pub use queries::BookingFilter;
pub use short_code::{generate_short_code, SHORT_CODE_ALPHABET};
pub use store::Catalog;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock};
use tracing::warn;
use ulid::Ulid;

use crate::clock::{Clock, SystemClock};
use crate::limits::DEFAULT_SHORT_CODE_LEN;
use crate::model::*;
use crate::wal::Wal;

pub type SharedLane = Arc<RwLock<Lane>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the WAL. Appends that arrive while a flush is pending are drained into
/// the same batch and made durable by one fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let WalCommand::Append { event, response } = cmd else {
            handle_non_append(&mut wal, cmd);
            continue;
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }
        flush_and_respond(&mut wal, batch);
        if let Some(other) = deferred {
            handle_non_append(&mut wal, other);
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();

    let events: Vec<&Event> = batch.iter().map(|(event, _)| event).collect();
    let results = wal.append_batch(&events);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    // Each sender hears whether its own frame is durable.
    for ((_, tx), result) in batch.into_iter().zip(results) {
        let _ = tx.send(result);
    }
}

/// Write event to WAL via the background group-commit writer.
async fn wal_append(wal_tx: &mpsc::Sender<WalCommand>, event: &Event) -> Result<(), EngineError> {
    let (tx, rx) = oneshot::channel();
    wal_tx
        .send(WalCommand::Append {
            event: event.clone(),
            response: tx,
        })
        .await
        .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
    rx.await
        .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
        .map_err(|e| EngineError::WalError(e.to_string()))
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result =
                Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => flush_and_respond(wal, vec![(event, response)]),
    }
}

// ── Engine ───────────────────────────────────────────────

/// Knobs fixed for the lifetime of an engine.
pub struct EngineOptions {
    pub clock: Arc<dyn Clock>,
    pub short_code_len: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            short_code_len: DEFAULT_SHORT_CODE_LEN,
        }
    }
}

/// The booking ledger for every location.
///
/// Each staff member and each resource owns one [`Lane`] behind its own lock.
/// A commit write-locks exactly the lanes it touches, so bookings for
/// unrelated staff and resources proceed in parallel.
pub struct Engine {
    pub catalog: Arc<Catalog>,
    pub(super) lanes: Arc<DashMap<Ulid, SharedLane>>,
    pub(super) bookings: Arc<DashMap<Ulid, Booking>>,
    /// Short code → booking id, non-terminal bookings only.
    pub(super) short_codes: Arc<DashMap<String, Ulid>>,
    pub(super) availability: Arc<DashMap<Ulid, StaffAvailability>>,
    pub(super) blocks: Arc<DashMap<Ulid, BookingBlock>>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Held shared by every persist-then-apply, exclusively by compaction.
    pub(super) persist_gate: Arc<RwLock<()>>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) short_code_len: usize,
}

/// Apply an event to one lane. Events that do not concern the lane are ignored,
/// so the same event can be fed to every guard a commit holds.
fn apply_to_lane(lane: &mut Lane, event: &Event) {
    match event {
        Event::AvailabilitySet { availability } if availability.staff_id == lane.id => {
            let kind = if availability.is_available {
                IntervalKind::Available
            } else {
                IntervalKind::Unavailable
            };
            lane.insert_interval(Interval {
                id: availability.id,
                span: availability.span,
                kind,
            });
        }
        Event::AvailabilityRemoved { id, staff_id } if *staff_id == lane.id => {
            lane.remove_interval(*id);
        }
        Event::BlockCreated { block } if block.resource_id == lane.id => {
            lane.insert_interval(Interval {
                id: block.id,
                span: block.span,
                kind: IntervalKind::Block,
            });
        }
        Event::BlockRemoved { id, resource_id } if *resource_id == lane.id => {
            lane.remove_interval(*id);
        }
        Event::BookingCreated { booking }
            if !booking.status.is_terminal() && booking.lane_ids().contains(&lane.id) =>
        {
            lane.insert_interval(Interval {
                id: booking.id,
                span: booking.span,
                kind: IntervalKind::Booking,
            });
        }
        Event::BookingTransitioned { id, status, .. } if status.is_terminal() => {
            lane.remove_interval(*id);
        }
        _ => {}
    }
}

fn ensure_lane(lanes: &DashMap<Ulid, SharedLane>, id: Ulid) -> SharedLane {
    lanes
        .entry(id)
        .or_insert_with(|| Arc::new(RwLock::new(Lane::new(id))))
        .clone()
}

/// Handles to the in-memory state outside the lanes. Cloned into the persist
/// task so a commit finishes applying even if its caller has gone away.
#[derive(Clone)]
struct Indexes {
    catalog: Arc<Catalog>,
    lanes: Arc<DashMap<Ulid, SharedLane>>,
    bookings: Arc<DashMap<Ulid, Booking>>,
    short_codes: Arc<DashMap<String, Ulid>>,
    availability: Arc<DashMap<Ulid, StaffAvailability>>,
    blocks: Arc<DashMap<Ulid, BookingBlock>>,
}

impl Indexes {
    /// Apply an event to everything except the lanes.
    fn apply(&self, event: &Event) {
        self.catalog.apply_event(event);
        match event {
            Event::StaffSaved { staff } => {
                ensure_lane(&self.lanes, staff.id);
            }
            Event::ResourceSaved { resource } => {
                ensure_lane(&self.lanes, resource.id);
            }
            Event::AvailabilitySet { availability } => {
                self.availability.insert(availability.id, availability.clone());
            }
            Event::AvailabilityRemoved { id, .. } => {
                self.availability.remove(id);
            }
            Event::BlockCreated { block } => {
                self.blocks.insert(block.id, block.clone());
            }
            Event::BlockRemoved { id, .. } => {
                self.blocks.remove(id);
            }
            Event::BookingCreated { booking } => {
                if !booking.status.is_terminal() {
                    self.short_codes.insert(booking.short_id.clone(), booking.id);
                }
                self.bookings.insert(booking.id, booking.clone());
            }
            Event::BookingTransitioned { id, status, at } => {
                if let Some(mut booking) = self.bookings.get_mut(id) {
                    booking.status = *status;
                    booking.updated_at = *at;
                    if status.is_terminal() {
                        self.short_codes
                            .remove_if(&booking.short_id, |_, owner| owner == id);
                    }
                }
            }
            Event::LocationSaved { .. } | Event::ServiceSaved { .. } => {}
        }
    }

    /// Undo what was claimed before the append for an event that never made it
    /// to the log. Only new bookings claim anything: their short code.
    fn release_unlogged(&self, event: &Event) {
        if let Event::BookingCreated { booking } = event {
            self.short_codes
                .remove_if(&booking.short_id, |_, owner| *owner == booking.id);
        }
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        Self::with_options(wal_path, EngineOptions::default())
    }

    /// Replay the WAL at `wal_path` and start its writer task.
    /// Must be called from within a tokio runtime.
    pub fn with_options(wal_path: PathBuf, options: EngineOptions) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            catalog: Arc::new(Catalog::new()),
            lanes: Arc::new(DashMap::new()),
            bookings: Arc::new(DashMap::new()),
            short_codes: Arc::new(DashMap::new()),
            availability: Arc::new(DashMap::new()),
            blocks: Arc::new(DashMap::new()),
            wal_tx,
            persist_gate: Arc::new(RwLock::new(())),
            clock: options.clock,
            short_code_len: options.short_code_len,
        };

        // Sole owner of every lane here, so try_write never contends. Blocking
        // lock calls are off limits since this runs inside the runtime.
        let indexes = engine.indexes();
        for event in &events {
            for lane_id in engine.event_lane_ids(event) {
                let lane = engine.ensure_lane(lane_id);
                match lane.try_write() {
                    Ok(mut guard) => apply_to_lane(&mut guard, event),
                    Err(_) => warn!(%lane_id, "replay: lane unexpectedly locked; event skipped"),
                }
            }
            indexes.apply(event);
        }
        tracing::debug!(events = events.len(), "WAL replayed");

        Ok(engine)
    }

    pub fn now_ms(&self) -> Ms {
        self.clock.now_ms()
    }

    pub(super) fn ensure_lane(&self, id: Ulid) -> SharedLane {
        ensure_lane(&self.lanes, id)
    }

    fn indexes(&self) -> Indexes {
        Indexes {
            catalog: self.catalog.clone(),
            lanes: self.lanes.clone(),
            bookings: self.bookings.clone(),
            short_codes: self.short_codes.clone(),
            availability: self.availability.clone(),
            blocks: self.blocks.clone(),
        }
    }

    pub(super) fn lane(&self, id: &Ulid) -> Result<SharedLane, EngineError> {
        self.lanes
            .get(id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(*id))
    }

    /// Write-lock lanes in ascending id order. Every multi-lane writer goes
    /// through here, which rules out lock-order deadlocks.
    pub(super) async fn lock_lanes(
        &self,
        ids: &[Ulid],
    ) -> Result<Vec<OwnedRwLockWriteGuard<Lane>>, EngineError> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        let mut guards = Vec::with_capacity(ids.len());
        for id in &ids {
            guards.push(self.lane(id)?.write_owned().await);
        }
        Ok(guards)
    }

    /// Lanes an event mutates. Booking transitions resolve through the booking map.
    fn event_lane_ids(&self, event: &Event) -> Vec<Ulid> {
        match event {
            Event::AvailabilitySet { availability } => vec![availability.staff_id],
            Event::AvailabilityRemoved { staff_id, .. } => vec![*staff_id],
            Event::BlockCreated { block } => vec![block.resource_id],
            Event::BlockRemoved { resource_id, .. } => vec![*resource_id],
            Event::BookingCreated { booking } => booking.lane_ids(),
            Event::BookingTransitioned { id, .. } => self
                .bookings
                .get(id)
                .map(|b| b.lane_ids())
                .unwrap_or_default(),
            Event::LocationSaved { .. }
            | Event::StaffSaved { .. }
            | Event::ResourceSaved { .. }
            | Event::ServiceSaved { .. } => Vec::new(),
        }
    }

    /// WAL-append, then apply to `lanes` and the indexes. Memory is untouched
    /// if the append fails.
    ///
    /// The work runs on its own task holding the lane guards, so once this is
    /// called the event is either logged and applied or neither, even if the
    /// caller stops polling.
    pub(super) async fn persist_and_apply(
        &self,
        event: Event,
        mut lanes: Vec<OwnedRwLockWriteGuard<Lane>>,
    ) -> Result<(), EngineError> {
        let gate = self.persist_gate.clone();
        let wal_tx = self.wal_tx.clone();
        let indexes = self.indexes();
        let task = tokio::spawn(async move {
            let _gate = gate.read_owned().await;
            if let Err(e) = wal_append(&wal_tx, &event).await {
                indexes.release_unlogged(&event);
                return Err(e);
            }
            for lane in lanes.iter_mut() {
                apply_to_lane(lane, &event);
            }
            indexes.apply(&event);
            Ok(())
        });
        task.await
            .map_err(|e| EngineError::WalError(format!("persist task failed: {e}")))?
    }
}
