use tokio::sync::oneshot;
use tracing::info;

use crate::model::*;

use super::{Engine, EngineError, WalCommand};

impl Engine {
    /// Minimal event list that rebuilds the current state: catalog first, then
    /// overrides and blocks, then every booking (terminal ones included) with
    /// its current status folded in.
    fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::new();

        let mut locations = self.catalog.all_locations();
        locations.sort_by_key(|l| l.id);
        events.extend(locations.into_iter().map(|location| Event::LocationSaved { location }));

        let mut staff = self.catalog.all_staff();
        staff.sort_by_key(|s| s.id);
        events.extend(staff.into_iter().map(|staff| Event::StaffSaved { staff }));

        let mut resources = self.catalog.all_resources();
        resources.sort_by_key(|r| r.id);
        events.extend(resources.into_iter().map(|resource| Event::ResourceSaved { resource }));

        let mut services = self.catalog.all_services();
        services.sort_by_key(|s| s.id);
        events.extend(services.into_iter().map(|service| Event::ServiceSaved { service }));

        let mut availability: Vec<StaffAvailability> =
            self.availability.iter().map(|e| e.value().clone()).collect();
        availability.sort_by_key(|a| a.id);
        events.extend(
            availability
                .into_iter()
                .map(|availability| Event::AvailabilitySet { availability }),
        );

        let mut blocks: Vec<BookingBlock> = self.blocks.iter().map(|e| e.value().clone()).collect();
        blocks.sort_by_key(|b| b.id);
        events.extend(blocks.into_iter().map(|block| Event::BlockCreated { block }));

        let mut bookings: Vec<Booking> = self.bookings.iter().map(|e| e.value().clone()).collect();
        bookings.sort_by_key(|b| b.id);
        events.extend(bookings.into_iter().map(|booking| Event::BookingCreated { booking }));

        events
    }

    /// Rewrite the WAL as a snapshot of current state. Commits wait on the
    /// persist gate until the swap is done, so nothing appended in between is lost.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.persist_gate.write().await;
        let events = self.snapshot_events();
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        info!(events = count, "WAL compacted");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
