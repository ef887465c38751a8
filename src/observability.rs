use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "salonbook_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "salonbook_query_duration_seconds";

// ── Booking domain ──────────────────────────────────────────────

/// Counter: bookings committed. Labels: channel.
pub const BOOKINGS_COMMITTED_TOTAL: &str = "salonbook_bookings_committed_total";

/// Counter: commits rejected because the slot was taken in the meantime.
pub const COMMIT_CONFLICTS_TOTAL: &str = "salonbook_commit_conflicts_total";

/// Histogram: booking commit latency in seconds, lock wait included.
pub const COMMIT_DURATION_SECONDS: &str = "salonbook_commit_duration_seconds";

/// Counter: lifecycle transitions applied. Labels: status.
pub const TRANSITIONS_TOTAL: &str = "salonbook_transitions_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "salonbook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "salonbook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "salonbook_connections_rejected_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "salonbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "salonbook_wal_flush_batch_size";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::UpsertLocation { .. } => "upsert_location",
        Command::UpsertStaff { .. } => "upsert_staff",
        Command::UpsertResource { .. } => "upsert_resource",
        Command::UpsertService { .. } => "upsert_service",
        Command::DeactivateStaff { .. } => "deactivate_staff",
        Command::DeactivateResource { .. } => "deactivate_resource",
        Command::DeactivateService { .. } => "deactivate_service",
        Command::SelectSlots { .. } => "select_slots",
        Command::SelectAssignment { .. } => "select_assignment",
        Command::InsertBooking { .. } => "insert_booking",
        Command::InsertWalkIn { .. } => "insert_walk_in",
        Command::InsertCheckIn { .. } => "insert_check_in",
        Command::InsertTransition { .. } => "insert_transition",
        Command::CancelBooking { .. } => "cancel_booking",
        Command::SelectBookings(_) => "select_bookings",
        Command::InsertAvailability { .. } => "insert_availability",
        Command::DeleteAvailability { .. } => "delete_availability",
        Command::SelectAvailability { .. } => "select_availability",
        Command::InsertBlock { .. } => "insert_block",
        Command::DeleteBlock { .. } => "delete_block",
        Command::SelectBlocks { .. } => "select_blocks",
    }
}
