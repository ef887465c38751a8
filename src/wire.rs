use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use futures::stream;
use futures::Sink;
use pgwire::api::auth::StartupHandler;
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use tracing::debug;

use crate::auth::{startup_handler, SalonStartupHandler};
use crate::calendar::WeeklyHours;
use crate::engine::{BookingRequest, Engine, EngineError, ErrorKind};
use crate::model::*;
use crate::observability;
use crate::sql::{self, BookingQuery, Command, SqlError};

pub struct SalonHandler {
    engine: Arc<Engine>,
    query_parser: Arc<SalonQueryParser>,
}

impl SalonHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(SalonQueryParser),
        }
    }

    /// Parse and run one statement, recording query metrics either way.
    async fn run(&self, sql: &str) -> PgWireResult<Vec<Response>> {
        let cmd = sql::parse_sql(sql).map_err(sql_err)?;
        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn execute_command(&self, cmd: Command) -> PgWireResult<Vec<Response>> {
        let engine = &self.engine;
        match cmd {
            Command::UpsertLocation {
                id,
                name,
                timezone,
                hours,
            } => {
                let hours = WeeklyHours::parse(&hours).map_err(|e| engine_err(e.into()))?;
                engine
                    .save_location(Location {
                        id,
                        name,
                        timezone,
                        hours,
                    })
                    .await
                    .map_err(engine_err)?;
                Ok(vec![inserted(1)])
            }
            Command::UpsertStaff {
                id,
                location_id,
                role,
                name,
                hours,
                bookable,
            } => {
                let working_hours = hours
                    .as_deref()
                    .map(WeeklyHours::parse)
                    .transpose()
                    .map_err(|e| engine_err(e.into()))?;
                engine
                    .save_staff(Staff {
                        id,
                        location_id,
                        role,
                        display_name: name,
                        active: true,
                        available_for_booking: bookable,
                        working_hours,
                    })
                    .await
                    .map_err(engine_err)?;
                Ok(vec![inserted(1)])
            }
            Command::UpsertResource {
                id,
                location_id,
                name,
                kind,
                capacity,
            } => {
                engine
                    .save_resource(Resource {
                        id,
                        location_id,
                        name,
                        kind,
                        capacity,
                        active: true,
                    })
                    .await
                    .map_err(engine_err)?;
                Ok(vec![inserted(1)])
            }
            Command::UpsertService {
                id,
                name,
                duration_min,
                price_cents,
                dual,
                kind,
            } => {
                engine
                    .save_service(Service {
                        id,
                        name,
                        duration_min,
                        base_price_cents: price_cents,
                        requires_dual_artist: dual,
                        resource_kind: kind,
                        active: true,
                    })
                    .await
                    .map_err(engine_err)?;
                Ok(vec![inserted(1)])
            }
            Command::DeactivateStaff { id } => {
                engine.deactivate_staff(id).await.map_err(engine_err)?;
                Ok(vec![deleted(1)])
            }
            Command::DeactivateResource { id } => {
                engine.deactivate_resource(id).await.map_err(engine_err)?;
                Ok(vec![deleted(1)])
            }
            Command::DeactivateService { id } => {
                engine.deactivate_service(id).await.map_err(engine_err)?;
                Ok(vec![deleted(1)])
            }
            Command::SelectSlots {
                location_id,
                service_id,
                date,
                granularity,
            } => {
                let slots = engine
                    .compute_slots(location_id, service_id, date, granularity)
                    .await
                    .map_err(engine_err)?;
                let tz = engine.catalog.location(&location_id).map_err(engine_err)?.tz();
                let schema = Arc::new(slot_schema());
                let rows: Vec<PgWireResult<_>> = slots
                    .into_iter()
                    .map(|slot| {
                        let local = DateTime::from_timestamp_millis(slot.start)
                            .map(|dt| dt.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string());
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&slot.start)?;
                        encoder.encode_field(&slot.end)?;
                        encoder.encode_field(&rfc3339(slot.start))?;
                        encoder.encode_field(&local)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectAssignment {
                location_id,
                service_id,
                start,
                end,
            } => {
                let end = match end {
                    Some(end) => end,
                    None => {
                        let service = engine.catalog.service(&service_id).map_err(engine_err)?;
                        start.saturating_add(service.duration_ms())
                    }
                };
                if start >= end {
                    return Err(engine_err(EngineError::Validation(
                        "window start must be before end".into(),
                    )));
                }
                let proposal = engine
                    .propose_assignment(location_id, service_id, Span::new(start, end))
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(assignment_schema());
                let rows: Vec<PgWireResult<_>> = proposal
                    .into_iter()
                    .map(|a| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&a.staff_id.to_string())?;
                        encoder.encode_field(&a.secondary_artist_id.map(|id| id.to_string()))?;
                        encoder.encode_field(&a.resource_id.to_string())?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::InsertBooking {
                customer_id,
                service_id,
                location_id,
                start,
                staff_id,
                secondary_artist_id,
                resource_id,
                channel,
            } => {
                let assignment = Assignment {
                    staff_id,
                    secondary_artist_id,
                    resource_id,
                };
                let booking = engine
                    .create_booking(BookingRequest::new(
                        customer_id,
                        service_id,
                        location_id,
                        start,
                        assignment,
                        channel,
                    ))
                    .await
                    .map_err(engine_err)?;
                booking_rows(vec![booking])
            }
            Command::InsertWalkIn {
                customer_id,
                location_id,
                service_id,
            } => {
                let booking = engine
                    .book_walk_in(customer_id, location_id, service_id)
                    .await
                    .map_err(engine_err)?;
                booking_rows(vec![booking])
            }
            Command::InsertCheckIn { short_id } => {
                let booking = engine.check_in(&short_id).await.map_err(engine_err)?;
                booking_rows(vec![booking])
            }
            Command::InsertTransition { booking_id, status } => {
                let booking = engine
                    .transition(booking_id, status)
                    .await
                    .map_err(engine_err)?;
                booking_rows(vec![booking])
            }
            Command::CancelBooking { id } => {
                engine.cancel(id).await.map_err(engine_err)?;
                Ok(vec![deleted(1)])
            }
            Command::SelectBookings(query) => {
                let bookings = match query {
                    BookingQuery::ById(id) => vec![engine.get_booking(id).map_err(engine_err)?],
                    BookingQuery::ByShortId(code) => {
                        vec![engine.booking_by_short_code(&code).map_err(engine_err)?]
                    }
                    BookingQuery::Filtered(filter) => engine.list_bookings(&filter),
                };
                booking_rows(bookings)
            }
            Command::InsertAvailability {
                staff_id,
                date,
                start_time,
                end_time,
                is_available,
                reason,
            } => {
                let row = engine
                    .set_staff_availability(staff_id, date, start_time, end_time, is_available, reason)
                    .await
                    .map_err(engine_err)?;
                availability_rows(vec![row])
            }
            Command::DeleteAvailability { id } => {
                engine.remove_staff_availability(id).await.map_err(engine_err)?;
                Ok(vec![deleted(1)])
            }
            Command::SelectAvailability { staff_id } => {
                engine.catalog.staff(&staff_id).map_err(engine_err)?;
                availability_rows(engine.staff_availability(staff_id))
            }
            Command::InsertBlock {
                location_id,
                resource_id,
                start,
                end,
                reason,
            } => {
                if start >= end {
                    return Err(engine_err(EngineError::Validation(
                        "block start must be before end".into(),
                    )));
                }
                let block = engine
                    .create_block(location_id, resource_id, Span::new(start, end), reason)
                    .await
                    .map_err(engine_err)?;
                block_rows(vec![block])
            }
            Command::DeleteBlock { id } => {
                engine.remove_block(id).await.map_err(engine_err)?;
                Ok(vec![deleted(1)])
            }
            Command::SelectBlocks { resource_id } => {
                engine.catalog.resource(&resource_id).map_err(engine_err)?;
                block_rows(engine.blocks_for_resource(resource_id))
            }
        }
    }
}

fn inserted(rows: usize) -> Response {
    Response::Execution(Tag::new("INSERT").with_rows(rows))
}

fn deleted(rows: usize) -> Response {
    Response::Execution(Tag::new("DELETE").with_rows(rows))
}

fn rfc3339(ms: Ms) -> Option<String> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn text(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn int8(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::INT8, FieldFormat::Text)
}

fn boolean(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::BOOL, FieldFormat::Text)
}

fn slot_schema() -> Vec<FieldInfo> {
    vec![int8("start"), int8("end"), text("start_utc"), text("start_local")]
}

fn assignment_schema() -> Vec<FieldInfo> {
    vec![text("staff_id"), text("secondary_artist_id"), text("resource_id")]
}

fn booking_schema() -> Vec<FieldInfo> {
    vec![
        text("id"),
        text("short_id"),
        text("customer_id"),
        text("staff_id"),
        text("secondary_artist_id"),
        text("location_id"),
        text("resource_id"),
        text("service_id"),
        int8("start"),
        int8("end"),
        text("status"),
        text("channel"),
        int8("deposit_cents"),
        int8("total_cents"),
        boolean("is_paid"),
        text("notes"),
    ]
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        text("id"),
        text("staff_id"),
        text("date"),
        text("start_time"),
        text("end_time"),
        boolean("is_available"),
        text("reason"),
        int8("start"),
        int8("end"),
    ]
}

fn block_schema() -> Vec<FieldInfo> {
    vec![
        text("id"),
        text("location_id"),
        text("resource_id"),
        int8("start"),
        int8("end"),
        text("reason"),
    ]
}

fn booking_rows(bookings: Vec<Booking>) -> PgWireResult<Vec<Response>> {
    let schema = Arc::new(booking_schema());
    let rows: Vec<PgWireResult<_>> = bookings
        .into_iter()
        .map(|b| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&b.id.to_string())?;
            encoder.encode_field(&b.short_id)?;
            encoder.encode_field(&b.customer_id.to_string())?;
            encoder.encode_field(&b.staff_id.to_string())?;
            encoder.encode_field(&b.secondary_artist_id.map(|id| id.to_string()))?;
            encoder.encode_field(&b.location_id.to_string())?;
            encoder.encode_field(&b.resource_id.to_string())?;
            encoder.encode_field(&b.service_id.to_string())?;
            encoder.encode_field(&b.span.start)?;
            encoder.encode_field(&b.span.end)?;
            encoder.encode_field(&b.status.as_str().to_string())?;
            encoder.encode_field(&b.channel.as_str().to_string())?;
            encoder.encode_field(&b.deposit_cents)?;
            encoder.encode_field(&b.total_cents)?;
            encoder.encode_field(&b.is_paid)?;
            encoder.encode_field(&b.notes)?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
}

fn availability_rows(rows: Vec<StaffAvailability>) -> PgWireResult<Vec<Response>> {
    let schema = Arc::new(availability_schema());
    let rows: Vec<PgWireResult<_>> = rows
        .into_iter()
        .map(|a| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&a.id.to_string())?;
            encoder.encode_field(&a.staff_id.to_string())?;
            encoder.encode_field(&a.date.to_string())?;
            encoder.encode_field(&a.start_time.format("%H:%M").to_string())?;
            encoder.encode_field(&a.end_time.format("%H:%M").to_string())?;
            encoder.encode_field(&a.is_available)?;
            encoder.encode_field(&a.reason)?;
            encoder.encode_field(&a.span.start)?;
            encoder.encode_field(&a.span.end)?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
}

fn block_rows(blocks: Vec<BookingBlock>) -> PgWireResult<Vec<Response>> {
    let schema = Arc::new(block_schema());
    let rows: Vec<PgWireResult<_>> = blocks
        .into_iter()
        .map(|b| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&b.id.to_string())?;
            encoder.encode_field(&b.location_id.to_string())?;
            encoder.encode_field(&b.resource_id.to_string())?;
            encoder.encode_field(&b.span.start)?;
            encoder.encode_field(&b.span.end)?;
            encoder.encode_field(&b.reason)?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
}

/// Row shape a statement will produce, judged from the table it names.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.trim_start().to_uppercase();
    if upper.starts_with("DELETE") {
        return vec![];
    }
    let mentions = |table: &str| upper.contains(table);
    if mentions("SLOTS") {
        slot_schema()
    } else if mentions("ASSIGNMENTS") {
        assignment_schema()
    } else if mentions("STAFF_AVAILABILITY") {
        availability_schema()
    } else if mentions("BOOKING_BLOCKS") {
        block_schema()
    } else if ["BOOKING_TRANSITIONS", "WALK_INS", "CHECK_INS", "BOOKINGS"]
        .iter()
        .any(|t| mentions(t))
    {
        booking_schema()
    } else {
        vec![]
    }
}

#[async_trait]
impl SimpleQueryHandler for SalonHandler {
    async fn do_query<C>(&self, _client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        debug!(query, "simple query");
        self.run(query).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct SalonQueryParser;

#[async_trait]
impl QueryParser for SalonQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for SalonHandler {
    type Statement = String;
    type QueryParser = SalonQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        let mut responses = self.run(&sql).await?;
        if responses.is_empty() {
            return Ok(Response::EmptyQuery);
        }
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Highest `$N` placeholder in the statement.
fn count_params(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut max = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        i += 1;
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if let Ok(n) = sql[start..i].parse::<usize>() {
            max = max.max(n);
        }
    }
    max
}

/// Inline bound text parameters as quoted literals.
fn substitute_params(portal: &Portal<String>) -> String {
    let params: Vec<Option<String>> = portal
        .parameters
        .iter()
        .map(|p| p.as_ref().map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
        .collect();
    inline_params(&portal.statement.statement, &params)
}

/// One left-to-right pass over the statement: each `$N` outside a string
/// literal becomes its parameter. Inserted text is never rescanned, so values
/// containing `$1` or quotes stay inside their own literal.
fn inline_params(sql: &str, params: &[Option<String>]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut in_literal = false;
    let mut chars = sql.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            in_literal = !in_literal;
            out.push(c);
            continue;
        }
        if c != '$' || in_literal {
            out.push(c);
            continue;
        }
        let digits_start = i + 1;
        let mut digits_end = digits_start;
        while let Some(&(j, d)) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            digits_end = j + 1;
            chars.next();
        }
        let index = sql[digits_start..digits_end].parse::<usize>().ok();
        match index.and_then(|n| n.checked_sub(1)).and_then(|n| params.get(n)) {
            Some(Some(text)) => {
                out.push('\'');
                out.push_str(&text.replace('\'', "''"));
                out.push('\'');
            }
            Some(None) => out.push_str("NULL"),
            None => out.push_str(&sql[i..digits_end]),
        }
    }
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct SalonFactory {
    handler: Arc<SalonHandler>,
    auth_handler: Arc<SalonStartupHandler>,
    noop: Arc<NoopHandler>,
}

impl SalonFactory {
    pub fn new(engine: Arc<Engine>, password: String) -> Self {
        Self {
            handler: Arc::new(SalonHandler::new(engine)),
            auth_handler: startup_handler(password),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for SalonFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = SalonFactory::new(engine, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

/// SQLSTATE reported for each engine failure.
fn sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::NotFound(_) | EngineError::UnknownShortCode(_) => "P0002",
        EngineError::LimitExceeded(_) => "54000",
        _ => match e.kind() {
            ErrorKind::Validation => "22023",
            ErrorKind::NoAvailability => "P0001",
            ErrorKind::SlotNoLongerAvailable => "40001",
            ErrorKind::IllegalTransition => "55000",
            ErrorKind::Overlap => "23P01",
            ErrorKind::Infrastructure => "58000",
        },
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        sqlstate(&e).into(),
        e.to_string(),
    )))
}

fn sql_err(e: SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BookingStatus;
    use ulid::Ulid;

    fn names(schema: Vec<FieldInfo>) -> Vec<String> {
        schema.iter().map(|f| f.name().to_string()).collect()
    }

    #[test]
    fn counts_highest_placeholder() {
        assert_eq!(count_params("SELECT * FROM slots"), 0);
        assert_eq!(count_params("SELECT * FROM bookings WHERE id = $1"), 1);
        assert_eq!(count_params("INSERT INTO walk_ins VALUES ($2, $1, $3)"), 3);
        assert_eq!(count_params("SELECT $12, $3"), 12);
        assert_eq!(count_params("price is $ 5"), 0);
    }

    #[test]
    fn inlines_params_without_prefix_clash() {
        let mut params: Vec<Option<String>> = (1..=10).map(|i| Some(format!("v{i}"))).collect();
        params[1] = None;
        params[2] = Some("O'Brien".into());
        let sql = inline_params("SELECT $1, $2, $3, $10", &params);
        assert_eq!(sql, "SELECT 'v1', NULL, 'O''Brien', 'v10'");
    }

    #[test]
    fn inlined_values_are_never_rescanned() {
        let staff = Ulid::new().to_string();
        let params = vec![
            Some(staff.clone()),
            Some("2030-06-03".into()),
            Some("09:00".into()),
            Some("10:00".into()),
            Some("false".into()),
            Some("late fee $1 waived, it's fine".into()),
        ];
        let sql = inline_params(
            "INSERT INTO staff_availability VALUES ($1, $2, $3, $4, $5, $6)",
            &params,
        );
        match crate::sql::parse_sql(&sql).unwrap() {
            crate::sql::Command::InsertAvailability { reason, .. } => {
                assert_eq!(reason.as_deref(), Some("late fee $1 waived, it's fine"));
            }
            other => panic!("expected InsertAvailability, got {other:?}"),
        }

        let escaped = inline_params(
            "SELECT * FROM bookings WHERE short_id = $1 AND status = $2",
            &[Some("x' OR '1".into()), Some("$1".into())],
        );
        assert_eq!(
            escaped,
            "SELECT * FROM bookings WHERE short_id = 'x'' OR ''1' AND status = '$1'"
        );
        assert_eq!(inline_params("SELECT '$1', $1, $9", &[Some("a".into())]), "SELECT '$1', 'a', $9");
    }

    #[test]
    fn schema_follows_table_name() {
        assert_eq!(
            names(result_schema("SELECT * FROM slots WHERE date = $1")),
            ["start", "end", "start_utc", "start_local"]
        );
        assert_eq!(names(result_schema("select * from assignments")).len(), 3);
        assert_eq!(names(result_schema("INSERT INTO walk_ins VALUES ($1, $2, $3)")).len(), 16);
        assert_eq!(names(result_schema("SELECT * FROM booking_blocks WHERE resource_id = $1"))[0], "id");
        assert_eq!(names(result_schema("SELECT * FROM staff_availability WHERE staff_id = $1")).len(), 9);
        assert!(result_schema("DELETE FROM bookings WHERE id = $1").is_empty());
        assert!(result_schema("INSERT INTO locations VALUES ($1, $2, $3, $4)").is_empty());
    }

    #[test]
    fn error_kinds_map_to_distinct_sqlstates() {
        let id = Ulid::new();
        assert_eq!(sqlstate(&EngineError::Validation("x".into())), "22023");
        assert_eq!(sqlstate(&EngineError::NotFound(id)), "P0002");
        assert_eq!(sqlstate(&EngineError::UnknownShortCode("ABC".into())), "P0002");
        assert_eq!(sqlstate(&EngineError::LimitExceeded("x")), "54000");
        assert_eq!(sqlstate(&EngineError::NoAvailability), "P0001");
        assert_eq!(sqlstate(&EngineError::SlotNoLongerAvailable), "40001");
        assert_eq!(
            sqlstate(&EngineError::IllegalTransition {
                from: BookingStatus::Cancelled,
                to: BookingStatus::Confirmed
            }),
            "55000"
        );
        assert_eq!(sqlstate(&EngineError::Overlap(id)), "23P01");
        assert_eq!(sqlstate(&EngineError::WalError("disk".into())), "58000");
    }

    #[test]
    fn timestamps_render_as_utc() {
        assert_eq!(rfc3339(1_906_711_200_000).as_deref(), Some("2030-06-03T10:00:00Z"));
    }
}
