use chrono::{DateTime, NaiveDate, NaiveTime};
use sqlparser::ast::{
    self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use thiserror::Error;
use ulid::Ulid;

use crate::calendar::parse_time;
use crate::engine::BookingFilter;
use crate::model::*;

/// Which bookings a `SELECT ... FROM bookings` asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum BookingQuery {
    ById(Ulid),
    ByShortId(String),
    Filtered(BookingFilter),
}

/// Parsed command from SQL input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    UpsertLocation {
        id: Ulid,
        name: String,
        timezone: String,
        hours: String,
    },
    UpsertStaff {
        id: Ulid,
        location_id: Ulid,
        role: StaffRole,
        name: String,
        hours: Option<String>,
        bookable: bool,
    },
    UpsertResource {
        id: Ulid,
        location_id: Ulid,
        name: String,
        kind: ResourceKind,
        capacity: u32,
    },
    UpsertService {
        id: Ulid,
        name: String,
        duration_min: u32,
        price_cents: i64,
        dual: bool,
        kind: Option<ResourceKind>,
    },
    DeactivateStaff {
        id: Ulid,
    },
    DeactivateResource {
        id: Ulid,
    },
    DeactivateService {
        id: Ulid,
    },
    SelectSlots {
        location_id: Ulid,
        service_id: Ulid,
        date: NaiveDate,
        granularity: Option<u32>,
    },
    SelectAssignment {
        location_id: Ulid,
        service_id: Ulid,
        start: Ms,
        end: Option<Ms>,
    },
    InsertBooking {
        customer_id: Ulid,
        service_id: Ulid,
        location_id: Ulid,
        start: Ms,
        staff_id: Ulid,
        secondary_artist_id: Option<Ulid>,
        resource_id: Ulid,
        channel: Channel,
    },
    InsertWalkIn {
        customer_id: Ulid,
        location_id: Ulid,
        service_id: Ulid,
    },
    InsertCheckIn {
        short_id: String,
    },
    InsertTransition {
        booking_id: Ulid,
        status: BookingStatus,
    },
    CancelBooking {
        id: Ulid,
    },
    SelectBookings(BookingQuery),
    InsertAvailability {
        staff_id: Ulid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        is_available: bool,
        reason: Option<String>,
    },
    DeleteAvailability {
        id: Ulid,
    },
    SelectAvailability {
        staff_id: Ulid,
    },
    InsertBlock {
        location_id: Ulid,
        resource_id: Ulid,
        start: Ms,
        end: Ms,
        reason: Option<String>,
    },
    DeleteBlock {
        id: Ulid,
    },
    SelectBlocks {
        resource_id: Ulid,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(stmt) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn arity(table: &'static str, values: &[Expr], expected: usize) -> Result<(), SqlError> {
    if values.len() < expected {
        return Err(SqlError::WrongArity(table, expected, values.len()));
    }
    Ok(())
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let v = extract_insert_values(insert)?;

    match table.as_str() {
        "locations" => {
            arity("locations", &v, 4)?;
            Ok(Command::UpsertLocation {
                id: parse_ulid(&v[0])?,
                name: parse_string(&v[1])?,
                timezone: parse_string(&v[2])?,
                hours: parse_string(&v[3])?,
            })
        }
        "staff" => {
            arity("staff", &v, 4)?;
            Ok(Command::UpsertStaff {
                id: parse_ulid(&v[0])?,
                location_id: parse_ulid(&v[1])?,
                role: parse_enum(&v[2])?,
                name: parse_string(&v[3])?,
                hours: v.get(4).map(parse_string_or_null).transpose()?.flatten(),
                bookable: v.get(5).map(parse_bool).transpose()?.unwrap_or(true),
            })
        }
        "resources" => {
            arity("resources", &v, 4)?;
            Ok(Command::UpsertResource {
                id: parse_ulid(&v[0])?,
                location_id: parse_ulid(&v[1])?,
                name: parse_string(&v[2])?,
                kind: parse_enum(&v[3])?,
                capacity: v.get(4).map(parse_u32).transpose()?.unwrap_or(1),
            })
        }
        "services" => {
            arity("services", &v, 4)?;
            Ok(Command::UpsertService {
                id: parse_ulid(&v[0])?,
                name: parse_string(&v[1])?,
                duration_min: parse_u32(&v[2])?,
                price_cents: parse_i64(&v[3])?,
                dual: v.get(4).map(parse_bool).transpose()?.unwrap_or(false),
                kind: match v.get(5).map(parse_string_or_null).transpose()?.flatten() {
                    Some(k) => Some(k.parse().map_err(SqlError::Parse)?),
                    None => None,
                },
            })
        }
        "bookings" => {
            arity("bookings", &v, 7)?;
            Ok(Command::InsertBooking {
                customer_id: parse_ulid(&v[0])?,
                service_id: parse_ulid(&v[1])?,
                location_id: parse_ulid(&v[2])?,
                start: parse_ms(&v[3])?,
                staff_id: parse_ulid(&v[4])?,
                secondary_artist_id: parse_ulid_or_null(&v[5])?,
                resource_id: parse_ulid(&v[6])?,
                channel: match v.get(7) {
                    Some(e) => parse_enum(e)?,
                    None => Channel::Web,
                },
            })
        }
        "walk_ins" => {
            arity("walk_ins", &v, 3)?;
            Ok(Command::InsertWalkIn {
                customer_id: parse_ulid(&v[0])?,
                location_id: parse_ulid(&v[1])?,
                service_id: parse_ulid(&v[2])?,
            })
        }
        "check_ins" => {
            arity("check_ins", &v, 1)?;
            Ok(Command::InsertCheckIn {
                short_id: parse_string(&v[0])?,
            })
        }
        "booking_transitions" => {
            arity("booking_transitions", &v, 2)?;
            Ok(Command::InsertTransition {
                booking_id: parse_ulid(&v[0])?,
                status: parse_enum(&v[1])?,
            })
        }
        "staff_availability" => {
            arity("staff_availability", &v, 5)?;
            Ok(Command::InsertAvailability {
                staff_id: parse_ulid(&v[0])?,
                date: parse_date(&v[1])?,
                start_time: parse_time_expr(&v[2])?,
                end_time: parse_time_expr(&v[3])?,
                is_available: parse_bool(&v[4])?,
                reason: v.get(5).map(parse_string_or_null).transpose()?.flatten(),
            })
        }
        "booking_blocks" => {
            arity("booking_blocks", &v, 4)?;
            Ok(Command::InsertBlock {
                location_id: parse_ulid(&v[0])?,
                resource_id: parse_ulid(&v[1])?,
                start: parse_ms(&v[2])?,
                end: parse_ms(&v[3])?,
                reason: v.get(4).map(parse_string_or_null).transpose()?.flatten(),
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "staff" => Ok(Command::DeactivateStaff { id }),
        "resources" => Ok(Command::DeactivateResource { id }),
        "services" => Ok(Command::DeactivateService { id }),
        "bookings" => Ok(Command::CancelBooking { id }),
        "staff_availability" => Ok(Command::DeleteAvailability { id }),
        "booking_blocks" => Ok(Command::DeleteBlock { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// `column = value` pairs plus `start >= x` / `"end" <= y` bounds from a WHERE clause.
#[derive(Default)]
struct Filters<'a> {
    eq: Vec<(String, &'a Expr)>,
    start_at_least: Option<&'a Expr>,
    end_at_most: Option<&'a Expr>,
}

impl<'a> Filters<'a> {
    fn collect(expr: &'a Expr, out: &mut Self) -> Result<(), SqlError> {
        match expr {
            Expr::Nested(inner) => Self::collect(inner, out),
            Expr::BinaryOp { left, op, right } => match op {
                ast::BinaryOperator::And => {
                    Self::collect(left, out)?;
                    Self::collect(right, out)
                }
                ast::BinaryOperator::Eq => {
                    let col = expr_column_name(left)
                        .ok_or_else(|| SqlError::Parse(format!("expected column, got {left}")))?;
                    out.eq.push((col, right));
                    Ok(())
                }
                ast::BinaryOperator::GtEq if expr_column_name(left).as_deref() == Some("start") => {
                    out.start_at_least = Some(right);
                    Ok(())
                }
                ast::BinaryOperator::LtEq if expr_column_name(left).as_deref() == Some("end") => {
                    out.end_at_most = Some(right);
                    Ok(())
                }
                _ => Err(SqlError::Unsupported(format!("filter {expr}"))),
            },
            _ => Err(SqlError::Unsupported(format!("filter {expr}"))),
        }
    }

    fn get(&self, col: &str) -> Option<&'a Expr> {
        self.eq.iter().find(|(c, _)| c == col).map(|(_, e)| *e)
    }

    fn require(&self, col: &'static str) -> Result<&'a Expr, SqlError> {
        self.get(col).ok_or(SqlError::MissingFilter(col))
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };
    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;

    let mut f = Filters::default();
    if let Some(selection) = &select.selection {
        Filters::collect(selection, &mut f)?;
    }

    match table.as_str() {
        "slots" => Ok(Command::SelectSlots {
            location_id: parse_ulid(f.require("location_id")?)?,
            service_id: parse_ulid(f.require("service_id")?)?,
            date: parse_date(f.require("date")?)?,
            granularity: f.get("granularity").map(parse_u32).transpose()?,
        }),
        "assignments" => Ok(Command::SelectAssignment {
            location_id: parse_ulid(f.require("location_id")?)?,
            service_id: parse_ulid(f.require("service_id")?)?,
            start: parse_ms(f.require("start")?)?,
            end: f.get("end").map(parse_ms).transpose()?,
        }),
        "bookings" => {
            if let Some(id) = f.get("id") {
                return Ok(Command::SelectBookings(BookingQuery::ById(parse_ulid(id)?)));
            }
            if let Some(code) = f.get("short_id") {
                return Ok(Command::SelectBookings(BookingQuery::ByShortId(parse_string(code)?)));
            }
            let opt_ulid = |col: &str| f.get(col).map(parse_ulid).transpose();
            let window = match (f.start_at_least, f.end_at_most) {
                (Some(s), Some(e)) => {
                    let (s, e) = (parse_ms(s)?, parse_ms(e)?);
                    if s >= e {
                        return Err(SqlError::Parse("start must be before end".into()));
                    }
                    Some(Span::new(s, e))
                }
                (None, None) => None,
                _ => return Err(SqlError::Parse("window needs both start >= and \"end\" <=".into())),
            };
            Ok(Command::SelectBookings(BookingQuery::Filtered(BookingFilter {
                location_id: opt_ulid("location_id")?,
                staff_id: opt_ulid("staff_id")?,
                resource_id: opt_ulid("resource_id")?,
                customer_id: opt_ulid("customer_id")?,
                status: f.get("status").map(parse_enum).transpose()?,
                window,
            })))
        }
        "staff_availability" => Ok(Command::SelectAvailability {
            staff_id: parse_ulid(f.require("staff_id")?)?,
        }),
        "booking_blocks" => Ok(Command::SelectBlocks {
            resource_id: parse_ulid(f.require("resource_id")?)?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [row] => Ok(row.clone()),
            [] => Err(SqlError::Parse("empty VALUES".into())),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some("id") => parse_ulid(right),
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => Ok(s.clone()),
        Some(other) => Err(SqlError::Parse(format!("expected string, got {other}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => parse_string(expr).map(Some),
    }
}

fn parse_enum<T: std::str::FromStr<Err = String>>(expr: &Expr) -> Result<T, SqlError> {
    parse_string(expr)?.parse().map_err(SqlError::Parse)
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_string(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad ULID '{s}': {e}")))
}

fn parse_ulid_or_null(expr: &Expr) -> Result<Option<Ulid>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => parse_ulid(expr).map(Some),
    }
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        return Ok(-parse_i64(expr)?);
    }
    let s = parse_string(expr)?;
    s.parse()
        .map_err(|e| SqlError::Parse(format!("bad integer '{s}': {e}")))
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

/// Unix milliseconds, as a number or an RFC 3339 string.
fn parse_ms(expr: &Expr) -> Result<Ms, SqlError> {
    if let Ok(ms) = parse_i64(expr) {
        return Ok(ms);
    }
    let s = parse_string(expr)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| SqlError::Parse(format!("bad timestamp '{s}': {e}")))
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date '{s}': {e}")))
}

fn parse_time_expr(expr: &Expr) -> Result<NaiveTime, SqlError> {
    let s = parse_string(expr)?;
    parse_time(&s).map_err(|e| SqlError::Parse(e.to_string()))
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    match extract_value(expr) {
        Some(Value::Boolean(b)) => Ok(*b),
        Some(Value::SingleQuotedString(s)) => match s.to_lowercase().as_str() {
            "true" | "t" | "1" => Ok(true),
            "false" | "f" | "0" => Ok(false),
            _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
        },
        Some(Value::Number(n, _)) => Ok(n != "0"),
        Some(other) => Err(SqlError::Parse(format!("expected bool, got {other}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("empty query")]
    Empty,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("{0}: expected {1} values, got {2}")]
    WrongArity(&'static str, usize, usize),
    #[error("missing filter: {0}")]
    MissingFilter(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const B: &str = "01BX5ZZKBKACTAV9WEVGEMMVRZ";

    fn ulid(s: &str) -> Ulid {
        Ulid::from_string(s).unwrap()
    }

    #[test]
    fn upsert_location() {
        let sql = format!(
            "INSERT INTO locations VALUES ('{A}', 'Downtown', 'Europe/Paris', 'mon-fri 09:00-18:00')"
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::UpsertLocation {
                id: ulid(A),
                name: "Downtown".into(),
                timezone: "Europe/Paris".into(),
                hours: "mon-fri 09:00-18:00".into(),
            }
        );
    }

    #[test]
    fn upsert_staff_defaults() {
        let sql = format!("INSERT INTO staff VALUES ('{A}', '{B}', 'artist', 'Ana')");
        match parse_sql(&sql).unwrap() {
            Command::UpsertStaff { role, hours, bookable, .. } => {
                assert_eq!(role, StaffRole::Artist);
                assert_eq!(hours, None);
                assert!(bookable);
            }
            other => panic!("expected UpsertStaff, got {other:?}"),
        }

        let sql = format!(
            "INSERT INTO staff VALUES ('{A}', '{B}', 'manager', 'Bo', 'sat 10:00-14:00', false)"
        );
        match parse_sql(&sql).unwrap() {
            Command::UpsertStaff { hours, bookable, .. } => {
                assert_eq!(hours.as_deref(), Some("sat 10:00-14:00"));
                assert!(!bookable);
            }
            other => panic!("expected UpsertStaff, got {other:?}"),
        }
    }

    #[test]
    fn upsert_resource_and_service() {
        let sql = format!("INSERT INTO resources VALUES ('{A}', '{B}', 'Suite', 'room', 1)");
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::UpsertResource { kind: ResourceKind::Room, capacity: 1, .. }
        ));

        let sql = format!("INSERT INTO services VALUES ('{A}', 'Bridal', 90, 30000, true, NULL)");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::UpsertService {
                id: ulid(A),
                name: "Bridal".into(),
                duration_min: 90,
                price_cents: 30000,
                dual: true,
                kind: None,
            }
        );
    }

    #[test]
    fn deletes_map_to_soft_operations() {
        let cases = [
            ("staff", Command::DeactivateStaff { id: ulid(A) }),
            ("resources", Command::DeactivateResource { id: ulid(A) }),
            ("services", Command::DeactivateService { id: ulid(A) }),
            ("bookings", Command::CancelBooking { id: ulid(A) }),
            ("staff_availability", Command::DeleteAvailability { id: ulid(A) }),
            ("booking_blocks", Command::DeleteBlock { id: ulid(A) }),
        ];
        for (table, expected) in cases {
            let sql = format!("DELETE FROM {table} WHERE id = '{A}'");
            assert_eq!(parse_sql(&sql).unwrap(), expected, "{table}");
        }
    }

    #[test]
    fn select_slots_with_granularity() {
        let sql = format!(
            "SELECT * FROM slots WHERE location_id = '{A}' AND service_id = '{B}' AND date = '2030-06-03' AND granularity = 30"
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::SelectSlots {
                location_id: ulid(A),
                service_id: ulid(B),
                date: NaiveDate::from_ymd_opt(2030, 6, 3).unwrap(),
                granularity: Some(30),
            }
        );
    }

    #[test]
    fn select_slots_requires_date() {
        let sql = format!("SELECT * FROM slots WHERE location_id = '{A}' AND service_id = '{B}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::MissingFilter("date"))));
    }

    #[test]
    fn select_assignment_accepts_rfc3339() {
        let sql = format!(
            "SELECT * FROM assignments WHERE location_id = '{A}' AND service_id = '{B}' AND start = '2030-06-03T10:00:00Z'"
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectAssignment { start, end, .. } => {
                assert_eq!(start, 1_906_711_200_000);
                assert_eq!(end, None);
            }
            other => panic!("expected SelectAssignment, got {other:?}"),
        }
    }

    #[test]
    fn insert_booking_with_null_secondary() {
        let sql = format!(
            "INSERT INTO bookings VALUES ('{A}', '{B}', '{A}', 1000, '{B}', NULL, '{A}', 'kiosk_walk_in')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBooking {
                start,
                secondary_artist_id,
                channel,
                ..
            } => {
                assert_eq!(start, 1000);
                assert_eq!(secondary_artist_id, None);
                assert_eq!(channel, Channel::KioskWalkIn);
            }
            other => panic!("expected InsertBooking, got {other:?}"),
        }
    }

    #[test]
    fn insert_booking_arity() {
        let sql = format!("INSERT INTO bookings VALUES ('{A}', '{B}', '{A}', 1000)");
        assert!(matches!(
            parse_sql(&sql),
            Err(SqlError::WrongArity("bookings", 7, 4))
        ));
    }

    #[test]
    fn transitions_walk_ins_and_check_ins() {
        let sql = format!("INSERT INTO booking_transitions VALUES ('{A}', 'no_show')");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertTransition {
                booking_id: ulid(A),
                status: BookingStatus::NoShow
            }
        );
        let sql = format!("INSERT INTO walk_ins VALUES ('{A}', '{B}', '{A}')");
        assert!(matches!(parse_sql(&sql).unwrap(), Command::InsertWalkIn { .. }));
        let sql = "INSERT INTO check_ins VALUES ('K7M3QX')";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::InsertCheckIn { short_id: "K7M3QX".into() }
        );
    }

    #[test]
    fn insert_availability_row() {
        let sql = format!(
            "INSERT INTO staff_availability VALUES ('{A}', '2030-06-03', '12:00', '14:00', false, 'dentist')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertAvailability {
                start_time,
                end_time,
                is_available,
                reason,
                ..
            } => {
                assert_eq!(start_time, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
                assert_eq!(end_time, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
                assert!(!is_available);
                assert_eq!(reason.as_deref(), Some("dentist"));
            }
            other => panic!("expected InsertAvailability, got {other:?}"),
        }
    }

    #[test]
    fn insert_block() {
        let sql = format!("INSERT INTO booking_blocks VALUES ('{A}', '{B}', 1000, 2000, NULL)");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertBlock {
                location_id: ulid(A),
                resource_id: ulid(B),
                start: 1000,
                end: 2000,
                reason: None,
            }
        );
    }

    #[test]
    fn select_bookings_variants() {
        let sql = format!("SELECT * FROM bookings WHERE id = '{A}'");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::SelectBookings(BookingQuery::ById(ulid(A)))
        );

        let sql = "SELECT * FROM bookings WHERE short_id = 'K7M3QX'";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::SelectBookings(BookingQuery::ByShortId("K7M3QX".into()))
        );

        let sql = format!(
            "SELECT * FROM bookings WHERE staff_id = '{B}' AND status = 'pending' AND start >= 1000 AND \"end\" <= 5000"
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectBookings(BookingQuery::Filtered(filter)) => {
                assert_eq!(filter.staff_id, Some(ulid(B)));
                assert_eq!(filter.status, Some(BookingStatus::Pending));
                assert_eq!(filter.window, Some(Span::new(1000, 5000)));
                assert_eq!(filter.location_id, None);
            }
            other => panic!("expected filtered bookings, got {other:?}"),
        }
    }

    #[test]
    fn half_open_window_filter_is_rejected() {
        let sql = "SELECT * FROM bookings WHERE start >= 1000";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn unknown_table_and_empty_input() {
        let sql = format!("INSERT INTO foobar VALUES ('{A}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownTable(t)) if t == "foobar"));
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }

    #[test]
    fn bad_enum_value_is_a_parse_error() {
        let sql = format!("INSERT INTO booking_transitions VALUES ('{A}', 'archived')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }
}
