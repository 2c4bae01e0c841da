//! Shared fixtures: an in-memory store and a few registered entity types.
//!
//! `MemoryStore` evaluates the statement subset the query compiler emits for
//! simple predicates: conjunctions of comparisons against bound parameters,
//! projected select lists, `ORDER BY`, `LIMIT`/`OFFSET` paging, `count(*)`
//! and `DELETE FROM`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;

use tabledoc_core::config::MapperConfig;
use tabledoc_core::convert::Row;
use tabledoc_core::error::DbError;
use tabledoc_core::mapping::{MappingContext, TableOptions, TypeInfo, TypeRegistry, DOCUMENT_COLUMN};
use tabledoc_core::schema::TableSchema;
use tabledoc_core::store::{
    DeleteRequest, GetRequest, MultiDeleteRequest, PreparedStatement, PutRequest, PutResult,
    QueryRequest, QueryResult, StoreClient, StoreError, StoreErrorCode, TableRequest,
};
use tabledoc_core::template::TableTemplate;
use tabledoc_core::types::{FieldType, FieldValue, ObjectValue};

#[derive(Default)]
struct Table {
    rows: BTreeMap<String, Row>,
    next_identity: i64,
    uuid_ids: bool,
}

/// In-memory [`StoreClient`].
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
    schemas: Mutex<HashMap<String, TableSchema>>,
    ddl: Mutex<Vec<TableRequest>>,
    statements: Mutex<Vec<String>>,
    prepares: AtomicUsize,
    stale_queries: AtomicUsize,
    batch_size: usize,
}

impl MemoryStore {
    /// Creates a store returning at most `batch_size` rows per query batch.
    pub fn new(batch_size: usize) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            schemas: Mutex::new(HashMap::new()),
            ddl: Mutex::new(Vec::new()),
            statements: Mutex::new(Vec::new()),
            prepares: AtomicUsize::new(0),
            stale_queries: AtomicUsize::new(0),
            batch_size,
        }
    }

    /// Makes `get_table` report an existing table.
    pub fn seed_schema(&self, schema: TableSchema) {
        self.schemas.lock().insert(schema.name.clone(), schema);
    }

    /// Makes the next `count` query batches fail with a stale handle.
    pub fn fail_next_queries(&self, count: usize) {
        self.stale_queries.store(count, AtomicOrdering::SeqCst);
    }

    pub fn ddl_statements(&self) -> Vec<String> {
        self.ddl.lock().iter().map(|r| r.statement.clone()).collect()
    }

    pub fn executed(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    pub fn prepare_count(&self) -> usize {
        self.prepares.load(AtomicOrdering::SeqCst)
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    fn evaluate(
        &self,
        text: &str,
        bindings: &BTreeMap<String, FieldValue>,
    ) -> Result<Vec<Row>, StoreError> {
        let body = match text.strip_prefix("DECLARE ") {
            Some(rest) => rest.rsplit_once(';').map(|(_, b)| b.trim()).unwrap_or(rest),
            None => text.trim(),
        };

        if let Some(table) = body.strip_prefix("DELETE FROM ") {
            let mut tables = self.tables.lock();
            let deleted = tables
                .get_mut(table.trim())
                .map(|t| std::mem::take(&mut t.rows).len())
                .unwrap_or(0);
            return Ok(vec![Row::new().with("numRowsDeleted", FieldValue::Long(deleted as i64))]);
        }

        let body = body.strip_prefix("SELECT ").ok_or_else(|| illegal(text))?;
        let (select, rest) = body.split_once(" FROM ").ok_or_else(|| illegal(text))?;
        let (table, rest) = rest.split_once(' ').unwrap_or((rest, ""));
        let rest = rest.strip_prefix('t').unwrap_or(rest);

        let (rest, limit) = split_clause(rest, " LIMIT ");
        let (rest, order) = split_clause(rest, " ORDER BY ");
        let (_, condition) = split_clause(rest, " WHERE ");

        let mut rows: Vec<Row> = {
            let tables = self.tables.lock();
            let Some(table) = tables.get(table) else {
                return Err(StoreError::new(StoreErrorCode::TableNotFound, table));
            };
            table.rows.values().cloned().collect()
        };

        if let Some(condition) = condition {
            let terms = parse_condition(condition, bindings).ok_or_else(|| illegal(text))?;
            rows.retain(|row| terms.iter().all(|term| term.matches(row)));
        }

        if select == "count(*) AS count" {
            return Ok(vec![Row::new().with("count", FieldValue::Long(rows.len() as i64))]);
        }

        if let Some(order) = order {
            let orders: Vec<(&str, bool)> = order
                .split(", ")
                .filter_map(|o| o.rsplit_once(' '))
                .map(|(field, direction)| (field, direction == "DESC"))
                .collect();
            rows.sort_by(|a, b| {
                orders
                    .iter()
                    .map(|(field, desc)| {
                        let ordering = compare(&lookup(a, field), &lookup(b, field))
                            .unwrap_or(Ordering::Equal);
                        if *desc {
                            ordering.reverse()
                        } else {
                            ordering
                        }
                    })
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        if let Some(limit) = limit {
            let (limit, offset) = match limit.split_once(" OFFSET ") {
                Some((l, o)) => (l, Some(o)),
                None => (limit, None),
            };
            let number = |token: &str| -> Option<usize> {
                match token.starts_with('$') {
                    true => bindings.get(token)?.as_i64().map(|v| v as usize),
                    false => token.parse().ok(),
                }
            };
            let offset = offset.and_then(number).unwrap_or(0);
            let limit = number(limit).ok_or_else(|| illegal(text))?;
            rows = rows.into_iter().skip(offset).take(limit).collect();
        }

        if select == "*" || select == "DISTINCT *" {
            return Ok(rows);
        }
        rows.iter()
            .map(|row| project(row, select).ok_or_else(|| illegal(text)))
            .collect()
    }
}

impl StoreClient for MemoryStore {
    fn get(&self, request: &GetRequest) -> Result<Option<Row>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .get(&request.table)
            .and_then(|t| t.rows.get(&key_string(&request.key)))
            .cloned())
    }

    fn put(&self, request: &PutRequest) -> Result<PutResult, StoreError> {
        let mut tables = self.tables.lock();
        let table = tables.entry(request.table.clone()).or_default();
        let mut row = request.row.clone();

        let mut generated = None;
        if let Some(column) = &request.generated_column {
            if !row.contains(column) {
                let value = match table.uuid_ids {
                    true => FieldValue::String(uuid::Uuid::new_v4().to_string()),
                    false => {
                        table.next_identity += 1;
                        FieldValue::Long(table.next_identity)
                    }
                };
                row.insert(column.clone(), value.clone());
                generated = Some(value);
            }
        }

        let key = key_string(&row);
        if request.if_present_only && !table.rows.contains_key(&key) {
            return Ok(PutResult {
                success: false,
                generated: None,
            });
        }
        table.rows.insert(key, row);
        Ok(PutResult {
            success: true,
            generated,
        })
    }

    fn delete(&self, request: &DeleteRequest) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock();
        Ok(tables
            .get_mut(&request.table)
            .and_then(|t| t.rows.remove(&key_string(&request.key)))
            .is_some())
    }

    fn multi_delete(&self, request: &MultiDeleteRequest) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock();
        let Some(table) = tables.get_mut(&request.table) else {
            return Ok(0);
        };
        let before = table.rows.len();
        table.rows.retain(|_, row| {
            !request
                .shard_key
                .iter()
                .all(|(column, value)| row.get(column) == Some(value))
        });
        Ok((before - table.rows.len()) as u64)
    }

    fn prepare(&self, statement: &str) -> Result<PreparedStatement, StoreError> {
        self.prepares.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(PreparedStatement::new(statement, statement.as_bytes().to_vec()))
    }

    fn query(&self, request: &QueryRequest) -> Result<QueryResult, StoreError> {
        let stale = self
            .stale_queries
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Err(StoreError::new(
                StoreErrorCode::PreparedStatementInvalid,
                "table changed since prepare",
            ));
        }

        let text = request.statement.text();
        if request.continuation.is_none() {
            self.statements.lock().push(text.to_string());
        }
        let rows = self.evaluate(text, request.statement.bindings())?;

        let start: usize = request
            .continuation
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        let end = (start + self.batch_size).min(rows.len());
        Ok(QueryResult {
            rows: rows[start..end].to_vec(),
            continuation: (end < rows.len()).then(|| end.to_string()),
        })
    }

    fn table_ddl(&self, request: &TableRequest) -> Result<(), StoreError> {
        self.ddl.lock().push(request.clone());
        let statement = request.statement.as_str();
        if let Some(rest) = statement.strip_prefix("CREATE TABLE IF NOT EXISTS ") {
            let name = rest.split_whitespace().next().unwrap_or_default().to_string();
            let mut tables = self.tables.lock();
            let table = tables.entry(name).or_default();
            table.uuid_ids = statement.contains("AS UUID");
        } else if let Some(name) = statement.strip_prefix("DROP TABLE IF EXISTS ") {
            self.tables.lock().remove(name.trim());
            self.schemas.lock().remove(name.trim());
        }
        Ok(())
    }

    fn get_table(&self, table: &str) -> Result<Option<TableSchema>, StoreError> {
        Ok(self.schemas.lock().get(table).cloned())
    }
}

fn illegal(text: &str) -> StoreError {
    StoreError::new(StoreErrorCode::IllegalArgument, format!("unsupported: {}", text))
}

fn key_string(row: &Row) -> String {
    row.iter()
        .filter(|(column, _)| column.as_str() != DOCUMENT_COLUMN)
        .map(|(column, value)| format!("{}={}", column, value))
        .collect::<Vec<_>>()
        .join("|")
}

/// Splits `text` at the last occurrence of `keyword`.
fn split_clause<'t>(text: &'t str, keyword: &str) -> (&'t str, Option<&'t str>) {
    match text.rfind(keyword) {
        Some(at) => (&text[..at], Some(&text[at + keyword.len()..])),
        None => (text, None),
    }
}

struct Term {
    field: String,
    op: &'static str,
    value: FieldValue,
}

impl Term {
    fn matches(&self, row: &Row) -> bool {
        let ordering = compare(&lookup(row, &self.field), &self.value);
        match self.op {
            "=" => ordering == Some(Ordering::Equal),
            "!=" => ordering != Some(Ordering::Equal),
            ">" => ordering == Some(Ordering::Greater),
            ">=" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            "<" => ordering == Some(Ordering::Less),
            "<=" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            _ => false,
        }
    }
}

fn parse_condition(condition: &str, bindings: &BTreeMap<String, FieldValue>) -> Option<Vec<Term>> {
    let condition = condition.trim();
    let condition = condition
        .strip_prefix('(')
        .and_then(|c| c.strip_suffix(')'))
        .unwrap_or(condition);
    condition
        .split(" AND ")
        .map(|term| {
            let term = term.trim_matches(|c| c == '(' || c == ')');
            let (field, op, value) = [" >= ", " <= ", " != ", " = ", " > ", " < "]
                .iter()
                .find_map(|op| {
                    term.split_once(op)
                        .map(|(field, value)| (field, op.trim(), value))
                })?;
            let value = match value {
                "true" => FieldValue::Boolean(true),
                "false" => FieldValue::Boolean(false),
                _ if value.starts_with('$') => bindings.get(value)?.clone(),
                _ => match value.strip_prefix('\'') {
                    Some(quoted) => FieldValue::String(quoted.trim_end_matches('\'').to_string()),
                    None => FieldValue::Long(value.parse().ok()?),
                },
            };
            let op = ["=", "!=", ">", ">=", "<", "<="].into_iter().find(|o| *o == op)?;
            Some(Term {
                field: field.to_string(),
                op,
                value,
            })
        })
        .collect()
}

/// Reads `t.column` or `t.kv_json_.a.b` from a row.
fn lookup(row: &Row, field: &str) -> FieldValue {
    let path = field.strip_prefix("t.").unwrap_or(field);
    let mut segments = path.split('.');
    let Some(column) = segments.next() else {
        return FieldValue::Null;
    };
    let mut current = row.get(column).cloned().unwrap_or(FieldValue::Null);
    for segment in segments {
        current = current
            .as_map()
            .and_then(|m| m.get(segment))
            .cloned()
            .unwrap_or(FieldValue::Null);
    }
    current
}

/// Evaluates a projected select list:
/// `t.a, t.b, {"c": t.kv_json_.c} AS kv_json_`.
fn project(row: &Row, select: &str) -> Option<Row> {
    let select = select.strip_prefix("DISTINCT ").unwrap_or(select);
    let (columns, document) = match select.find('{') {
        Some(at) => (&select[..at], Some(&select[at..])),
        None => (select, None),
    };

    let mut projected = Row::new();
    for column in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let name = column.strip_prefix("t.")?;
        projected.insert(name, lookup(row, column));
    }
    if let Some(document) = document {
        let suffix = format!(" AS {}", DOCUMENT_COLUMN);
        let entries = document
            .strip_suffix(suffix.as_str())?
            .strip_prefix('{')?
            .strip_suffix('}')?;
        let mut map = BTreeMap::new();
        for entry in entries.split(", ") {
            let (name, field) = entry.split_once(": ")?;
            let value = lookup(row, field);
            if !value.is_null() {
                map.insert(name.trim_matches('"').to_string(), value);
            }
        }
        projected.insert(DOCUMENT_COLUMN, FieldValue::Map(map));
    }
    Some(projected)
}

fn compare(left: &FieldValue, right: &FieldValue) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        return l.partial_cmp(&r);
    }
    match (left, right) {
        (FieldValue::String(l), FieldValue::String(r)) => Some(l.cmp(r)),
        (FieldValue::Boolean(l), FieldValue::Boolean(r)) => Some(l.cmp(r)),
        (FieldValue::Null, FieldValue::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

// Fixture entities

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Person {
    pub id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub active: bool,
}

impl Person {
    pub fn new(first_name: &str, last_name: &str, age: i32) -> Self {
        Self {
            id: None,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            age,
            active: true,
        }
    }
}

/// Projection of [`Person`] onto its names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PersonName {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Account {
    pub id: Option<String>,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderKey {
    pub region: String,
    pub number: i64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Order {
    pub key: OrderKey,
    pub total: f64,
}

/// Projection of [`Order`] keeping its composite id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderTotal {
    pub key: OrderKey,
    pub total: f64,
}

impl Order {
    pub fn new(region: &str, number: i64, total: f64) -> Self {
        Self {
            key: OrderKey {
                region: region.to_string(),
                number,
            },
            total,
        }
    }
}

pub fn register_fixtures(registry: &TypeRegistry) -> Result<(), DbError> {
    registry.register(
        TypeInfo::builder::<Person>("Person")
            .table(TableOptions::named("people"))
            .property("id", FieldType::Long, |p| p.id.into(), |p, v| {
                p.id = v.take()?;
                Ok(())
            })
            .id()
            .generated()
            .property("firstName", FieldType::String, |p| p.first_name.clone().into(), |p, v| {
                p.first_name = v.take()?;
                Ok(())
            })
            .property("lastName", FieldType::String, |p| p.last_name.clone().into(), |p, v| {
                p.last_name = v.take()?;
                Ok(())
            })
            .property("age", FieldType::Int, |p| p.age.into(), |p, v| {
                p.age = v.take()?;
                Ok(())
            })
            .property("active", FieldType::Bool, |p| p.active.into(), |p, v| {
                p.active = v.take()?;
                Ok(())
            })
            .build()?,
    )?;
    registry.register(
        TypeInfo::builder::<PersonName>("PersonName")
            .property("firstName", FieldType::String, |p| p.first_name.clone().into(), |p, v| {
                p.first_name = v.take()?;
                Ok(())
            })
            .property("lastName", FieldType::String, |p| p.last_name.clone().into(), |p, v| {
                p.last_name = v.take()?;
                Ok(())
            })
            .build()?,
    )?;
    registry.register(
        TypeInfo::builder::<Account>("Account")
            .table(TableOptions::named("accounts"))
            .property("id", FieldType::String, |a| a.id.clone().into(), |a, v| {
                a.id = v.take()?;
                Ok(())
            })
            .id()
            .generated()
            .property("owner", FieldType::String, |a| a.owner.clone().into(), |a, v| {
                a.owner = v.take()?;
                Ok(())
            })
            .build()?,
    )?;
    registry.register(
        TypeInfo::builder::<OrderKey>("OrderKey")
            .property("region", FieldType::String, |k| k.region.clone().into(), |k, v| {
                k.region = v.take()?;
                Ok(())
            })
            .key(true, None)
            .property("number", FieldType::Long, |k| k.number.into(), |k, v| {
                k.number = v.take()?;
                Ok(())
            })
            .key(false, None)
            .build()?,
    )?;
    registry.register(
        TypeInfo::builder::<Order>("Order")
            .table(TableOptions::named("orders"))
            .property(
                "key",
                FieldType::object("OrderKey"),
                |o| ObjectValue::object(o.key.clone()),
                |o, v| {
                    o.key = v.into_object()?;
                    Ok(())
                },
            )
            .id()
            .property("total", FieldType::Double, |o| o.total.into(), |o, v| {
                o.total = v.take()?;
                Ok(())
            })
            .build()?,
    )?;
    registry.register(
        TypeInfo::builder::<OrderTotal>("OrderTotal")
            .property(
                "key",
                FieldType::object("OrderKey"),
                |o| ObjectValue::object(o.key.clone()),
                |o, v| {
                    o.key = v.into_object()?;
                    Ok(())
                },
            )
            .property("total", FieldType::Double, |o| o.total.into(), |o, v| {
                o.total = v.take()?;
                Ok(())
            })
            .build()?,
    )?;
    Ok(())
}

/// A template over a fresh store with every fixture registered.
pub fn setup(batch_size: usize) -> (Arc<MemoryStore>, TableTemplate) {
    setup_with(batch_size, MapperConfig::default())
}

pub fn setup_with(batch_size: usize, config: MapperConfig) -> (Arc<MemoryStore>, TableTemplate) {
    let registry = Arc::new(TypeRegistry::new());
    register_fixtures(&registry).unwrap();
    let context = Arc::new(MappingContext::new(registry, config));
    let store = Arc::new(MemoryStore::new(batch_size));
    let template = TableTemplate::new(store.clone(), context);
    (store, template)
}

/// Inserts people and returns them with their generated ids.
pub fn insert_people(template: &TableTemplate, people: &[(&str, &str, i32)]) -> Vec<Person> {
    people
        .iter()
        .map(|(first, last, age)| template.insert(Person::new(first, last, *age)).unwrap())
        .collect()
}

/// Names of tables that received a `CREATE TABLE`.
pub fn created_tables(store: &MemoryStore) -> HashSet<String> {
    store
        .ddl_statements()
        .iter()
        .filter_map(|s| s.strip_prefix("CREATE TABLE IF NOT EXISTS "))
        .filter_map(|s| s.split_whitespace().next())
        .map(str::to_string)
        .collect()
}
