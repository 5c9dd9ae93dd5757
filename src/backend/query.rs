use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite, sqlite::SqliteRow};
use std::marker::PhantomData;

use crate::backend::Backend;
use crate::backend::realtime::{ChangeEvent, ChangeKind};
use crate::error::BackendError;

/// A table the backend exposes through the query builder.
pub trait Table {
    const NAME: &'static str;
    const COLUMNS: &'static [&'static str];

    type Row: for<'r> FromRow<'r, SqliteRow> + Serialize + Send + Unpin;

    /// Columns the backend fills in on insert.
    fn generated(now: DateTime<Utc>) -> Record;

    /// Columns the backend refreshes on every update.
    fn touched(_now: DateTime<Utc>) -> Record {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Column/value pairs for an insert or update.
pub type Record = Vec<(&'static str, Value)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    fn sql(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

/// Table-scoped query: equality filters, ordering, then one terminal call.
pub struct Query<'a, T: Table> {
    backend: &'a Backend,
    filters: Vec<(String, Value)>,
    order: Vec<(String, Direction)>,
    _table: PhantomData<T>,
}

impl<'a, T: Table> Query<'a, T> {
    pub(crate) fn new(backend: &'a Backend) -> Self {
        Self {
            backend,
            filters: Vec::new(),
            order: Vec::new(),
            _table: PhantomData,
        }
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order.push((column.to_string(), direction));
        self
    }

    pub async fn select(self) -> Result<Vec<T::Row>, BackendError> {
        self.check_columns(std::iter::empty())?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {}", T::NAME));
        self.push_filters(&mut qb);
        self.push_order(&mut qb);

        let rows = qb
            .build_query_as::<T::Row>()
            .fetch_all(self.backend.pool())
            .await?;
        Ok(rows)
    }

    /// Inserts one row and returns it as stored.
    pub async fn insert(self, record: Record) -> Result<Vec<T::Row>, BackendError> {
        self.check_columns(record.iter().map(|(c, _)| *c))?;

        let mut values = T::generated(Utc::now());
        values.retain(|(column, _)| !record.iter().any(|(c, _)| c == column));
        values.extend(record);

        let mut qb = QueryBuilder::<Sqlite>::new(format!("INSERT INTO {} (", T::NAME));
        let mut columns = qb.separated(", ");
        for (column, _) in &values {
            columns.push(*column);
        }
        qb.push(") VALUES (");
        let mut binds = qb.separated(", ");
        for (_, value) in values {
            push_value(&mut binds, value);
        }
        qb.push(") RETURNING *");

        let rows = qb
            .build_query_as::<T::Row>()
            .fetch_all(self.backend.pool())
            .await?;
        self.publish(ChangeKind::Insert, &rows, |row| (Some(row), None));
        Ok(rows)
    }

    /// Sets the given columns on every filtered row and returns the rows.
    pub async fn update(self, record: Record) -> Result<Vec<T::Row>, BackendError> {
        self.check_columns(record.iter().map(|(c, _)| *c))?;
        self.require_filter("update")?;

        let mut values = record;
        values.extend(T::touched(Utc::now()));

        let mut qb = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", T::NAME));
        let mut assignments = qb.separated(", ");
        for (column, value) in values {
            assignments.push(format!("{column} = "));
            push_value_unseparated(&mut assignments, value);
        }
        self.push_filters(&mut qb);
        qb.push(" RETURNING *");

        let rows = qb
            .build_query_as::<T::Row>()
            .fetch_all(self.backend.pool())
            .await?;
        self.publish(ChangeKind::Update, &rows, |row| (Some(row), None));
        Ok(rows)
    }

    /// Deletes every filtered row and returns how many went.
    pub async fn delete(self) -> Result<u64, BackendError> {
        self.check_columns(std::iter::empty())?;
        self.require_filter("delete")?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {}", T::NAME));
        self.push_filters(&mut qb);
        qb.push(" RETURNING *");

        let rows = qb
            .build_query_as::<T::Row>()
            .fetch_all(self.backend.pool())
            .await?;
        self.publish(ChangeKind::Delete, &rows, |row| (None, Some(row)));
        Ok(rows.len() as u64)
    }

    fn check_columns<'c>(
        &'c self,
        written: impl Iterator<Item = &'c str>,
    ) -> Result<(), BackendError> {
        let referenced = self
            .filters
            .iter()
            .map(|(c, _)| c.as_str())
            .chain(self.order.iter().map(|(c, _)| c.as_str()))
            .chain(written);

        for column in referenced {
            if !T::COLUMNS.contains(&column) {
                return Err(BackendError::UnknownColumn {
                    table: T::NAME,
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    fn require_filter(&self, op: &str) -> Result<(), BackendError> {
        if self.filters.is_empty() {
            return Err(BackendError::InvalidInput(format!(
                "{op} on {} requires a filter",
                T::NAME
            )));
        }
        Ok(())
    }

    fn push_filters(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        for (i, (column, value)) in self.filters.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            if *value == Value::Null {
                qb.push(format!("{column} IS NULL"));
            } else {
                qb.push(format!("{column} = "));
                push_bind(qb, value.clone());
            }
        }
    }

    fn push_order(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        let tiebreak = self
            .order
            .first()
            .map(|(_, direction)| *direction)
            .unwrap_or(Direction::Ascending);

        qb.push(" ORDER BY ");
        for (column, direction) in &self.order {
            qb.push(format!("{column} {}, ", direction.sql()));
        }
        // Rows written within the same instant keep insertion order.
        qb.push(format!("rowid {}", tiebreak.sql()));
    }

    fn publish(
        &self,
        kind: ChangeKind,
        rows: &[T::Row],
        split: impl Fn(serde_json::Value) -> (Option<serde_json::Value>, Option<serde_json::Value>),
    ) {
        for row in rows {
            let record = serde_json::to_value(row).unwrap_or(serde_json::Value::Null);
            let (new, old) = split(record);
            self.backend
                .realtime()
                .publish(ChangeEvent::new(T::NAME, kind, new, old));
        }
    }
}

fn push_bind(qb: &mut QueryBuilder<'_, Sqlite>, value: Value) {
    match value {
        Value::Null => qb.push_bind(Option::<String>::None),
        Value::Bool(v) => qb.push_bind(v),
        Value::Int(v) => qb.push_bind(v),
        Value::Real(v) => qb.push_bind(v),
        Value::Text(v) => qb.push_bind(v),
        Value::Timestamp(v) => qb.push_bind(v),
    };
}

fn push_value(binds: &mut sqlx::query_builder::Separated<'_, '_, Sqlite, &str>, value: Value) {
    match value {
        Value::Null => binds.push_bind(Option::<String>::None),
        Value::Bool(v) => binds.push_bind(v),
        Value::Int(v) => binds.push_bind(v),
        Value::Real(v) => binds.push_bind(v),
        Value::Text(v) => binds.push_bind(v),
        Value::Timestamp(v) => binds.push_bind(v),
    };
}

fn push_value_unseparated(
    binds: &mut sqlx::query_builder::Separated<'_, '_, Sqlite, &str>,
    value: Value,
) {
    match value {
        Value::Null => binds.push_bind_unseparated(Option::<String>::None),
        Value::Bool(v) => binds.push_bind_unseparated(v),
        Value::Int(v) => binds.push_bind_unseparated(v),
        Value::Real(v) => binds.push_bind_unseparated(v),
        Value::Text(v) => binds.push_bind_unseparated(v),
        Value::Timestamp(v) => binds.push_bind_unseparated(v),
    };
}
