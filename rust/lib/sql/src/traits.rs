use tracing::warn;

use crate::error::SQLError;

/// A dynamically-typed SQL parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v as i64)
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

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A row returned from a SQL query: column name to value.
#[derive(Debug, Clone)]
pub struct Row {
    pub columns: Vec<(String, Value)>,
}

impl Row {
    /// Get a column value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a text column value by name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get an integer column value by name.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Get a real column value by name. Integers are widened.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(Value::Real(f)) => Some(*f),
            Some(Value::Integer(i)) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get a 0/1 integer column as a bool. NULL and missing read as false.
    pub fn get_bool(&self, name: &str) -> bool {
        self.get_i64(name).is_some_and(|i| i != 0)
    }

    /// Like [`Row::get_i64`] but a missing or NULL value is an error.
    pub fn require_i64(&self, name: &str) -> Result<i64, SQLError> {
        self.get_i64(name)
            .ok_or_else(|| SQLError::Query(format!("column {} missing or not an integer", name)))
    }

    /// Like [`Row::get_str`] but a missing or NULL value is an error.
    pub fn require_str(&self, name: &str) -> Result<&str, SQLError> {
        self.get_str(name)
            .ok_or_else(|| SQLError::Query(format!("column {} missing or not text", name)))
    }
}

/// Statement execution shared by stores and open transactions.
pub trait Executor {
    /// Execute a query and return rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError>;

    /// Execute a statement (INSERT/UPDATE/DELETE) and return affected row count.
    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError>;

    /// Execute a query and return only the first row.
    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>, SQLError> {
        Ok(self.query(sql, params)?.into_iter().next())
    }
}

/// SQLStore provides a SQL execution interface backed by an embedded database.
///
/// Statements run directly on the store are autocommitted and retried on
/// connection errors. Multi-statement work goes through [`SQLStore::begin`].
pub trait SQLStore: Executor + Send + Sync {
    /// Open a write transaction.
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, SQLError>;
}

/// An open transaction. Dropping it without [`Transaction::commit`] rolls back.
///
/// Statements inside a transaction are never retried.
pub trait Transaction: Executor {
    fn commit(self: Box<Self>) -> Result<(), SQLError>;

    fn rollback(self: Box<Self>) -> Result<(), SQLError>;
}

/// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
pub fn with_transaction<T, E, F>(store: &dyn SQLStore, f: F) -> Result<T, E>
where
    E: From<SQLError>,
    F: FnOnce(&dyn Transaction) -> Result<T, E>,
{
    let tx = store.begin()?;
    match f(tx.as_ref()) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback() {
                warn!("rollback failed: {}", rb);
            }
            Err(e)
        }
    }
}
