pub mod error;
pub mod filter;
pub mod sqlite;
pub mod traits;

pub use error::SQLError;
pub use filter::Predicates;
pub use sqlite::{HealthReport, SqliteStore, StoreOptions};
pub use traits::{with_transaction, Executor, Row, SQLStore, Transaction, Value};
