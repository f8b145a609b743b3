pub mod sqlite;

pub use sqlite::SqliteEquityStore;
