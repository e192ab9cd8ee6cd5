pub mod schema;
pub mod connection;
pub mod repositories;

pub use connection::{from_db_time, to_db_time, Database, DbConnection, DbPool};
