//! # Connections Module
//!
//! Clients for the external services the cache is loaded from.

/// PostgreSQL-backed `RangeSource` over a `deadpool-postgres` pool.
pub mod db_postgres;

pub use db_postgres::PostgresSource;
