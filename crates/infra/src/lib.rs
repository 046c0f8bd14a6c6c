//! Infrastructure layer: durable record storage.

pub mod postgres;

pub use postgres::PostgresRecordStore;
