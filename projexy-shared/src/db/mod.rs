/// PostgreSQL access
///
/// - `pool`: pool construction from [`pool::DatabaseConfig`], liveness probe, stats
/// - `migrations`: embedded schema migrations
///
/// Table-level queries live with their types in [`crate::models`].

pub mod migrations;
pub mod pool;
