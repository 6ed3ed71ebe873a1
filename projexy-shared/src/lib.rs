//! # ProjeXY Shared Library
//!
//! Domain types, persistence, and business rules used by the ProjeXY API
//! server.
//!
//! ## Module Organization
//!
//! - `models`: users, projects, memberships, tasks, comments and their SQL
//! - `db`: connection pool and migrations
//! - `auth`: passwords, session tokens, one-time tokens, request
//!   authentication, project access control
//! - `plan`: FREE/PREMIUM limits and feature gates
//! - `realtime`: private-channel notifications
//! - `billing`: subscription webhook verification and plan updates
//! - `email`: transactional mail

pub mod auth;
pub mod billing;
pub mod db;
pub mod email;
pub mod models;
pub mod plan;
pub mod realtime;

/// Current version of the ProjeXY shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
