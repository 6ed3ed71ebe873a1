//! # ProjeXY API Server Library
//!
//! HTTP surface of ProjeXY: users, projects, memberships, tasks, comments,
//! realtime subscriptions and the billing webhook.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from the environment
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers
//! - `routes`: Route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
