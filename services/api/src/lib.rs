//! services/api/src/lib.rs
//!
//! The Genfuze API service: adapters behind the core ports, authentication, and
//! the axum web layer. The `api` and `openapi` binaries are thin wrappers.

pub mod adapters;
pub mod auth;
pub mod config;
pub mod error;
pub mod sweeper;
pub mod web;
