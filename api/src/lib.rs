//! gcipher API service.
//!
//! A small certificate authority: signs certificate signing requests for
//! authenticated users, tracks revocation and publishes a revocation list.
//!
//! # Configuration
//!
//! The service needs a CA certificate and key, optionally an intermediate.
//! See [`config::GcipherConfig`] for all options.

pub mod auth;
pub mod ca;
pub mod config;
pub mod context;
pub mod server;

pub(crate) mod error;
pub(crate) mod handlers;
