//! secretgate: a secrets proxy gateway.
//!
//! Resolves corporate directory users into principals, routes them to the
//! secret store serving their authorization domain over mutually
//! authenticated TLS, and manages single-use onboarding invitations.

pub mod auth;
pub mod config;
pub mod db;
pub mod models;
#[cfg(feature = "cli")]
pub mod observability;
pub mod secret_store;
pub mod services;
pub mod state;
pub mod transport;
