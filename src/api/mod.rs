//! HTTP surface for the wagering core
//!
//! Thin axum layer over [`crate::games::GameEngine`]. Identity is an
//! upstream collaborator: an auth proxy validates credentials and
//! forwards the authenticated user id in a header; this layer only
//! extracts it. WebSocket fan-out likewise lives outside the core and
//! subscribes through [`crate::broadcast`].

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{ApiConfig, ApiServer};
