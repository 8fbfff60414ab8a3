//! claims-server: HTTP surface for claims management.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod render;
pub mod router;
