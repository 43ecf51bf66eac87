//! Operator HTTP surface.
//!
//! Read-only observability routes plus the authenticated kill-switch pair.
//! Everything the routes return is scrubbed of secrets; the kill-switch auth
//! uses a constant-time token comparison with a fail-closed default.

pub mod auth;
pub mod context;
pub mod handlers;
pub mod server;
pub mod sse;

pub use context::AppContext;
pub use server::ApiServer;
