pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::{IdentityResolver, StaticTokenResolver};
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
