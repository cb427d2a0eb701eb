pub mod auth;
pub mod embeddings;
pub mod llm;
pub mod middleware;
pub mod reports;
pub mod rest;
pub mod router;
pub mod sessions;
pub mod state;

// Re-export what the binaries and integration tests need to build the server.
pub use middleware::require_auth;
pub use router::build_router;
pub use state::AppState;
