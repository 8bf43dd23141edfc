//! HTTP boundary for the Agora agent brains.
//!
//! The world front-end drives the brains entirely over this API: it posts a
//! sensory snapshot to get a decision, reports when an action has finished
//! executing, and starts, stops or resets the simulation. Read-only routes
//! expose the render state, the memory summary and the conversation logs.
//!
//! All state lives in the [`CoordinationService`](agora_brain::CoordinationService)
//! held by [`AppState`]; handlers are thin translations between JSON and
//! service calls.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
