//! Lectio Serve - HTTP handlers for passages, verses and generated studies.
//!
//! This crate wires the pure logic of `lectio-core` to two upstream
//! providers: a scripture content API and an OpenAI-compatible LLM used for
//! motif extraction. Both are optional; without them the handlers degrade to
//! generated or heuristic content.
//!
//! # Response contract
//!
//! Every body is JSON with an `ok` flag. Listing endpoints (`/books`,
//! `/bibles`, `/passage`, `/verses/bulk`) use conventional status codes.
//! Content endpoints (`/study`, `/verses`) always answer 200.
//!
//! # Architecture
//!
//! - **AppState**: Shared state (configuration, provider clients, cache, verse store)
//! - **Scripture / LLM**: Typed upstream clients with bounded timeouts
//! - **Routes**: Endpoint handlers grouped by resource

pub mod cache;
mod error;
pub mod llm;
pub mod metrics;
mod routes;
pub mod scripture;
mod state;

pub use self::cache::{ListingKey, ResponseCache, get_or_compute, new_cache};
pub use self::error::ApiError;
pub use self::routes::{Envelope, router};
pub use self::state::{AppState, Config};
