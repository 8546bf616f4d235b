//! hubchat is a streaming chat client for OpenAI-compatible gateways and
//! aggregators.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the transport: SSE frame decoding, payload
//!   normalization, request orchestration, error classification,
//!   credentials, configuration, and the channel-based stream service.
//! - [`api`] defines chat/model payloads exchanged with gateways.
//! - [`utils`] holds URL, auth header, attachment, and logging helpers.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
