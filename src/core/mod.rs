pub mod chat_stream;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod frames;
pub mod normalizer;
pub mod transport;
