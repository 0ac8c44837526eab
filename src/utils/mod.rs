//! Configuration and HTTP helpers shared by the pipeline.

/// HTTP retry with exponential backoff for provider calls.
pub mod retry;
/// TOML configuration (`freestream.toml`).
pub mod toml_config;
