//! LLM Provider Clients and Abstractions
//!
//! This module provides a unified interface for the chat models a session can
//! switch between. Provider-specific wire formats stay behind common traits.
//!
//! # Architecture
//!
//! The module follows a factory pattern:
//! - [`LLMClient`] - The core trait that all providers implement
//! - [`LLMClientFactory`] - Factory trait for creating provider clients
//! - [`ModelRegistry`] - Model catalogue, active selection and temperature
//! - [`HttpClientFactory`] - Creates real HTTP clients, resolving API keys
//!
//! # Example
//!
//! ```ignore
//! use freestream::llm::{HttpClientFactory, LLMClientFactory, ModelRegistry};
//!
//! let mut registry = ModelRegistry::from_config(&config)?;
//! registry.select("Claude: Haiku")?;
//! let client = HttpClientFactory.create_client(&registry.active()?).await?;
//!
//! let answer = client.generate(&[Message::user("What is 2+2?")]).await?;
//! ```
//!
//! # Streaming
//!
//! Streaming providers return a [`TokenStream`] of text fragments. A client
//! reports through [`LLMClient::supports_streaming`] whether its output
//! arrives incrementally; callers fall back to `generate` otherwise.

pub mod anthropic;
/// Core LLM client trait and streaming response types.
pub mod client;
pub mod gemini;
pub mod openai;
/// Model catalogue and session selection.
pub mod provider_registry;
pub mod sse;

pub use client::{HttpClientFactory, LLMClient, LLMClientFactory, ModelParams, Provider, TokenStream};
pub use provider_registry::{ActiveModel, ModelRegistry};
