//! Text generation for the interview engine.
//!
//! Provides the `TextGenerator` capability consumed by the engine, the
//! `ProviderAdapter` trait with a `DynProvider` wrapper, a middleware chain,
//! and `LlmClient`, which sends single-prompt generations to its provider.

mod client;
mod generator;
mod openai_compat;
mod provider;
mod types;

pub use client::*;
pub use generator::*;
pub use openai_compat::OpenAiCompatAdapter;
pub use provider::*;
pub use types::*;
