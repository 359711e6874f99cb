//! # imagen-dispatch
//!
//! Orchestration core for asynchronous text-to-image generation over a pool
//! of independent API credentials.
//!
//! ## Design Philosophy
//!
//! imagen-dispatch is designed to be:
//! - **Library-first** - No CLI or chat transport, purely a Rust crate for embedding
//! - **Non-blocking** - Every request runs as a detached task; callers never wait on the remote
//! - **Contained failures** - Per-credential and per-job failures become values, never panics
//! - **Event-driven** - Consumers subscribe to lifecycle events
//!
//! ## How a request flows
//!
//! 1. [`ClientPool`] resolves the remote pipeline of every credential at startup
//!    and keeps the ones that work.
//! 2. [`Dispatcher`] rotates over the pool, one credential per request.
//! 3. The selected client submits the job and polls it under a bounded budget.
//! 4. The run ends in exactly one [`Outcome`], which [`classify`] turns into an
//!    image or a fixed user-facing notice.
//!
//! ## Quick Start
//!
//! ```no_run
//! use imagen_dispatch::{
//!     AspectRatio, Config, GenerationRequest, ImageGenerator, Presentation, Style, classify,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads API_KEY_1/SECRET_KEY_1, API_KEY_2/SECRET_KEY_2, ...
//!     let config = Config::from_env()?;
//!     let generator = ImageGenerator::new(config).await?;
//!
//!     let request = GenerationRequest::new("a lighthouse on a cliff at dusk")
//!         .with_style(Style::Cinematic)
//!         .with_aspect_ratio(AspectRatio::Widescreen);
//!
//!     let report = generator.generate(request)?.await?;
//!     match classify(&report.outcome) {
//!         Presentation::Image(image) => println!("{} bytes of {}", image.bytes.len(), image.mime),
//!         Presentation::Notice(notice) => println!("{notice}"),
//!     }
//!
//!     generator.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Result classification for the presentation layer
pub mod classifier;
/// Per-credential HTTP client
pub mod client;
/// Configuration types
pub mod config;
/// Round-robin credential selection
pub mod dispatcher;
/// Prompt enrichment seam
pub mod enrichment;
/// Error types
pub mod error;
/// Generation service (decomposed into focused submodules)
pub mod generator;
/// Client pool initialization
pub mod pool;
/// Prompt length handling
pub mod prompt;
/// Bounded polling with transient-failure tolerance
pub mod retry;
/// Core types and events
pub mod types;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use classifier::{DecodedImage, Notice, Presentation, classify};
pub use client::{FusionClient, ImageBackend};
pub use config::{Config, Credential, CredentialLoader, PollConfig};
pub use dispatcher::Dispatcher;
pub use enrichment::{
    Enricher, Enrichment, Passthrough, PromptResolution, PromptSource, resolve_prompt,
};
pub use error::{ClientError, Error, Result};
pub use generator::{ImageGenerator, JobHandle, OutcomeSink, run_with_shutdown};
pub use pool::ClientPool;
pub use types::{
    AspectRatio, CredentialId, Event, GenerationReport, GenerationRequest, JobId, Outcome,
    PipelineId, RequestId, Style,
};
