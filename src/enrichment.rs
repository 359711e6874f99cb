//! Prompt enrichment seam
//!
//! Before a request reaches the generator, the user's input may be run
//! through an external language or vision service that rewrites it into a
//! better prompt. That service lives outside this crate and is reached
//! through the [`Enricher`] trait. [`resolve_prompt`] applies the fallback
//! rules, so the generator only ever sees a final prompt string.

use crate::types::{AspectRatio, Style};

/// Raw user input a prompt is made from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptSource {
    /// Free text typed by the user
    Text {
        /// The user's own words
        text: String,
        /// Style the picture will be rendered in, if already chosen
        style: Option<Style>,
        /// Aspect ratio the picture will be rendered at, if already chosen
        aspect_ratio: Option<AspectRatio>,
    },
    /// An uploaded picture to be described, optionally with a caption
    Image {
        /// Encoded image bytes as received
        bytes: Vec<u8>,
        /// Caption sent along with the picture
        caption: Option<String>,
    },
}

impl PromptSource {
    /// Text input with no rendering context
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            style: None,
            aspect_ratio: None,
        }
    }

    /// Text input with the style and aspect ratio the picture will use
    pub fn text_for(text: impl Into<String>, style: Style, aspect_ratio: AspectRatio) -> Self {
        Self::Text {
            text: text.into(),
            style: Some(style),
            aspect_ratio: Some(aspect_ratio),
        }
    }
}

/// Result of one enrichment call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Enrichment {
    /// Rewritten prompt text
    Enriched(String),
    /// The service refused the input on content grounds
    Blocked,
    /// The call failed (timeout, transport, unusable answer)
    Failed(String),
}

/// External prompt-enhancement service
#[async_trait::async_trait]
pub trait Enricher: Send + Sync {
    /// Turn user input into a generation prompt
    async fn enrich(&self, source: &PromptSource) -> Enrichment;
}

/// Enricher that performs no rewriting
///
/// Text comes back unchanged; images cannot be described and fail.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

#[async_trait::async_trait]
impl Enricher for Passthrough {
    async fn enrich(&self, source: &PromptSource) -> Enrichment {
        match source {
            PromptSource::Text { text, .. } => Enrichment::Enriched(text.clone()),
            PromptSource::Image { .. } => {
                Enrichment::Failed("image description is not available".to_string())
            }
        }
    }
}

/// Final decision on what to generate
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptResolution {
    /// Generate with this prompt
    Ready(String),
    /// Do not generate; the input was refused
    Blocked,
    /// Do not generate; no prompt could be produced from the input
    Unavailable,
}

/// Run `source` through `enricher` and apply the fallback rules
///
/// - A non-blank enriched prompt is used as is.
/// - Text input falls back to the user's own text when enrichment fails,
///   is blocked or comes back blank. Blank text input is `Unavailable`.
/// - Image input has nothing to fall back to: a block is `Blocked`, a
///   failure or blank answer is `Unavailable`.
pub async fn resolve_prompt(enricher: &dyn Enricher, source: &PromptSource) -> PromptResolution {
    let enrichment = enricher.enrich(source).await;

    match (enrichment, source) {
        (Enrichment::Enriched(text), _) if !text.trim().is_empty() => {
            tracing::debug!(chars = crate::prompt::char_len(&text), "prompt enriched");
            PromptResolution::Ready(text)
        }
        (Enrichment::Blocked, PromptSource::Image { .. }) => {
            tracing::warn!("image description refused the input");
            PromptResolution::Blocked
        }
        (other, PromptSource::Text { text: original, .. }) => {
            match &other {
                Enrichment::Failed(reason) => {
                    tracing::warn!(error = %reason, "prompt enrichment failed, using original text");
                }
                Enrichment::Blocked => {
                    tracing::warn!("prompt enrichment refused the input, using original text");
                }
                Enrichment::Enriched(_) => {}
            }
            if original.trim().is_empty() {
                PromptResolution::Unavailable
            } else {
                PromptResolution::Ready(original.clone())
            }
        }
        (other, PromptSource::Image { .. }) => {
            if let Enrichment::Failed(reason) = &other {
                tracing::error!(error = %reason, "image description failed");
            }
            PromptResolution::Unavailable
        }
    }
}
