//! Core types for imagen-dispatch

use crate::config::GenerationDefaults;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one configured credential (the `n` in `API_KEY_n`, 0 for the unnumbered pair)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(pub u32);

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CredentialId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Remote identifier of a generation pipeline (model/version)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(pub String);

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque remote job identifier returned by a successful submission
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local identifier assigned to every request accepted by the generator
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rendering style understood by the remote pipeline
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Style {
    /// Pipeline default
    #[default]
    Default,
    /// Cinematic
    Cinematic,
    /// Photorealistic
    Photorealistic,
    /// Anime
    Anime,
    /// Digital art
    DigitalArt,
    /// Comic book
    ComicBook,
    /// Pencil drawing
    PencilDrawing,
    /// Pastel art
    PastelArt,
}

impl Style {
    /// Every style, in menu order
    pub const ALL: [Style; 8] = [
        Style::Default,
        Style::Cinematic,
        Style::Photorealistic,
        Style::Anime,
        Style::DigitalArt,
        Style::ComicBook,
        Style::PencilDrawing,
        Style::PastelArt,
    ];

    /// Wire name sent in the `style` parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Default => "DEFAULT",
            Style::Cinematic => "CINEMATIC",
            Style::Photorealistic => "PHOTOREALISTIC",
            Style::Anime => "ANIME",
            Style::DigitalArt => "DIGITAL_ART",
            Style::ComicBook => "COMIC_BOOK",
            Style::PencilDrawing => "PENCIL_DRAWING",
            Style::PastelArt => "PASTEL_ART",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Style::ALL
            .into_iter()
            .find(|style| style.as_str() == wanted)
            .ok_or_else(|| format!("unknown style '{s}'"))
    }
}

/// Supported output aspect ratios
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1, 1024x1024
    #[default]
    #[serde(rename = "1:1")]
    Square,
    /// 16:9, 1024x576
    #[serde(rename = "16:9")]
    Widescreen,
    /// 9:16, 576x1024
    #[serde(rename = "9:16")]
    Portrait,
    /// 3:2, 1024x683
    #[serde(rename = "3:2")]
    Landscape,
    /// 2:3, 683x1024
    #[serde(rename = "2:3")]
    Tall,
}

impl AspectRatio {
    /// Every ratio, in menu order
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Widescreen,
        AspectRatio::Portrait,
        AspectRatio::Landscape,
        AspectRatio::Tall,
    ];

    /// Pixel dimensions as `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1024, 1024),
            AspectRatio::Widescreen => (1024, 576),
            AspectRatio::Portrait => (576, 1024),
            AspectRatio::Landscape => (1024, 683),
            AspectRatio::Tall => (683, 1024),
        }
    }

    /// Label in `W:H` form
    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Widescreen => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "3:2",
            AspectRatio::Tall => "2:3",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.label() == wanted)
            .ok_or_else(|| format!("unknown aspect ratio '{s}'"))
    }
}

/// One generation request, as handed to the generator after prompt enrichment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Final prompt text (truncated by the client if it exceeds the remote limit)
    pub prompt: String,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Rendering style
    pub style: Style,
    /// Number of images requested from the pipeline
    pub num_images: u32,
}

impl GenerationRequest {
    /// Request with a square 1024x1024 default-style single image
    pub fn new(prompt: impl Into<String>) -> Self {
        let (width, height) = AspectRatio::Square.dimensions();
        Self {
            prompt: prompt.into(),
            width,
            height,
            style: Style::Default,
            num_images: 1,
        }
    }

    /// Request using the configured style, aspect ratio and image count
    pub fn with_defaults(prompt: impl Into<String>, defaults: &GenerationDefaults) -> Self {
        Self::new(prompt)
            .with_style(defaults.style)
            .with_aspect_ratio(defaults.aspect_ratio)
            .with_num_images(defaults.num_images)
    }

    /// Set the style
    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    /// Set width and height from an aspect ratio
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        (self.width, self.height) = ratio.dimensions();
        self
    }

    /// Set explicit dimensions
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the number of images
    pub fn with_num_images(mut self, num_images: u32) -> Self {
        self.num_images = num_images;
        self
    }
}

/// Terminal, classified result of one job
///
/// Produced exactly once per run. Consumers match it exhaustively; see
/// [`classify`](crate::classifier::classify) for the presentation mapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Base64-encoded image payloads, in remote order
    Images {
        /// Encoded payloads (at least one)
        payloads: Vec<String>,
    },
    /// The remote moderation flagged the result
    Censored,
    /// The remote reported failure, returned a malformed result, or the run faulted
    RemoteError {
        /// Diagnostic description
        reason: String,
    },
    /// The poll budget was spent while the job was still pending
    Timeout {
        /// Attempts consumed
        attempts: u32,
    },
    /// The job could not be submitted
    SubmissionFailed {
        /// Credential that attempted the submission
        credential: CredentialId,
        /// Diagnostic description
        reason: String,
    },
}

impl Outcome {
    /// Short kind label used in logs and events
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Images { .. } => "images",
            Outcome::Censored => "censored",
            Outcome::RemoteError { .. } => "remote_error",
            Outcome::Timeout { .. } => "timeout",
            Outcome::SubmissionFailed { .. } => "submission_failed",
        }
    }

    /// Convenience constructor for [`Outcome::RemoteError`]
    pub fn remote_error(reason: impl Into<String>) -> Self {
        Outcome::RemoteError {
            reason: reason.into(),
        }
    }
}

/// Everything known about a finished run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Local request id
    pub request_id: RequestId,
    /// Credential that served the request
    pub credential: CredentialId,
    /// Remote job id, if submission succeeded
    pub job_id: Option<JobId>,
    /// Terminal outcome
    pub outcome: Outcome,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the outcome was produced
    pub finished_at: DateTime<Utc>,
}

/// Event emitted during the generation lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A credential was selected for a request
    Dispatched {
        /// Local request id
        request_id: RequestId,
        /// Selected credential
        credential: CredentialId,
    },

    /// The remote accepted the job
    Submitted {
        /// Local request id
        request_id: RequestId,
        /// Remote job id
        job_id: JobId,
    },

    /// The run produced its terminal outcome
    Finished {
        /// Local request id
        request_id: RequestId,
        /// Serving credential
        credential: CredentialId,
        /// Outcome kind label (see [`Outcome::kind`])
        outcome: String,
    },

    /// Generator is shutting down
    Shutdown,
}
