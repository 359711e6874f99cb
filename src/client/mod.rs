//! Credential client: one key/secret pair bound to one remote pipeline.
//!
//! Split into:
//! - [`ImageBackend`] - the seam the pool, dispatcher and generator talk to
//! - [`FusionClient`] - the HTTP implementation over `reqwest`
//! - `wire` - JSON request/response shapes

mod wire;


use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::config::{ApiConfig, Config, Credential, PipelineSelector, PollConfig};
use crate::error::{ClientError, Error, Result};
use crate::prompt::{char_len, truncate_prompt};
use crate::retry::{PollFinish, PollStep, poll_with_budget};
use crate::types::{CredentialId, GenerationRequest, JobId, Outcome, PipelineId};

use wire::{GenerateParams, PipelineInfo, RunParams, RunResponse, StatusResponse};

const PIPELINES_PATH: &str = "key/api/v1/pipelines";
const RUN_PATH: &str = "key/api/v1/pipeline/run";
const STATUS_PATH: &str = "key/api/v1/pipeline/status/";

/// Longest response body excerpt kept in error messages
const BODY_SNIPPET_CHARS: usize = 500;

/// Abstraction over one credential's access to the generation service
///
/// Implementations contain every transport and parsing failure: `submit`
/// and `resolve_pipeline` report them as [`ClientError`] values and `poll`
/// always settles on an [`Outcome`]. Nothing here panics on remote input.
#[async_trait::async_trait]
pub trait ImageBackend: Send + Sync {
    /// Credential this backend authenticates with
    fn credential_id(&self) -> CredentialId;

    /// Query the pipeline listing and bind to the matching pipeline
    async fn resolve_pipeline(&self) -> std::result::Result<PipelineId, ClientError>;

    /// Submit a generation job, resolving the pipeline first if still unbound
    async fn submit(&self, request: &GenerationRequest)
    -> std::result::Result<JobId, ClientError>;

    /// Poll a submitted job until it settles or the budget is spent
    async fn poll(&self, job_id: &JobId, config: &PollConfig) -> Outcome;
}

/// HTTP client for one credential
pub struct FusionClient {
    credential: CredentialId,
    http: reqwest::Client,
    base_url: Url,
    auth: HeaderMap,
    api: ApiConfig,
    selector: PipelineSelector,
    max_prompt_chars: usize,
    /// Written only by a successful resolution
    pipeline_id: RwLock<Option<PipelineId>>,
    /// Serializes lazy resolution so concurrent submits resolve once
    resolve_lock: Mutex<()>,
}

impl std::fmt::Debug for FusionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionClient")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl FusionClient {
    /// Create an unresolved client for `credential`
    ///
    /// `http` is shared by every client in the pool. Fails only if the
    /// credential cannot be carried in an HTTP header or the base URL is
    /// invalid.
    pub fn new(credential: &Credential, config: &Config, http: reqwest::Client) -> Result<Self> {
        let mut base = config.api.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| {
            Error::config(format!("invalid base URL '{base}': {e}"), "api.base_url")
        })?;

        let mut auth = HeaderMap::new();
        auth.insert(
            "x-key",
            sensitive_header(&format!("Key {}", credential.api_key), credential.id)?,
        );
        auth.insert(
            "x-secret",
            sensitive_header(&format!("Secret {}", credential.secret_key), credential.id)?,
        );

        Ok(Self {
            credential: credential.id,
            http,
            base_url,
            auth,
            api: config.api.clone(),
            selector: config.pipeline.clone(),
            max_prompt_chars: config.defaults.max_prompt_chars,
            pipeline_id: RwLock::new(None),
            resolve_lock: Mutex::new(()),
        })
    }

    /// Currently bound pipeline, if any
    pub async fn pipeline_id(&self) -> Option<PipelineId> {
        self.pipeline_id.read().await.clone()
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::UnexpectedResponse(format!("cannot build URL for {path}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        timeout: Duration,
    ) -> std::result::Result<T, ClientError> {
        let response = self
            .http
            .get(url)
            .headers(self.auth.clone())
            .timeout(timeout)
            .send()
            .await?;
        read_json(response).await
    }

    async fn fetch_pipeline(&self) -> std::result::Result<PipelineId, ClientError> {
        let url = self.endpoint(PIPELINES_PATH)?;
        let pipelines: Vec<PipelineInfo> = self.get_json(url, self.api.list_timeout).await?;

        let chosen =
            wire::select_pipeline(&pipelines, &self.selector).ok_or(ClientError::NoActivePipeline)?;
        let id = chosen.id_string().ok_or(ClientError::NoActivePipeline)?;

        tracing::info!(
            credential = %self.credential,
            pipeline_id = %id,
            pipeline_name = chosen.name.as_deref().unwrap_or("n/a"),
            "resolved pipeline"
        );
        Ok(PipelineId(id))
    }

    /// Return the bound pipeline, resolving it first if necessary
    async fn ensure_pipeline(&self) -> std::result::Result<PipelineId, ClientError> {
        if let Some(id) = self.pipeline_id.read().await.clone() {
            return Ok(id);
        }

        let _guard = self.resolve_lock.lock().await;
        // Another submit may have resolved while we waited
        if let Some(id) = self.pipeline_id.read().await.clone() {
            return Ok(id);
        }

        tracing::warn!(
            credential = %self.credential,
            "pipeline id not set, resolving before submission"
        );
        self.resolve_pipeline().await
    }

    async fn post_run(
        &self,
        pipeline: &PipelineId,
        request: &GenerationRequest,
    ) -> std::result::Result<JobId, ClientError> {
        let query = truncate_prompt(&request.prompt, self.max_prompt_chars);
        if query.len() != request.prompt.len() {
            tracing::warn!(
                credential = %self.credential,
                original_chars = char_len(&request.prompt),
                truncated_chars = char_len(&query),
                "prompt truncated to the remote limit"
            );
        }

        let params = RunParams {
            kind: "GENERATE",
            num_images: request.num_images,
            width: request.width,
            height: request.height,
            style: request.style.as_str(),
            generate_params: GenerateParams { query: &query },
        };
        let params_json = serde_json::to_string(&params)
            .map_err(|e| ClientError::UnexpectedResponse(format!("cannot encode params: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .text("pipeline_id", pipeline.0.clone())
            .part(
                "params",
                reqwest::multipart::Part::text(params_json).mime_str("application/json")?,
            );

        tracing::info!(
            credential = %self.credential,
            pipeline_id = %pipeline,
            width = request.width,
            height = request.height,
            style = %request.style,
            "submitting generation job"
        );

        let response = self
            .http
            .post(self.endpoint(RUN_PATH)?)
            .headers(self.auth.clone())
            .timeout(self.api.run_timeout)
            .multipart(form)
            .send()
            .await?;
        let body: RunResponse = read_json(response).await?;

        if let Some(uuid) = body.uuid.filter(|u| !u.is_empty()) {
            tracing::info!(credential = %self.credential, job_id = %uuid, "generation job accepted");
            return Ok(JobId(uuid));
        }
        if let Some(description) = body.error_description {
            return Err(ClientError::Api(description));
        }
        if let Some(status) = body.pipeline_status {
            return Err(ClientError::ServiceUnavailable(status));
        }
        Err(ClientError::UnexpectedResponse(
            "run response carried neither uuid nor error".to_string(),
        ))
    }

    /// One status request, mapped onto a poll step
    async fn check_status(
        &self,
        job_id: &JobId,
        attempt: u32,
        max_attempts: u32,
    ) -> std::result::Result<PollStep<Outcome>, ClientError> {
        let url = self.endpoint(&format!("{STATUS_PATH}{}", job_id.as_str()))?;
        let body: StatusResponse = self.get_json(url, self.api.status_timeout).await?;

        tracing::debug!(
            credential = %self.credential,
            job_id = %job_id,
            attempt,
            max_attempts,
            status = body.status.as_deref().unwrap_or("<missing>"),
            "job status"
        );

        let step = match body.status.as_deref() {
            Some("DONE") => {
                let result = body.result.unwrap_or_default();
                if result.is_censored() {
                    tracing::warn!(credential = %self.credential, job_id = %job_id, "result was censored");
                    PollStep::Ready(Outcome::Censored)
                } else if let Some(payloads) = result.payloads() {
                    tracing::info!(
                        credential = %self.credential,
                        job_id = %job_id,
                        images = payloads.len(),
                        "generation finished"
                    );
                    PollStep::Ready(Outcome::Images { payloads })
                } else {
                    tracing::error!(
                        credential = %self.credential,
                        job_id = %job_id,
                        "job DONE but result carries no image list"
                    );
                    PollStep::Ready(Outcome::remote_error("job finished without an image list"))
                }
            }
            Some("FAIL") => {
                let description = body
                    .error_description
                    .unwrap_or_else(|| "no error description".to_string());
                tracing::error!(
                    credential = %self.credential,
                    job_id = %job_id,
                    error = %description,
                    "generation failed remotely"
                );
                PollStep::Ready(Outcome::remote_error(description))
            }
            Some("INITIAL") | Some("PROCESSING") => PollStep::Pending,
            other => {
                // Unknown statuses keep polling and count against the budget
                tracing::warn!(
                    credential = %self.credential,
                    job_id = %job_id,
                    status = other.unwrap_or("<missing>"),
                    "unknown job status, continuing to poll"
                );
                PollStep::Pending
            }
        };
        Ok(step)
    }
}

#[async_trait::async_trait]
impl ImageBackend for FusionClient {
    fn credential_id(&self) -> CredentialId {
        self.credential
    }

    async fn resolve_pipeline(&self) -> std::result::Result<PipelineId, ClientError> {
        tracing::info!(credential = %self.credential, "requesting pipeline listing");
        match self.fetch_pipeline().await {
            Ok(id) => {
                *self.pipeline_id.write().await = Some(id.clone());
                Ok(id)
            }
            Err(e) => {
                tracing::error!(credential = %self.credential, error = %e, "pipeline resolution failed");
                Err(e)
            }
        }
    }

    async fn submit(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<JobId, ClientError> {
        let pipeline = self
            .ensure_pipeline()
            .await
            .map_err(|e| ClientError::PipelineUnresolved(e.to_string()))?;

        self.post_run(&pipeline, request).await.inspect_err(|e| {
            tracing::error!(credential = %self.credential, error = %e, "job submission failed");
        })
    }

    async fn poll(&self, job_id: &JobId, config: &PollConfig) -> Outcome {
        tracing::info!(
            credential = %self.credential,
            job_id = %job_id,
            max_attempts = config.max_attempts,
            delay_secs = config.delay.as_secs_f64(),
            "polling job status"
        );

        let max_attempts = config.max_attempts;
        let finish = poll_with_budget(config, move |attempt| {
            self.check_status(job_id, attempt, max_attempts)
        })
        .await;

        match finish {
            PollFinish::Ready { value, .. } => value,
            PollFinish::Exhausted { attempts } => {
                tracing::warn!(
                    credential = %self.credential,
                    job_id = %job_id,
                    attempts,
                    "poll budget exhausted"
                );
                Outcome::Timeout { attempts }
            }
            PollFinish::Aborted { error, .. } => Outcome::remote_error(error.to_string()),
        }
    }
}

fn sensitive_header(value: &str, credential: CredentialId) -> Result<HeaderValue> {
    let mut header = HeaderValue::from_str(value).map_err(|_| {
        Error::config(
            format!("credential {credential} contains characters not allowed in a header"),
            "credentials",
        )
    })?;
    header.set_sensitive(true);
    Ok(header)
}

async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> std::result::Result<T, ClientError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let text = String::from_utf8_lossy(&body);
        return Err(ClientError::HttpStatus {
            status: status.as_u16(),
            body: truncate_prompt(&text, BODY_SNIPPET_CHARS).into_owned(),
        });
    }

    serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
}
