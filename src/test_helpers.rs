//! Scripted [`ImageBackend`] fakes shared by unit tests

use crate::client::ImageBackend;
use crate::config::PollConfig;
use crate::error::ClientError;
use crate::types::{CredentialId, GenerationRequest, JobId, Outcome, PipelineId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Backend whose every answer is fixed up front
pub(crate) struct ScriptedBackend {
    id: CredentialId,
    resolve_ok: bool,
    resolve_delay: Duration,
    submit_error: Option<String>,
    outcome: Outcome,
    poll_delay: Duration,
    panic_on_poll: bool,
    pub(crate) resolves: AtomicU32,
    pub(crate) submits: AtomicU32,
    pub(crate) polls: AtomicU32,
}

impl ScriptedBackend {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            id: CredentialId(id),
            resolve_ok: true,
            resolve_delay: Duration::ZERO,
            submit_error: None,
            outcome: Outcome::Images {
                payloads: vec![format!("payload-{id}")],
            },
            poll_delay: Duration::ZERO,
            panic_on_poll: false,
            resolves: AtomicU32::new(0),
            submits: AtomicU32::new(0),
            polls: AtomicU32::new(0),
        }
    }

    pub(crate) fn failing_resolution(mut self) -> Self {
        self.resolve_ok = false;
        self
    }

    pub(crate) fn with_resolve_delay(mut self, delay: Duration) -> Self {
        self.resolve_delay = delay;
        self
    }

    pub(crate) fn rejecting_submissions(mut self, reason: &str) -> Self {
        self.submit_error = Some(reason.to_string());
        self
    }

    pub(crate) fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub(crate) fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    pub(crate) fn panicking_on_poll(mut self) -> Self {
        self.panic_on_poll = true;
        self
    }

    pub(crate) fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

/// Erase a list of fakes into the trait objects the pool expects
pub(crate) fn as_backends(fakes: &[Arc<ScriptedBackend>]) -> Vec<Arc<dyn ImageBackend>> {
    fakes
        .iter()
        .map(|f| f.clone() as Arc<dyn ImageBackend>)
        .collect()
}

#[async_trait::async_trait]
impl ImageBackend for ScriptedBackend {
    fn credential_id(&self) -> CredentialId {
        self.id
    }

    async fn resolve_pipeline(&self) -> Result<PipelineId, ClientError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if !self.resolve_delay.is_zero() {
            tokio::time::sleep(self.resolve_delay).await;
        }
        if self.resolve_ok {
            Ok(PipelineId(format!("pipeline-{}", self.id)))
        } else {
            Err(ClientError::HttpStatus {
                status: 401,
                body: "invalid key".to_string(),
            })
        }
    }

    async fn submit(&self, _request: &GenerationRequest) -> Result<JobId, ClientError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        match &self.submit_error {
            Some(reason) => Err(ClientError::Api(reason.clone())),
            None => Ok(JobId(format!("job-{}-{n}", self.id))),
        }
    }

    async fn poll(&self, _job_id: &JobId, _config: &PollConfig) -> Outcome {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if !self.poll_delay.is_zero() {
            tokio::time::sleep(self.poll_delay).await;
        }
        if self.panic_on_poll {
            panic!("scripted poll panic");
        }
        self.outcome.clone()
    }
}
