//! The per-request flow: dispatch, submit, poll, report.

use crate::client::ImageBackend;
use crate::types::{Event, GenerationReport, GenerationRequest, JobId, Outcome, RequestId};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;

use super::ImageGenerator;

impl ImageGenerator {
    /// Run one request to its terminal outcome in the current task
    ///
    /// This is the body of every detached run, exposed for callers that
    /// already manage their own tasks. It never fails: submission errors,
    /// remote failures, timeouts and panics inside the flow all end up as an
    /// [`Outcome`] in the returned report. Unlike
    /// [`generate`](Self::generate) it is not refused during shutdown.
    pub async fn run(&self, request: GenerationRequest) -> GenerationReport {
        let request_id = self.next_request_id();
        self.run_request(request_id, request).await
    }

    pub(crate) async fn run_request(
        &self,
        request_id: RequestId,
        request: GenerationRequest,
    ) -> GenerationReport {
        let started_at = Utc::now();
        let backend = self.dispatcher.select();
        let credential = backend.credential_id();
        self.emit_event(Event::Dispatched {
            request_id,
            credential,
        });

        let mut job_id = None;
        let flow = self.execute(request_id, backend.as_ref(), &request, &mut job_id);
        let outcome = match AssertUnwindSafe(flow).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(
                    request_id = %request_id,
                    credential = %credential,
                    panic = %message,
                    "generation run panicked"
                );
                Outcome::remote_error(format!("generation run faulted: {message}"))
            }
        };

        let report = GenerationReport {
            request_id,
            credential,
            job_id,
            outcome,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            request_id = %request_id,
            credential = %credential,
            outcome = report.outcome.kind(),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "generation run finished"
        );
        self.emit_finished(&report);
        report
    }

    async fn execute(
        &self,
        request_id: RequestId,
        backend: &dyn ImageBackend,
        request: &GenerationRequest,
        job_slot: &mut Option<JobId>,
    ) -> Outcome {
        let credential = backend.credential_id();

        let job_id = match backend.submit(request).await {
            Ok(job_id) => job_id,
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    credential = %credential,
                    error = %e,
                    "submission failed"
                );
                return Outcome::SubmissionFailed {
                    credential,
                    reason: e.to_string(),
                };
            }
        };

        self.emit_event(Event::Submitted {
            request_id,
            job_id: job_id.clone(),
        });
        *job_slot = Some(job_id.clone());

        backend.poll(&job_id, &self.config.polling).await
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
