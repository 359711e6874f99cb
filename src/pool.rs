//! Client pool initialization
//!
//! Every configured credential gets its own client. Pipeline resolution runs
//! for all of them at once, so startup takes as long as the slowest single
//! resolution. Clients whose resolution fails are dropped for the lifetime of
//! the process; an empty result is the only fatal startup condition.

use crate::client::{FusionClient, ImageBackend};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::CredentialId;
use futures::future::join_all;
use std::sync::Arc;

/// Non-empty, ordered set of clients with a resolved pipeline
///
/// Immutable once built. Order follows the order the backends were given in,
/// with failed entries removed.
#[derive(Clone)]
pub struct ClientPool {
    backends: Vec<Arc<dyn ImageBackend>>,
}

impl std::fmt::Debug for ClientPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientPool")
            .field("credentials", &self.credentials())
            .finish()
    }
}

impl ClientPool {
    /// Build one [`FusionClient`] per configured credential and initialize them
    ///
    /// All clients share a single `reqwest::Client` (and its connection pool).
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("imagen-dispatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let backends = config
            .credentials
            .iter()
            .map(|credential| {
                FusionClient::new(credential, config, http.clone())
                    .map(|client| Arc::new(client) as Arc<dyn ImageBackend>)
            })
            .collect::<Result<Vec<_>>>()?;

        Self::initialize(backends).await
    }

    /// Resolve the pipeline of every backend concurrently and keep the ones that succeed
    ///
    /// # Errors
    ///
    /// [`Error::NoUsableCredentials`] when not a single backend resolved.
    pub async fn initialize(backends: Vec<Arc<dyn ImageBackend>>) -> Result<Self> {
        let attempted = backends.len();
        tracing::info!(credentials = attempted, "initializing client pool");

        let results = join_all(backends.iter().map(|backend| backend.resolve_pipeline())).await;

        let mut usable = Vec::with_capacity(attempted);
        for (backend, result) in backends.into_iter().zip(results) {
            match result {
                Ok(pipeline_id) => {
                    tracing::info!(
                        credential = %backend.credential_id(),
                        pipeline_id = %pipeline_id,
                        "client ready"
                    );
                    usable.push(backend);
                }
                Err(e) => {
                    tracing::warn!(
                        credential = %backend.credential_id(),
                        error = %e,
                        "excluding client from pool"
                    );
                }
            }
        }

        if usable.is_empty() {
            tracing::error!(attempted, "no credential resolved a pipeline, cannot start");
            return Err(Error::NoUsableCredentials { attempted });
        }

        if usable.len() < attempted {
            tracing::warn!(
                usable = usable.len(),
                attempted,
                "client pool initialized with partial failures"
            );
        } else {
            tracing::info!(usable = usable.len(), "client pool initialized");
        }

        Ok(Self { backends: usable })
    }

    /// Number of usable clients (always at least one)
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Always `false`; a pool is never built empty
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Credentials in the pool, in dispatch order
    pub fn credentials(&self) -> Vec<CredentialId> {
        self.backends.iter().map(|b| b.credential_id()).collect()
    }

    pub(crate) fn into_backends(self) -> Vec<Arc<dyn ImageBackend>> {
        self.backends
    }
}
