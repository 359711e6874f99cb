//! JSON shapes exchanged with the generation service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PipelineSelector;

/// One entry of the pipeline listing
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PipelineInfo {
    /// UUID string on current API versions, integer on older ones
    pub(crate) id: Option<Value>,
    pub(crate) name: Option<String>,
    pub(crate) status: Option<String>,
    #[serde(rename = "type")]
    pub(crate) kind: Option<String>,
    /// Number (3.1) on current API versions; absent on older ones
    pub(crate) version: Option<Value>,
}

impl PipelineInfo {
    /// Identifier rendered as a string, if present and scalar
    pub(crate) fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn version_number(&self) -> Option<f64> {
        match self.version.as_ref()? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn is_usable(&self, selector: &PipelineSelector) -> bool {
        self.status.as_deref() == Some(selector.status.as_str())
            && self.kind.as_deref() == Some(selector.kind.as_str())
            && self.id_string().is_some()
    }
}

/// Pick the pipeline matching `selector` from a listing
///
/// An exact version match wins. If none exists, the first usable entry
/// that carries no version field at all is taken, which keeps older API
/// shapes working. Entries with a different explicit version never match.
pub(crate) fn select_pipeline<'a>(
    pipelines: &'a [PipelineInfo],
    selector: &PipelineSelector,
) -> Option<&'a PipelineInfo> {
    let usable = || pipelines.iter().filter(|p| p.is_usable(selector));

    let Some(wanted) = selector.version else {
        return usable().next();
    };

    usable()
        .find(|p| {
            p.version_number()
                .is_some_and(|v| (v - wanted).abs() < 1e-9)
        })
        .or_else(|| usable().find(|p| p.version.is_none()))
}

/// `params` part of the run request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RunParams<'a> {
    #[serde(rename = "type")]
    pub(crate) kind: &'static str,
    pub(crate) num_images: u32,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) style: &'static str,
    pub(crate) generate_params: GenerateParams<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GenerateParams<'a> {
    pub(crate) query: &'a str,
}

/// Response to the run request
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RunResponse {
    pub(crate) uuid: Option<String>,
    #[serde(rename = "errorDescription")]
    pub(crate) error_description: Option<String>,
    pub(crate) pipeline_status: Option<String>,
}

/// Response to the status request
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StatusResponse {
    pub(crate) status: Option<String>,
    pub(crate) result: Option<StatusResult>,
    #[serde(rename = "errorDescription")]
    pub(crate) error_description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StatusResult {
    pub(crate) files: Option<Value>,
    /// Absent or null when moderation did not flag the result
    pub(crate) censored: Option<bool>,
}

impl StatusResult {
    pub(crate) fn is_censored(&self) -> bool {
        self.censored.unwrap_or(false)
    }

    /// Image payloads, if `files` is a non-empty list of strings
    pub(crate) fn payloads(&self) -> Option<Vec<String>> {
        let files = self.files.as_ref()?.as_array()?;
        if files.is_empty() {
            return None;
        }
        files
            .iter()
            .map(|f| f.as_str().map(str::to_string))
            .collect()
    }
}
