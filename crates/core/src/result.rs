//! Per-backend and aggregate upload outcomes.

use serde::{Deserialize, Serialize};

/// Classification of a failed upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The input was rejected before any network call.
    Input,
    /// The request did not complete (connect, timeout, broken stream).
    Transport,
    /// The backend answered but rejected or mangled the upload.
    Backend,
    /// The upload was abandoned by the caller.
    Cancelled,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transport)
    }
}

/// Outcome of one upload against one backend.
///
/// `success` implies a non-empty `cid`; failure leaves `cid` empty and sets
/// `error`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub success: bool,
    #[serde(default)]
    pub cid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub error_kind: Option<ErrorKind>,
}

impl UploadResult {
    pub fn success(cid: impl Into<String>) -> Self {
        Self {
            success: true,
            cid: cid.into(),
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            cid: String::new(),
            error: Some(error.into()),
            error_kind: Some(kind),
        }
    }

    pub fn cancelled() -> Self {
        Self::failure(ErrorKind::Cancelled, "upload cancelled")
    }
}

/// Combined outcome of one upload fanned out to every backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateUploadResult {
    /// At least one backend succeeded.
    pub success: bool,
    /// CID of the first successful backend in registration order, empty
    /// when none succeeded.
    #[serde(default)]
    pub cid: String,
    #[serde(rename = "allNodesSucceeded")]
    pub all_succeeded: bool,
    /// One entry per backend, in registration order.
    pub results: Vec<(String, UploadResult)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AggregateUploadResult {
    pub fn from_results(results: Vec<(String, UploadResult)>) -> Self {
        let cid = results
            .iter()
            .find(|(_, r)| r.success)
            .map(|(_, r)| r.cid.clone());
        let success = cid.is_some();
        let cid = cid.unwrap_or_default();
        let all_succeeded = !results.is_empty() && results.iter().all(|(_, r)| r.success);
        let error = if success {
            None
        } else {
            let messages: Vec<String> = results
                .iter()
                .map(|(id, r)| format!("{id}: {}", r.error.as_deref().unwrap_or("unknown error")))
                .collect();
            Some(if messages.is_empty() {
                "no backends".to_string()
            } else {
                messages.join("; ")
            })
        };

        Self {
            success,
            cid,
            all_succeeded,
            results,
            error,
        }
    }

    pub fn get(&self, id: &str) -> Option<&UploadResult> {
        self.results.iter().find(|(k, _)| k == id).map(|(_, r)| r)
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.success).count()
    }

    /// CIDs reported by successful backends that disagree with the headline CID.
    pub fn divergent_cids(&self) -> Vec<(&str, &str)> {
        if !self.success {
            return Vec::new();
        }
        self.results
            .iter()
            .filter(|(_, r)| r.success && r.cid != self.cid)
            .map(|(id, r)| (id.as_str(), r.cid.as_str()))
            .collect()
    }
}
