//! MiniMax response payloads and their decoding.
//!
//! Every MiniMax endpoint wraps its payload with a `base_resp` object whose
//! `status_code` is `0` on success. Generation status strings are decoded
//! into [`RemoteStatus`] here and nowhere else.

use framecast_core::remote::RemoteStatus;
use serde::Deserialize;

use crate::error::MiniMaxError;

/// Remote status string for a finished generation.
pub const STATUS_SUCCESS: &str = "Success";
/// Remote status string for a failed generation.
pub const STATUS_FAIL: &str = "Fail";

/// Envelope status common to every MiniMax response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaseResp {
    #[serde(default)]
    pub status_code: i64,
    #[serde(default)]
    pub status_msg: String,
}

/// Response of `POST /video_generation`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskResponse {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub base_resp: Option<BaseResp>,
}

/// Response of `GET /query/video_generation`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryTaskResponse {
    #[serde(default)]
    pub task_id: Option<String>,
    /// `Queueing`, `Preparing`, `Processing`, `Success` or `Fail`.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub base_resp: Option<BaseResp>,
}

/// Response of `GET /files/retrieve`.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveFileResponse {
    #[serde(default)]
    pub file: Option<FileObject>,
    #[serde(default)]
    pub base_resp: Option<BaseResp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
    #[serde(default)]
    pub file_id: Option<serde_json::Value>,
    #[serde(default)]
    pub download_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Reject a response whose `base_resp.status_code` is non-zero.
fn check_base(base: Option<&BaseResp>) -> Result<(), MiniMaxError> {
    match base {
        Some(base) if base.status_code != 0 => Err(MiniMaxError::Rejected {
            code: base.status_code,
            message: base.status_msg.clone(),
        }),
        _ => Ok(()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Extract the remote task id from a create-task body.
pub fn decode_create(body: &str) -> Result<String, MiniMaxError> {
    let resp: CreateTaskResponse = serde_json::from_str(body)
        .map_err(|e| MiniMaxError::Malformed(format!("create task: {e}: {body}")))?;
    check_base(resp.base_resp.as_ref())?;
    non_empty(resp.task_id)
        .ok_or_else(|| MiniMaxError::Malformed(format!("no task_id in response: {body}")))
}

/// Decode a query-task body into a [`RemoteStatus`].
///
/// A failed generation carries the raw body as its reason. A success
/// without a `file_id` cannot be materialized and is an error.
pub fn decode_query(body: &str) -> Result<RemoteStatus, MiniMaxError> {
    let resp: QueryTaskResponse = serde_json::from_str(body)
        .map_err(|e| MiniMaxError::Malformed(format!("query task: {e}: {body}")))?;

    match resp.status.as_str() {
        STATUS_SUCCESS => {
            check_base(resp.base_resp.as_ref())?;
            let artifact_ref = non_empty(resp.file_id).ok_or_else(|| {
                MiniMaxError::Malformed(format!("no file_id for finished task: {body}"))
            })?;
            Ok(RemoteStatus::Success { artifact_ref })
        }
        STATUS_FAIL => Ok(RemoteStatus::Failure {
            reason: format!("Task failed: {body}"),
        }),
        _ => {
            check_base(resp.base_resp.as_ref())?;
            Ok(RemoteStatus::Processing)
        }
    }
}

/// Extract the download URL from a retrieve-file body.
pub fn decode_retrieve(body: &str) -> Result<String, MiniMaxError> {
    let resp: RetrieveFileResponse = serde_json::from_str(body)
        .map_err(|e| MiniMaxError::Malformed(format!("retrieve file: {e}: {body}")))?;
    check_base(resp.base_resp.as_ref())?;
    non_empty(resp.file.and_then(|f| f.download_url))
        .ok_or_else(|| MiniMaxError::Malformed(format!("no download_url in response: {body}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn create_returns_task_id() {
        let body = r#"{"task_id":"106916112212032","base_resp":{"status_code":0,"status_msg":"success"}}"#;
        assert_eq!(decode_create(body).unwrap(), "106916112212032");
    }

    #[test]
    fn create_without_task_id_is_malformed() {
        let body = r#"{"task_id":"","base_resp":{"status_code":0,"status_msg":"success"}}"#;
        assert_matches!(decode_create(body), Err(MiniMaxError::Malformed(_)));
    }

    #[test]
    fn create_rejected_by_base_resp() {
        let body = r#"{"base_resp":{"status_code":1004,"status_msg":"authentication failed"}}"#;
        assert_matches!(
            decode_create(body),
            Err(MiniMaxError::Rejected { code: 1004, ref message }) if message == "authentication failed"
        );
    }

    #[test]
    fn create_with_non_json_body_is_malformed() {
        assert_matches!(decode_create("<html>"), Err(MiniMaxError::Malformed(_)));
    }

    #[test]
    fn query_in_progress_states_are_processing() {
        for status in ["Queueing", "Preparing", "Processing", ""] {
            let body = format!(r#"{{"task_id":"t","status":"{status}","file_id":""}}"#);
            assert_eq!(decode_query(&body).unwrap(), RemoteStatus::Processing);
        }
    }

    #[test]
    fn query_success_yields_file_id() {
        let body = r#"{"task_id":"t","status":"Success","file_id":"205258526306433","base_resp":{"status_code":0}}"#;
        assert_eq!(
            decode_query(body).unwrap(),
            RemoteStatus::Success {
                artifact_ref: "205258526306433".into()
            }
        );
    }

    #[test]
    fn query_success_without_file_id_is_malformed() {
        let body = r#"{"task_id":"t","status":"Success"}"#;
        assert_matches!(decode_query(body), Err(MiniMaxError::Malformed(_)));
    }

    #[test]
    fn query_fail_carries_raw_body() {
        let body = r#"{"task_id":"t","status":"Fail","base_resp":{"status_code":1026,"status_msg":"sensitive content"}}"#;
        assert_matches!(
            decode_query(body),
            Ok(RemoteStatus::Failure { ref reason }) if reason.contains("sensitive content")
        );
    }

    #[test]
    fn query_error_envelope_is_rejected() {
        let body = r#"{"status":"","base_resp":{"status_code":1002,"status_msg":"rate limit"}}"#;
        assert_matches!(decode_query(body), Err(MiniMaxError::Rejected { code: 1002, .. }));
    }

    #[test]
    fn retrieve_returns_download_url() {
        let body = r#"{"file":{"file_id":205258526306433,"download_url":"https://cdn.example/v.mp4"},"base_resp":{"status_code":0}}"#;
        assert_eq!(decode_retrieve(body).unwrap(), "https://cdn.example/v.mp4");
    }

    #[test]
    fn retrieve_without_url_is_malformed() {
        let body = r#"{"file":{"file_id":1},"base_resp":{"status_code":0}}"#;
        assert_matches!(decode_retrieve(body), Err(MiniMaxError::Malformed(_)));
    }
}
