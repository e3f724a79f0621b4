//! Purpose: Outcome of one orchestrated scraping job.
//! Exports: `JobResult`, `JobFailure`, `extract_task_id`, `TASK_ID_UNAVAILABLE`.
//! Role: Recovered remote failures travel as data, not as `Err`.
//! Invariants: A `JobResult` is built once at the end of a call and never mutated.
//! Invariants: `JobFailure::parameters` echoes the caller's payload unchanged.
use serde::{Deserialize, Serialize};

use crate::core::decode::Decoded;
use crate::core::error::{Error, ErrorKind};
use crate::core::params::ParameterPayload;
use crate::core::registry::OperationDescriptor;

pub const TASK_ID_UNAVAILABLE: &str = "N/A";

#[derive(Clone, Debug, PartialEq)]
pub enum JobResult {
    Success(Decoded),
    Failure(JobFailure),
}

/// Structured record persisted in place of a result when a job fails.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub error: String,
    pub error_type: String,
    pub task_id: String,
    #[serde(rename = "spider_id")]
    pub job_type_id: String,
    pub parameters: ParameterPayload,
}

impl JobFailure {
    pub fn from_error(
        err: &Error,
        descriptor: &OperationDescriptor,
        parameters: ParameterPayload,
    ) -> Self {
        let error = err.detailed_message();
        let task_id = extract_task_id(&error).unwrap_or(TASK_ID_UNAVAILABLE).to_string();
        Self {
            error,
            error_type: err.kind().name().to_string(),
            task_id,
            job_type_id: descriptor.job_type_id.to_string(),
            parameters,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_name(&self.error_type).unwrap_or(ErrorKind::Remote)
    }

    pub fn into_error(self) -> Error {
        Error::new(self.kind()).with_message(self.error)
    }
}

/// Pulls `<id>` out of vendor messages shaped like `Task <id> ...` or `Task <id>: ...`.
pub fn extract_task_id(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("Task ")?;
    let token = rest.split_whitespace().next()?;
    let id = token.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '_');
    (!id.is_empty()).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::{JobFailure, TASK_ID_UNAVAILABLE, extract_task_id};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::params::{ParameterPayload, Params};
    use crate::core::registry::lookup;
    use serde_json::json;

    #[test]
    fn task_id_is_extracted_from_vendor_prefix() {
        assert_eq!(extract_task_id("Task 12345: timed out"), Some("12345"));
        assert_eq!(
            extract_task_id("Task ab-12_x failed with status Failed"),
            Some("ab-12_x")
        );
    }

    #[test]
    fn task_id_missing_for_other_formats() {
        assert_eq!(extract_task_id("request failed: connection refused"), None);
        assert_eq!(extract_task_id("Task"), None);
        assert_eq!(extract_task_id("Task :"), None);
        assert_eq!(extract_task_id("task 123 lowercase"), None);
    }

    #[test]
    fn failure_record_uses_vendor_field_names() {
        let op = lookup("post_by_posts_url").expect("op");
        let payload = ParameterPayload::from(Params::with_url("https://facebook.com/p/1"));
        let err = Error::new(ErrorKind::Timeout)
            .with_message("Task 987 did not complete within 600s");
        let failure = JobFailure::from_error(&err, op, payload);

        assert_eq!(
            serde_json::to_value(&failure).expect("json"),
            json!({
                "error": "Task 987 did not complete within 600s",
                "error_type": "Timeout",
                "task_id": "987",
                "spider_id": "facebook_post_by-posts-url",
                "parameters": {"url": "https://facebook.com/p/1"},
            })
        );
        assert_eq!(failure.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn failure_without_task_prefix_uses_sentinel() {
        let op = lookup("profile_by_profiles_url").expect("op");
        let err = Error::new(ErrorKind::Decode).with_message("empty response from server");
        let failure = JobFailure::from_error(
            &err,
            op,
            ParameterPayload::from(Params::with_url("https://facebook.com/zuck")),
        );
        assert_eq!(failure.task_id, TASK_ID_UNAVAILABLE);
        assert_eq!(failure.into_error().kind(), ErrorKind::Decode);
    }
}
