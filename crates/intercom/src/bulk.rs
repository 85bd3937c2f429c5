//! Bulk job handles.
//!
//! Intercom processes bulk uploads asynchronously. Submitting one returns a
//! job record; progress is polled with the job id.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::client::IntercomApi;
use crate::error::Result;

/// Job state as reported by Intercom.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<JobLinks>,
}

/// Links Intercom attaches to a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobLinks {
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Whether Intercom has stopped working on this job.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(
            self.state.as_deref(),
            Some("completed" | "completed_with_errors" | "failed")
        )
    }
}

/// Handle to a submitted bulk job, bound to the client that created it.
#[derive(Clone)]
pub struct BulkJob {
    id: String,
    client: Arc<dyn IntercomApi>,
}

impl BulkJob {
    #[must_use]
    pub fn new(client: Arc<dyn IntercomApi>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Poll the job's current state.
    pub async fn status(&self) -> Result<Job> {
        self.client.job(&self.id).await
    }

    /// Fetch the per-item errors Intercom recorded for this job.
    pub async fn errors(&self) -> Result<serde_json::Value> {
        self.client.job_errors(&self.id).await
    }
}

impl std::fmt::Debug for BulkJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkJob").field("id", &self.id).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_deserialize() {
        let json = r#"{
            "type": "job",
            "id": "job_5ca1ab1eca11ab1e",
            "app_id": "app_or_workspace_id",
            "updated_at": 1446033421,
            "completed_at": 1446048736,
            "name": "api_bulk_job",
            "state": "completed",
            "links": {
                "error": "https://api.intercom.io/jobs/job_5ca1ab1eca11ab1e/error",
                "self": "https://api.intercom.io/jobs/job_5ca1ab1eca11ab1e"
            }
        }"#;

        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.id, "job_5ca1ab1eca11ab1e");
        assert!(job.is_finished());
        assert_eq!(
            job.links.unwrap().self_link.as_deref(),
            Some("https://api.intercom.io/jobs/job_5ca1ab1eca11ab1e")
        );
    }

    #[test]
    fn test_running_job_not_finished() {
        let job = Job {
            id: "job_1".to_string(),
            state: Some("running".to_string()),
            ..Job::default()
        };
        assert!(!job.is_finished());
        assert!(!Job::default().is_finished());
    }
}
