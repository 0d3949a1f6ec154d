//! Task-tracker sink: the full capability set, including the numeric
//! custom field used for vote-count propagation.

#![allow(clippy::module_name_repetitions)]

use serde::Deserialize;
use serde_json::json;
use soundoff_core::model::{FeedbackItem, RemoteRef, SinkKind, Status};
use std::time::Duration;

use super::http::{HttpClient, is_state_conflict};
use super::{SinkAdapter, SinkCapabilities, SinkError};
use crate::config::TaskTrackerConfig;
use crate::status_map;

#[derive(Debug, Clone, Deserialize)]
struct CreatedTask {
    id: String,
    url: String,
}

pub struct TaskTrackerSink {
    http: HttpClient,
    base_url: String,
    vote_field_key: String,
}

impl TaskTrackerSink {
    #[must_use]
    pub fn new(cfg: &TaskTrackerConfig, timeout: Duration) -> Self {
        Self {
            http: HttpClient::new(SinkKind::TaskTracker, cfg.token.clone(), timeout),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            vote_field_key: cfg.vote_field_key.clone(),
        }
    }

    fn set_task_status(&self, remote: &RemoteRef, status: &str) -> Result<(), SinkError> {
        let url = format!("{}/tasks/{}/status", self.base_url, remote.external_id);
        match self.http.post_json_discard(&url, &json!({ "status": status })) {
            Ok(()) => Ok(()),
            Err(err) if is_state_conflict(&err) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl SinkAdapter for TaskTrackerSink {
    fn kind(&self) -> SinkKind {
        SinkKind::TaskTracker
    }

    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities::ALL
    }

    fn create(&self, item: &FeedbackItem) -> Result<RemoteRef, SinkError> {
        let url = format!("{}/tasks", self.base_url);
        let body = json!({
            "name": item.title,
            "description": item.description,
            "status": status_map::map(item.status, SinkKind::TaskTracker),
        });

        let response = self.http.post_json(&url, &body)?;
        let created: CreatedTask = serde_json::from_value(response).map_err(|err| {
            SinkError::transport(SinkKind::TaskTracker, format!("decode created task: {err}"))
        })?;

        Ok(RemoteRef {
            external_id: created.id,
            url: created.url,
        })
    }

    fn close(&self, remote: &RemoteRef) -> Result<(), SinkError> {
        self.set_task_status(remote, status_map::map(Status::Completed, SinkKind::TaskTracker))
    }

    fn reopen(&self, remote: &RemoteRef) -> Result<(), SinkError> {
        self.set_task_status(remote, status_map::map(Status::Approved, SinkKind::TaskTracker))
    }

    fn add_comment(&self, remote: &RemoteRef, body: &str) -> Result<(), SinkError> {
        let url = format!("{}/tasks/{}/comments", self.base_url, remote.external_id);
        self.http.post_json_discard(&url, &json!({ "comment_text": body }))
    }

    fn set_metric(&self, remote: &RemoteRef, field_key: &str, value: i64) -> Result<(), SinkError> {
        let url = format!("{}/tasks/{}/fields", self.base_url, remote.external_id);
        self.http
            .post_json_discard(&url, &json!({ "key": field_key, "value": value }))
    }

    fn vote_field_key(&self) -> Option<&str> {
        Some(&self.vote_field_key)
    }
}
