//! Issue-tracker sink: create/close/reopen/comment over a generic issues API.

#![allow(clippy::module_name_repetitions)]

use serde::Deserialize;
use serde_json::json;
use soundoff_core::model::{FeedbackItem, RemoteRef, SinkKind};
use std::time::Duration;

use super::http::{HttpClient, is_state_conflict};
use super::{SinkAdapter, SinkCapabilities, SinkError};
use crate::config::IssueTrackerConfig;
use crate::status_map;

#[derive(Debug, Clone, Deserialize)]
struct CreatedIssue {
    id: i64,
    url: String,
}

pub struct IssueTrackerSink {
    http: HttpClient,
    base_url: String,
}

impl IssueTrackerSink {
    #[must_use]
    pub fn new(cfg: &IssueTrackerConfig, timeout: Duration) -> Self {
        Self {
            http: HttpClient::new(SinkKind::IssueTracker, cfg.token.clone(), timeout),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn set_state(&self, remote: &RemoteRef, state: &str) -> Result<(), SinkError> {
        let url = format!("{}/issues/{}/state", self.base_url, remote.external_id);
        match self.http.post_json_discard(&url, &json!({ "state": state })) {
            Ok(()) => Ok(()),
            // Already in the requested state: idempotent no-op.
            Err(err) if is_state_conflict(&err) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl SinkAdapter for IssueTrackerSink {
    fn kind(&self) -> SinkKind {
        SinkKind::IssueTracker
    }

    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities {
            create: true,
            close: true,
            reopen: true,
            comment: true,
            set_metric: false,
        }
    }

    fn create(&self, item: &FeedbackItem) -> Result<RemoteRef, SinkError> {
        let url = format!("{}/issues", self.base_url);
        let body = json!({
            "title": item.title,
            "body": item.description,
            "labels": item.category.as_deref().map_or_else(Vec::new, |c| vec![c]),
            "state": status_map::map(item.status, SinkKind::IssueTracker),
        });

        let response = self.http.post_json(&url, &body)?;
        let created: CreatedIssue = serde_json::from_value(response).map_err(|err| {
            SinkError::transport(SinkKind::IssueTracker, format!("decode created issue: {err}"))
        })?;

        Ok(RemoteRef {
            external_id: created.id.to_string(),
            url: created.url,
        })
    }

    fn close(&self, remote: &RemoteRef) -> Result<(), SinkError> {
        self.set_state(remote, "closed")
    }

    fn reopen(&self, remote: &RemoteRef) -> Result<(), SinkError> {
        self.set_state(remote, "open")
    }

    fn add_comment(&self, remote: &RemoteRef, body: &str) -> Result<(), SinkError> {
        let url = format!("{}/issues/{}/comments", self.base_url, remote.external_id);
        self.http.post_json_discard(&url, &json!({ "body": body }))
    }
}
