//! Notification sink: a chat webhook that announces feedback activity.
//!
//! Webhooks have no per-item remote state, so only `create` (the initial
//! announcement) and `comment` are supported. The recorded remote ref points
//! at the configured channel and reuses the feedback id as the external id —
//! it exists so re-running a bulk create stays a no-op like any other sink.

use serde_json::json;
use soundoff_core::model::{FeedbackItem, RemoteRef, SinkKind};
use std::time::Duration;

use super::http::HttpClient;
use super::{SinkAdapter, SinkCapabilities, SinkError};
use crate::config::NotificationConfig;
use crate::status_map;

pub struct NotificationSink {
    http: HttpClient,
    webhook_url: String,
    channel_url: Option<String>,
}

impl NotificationSink {
    #[must_use]
    pub fn new(cfg: &NotificationConfig, timeout: Duration) -> Self {
        Self {
            http: HttpClient::new(SinkKind::Notification, None, timeout),
            webhook_url: cfg.webhook_url.clone(),
            channel_url: cfg.channel_url.clone(),
        }
    }

    fn post_message(&self, text: &str) -> Result<(), SinkError> {
        self.http
            .post_json_discard(&self.webhook_url, &json!({ "text": text }))
    }
}

impl SinkAdapter for NotificationSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Notification
    }

    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities {
            create: true,
            comment: true,
            ..SinkCapabilities::default()
        }
    }

    fn create(&self, item: &FeedbackItem) -> Result<RemoteRef, SinkError> {
        let status = status_map::map(item.status, SinkKind::Notification);
        self.post_message(&format!(
            "New feedback: {} [{status}] ({} votes)",
            item.title, item.vote_count
        ))?;

        Ok(RemoteRef {
            external_id: item.id.to_string(),
            url: self.channel_url.clone().unwrap_or_default(),
        })
    }

    fn add_comment(&self, _remote: &RemoteRef, body: &str) -> Result<(), SinkError> {
        self.post_message(body)
    }
}
