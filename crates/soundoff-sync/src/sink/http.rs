//! Shared HTTP plumbing for the sink adapters.
//!
//! Thin wrapper over a `ureq` agent: bearer auth, bounded per-call timeout,
//! and uniform mapping of vendor responses into [`SinkError`] with enough
//! detail to log and retry.

#![allow(clippy::module_name_repetitions)]

use serde_json::Value as JsonValue;
use soundoff_core::model::SinkKind;
use std::time::Duration;

use super::SinkError;

/// Cap on vendor error bodies carried into [`SinkError::detail`].
const MAX_ERROR_BODY: usize = 300;

pub struct HttpClient {
    kind: SinkKind,
    agent: ureq::Agent,
    token: Option<String>,
}

impl HttpClient {
    /// Build a client for one sink with a bounded per-call timeout.
    #[must_use]
    pub fn new(kind: SinkKind, token: Option<String>, timeout: Duration) -> Self {
        Self {
            kind,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            token,
        }
    }

    /// POST a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] carrying the vendor HTTP status for rejected
    /// calls, or a transport error without a status.
    pub fn post_json(&self, url: &str, body: &JsonValue) -> Result<JsonValue, SinkError> {
        let response = self
            .request("POST", url)
            .send_json(body.clone())
            .map_err(|err| self.map_error(url, err))?;

        response
            .into_json::<JsonValue>()
            .map_err(|err| SinkError::transport(self.kind, format!("decode {url}: {err}")))
    }

    /// POST a JSON body, ignoring the response payload.
    ///
    /// # Errors
    ///
    /// Same mapping as [`HttpClient::post_json`].
    pub fn post_json_discard(&self, url: &str, body: &JsonValue) -> Result<(), SinkError> {
        self.request("POST", url)
            .send_json(body.clone())
            .map_err(|err| self.map_error(url, err))?;
        Ok(())
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let mut request = self
            .agent
            .request(method, url)
            .set("Accept", "application/json")
            .set("User-Agent", "soundoff-sync");

        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        request
    }

    fn map_error(&self, url: &str, err: ureq::Error) -> SinkError {
        match err {
            ureq::Error::Status(code, response) => {
                let mut body = response.into_string().unwrap_or_default();
                truncate_on_char_boundary(&mut body, MAX_ERROR_BODY);
                SinkError::status(self.kind, code, format!("{url}: {body}"))
            }
            ureq::Error::Transport(transport) => {
                SinkError::transport(self.kind, format!("{url}: {transport}"))
            }
        }
    }
}

/// Truncate to at most `max` bytes without splitting a multibyte character.
/// `String::truncate` panics mid-character, and vendor error bodies are not
/// guaranteed to be ASCII.
fn truncate_on_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

/// Whether a failed call was a vendor "already in that state" rejection,
/// which idempotent close/reopen treats as success.
#[must_use]
pub const fn is_state_conflict(err: &SinkError) -> bool {
    matches!(err.status, Some(409))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn oversized_multibyte_error_body_is_truncated_without_panicking() {
        let client = HttpClient::new(SinkKind::IssueTracker, None, Duration::from_secs(1));

        // 299 ASCII bytes followed by a 3-byte character straddling the cap.
        let body = format!("{}\u{20ac}", "a".repeat(299));
        let response =
            ureq::Response::new(500, "Internal Server Error", &body).expect("build response");

        let err = client.map_error("https://issues.example/issues", ureq::Error::Status(500, response));
        assert_eq!(err.status, Some(500));
        assert!(err.detail.ends_with('a'), "partial character dropped whole");
        assert!(err.detail.len() <= "https://issues.example/issues: ".len() + MAX_ERROR_BODY);
    }

    #[test]
    fn char_boundary_truncation_is_a_no_op_under_the_cap() {
        let mut short = String::from("une erreur d\u{e9}taill\u{e9}e");
        let original = short.clone();
        truncate_on_char_boundary(&mut short, MAX_ERROR_BODY);
        assert_eq!(short, original);
    }

    #[test]
    fn state_conflict_matches_409_only() {
        let conflict = SinkError::status(SinkKind::IssueTracker, 409, "already closed");
        let rejected = SinkError::status(SinkKind::IssueTracker, 422, "bad field");
        let transport = SinkError::transport(SinkKind::IssueTracker, "timed out");

        assert!(is_state_conflict(&conflict));
        assert!(!is_state_conflict(&rejected));
        assert!(!is_state_conflict(&transport));
    }
}
