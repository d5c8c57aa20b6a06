//! Inbox intake: authentication-shape validation, then enqueue.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{StatusCode, header};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use apserve_common::{AppResult, HostPolicy};

use crate::activity::InboxActivity;
use crate::context::{RejectReason, SignatureContext, SignaturePolicy};
use crate::gate::audit_rejection;
use crate::request::ApRequest;

/// Media types an inbox body may be sent as; parameters are ignored.
const INBOX_MEDIA_TYPES: [&str; 3] = [
    "application/activity+json",
    "application/ld+json",
    "application/json",
];

fn has_json_body(request: &ApRequest) -> bool {
    request
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|essence| {
            INBOX_MEDIA_TYPES
                .iter()
                .any(|t| essence.trim().eq_ignore_ascii_case(t))
        })
}

/// A received activity handed to the processing queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxJob {
    pub activity: InboxActivity,
    pub signature: SignatureContext,
    /// The signer's host is silenced.
    pub silenced: bool,
    pub request_id: String,
    pub received_at: DateTime<Utc>,
}

/// Destination for accepted inbox activities.
#[async_trait]
pub trait InboxQueue: Send + Sync {
    async fn enqueue(&self, job: InboxJob) -> AppResult<()>;
}

/// Handles `POST` to the shared and per-user inboxes.
#[derive(Clone)]
pub struct InboxIntake {
    queue: Arc<dyn InboxQueue>,
    hosts: HostPolicy,
    signature_policy: SignaturePolicy,
}

impl InboxIntake {
    #[must_use]
    pub fn new(
        queue: Arc<dyn InboxQueue>,
        hosts: HostPolicy,
        signature_policy: SignaturePolicy,
    ) -> Self {
        Self {
            queue,
            hosts,
            signature_policy,
        }
    }

    /// Validate and enqueue one inbox delivery, returning the response status.
    pub async fn handle(&self, request: &ApRequest, body: Bytes) -> StatusCode {
        if !has_json_body(request) {
            debug!(
                request_id = %request.request_id,
                content_type = ?request.headers.get(header::CONTENT_TYPE),
                "Rejecting inbox body with unsupported media type"
            );
            return StatusCode::UNSUPPORTED_MEDIA_TYPE;
        }

        let context = match SignatureContext::parse(request, Some(&body), &self.signature_policy) {
            Ok(context) => context,
            Err(reason) => {
                audit_rejection(request, None, reason);
                return reason.status();
            }
        };

        let key_host = context.key_host();
        if key_host.as_deref().is_some_and(|h| self.hosts.is_blocked(h)) {
            audit_rejection(request, Some(&context.key_id), RejectReason::BlockedHost);
            return RejectReason::BlockedHost.status();
        }

        let activity = match InboxActivity::parse(&body) {
            Ok(activity) => activity,
            Err(e) => {
                debug!(
                    request_id = %request.request_id,
                    key_id = %context.key_id,
                    error = %e,
                    "Rejecting invalid inbox activity"
                );
                return StatusCode::BAD_REQUEST;
            }
        };

        let silenced = key_host.as_deref().is_some_and(|h| self.hosts.is_silenced(h));
        let kind = activity.kind().to_string();
        let key_id = context.key_id.clone();
        let job = InboxJob {
            activity,
            signature: context,
            silenced,
            request_id: request.request_id.clone(),
            received_at: Utc::now(),
        };

        if let Err(e) = self.queue.enqueue(job).await {
            error!(request_id = %request.request_id, error = %e, "Failed to enqueue inbox activity");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }

        debug!(
            request_id = %request.request_id,
            key_id = %key_id,
            activity_type = %kind,
            silenced,
            "Inbox activity queued"
        );
        StatusCode::ACCEPTED
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::signature::HttpSigner;
    use crate::test_utils::{RecordingQueue, TestKeys};
    use apserve_common::HostLists;
    use axum::http::{HeaderValue, Method};
    use serde_json::json;
    use url::Url;

    const KEY_ID: &str = "https://remote.example/users/alice#main-key";
    const ACTIVITY_JSON: &str = "application/activity+json";

    fn intake(queue: &Arc<RecordingQueue>, blocked: &[&str], silenced: &[&str]) -> InboxIntake {
        let lists = HostLists::new(
            blocked.iter().map(ToString::to_string),
            silenced.iter().map(ToString::to_string),
        );
        InboxIntake::new(
            queue.clone(),
            HostPolicy::new(lists),
            SignaturePolicy::new("local.example", 300),
        )
    }

    fn follow_body() -> Bytes {
        Bytes::from(
            json!({
                "type": "Follow",
                "actor": "https://remote.example/users/alice",
                "object": "https://local.example/users/bob"
            })
            .to_string(),
        )
    }

    fn signed_post(key_id: &str, body: &[u8]) -> ApRequest {
        let keys = TestKeys::shared();
        let signer = HttpSigner::new(&keys.private_pem, key_id.to_string()).unwrap();
        let url = Url::parse("https://local.example/inbox").unwrap();
        let mut headers = signer.sign_request("POST", &url, Some(body)).unwrap();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(ACTIVITY_JSON));
        ApRequest::new(Method::POST, "/inbox".parse().unwrap(), headers)
    }

    #[tokio::test]
    async fn test_valid_post_is_queued() {
        let queue = Arc::new(RecordingQueue::default());
        let body = follow_body();
        let request = signed_post(KEY_ID, &body);

        let status = intake(&queue, &[], &[]).handle(&request, body).await;

        assert_eq!(status, StatusCode::ACCEPTED);
        let jobs = queue.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].activity.kind(), "Follow");
        assert_eq!(jobs[0].signature.key_id, KEY_ID);
        assert!(!jobs[0].silenced);
    }

    #[tokio::test]
    async fn test_digest_mismatch_is_not_queued() {
        let queue = Arc::new(RecordingQueue::default());
        let request = signed_post(KEY_ID, &follow_body());
        let tampered = Bytes::from_static(br#"{"type":"Delete","actor":"x","object":"y"}"#);

        let status = intake(&queue, &[], &[]).handle(&request, tampered).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_unsigned_and_malformed() {
        let queue = Arc::new(RecordingQueue::default());
        let intake = intake(&queue, &[], &[]);

        let mut unsigned = ApRequest::new(Method::POST, "/inbox".parse().unwrap(), Default::default());
        unsigned
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(ACTIVITY_JSON));
        assert_eq!(
            intake.handle(&unsigned, follow_body()).await,
            StatusCode::UNAUTHORIZED
        );

        let mut garbled = signed_post(KEY_ID, &follow_body());
        garbled
            .headers
            .insert("signature", HeaderValue::from_static("garbage"));
        assert_eq!(
            intake.handle(&garbled, follow_body()).await,
            StatusCode::UNAUTHORIZED
        );
        assert!(queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_media_types() {
        let queue = Arc::new(RecordingQueue::default());
        let intake = intake(&queue, &[], &[]);
        let body = follow_body();

        for content_type in [
            "application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\"",
            "application/json; charset=utf-8",
            "Application/Activity+JSON",
        ] {
            let mut request = signed_post(KEY_ID, &body);
            request
                .headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
            assert_eq!(intake.handle(&request, body.clone()).await, StatusCode::ACCEPTED);
        }

        let mut text = signed_post(KEY_ID, &body);
        text.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert_eq!(
            intake.handle(&text, body.clone()).await,
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );

        let mut missing = signed_post(KEY_ID, &body);
        missing.headers.remove(header::CONTENT_TYPE);
        assert_eq!(
            intake.handle(&missing, body).await,
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(queue.jobs().len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_activity_is_bad_request() {
        let queue = Arc::new(RecordingQueue::default());
        let body = Bytes::from_static(br#"{"type":"Create","actor":"https://remote.example/users/alice"}"#);
        let request = signed_post(KEY_ID, &body);

        let status = intake(&queue, &[], &[]).handle(&request, body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(queue.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_blocked_and_silenced_hosts() {
        let queue = Arc::new(RecordingQueue::default());
        let body = follow_body();

        let blocked = intake(&queue, &["remote.example"], &[]);
        let status = blocked.handle(&signed_post(KEY_ID, &body), body.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(queue.jobs().is_empty());

        let silenced = intake(&queue, &[], &["remote.example"]);
        let status = silenced.handle(&signed_post(KEY_ID, &body), body).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(queue.jobs()[0].silenced);
    }

    #[tokio::test]
    async fn test_enqueue_failure_is_server_error() {
        let queue = Arc::new(RecordingQueue::failing());
        let body = follow_body();
        let request = signed_post(KEY_ID, &body);

        let status = intake(&queue, &[], &[]).handle(&request, body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
