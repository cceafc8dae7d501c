use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use crate::error::TransportError;
use crate::transport::transport::{HttpRequest, HttpResponse, HttpTransport};

#[derive(Debug, Clone)]
pub(crate) enum MockReply {
    Response(HttpResponse),
    Failure,
}

/// Scripted transport recording every request it receives.
///
/// Replies are consumed in order; the last one keeps being repeated.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockTransport {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    latency: Arc<Mutex<Duration>>,
}

impl MockTransport {
    pub(crate) fn replying(reply: MockReply) -> Self {
        let transport = MockTransport::default();
        transport.push(reply);
        transport
    }

    pub(crate) fn json(body: &str, etag: Option<&str>) -> MockReply {
        let mut response = HttpResponse::new(200).with_body(body.as_bytes());
        if let Some(etag) = etag {
            response = response.with_header("ETag", etag);
        }
        MockReply::Response(response)
    }

    pub(crate) fn status(status: u16) -> MockReply {
        MockReply::Response(HttpResponse::new(status))
    }

    pub(crate) fn push(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Replaces every scripted reply.
    pub(crate) fn set(&self, reply: MockReply) {
        let mut replies = self.replies.lock().unwrap();
        replies.clear();
        replies.push_back(reply);
    }

    pub(crate) fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 { replies.pop_front() } else { replies.front().cloned() }
        };
        match reply {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::Failure) | None => Err("connection refused".into())
        }
    }
}
