use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use crate::config::RetryPolicy;
use crate::error::RetrieverError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, IF_NONE_MATCH};

/// Turns a successful body and its validator into a resource.
/// `None` means the body could not be decoded.
pub type ResourceBuilder<R> = Arc<dyn Fn(&[u8], Option<&str>) -> Option<R> + Send + Sync>;

/// Performs conditional, retryable GETs for one kind of resource.
///
/// Transient failures (no response, 408, 429, 5xx) are retried up to
/// [`RetryPolicy::max_retries`] times, waiting `retry_delay * attempt` before each
/// retry. Any other failure is returned right away. The retriever never touches storage.
pub struct ResourceRetriever<R, T: HttpTransport> {
    transport: T,
    builder: ResourceBuilder<R>,
    retry_policy: RetryPolicy,
    stopped: AtomicBool,
    stop_signal: Notify,
    _resource: PhantomData<fn() -> R>,
}

impl <R, T: HttpTransport> Debug for ResourceRetriever<R, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRetriever")
            .field("retry_policy", &self.retry_policy)
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl <R, T: HttpTransport> ResourceRetriever<R, T> {
    pub fn new<F>(transport: T, builder: F) -> Self
    where
        F: Fn(&[u8], Option<&str>) -> Option<R> + Send + Sync + 'static,
    {
        ResourceRetriever {
            transport,
            builder: Arc::new(builder),
            retry_policy: RetryPolicy::default(),
            stopped: AtomicBool::new(false),
            stop_signal: Notify::new(),
            _resource: PhantomData,
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Prevents any further attempt and interrupts a pending retry delay.
    /// A fetch in progress returns its last error instead of retrying.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.stop_signal.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Fetches the resource at `url`.
    ///
    /// With an `etag`, the request is conditional (`If-None-Match`) and bypasses any
    /// transport cache, so an unchanged resource comes back as
    /// `NonSuccessStatus(304)`.
    pub async fn get_resource(&self, url: &str, etag: Option<&str>) -> Result<R, RetrieverError> {
        let mut request = HttpRequest::get(url);
        if let Some(etag) = etag {
            request = request.with_header(IF_NONE_MATCH, etag);
            request.bypass_cache = true;
        }

        let mut attempt = 0u32;
        loop {
            if self.is_stopped() {
                debug!(url, "retriever stopped, no request sent");
                return Err(RetrieverError::Unknown);
            }
            debug!(url, attempt, conditional = etag.is_some(), "sending resource request");

            let error = match self.send_request(request.clone()).await {
                Ok(resource) => return Ok(resource),
                Err(error) => error
            };

            if !error.is_retryable() {
                debug!(url, %error, "resource request failed");
                return Err(error);
            }
            if attempt >= self.retry_policy.max_retries {
                warn!(url, %error, attempts = attempt + 1, "max retries exhausted");
                return Err(error);
            }

            attempt += 1;
            let delay = self.retry_policy.delay_for_attempt(attempt);
            debug!(url, attempt, delay_ms = delay.as_millis() as u64, %error, "retrying after transient error");
            // Registered before the stop flag is checked, so a concurrent `stop` always wakes it
            let stop = self.stop_signal.notified();
            tokio::pin!(stop);
            stop.as_mut().enable();
            if !self.is_stopped() {
                let _ = tokio::time::timeout(delay, stop).await;
            }
            if self.is_stopped() {
                debug!(url, "retriever stopped during retry delay");
                return Err(error);
            }
        }
    }

    async fn send_request(&self, request: HttpRequest) -> Result<R, RetrieverError> {
        match self.transport.send(request).await {
            Ok(response) => self.classify(response),
            Err(error) => {
                debug!(error = %error, "transport error");
                Err(RetrieverError::Unknown)
            }
        }
    }

    fn classify(&self, response: HttpResponse) -> Result<R, RetrieverError> {
        if !response.is_success() {
            return Err(RetrieverError::NonSuccessStatus(response.status));
        }
        let body = match response.body.as_deref() {
            Some(body) if !body.is_empty() => body,
            _ => return Err(RetrieverError::EmptyBody)
        };
        (self.builder)(body, response.etag()).ok_or(RetrieverError::CouldNotDecode)
    }
}
