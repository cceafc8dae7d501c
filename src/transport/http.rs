use std::collections::BTreeMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, PRAGMA};
use crate::error::TransportError;
use crate::transport::transport::{HttpRequest, HttpResponse, HttpTransport};

/// [`HttpTransport`] on top of a [`reqwest::Client`].
///
/// reqwest keeps no response cache of its own, so `bypass_cache` is forwarded to
/// intermediaries as `Cache-Control: no-cache`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        ReqwestTransport { client }
    }
}

impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut headers = HeaderMap::with_capacity(request.headers.len() + 2);
        for (name, value) in &request.headers {
            headers.insert(HeaderName::try_from(name.as_str())?, HeaderValue::from_str(value)?);
        }
        if request.bypass_cache {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        }

        let response = self.client.get(&request.url).headers(headers).send().await?;
        let status = response.status().as_u16();
        debug!(url = %request.url, status, "response received");

        let headers = response.headers().iter()
            .filter_map(|(name, value)| {
                // Header names from reqwest are already lower-cased
                value.to_str().ok().map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect::<BTreeMap<_, _>>();
        let bytes = response.bytes().await?;

        return Ok(HttpResponse {
            status,
            headers,
            body: if bytes.is_empty() { None } else { Some(bytes.to_vec()) },
        })
    }
}
