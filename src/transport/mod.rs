/// Transport capability and request/response types
pub mod transport;

/// reqwest backed transport
#[cfg(feature = "http")]
pub mod http;

#[cfg(test)]
pub(crate) mod mock;

pub use transport::{HttpRequest, HttpResponse, HttpTransport, IF_NONE_MATCH};
