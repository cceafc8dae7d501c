use serde::{Deserialize, Serialize};

/// A resource that remembers the validator (ETag) of the response it was built from.
///
/// The validator is sent back as `If-None-Match` on the next fetch, so the server can
/// answer `304 Not Modified` instead of resending an unchanged body.
pub trait EtagResource {
    fn etag(&self) -> Option<&str>;
}

/// A downloaded and cached list of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsFile<Item> {
    /// Used to avoid downloading the file again when it was not updated
    pub etag: Option<String>,
    pub items: Vec<Item>,
}

impl <Item> EtagResource for ItemsFile<Item> {
    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }
}
