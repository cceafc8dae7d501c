use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use arc_swap::ArcSwapOption;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;
use crate::config::RefreshParameters;
use crate::error::RetrieverError;
use crate::refresher::{ResourceRefresher, ResourceRefresherDelegate};
use crate::resource::ItemsFile;
use crate::retriever::ResourceRetriever;
use crate::storage::DiskStorage;
use crate::transport::HttpTransport;

/// Where a list of items comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemsFileLocation {
    /// JSON array bundled with the host
    Local(PathBuf),
    /// Url of a JSON array
    Remote(String),
    None,
}

/// Receives the items once they are loaded, or an empty list when loading
/// failed and nothing is cached.
///
/// Callbacks must not call [`ItemsProvider::load_items`] on the provider that invoked them.
pub trait ItemsProviderDelegate<Item>: Send + Sync {
    fn did_load_items(&self, items: &[Item]);
}

/// Provides a list of items (blocklists, geofences, ...) from a local file or a
/// remote url, caching remote downloads for future launches.
///
/// A remote file is downloaded at most once per process. On later launches the cached
/// items are delivered immediately and the file is downloaded again only if its etag changed.
pub struct ItemsProvider<Item, T: HttpTransport> {
    location: ItemsFileLocation,
    refresher: Option<ResourceRefresher<ItemsFile<Item>, T>>,
    listener: Arc<ItemsListener<Item>>,
}

struct ItemsListener<Item> {
    id: String,
    delegate: ArcSwapOption<Weak<dyn ItemsProviderDelegate<Item>>>,
    loaded: AtomicBool,
}

impl <Item, T> ItemsProvider<Item, T>
where
    Item: Serialize + DeserializeOwned + Send + Sync + 'static,
    T: HttpTransport,
{
    pub fn new(
        id: impl Into<String>,
        location: ItemsFileLocation,
        transport: T,
        storage: Arc<dyn DiskStorage>,
        runtime: Handle,
    ) -> Self {
        let id = id.into();
        let refresher = match &location {
            ItemsFileLocation::Remote(url) if !url.trim().is_empty() => {
                let retriever = ResourceRetriever::new(transport, |data, etag| {
                    let items = serde_json::from_slice::<Vec<Item>>(data).ok()?;
                    Some(ItemsFile { etag: etag.map(str::to_owned), items })
                });
                let parameters = RefreshParameters::new(id.clone(), url.clone())
                    .with_refresh_interval(RefreshParameters::INFINITE)
                    .with_error_cooldown_base_interval(Some(RefreshParameters::INFINITE));
                Some(ResourceRefresher::new(retriever, storage, parameters, runtime))
            }
            _ => None
        };
        ItemsProvider {
            location,
            refresher,
            listener: Arc::new(ItemsListener {
                id,
                delegate: ArcSwapOption::empty(),
                loaded: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.listener.id
    }

    /// Loads the items and reports them to `delegate`, which is only weakly referenced.
    pub fn load_items<D>(&self, delegate: &Arc<D>)
    where
        D: ItemsProviderDelegate<Item> + 'static,
    {
        let weak = Arc::downgrade(delegate);
        let weak: Weak<dyn ItemsProviderDelegate<Item>> = weak;
        self.listener.delegate.store(Some(Arc::new(weak)));

        if let Some(refresher) = &self.refresher {
            refresher.set_delegate(&self.listener);
            refresher.request_refresh();
            return;
        }
        match &self.location {
            ItemsFileLocation::Local(path) => self.load_local_items(path),
            _ => self.listener.report_loaded_items(&[])
        }
    }

    fn load_local_items(&self, path: &Path) {
        let items = fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|data| serde_json::from_slice::<Vec<Item>>(&data).map_err(|e| e.to_string()));
        match items {
            Ok(items) => self.listener.report_loaded_items(&items),
            Err(error) => {
                warn!(id = %self.id(), path = %path.display(), %error, "failed to load local items");
                self.listener.report_loaded_items(&[]);
            }
        }
    }

    /// Items currently cached from the remote location, without any network request.
    pub fn cached_items(&self) -> Option<Vec<Item>> {
        self.refresher.as_ref()
            .and_then(ResourceRefresher::read_resource)
            .map(|file| file.items)
    }
}

impl <Item> ItemsListener<Item> {
    fn report_loaded_items(&self, items: &[Item]) {
        info!(id = %self.id, count = items.len(), "items loaded");
        if let Some(delegate) = self.delegate.load_full().and_then(|weak| weak.upgrade()) {
            delegate.did_load_items(items);
        }
    }
}

impl <Item: Send + Sync> ResourceRefresherDelegate<ItemsFile<Item>> for ItemsListener<Item> {
    fn did_load(&self, _id: &str, resource: &ItemsFile<Item>) {
        self.loaded.store(true, Ordering::SeqCst);
        self.report_loaded_items(&resource.items);
    }

    fn did_fail_to_load(&self, _id: &str, error: &RetrieverError) {
        // Items already delivered from cache stay valid
        if self.loaded.load(Ordering::SeqCst) {
            return;
        }
        warn!(id = %self.id, %error, "failed to load items");
        self.report_loaded_items(&[]);
    }
}
