use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, SystemTime};
use arc_swap::ArcSwapOption;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;
use crate::config::RefreshParameters;
use crate::cooldown::ErrorCooldown;
use crate::error::RetrieverError;
use crate::resource::EtagResource;
use crate::retriever::ResourceRetriever;
use crate::storage::DiskStorage;
use crate::transport::HttpTransport;

/// Observer of a [`ResourceRefresher`].
///
/// The refresher only keeps a weak reference to its delegate.
pub trait ResourceRefresherDelegate<R>: Send + Sync {
    /// A resource was loaded, either from the network or from the cache when the delegate was attached.
    fn did_load(&self, id: &str, resource: &R);

    /// A refresh failed after all retries.
    fn did_fail_to_load(&self, id: &str, error: &RetrieverError) {
        let _ = (id, error);
    }

    /// The server answered `304 Not Modified` and the cached resource is still current.
    fn did_validate_cache(&self, id: &str) {
        let _ = id;
    }
}

struct RefreshState {
    refresh_interval: Duration,
    fetching: bool,
    last_fetch: Option<SystemTime>,
    /// Validator of the last successfully loaded resource
    last_etag: Option<String>,
    /// Lazily computed from storage, then kept in memory
    is_file_cached: Option<bool>,
    /// A resource was loaded from the network in this process
    refreshed: bool,
    error_cooldown: Option<ErrorCooldown>,
}

type DelegateSlot<R> = ArcSwapOption<Weak<dyn ResourceRefresherDelegate<R>>>;

struct Inner<R, T: HttpTransport> {
    retriever: Arc<ResourceRetriever<R, T>>,
    storage: Arc<dyn DiskStorage>,
    parameters: RefreshParameters,
    state: Mutex<RefreshState>,
    /// Held while delegate callbacks are delivered, keeping them in load order
    delivery: Mutex<()>,
    delegate: DelegateSlot<R>,
    runtime: Handle,
}

/// Refreshes a single remote resource at regular intervals.
///
/// Refresh is requested from the outside with [`request_refresh`](Self::request_refresh),
/// but it is ignored while a fetch is in flight, before `refresh_interval` has elapsed,
/// or while the [`ErrorCooldown`] suppresses requests after failures.
/// Loaded resources are persisted in [`DiskStorage`] and served synchronously by
/// [`read_resource`](Self::read_resource), also across process restarts.
///
/// Fetches run on the injected tokio runtime. Dropping the refresher stops its retriever,
/// so a fetch still retrying gives up at its next step and its result is discarded.
pub struct ResourceRefresher<R, T: HttpTransport> {
    inner: Arc<Inner<R, T>>,
}

impl <R, T: HttpTransport> Debug for ResourceRefresher<R, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRefresher")
            .field("parameters", &self.inner.parameters)
            .finish_non_exhaustive()
    }
}

impl <R, T> ResourceRefresher<R, T>
where
    R: EtagResource + Serialize + DeserializeOwned + Send + Sync + 'static,
    T: HttpTransport,
{
    /// Error cooldown is derived from `error_cooldown_base_interval`, capped by `refresh_interval`.
    pub fn new(
        retriever: ResourceRetriever<R, T>,
        storage: Arc<dyn DiskStorage>,
        parameters: RefreshParameters,
        runtime: Handle,
    ) -> Self {
        let error_cooldown = ErrorCooldown::new(parameters.error_cooldown_base_interval, parameters.refresh_interval);
        Self::build(retriever, storage, parameters, error_cooldown, runtime)
    }

    pub fn with_error_cooldown(
        retriever: ResourceRetriever<R, T>,
        storage: Arc<dyn DiskStorage>,
        parameters: RefreshParameters,
        error_cooldown: ErrorCooldown,
        runtime: Handle,
    ) -> Self {
        Self::build(retriever, storage, parameters, Some(error_cooldown), runtime)
    }

    fn build(
        retriever: ResourceRetriever<R, T>,
        storage: Arc<dyn DiskStorage>,
        parameters: RefreshParameters,
        error_cooldown: Option<ErrorCooldown>,
        runtime: Handle,
    ) -> Self {
        let state = RefreshState {
            refresh_interval: parameters.refresh_interval,
            fetching: false,
            last_fetch: None,
            last_etag: None,
            is_file_cached: None,
            refreshed: false,
            error_cooldown,
        };
        ResourceRefresher {
            inner: Arc::new(Inner {
                retriever: Arc::new(retriever),
                storage,
                parameters,
                state: Mutex::new(state),
                delivery: Mutex::new(()),
                delegate: ArcSwapOption::empty(),
                runtime,
            })
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.parameters.id
    }

    /// Attaches the delegate. A resource already cached is reported to it right away,
    /// without any network request.
    ///
    /// Must not be called from one of this refresher's delegate callbacks.
    pub fn set_delegate<D>(&self, delegate: &Arc<D>)
    where
        D: ResourceRefresherDelegate<R> + 'static,
    {
        let weak = Arc::downgrade(delegate);
        let weak: Weak<dyn ResourceRefresherDelegate<R>> = weak;
        let _delivery = self.inner.lock_delivery();
        self.inner.delegate.store(Some(Arc::new(weak)));

        let cached = {
            let mut state = self.inner.lock_state();
            let cached = self.inner.read_resource();
            // A resource loaded from the network already owns the validator
            if let (Some(resource), false) = (&cached, state.refreshed) {
                state.is_file_cached = Some(true);
                state.last_etag = resource.etag().map(str::to_owned);
            }
            cached
        };
        if let (Some(resource), Some(delegate)) = (cached, self.inner.delegate()) {
            delegate.did_load(self.id(), &resource);
        }
    }

    pub fn clear_delegate(&self) {
        self.inner.delegate.store(None);
    }

    /// Synchronous read of the cached resource. Never hits the network.
    pub fn read_resource(&self) -> Option<R> {
        self.inner.read_resource()
    }

    pub fn should_refresh(&self) -> bool {
        let mut state = self.inner.lock_state();
        self.inner.should_refresh(&mut state)
    }

    /// Starts a fetch if [`should_refresh`](Self::should_refresh) allows it, otherwise does nothing.
    /// Requests arriving while a fetch is in flight are dropped, not queued.
    pub fn request_refresh(&self) {
        let etag = {
            let mut state = self.inner.lock_state();
            if !self.inner.should_refresh(&mut state) {
                debug!(id = %self.id(), "refresh not needed");
                return;
            }
            state.fetching = true;
            state.last_etag.clone()
        };
        info!(id = %self.id(), etag = ?etag, "refreshing resource");

        let retriever = self.inner.retriever.clone();
        let url = self.inner.parameters.url.clone();
        let inner = Arc::downgrade(&self.inner);
        self.inner.runtime.spawn(async move {
            let result = retriever.get_resource(&url, etag.as_deref()).await;
            match inner.upgrade() {
                Some(inner) => inner.complete_refresh(result),
                None => debug!(url = %url, "refresher dropped while fetching, result discarded")
            }
        });
    }

    /// Updates the refresh cadence, which also caps the error cooldown window.
    pub fn set_refresh_interval(&self, interval: Duration) {
        let mut state = self.inner.lock_state();
        state.refresh_interval = interval;
        if let Some(cooldown) = state.error_cooldown.as_mut() {
            cooldown.set_max_interval(interval);
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.inner.lock_state().refresh_interval
    }

    pub fn is_fetching(&self) -> bool {
        self.inner.lock_state().fetching
    }

    pub fn is_file_cached(&self) -> bool {
        let mut state = self.inner.lock_state();
        self.inner.is_file_cached(&mut state)
    }

    pub fn last_fetch(&self) -> Option<SystemTime> {
        self.inner.lock_state().last_fetch
    }

    /// Validator sent with the next conditional request.
    pub fn last_etag(&self) -> Option<String> {
        self.inner.lock_state().last_etag.clone()
    }

    pub fn error_cooldown(&self) -> Option<ErrorCooldown> {
        self.inner.lock_state().error_cooldown.clone()
    }
}

impl <R, T> Inner<R, T>
where
    R: EtagResource + Serialize + DeserializeOwned + Send + Sync + 'static,
    T: HttpTransport,
{
    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn delegate(&self) -> Option<Arc<dyn ResourceRefresherDelegate<R>>> {
        self.delegate.load_full().and_then(|weak| weak.upgrade())
    }

    fn should_refresh(&self, state: &mut RefreshState) -> bool {
        if state.fetching {
            return false;
        }
        let last_fetch = match state.last_fetch {
            Some(last_fetch) => last_fetch,
            None => return true
        };
        // Without a cache, failures are throttled by the cooldown alone
        if state.error_cooldown.is_some() && !self.is_file_cached(state) {
            return !state.error_cooldown.as_ref().is_some_and(|c| c.is_in_cooldown(last_fetch));
        }
        match last_fetch.checked_add(state.refresh_interval) {
            Some(next_fetch) => next_fetch <= SystemTime::now(),
            None => false
        }
    }

    fn is_file_cached(&self, state: &mut RefreshState) -> bool {
        match state.is_file_cached {
            Some(cached) => cached,
            None => {
                let cached = self.read_resource().is_some();
                state.is_file_cached = Some(cached);
                cached
            }
        }
    }

    fn has_cached_resource(&self) -> bool {
        let mut state = self.lock_state();
        self.is_file_cached(&mut state)
    }

    fn read_resource(&self) -> Option<R> {
        let key = self.parameters.storage_key();
        match self.storage.retrieve(key) {
            Ok(Some(data)) => match serde_json::from_slice(&data) {
                Ok(resource) => Some(resource),
                Err(error) => {
                    warn!(key, %error, "cached resource could not be decoded");
                    None
                }
            },
            Ok(None) => None,
            Err(error) => {
                warn!(key, %error, "cached resource could not be read");
                None
            }
        }
    }

    fn save_resource(&self, resource: &R) -> bool {
        let key = self.parameters.storage_key();
        let saved = serde_json::to_vec(resource)
            .map_err(Into::into)
            .and_then(|data| self.storage.save(key, &data));
        match saved {
            Ok(()) => true,
            Err(error) => {
                warn!(key, %error, "resource could not be persisted");
                false
            }
        }
    }

    fn complete_refresh(&self, result: Result<R, RetrieverError>) {
        let id = &self.parameters.id;
        let _delivery = self.lock_delivery();
        let cooldown_error = match result {
            Ok(resource) => {
                let saved = self.save_resource(&resource);
                info!(id = %id, etag = ?resource.etag(), "resource loaded");
                {
                    let mut state = self.lock_state();
                    state.is_file_cached = Some(saved);
                    state.last_etag = resource.etag().map(str::to_owned);
                    state.refreshed = true;
                }
                if let Some(delegate) = self.delegate() {
                    delegate.did_load(id, &resource);
                }
                None
            }
            Err(error) if error.is_not_modified() && self.has_cached_resource() => {
                debug!(id = %id, "resource not modified");
                if let Some(delegate) = self.delegate() {
                    delegate.did_validate_cache(id);
                }
                None
            }
            Err(error) => {
                warn!(id = %id, %error, "resource failed to load");
                if let Some(delegate) = self.delegate() {
                    delegate.did_fail_to_load(id, &error);
                }
                // 304 is an answer, not a failing endpoint
                if error.is_not_modified() { None } else { Some(error) }
            }
        };

        let mut state = self.lock_state();
        if let Some(cooldown) = state.error_cooldown.as_mut() {
            cooldown.new_cooldown_event(cooldown_error.as_ref());
        }
        state.last_fetch = Some(SystemTime::now());
        state.fetching = false;
    }
}

impl <R, T: HttpTransport> Drop for Inner<R, T> {
    fn drop(&mut self) {
        self.retriever.stop();
    }
}
