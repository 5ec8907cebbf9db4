//! Hot-fix host context and loader
//!
//! `HotfixHost` owns the load state, the published domain handle, the
//! behaviour registry, and the collaborators a load needs. A load runs:
//!
//! 1. Guard `NotLoaded -> Loading` under one lock
//! 2. Create a fresh domain
//! 3. Fetch and decode the module (and symbols outside production)
//! 4. Parse the bundle into the domain
//! 5. Register native bindings, install the exception hook, start the
//!    debug bridge outside production
//! 6. Publish the domain and set `Loaded`
//! 7. Scan behaviours and invoke the entry point
//!
//! Only the fetches in step 3 suspend. A failure in steps 3 to 5, or dropping
//! the load future, returns the state to `NotLoaded`. So does a `dispose`
//! that lands while the load is in flight: the prepared domain is released
//! instead of published. A failure in step 7 leaves the domain published.

use hotfix_engine::{Domain, HotFixBundle, NativeFunctionRegistry};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::artifact::{ArtifactKind, ArtifactLayout};
use crate::behaviours::BehaviourRegistry;
use crate::codec::HotfixCodec;
use crate::config::{FetchMode, HotfixConfig};
use crate::configurator::Configurator;
use crate::debug_bridge::DebugBridge;
use crate::entry::EntryInvoker;
use crate::error::{DomainAccess, HotfixError, HotfixResult, Severity};
use crate::fetcher::{ArtifactFetcher, FileFetcher};
use crate::sink::{ExceptionSink, TracingSink};

/// Hot-fix load state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// No load attempted, or the last attempt failed, or the host was reset
    NotLoaded,
    /// A load is in flight
    Loading,
    /// A domain is published
    Loaded,
}

#[derive(Debug)]
struct HostState {
    load: LoadState,
    domain: Option<Arc<Domain>>,
    // Set by `dispose` during `Loading`, consumed at publication.
    dispose_requested: bool,
}

/// Builder for [`HotfixHost`]
pub struct HotfixHostBuilder {
    config: HotfixConfig,
    configurator: Option<Arc<dyn Configurator>>,
    duplicate_configurator: bool,
    fetcher: Option<Arc<dyn ArtifactFetcher>>,
    codec: Option<HotfixCodec>,
    natives: NativeFunctionRegistry,
    sink: Arc<dyn ExceptionSink>,
}

impl HotfixHostBuilder {
    /// Builder with the given configuration
    pub fn new(config: HotfixConfig) -> Self {
        Self {
            config,
            configurator: None,
            duplicate_configurator: false,
            fetcher: None,
            codec: None,
            natives: NativeFunctionRegistry::new(),
            sink: Arc::new(TracingSink),
        }
    }

    /// Register the configurator. Registering a second one fails `build`.
    pub fn configurator(mut self, configurator: Arc<dyn Configurator>) -> Self {
        if self.configurator.is_some() {
            self.duplicate_configurator = true;
        } else {
            self.configurator = Some(configurator);
        }
        self
    }

    /// Artifact fetcher (defaults to a `FileFetcher` at `artifacts.root`)
    pub fn fetcher(mut self, fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Codec (defaults to the build secret)
    pub fn codec(mut self, codec: HotfixCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Host functions linked into every loaded domain
    pub fn natives(mut self, natives: NativeFunctionRegistry) -> Self {
        self.natives = natives;
        self
    }

    /// Exception report destination (defaults to `TracingSink`)
    pub fn sink(mut self, sink: Arc<dyn ExceptionSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validate and build the host
    pub fn build(self) -> HotfixResult<HotfixHost> {
        if self.duplicate_configurator {
            return Err(HotfixError::ConfiguratorAlreadyRegistered);
        }
        let configurator = self.configurator.ok_or(HotfixError::ConfiguratorMissing)?;
        self.config.validate()?;

        let codec = match self.codec {
            Some(codec) => codec,
            None => HotfixCodec::from_build_secret().map_err(HotfixError::Codec)?,
        };
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(FileFetcher::new(&self.config.artifacts.root)));

        Ok(HotfixHost {
            layout: ArtifactLayout::new(&self.config.artifacts),
            config: self.config,
            configurator,
            fetcher,
            codec,
            natives: self.natives,
            sink: self.sink,
            state: Mutex::new(HostState {
                load: LoadState::NotLoaded,
                domain: None,
                dispose_requested: false,
            }),
            live: AtomicBool::new(false),
            behaviours: BehaviourRegistry::new(),
            bridge: Mutex::new(None),
        })
    }
}

/// Owner of one hot-fix module lifecycle
pub struct HotfixHost {
    config: HotfixConfig,
    layout: ArtifactLayout,
    configurator: Arc<dyn Configurator>,
    fetcher: Arc<dyn ArtifactFetcher>,
    codec: HotfixCodec,
    natives: NativeFunctionRegistry,
    sink: Arc<dyn ExceptionSink>,
    state: Mutex<HostState>,
    live: AtomicBool,
    behaviours: BehaviourRegistry,
    bridge: Mutex<Option<DebugBridge>>,
}

impl std::fmt::Debug for HotfixHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotfixHost")
            .field("state", &self.state())
            .field("live", &self.is_live())
            .field("behaviours", &self.behaviours.len())
            .finish_non_exhaustive()
    }
}

// Returns the host to NotLoaded unless disarmed after publication.
struct LoadingGuard<'h> {
    host: &'h HotfixHost,
    armed: bool,
}

impl LoadingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.host.state.lock();
        if state.load == LoadState::Loading {
            state.load = LoadState::NotLoaded;
            debug!("load attempt abandoned, state reset to NotLoaded");
        }
    }
}

impl HotfixHost {
    /// Start building a host
    pub fn builder(config: HotfixConfig) -> HotfixHostBuilder {
        HotfixHostBuilder::new(config)
    }

    /// Current load state
    pub fn state(&self) -> LoadState {
        self.state.lock().load
    }

    /// Whether the host has started running
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Mark the host as running (or not)
    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }

    /// Configuration
    pub fn config(&self) -> &HotfixConfig {
        &self.config
    }

    /// Artifact naming
    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// The registered configurator
    pub fn configurator(&self) -> &Arc<dyn Configurator> {
        &self.configurator
    }

    /// Behaviours discovered by the last successful load
    pub fn behaviours(&self) -> &BehaviourRegistry {
        &self.behaviours
    }

    /// Address of the running debug bridge
    pub fn debug_bridge_addr(&self) -> Option<SocketAddr> {
        self.bridge.lock().as_ref().map(DebugBridge::local_addr)
    }

    /// The published domain
    pub fn domain(&self) -> HotfixResult<Arc<Domain>> {
        if let Some(domain) = self.state.lock().domain.clone() {
            return Ok(domain);
        }
        let access = if self.is_live() {
            DomainAccess::LiveButUnloaded
        } else {
            DomainAccess::NotRunning
        };
        Err(HotfixError::DomainAccessedBeforeLoad(access))
    }

    /// Load the hot-fix module. See the module docs for the sequence.
    pub async fn begin_load(&self) -> HotfixResult<()> {
        self.set_live(true);
        {
            let mut state = self.state.lock();
            if state.load != LoadState::NotLoaded {
                let observed = state.load;
                drop(state);
                warn!(
                    state = ?observed,
                    "hot-fix load already attempted; dispose and reset before loading again"
                );
                return Err(HotfixError::DoubleLoadAttempted { state: observed });
            }
            state.load = LoadState::Loading;
            state.dispose_requested = false;
        }
        let guard = LoadingGuard {
            host: self,
            armed: true,
        };

        let domain = match self.prepare_domain().await {
            Ok(domain) => domain,
            Err(err) => {
                error!(error = %err, "hot-fix load failed");
                return Err(err);
            }
        };

        let abandoned = {
            let mut state = self.state.lock();
            if state.dispose_requested {
                state.dispose_requested = false;
                state.load = LoadState::NotLoaded;
                true
            } else {
                state.domain = Some(domain.clone());
                state.load = LoadState::Loaded;
                false
            }
        };
        guard.disarm();
        if abandoned {
            self.release(Some(domain));
            warn!("host disposed during load, prepared domain released");
            return Err(HotfixError::LoadAbandoned);
        }
        info!(
            module = domain.module_name().as_deref().unwrap_or_default(),
            checksum = domain.module_checksum().as_deref().unwrap_or_default(),
            "hot-fix loaded"
        );

        self.activate(&domain).inspect_err(|err| match err.severity() {
            Severity::Fatal => error!(error = %err, "hot-fix activation aborted"),
            _ => error!(error = %err, "hot-fix activation failed"),
        })
    }

    // Steps 2 to 5. Nothing is published here.
    async fn prepare_domain(&self) -> HotfixResult<Arc<Domain>> {
        let domain = Arc::new(Domain::new());
        let bundle = self.fetch_bundle().await?;
        domain.load_module(bundle)?;
        domain
            .register_bindings(&self.natives)
            .map_err(HotfixError::BindingFailure)?;
        self.attach_debug(&domain);
        Ok(domain)
    }

    async fn fetch_bundle(&self) -> HotfixResult<HotFixBundle> {
        let module = self.fetch_artifact(ArtifactKind::Module).await?;
        let mut bundle = HotFixBundle::new(module);
        if !self.config.loader.profile.is_production() {
            bundle = bundle.with_symbols(self.fetch_artifact(ArtifactKind::Symbols).await?);
        }
        Ok(bundle)
    }

    async fn fetch_artifact(&self, kind: ArtifactKind) -> HotfixResult<Vec<u8>> {
        let path = self.layout.logical_path(kind);
        debug!(%kind, %path, mode = ?self.config.loader.fetch_mode, "fetching artifact");

        let fetched = match self.config.loader.fetch_mode {
            FetchMode::Sync => self.fetcher.load_sync(&path),
            FetchMode::Async => {
                let timeout = self.config.loader.fetch_timeout();
                tokio::time::timeout(timeout, self.fetcher.load_async(&path))
                    .await
                    .map_err(|_| HotfixError::FetchTimeout {
                        kind,
                        timeout_ms: self.config.loader.fetch_timeout_ms,
                    })?
            }
        };
        let encoded = fetched.map_err(|source| HotfixError::Fetch { kind, source })?;

        self.codec
            .decode(&encoded)
            .map_err(|source| HotfixError::CodecDecodeFailure { kind, source })
    }

    fn attach_debug(&self, domain: &Domain) {
        let production = self.config.loader.profile.is_production();
        let sink = self.sink.clone();
        domain.debug_service().add_exception_observer(move |exception| {
            let report = format!("DomainException:\n{}", exception.report());
            sink.surface(&report);
            if production {
                sink.remote(&report);
            }
        });

        if production {
            return;
        }
        domain.debug_service().tag_main_thread();
        let started = self
            .config
            .debug
            .socket_addr()
            .map_err(HotfixError::from)
            .and_then(|addr| {
                DebugBridge::start(
                    addr,
                    domain.debug_service(),
                    &domain.module_name().unwrap_or_default(),
                )
            });
        match started {
            Ok(bridge) => *self.bridge.lock() = Some(bridge),
            Err(err) => warn!(error = %err, "debug bridge unavailable, continuing without it"),
        }
    }

    // Step 7
    fn activate(&self, domain: &Domain) -> HotfixResult<()> {
        let types = domain.type_table()?;
        let count = self.behaviours.scan(&types)?;
        info!(behaviours = count, "behaviours registered");

        let argument = self.configurator.entry_argument();
        EntryInvoker::new(self.sink.clone()).invoke(domain, &argument)?;
        Ok(())
    }

    /// Unregister bindings, release buffers, and clear the domain handle.
    ///
    /// The load state is left as is; use [`reset`](Self::reset) to allow
    /// another load. During `Loading` the in-flight load is told to release
    /// its domain rather than publish it, and ends in `NotLoaded`.
    pub fn dispose(&self) {
        let domain = {
            let mut state = self.state.lock();
            if state.load == LoadState::Loading {
                state.dispose_requested = true;
            }
            state.domain.take()
        };
        self.release(domain);
    }

    /// Dispose and return to `NotLoaded`. Refused while a load is in flight.
    pub fn reset(&self) -> HotfixResult<()> {
        let domain = {
            let mut state = self.state.lock();
            if state.load == LoadState::Loading {
                return Err(HotfixError::LoadInFlight);
            }
            state.load = LoadState::NotLoaded;
            state.domain.take()
        };
        self.release(domain);
        Ok(())
    }

    fn release(&self, domain: Option<Arc<Domain>>) {
        if let Some(bridge) = self.bridge.lock().take() {
            bridge.stop();
        }
        self.behaviours.clear();
        if let Some(domain) = domain {
            domain.dispose();
            info!("hot-fix domain disposed");
        }
    }
}

impl Drop for HotfixHost {
    fn drop(&mut self) {
        self.dispose();
    }
}
