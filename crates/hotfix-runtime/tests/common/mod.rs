//! Shared fixtures for runtime integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use hotfix_engine::image::{MethodSymbols, TypeSymbols};
use hotfix_engine::{
    MethodDef, ModuleImage, NativeCallResult, NativeFunctionRegistry, SymbolImage, TypeDef,
};
use hotfix_runtime::{
    ArtifactFetcher, ArtifactKind, ArtifactLayout, Configurator, FetchError, HotfixCodec,
    HotfixConfig, HotfixHost, MemoryFetcher, MemorySink, UpdateDecision, UpdateInfo,
    BEHAVIOUR_MARKER, ENTRY,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SECRET: &[u8] = b"integration-secret";

pub fn codec() -> HotfixCodec {
    HotfixCodec::new(SECRET).unwrap()
}

/// `{Base, A: Base, B: A, C}` plus the marker and entry types.
///
/// `Base` is abstract and derives from the marker, so behaviours are `{A, B}`.
pub fn game_module() -> ModuleImage {
    let mut module = ModuleImage::new("game");
    let enter = module.add_native("host.enter");
    let marker = module.add_type(TypeDef::abstract_class(BEHAVIOUR_MARKER));
    let base = module.add_type(TypeDef::abstract_class("Game.Base").extends(marker));
    let a = module.add_type(TypeDef::class("Game.A").extends(base));
    module.add_type(TypeDef::class("Game.B").extends(a));
    module.add_type(TypeDef::class("Game.C"));
    module.add_type(
        TypeDef::class(ENTRY.type_name)
            .with_method(MethodDef::new_static(ENTRY.method, 1).bound_to(enter)),
    );
    module
}

pub fn module_without_marker() -> ModuleImage {
    let mut module = ModuleImage::new("bare");
    let enter = module.add_native("host.enter");
    module.add_type(
        TypeDef::class(ENTRY.type_name)
            .with_method(MethodDef::new_static(ENTRY.method, 1).bound_to(enter)),
    );
    module
}

pub fn module_without_entry() -> ModuleImage {
    let mut module = ModuleImage::new("no-entry");
    let marker = module.add_type(TypeDef::abstract_class(BEHAVIOUR_MARKER));
    module.add_type(TypeDef::class("Game.A").extends(marker));
    module
}

/// Symbols matching an encoded module
pub fn symbols_for(module_bytes: &[u8]) -> Vec<u8> {
    let decoded = ModuleImage::decode(module_bytes).unwrap();
    let mut symbols = SymbolImage::new(decoded.checksum);
    let file = symbols.add_source_file("src/entry.hfx");
    symbols.types.push(TypeSymbols {
        type_name: ENTRY.type_name.to_string(),
        source_file: file,
        line: 1,
        methods: vec![MethodSymbols {
            name: ENTRY.method.to_string(),
            line: 4,
        }],
    });
    symbols.encode()
}

/// Fetcher serving the encoded module and matching symbols
pub fn fetcher_for(module: &ModuleImage) -> Arc<MemoryFetcher> {
    let layout = ArtifactLayout::default();
    let codec = codec();
    let module_bytes = module.encode();
    let symbols = symbols_for(&module_bytes);

    let fetcher = MemoryFetcher::new();
    fetcher.insert(
        layout.logical_path(ArtifactKind::Module),
        codec.encode(&module_bytes).unwrap(),
    );
    fetcher.insert(
        layout.logical_path(ArtifactKind::Symbols),
        codec.encode(&symbols).unwrap(),
    );
    Arc::new(fetcher)
}

/// Records every entry argument
#[derive(Default)]
pub struct EntryLog {
    pub arguments: Mutex<Vec<String>>,
}

pub fn natives(log: Arc<EntryLog>) -> NativeFunctionRegistry {
    let mut natives = NativeFunctionRegistry::new();
    natives.register("host.enter", move |_call, args| {
        let arg = args[0].as_str().unwrap_or_default().to_string();
        if arg == "scene/Crash" {
            return NativeCallResult::error("scene not found");
        }
        if arg == "scene/Panic" {
            panic!("scene loader exploded");
        }
        log.arguments.lock().push(arg);
        NativeCallResult::null()
    });
    natives
}

/// Configurator recording hook calls
pub struct RecordingConfigurator {
    pub entry: String,
    pub decision: UpdateDecision,
    pub calls: Mutex<Vec<&'static str>>,
}

impl RecordingConfigurator {
    pub fn new(entry: &str) -> Self {
        Self {
            entry: entry.to_string(),
            decision: UpdateDecision::Proceed,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn declining(entry: &str) -> Self {
        Self {
            decision: UpdateDecision::Abort,
            ..Self::new(entry)
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Configurator for RecordingConfigurator {
    fn before_check_update(&self) {
        self.calls.lock().push("before_check_update");
    }

    fn on_update_available(&self, _info: &UpdateInfo) -> UpdateDecision {
        self.calls.lock().push("on_update_available");
        self.decision
    }

    fn after_check_update(&self) {
        self.calls.lock().push("after_check_update");
    }

    async fn start_loading(&self, host: &HotfixHost) -> hotfix_runtime::HotfixResult<()> {
        self.calls.lock().push("start_loading");
        host.begin_load().await
    }

    fn entry_argument(&self) -> String {
        self.entry.clone()
    }
}

/// Fetcher that waits before delegating, counting async calls
pub struct SlowFetcher {
    pub inner: Arc<MemoryFetcher>,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl SlowFetcher {
    pub fn new(inner: Arc<MemoryFetcher>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ArtifactFetcher for SlowFetcher {
    fn load_sync(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        self.inner.load_sync(path)
    }

    async fn load_async(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.load_async(path).await
    }
}

/// Development config with the debug bridge on an ephemeral port
pub fn dev_config() -> HotfixConfig {
    let mut config = HotfixConfig::default();
    config.debug.port = 0;
    config
}

pub struct Harness {
    pub host: HotfixHost,
    pub log: Arc<EntryLog>,
    pub sink: Arc<MemorySink>,
    pub configurator: Arc<RecordingConfigurator>,
}

pub fn harness(
    config: HotfixConfig,
    fetcher: Arc<dyn ArtifactFetcher>,
    configurator: RecordingConfigurator,
) -> Harness {
    let log = Arc::new(EntryLog::default());
    let sink = Arc::new(MemorySink::new());
    let configurator = Arc::new(configurator);
    let host = HotfixHost::builder(config)
        .configurator(configurator.clone())
        .fetcher(fetcher)
        .codec(codec())
        .natives(natives(log.clone()))
        .sink(sink.clone())
        .build()
        .unwrap();
    Harness {
        host,
        log,
        sink,
        configurator,
    }
}
