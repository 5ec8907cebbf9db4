//! Execution domain
//!
//! A `Domain` owns one loaded module: its validated type table, optional
//! symbols, the retained bundle buffers, and the native bindings linked for
//! it. Method bodies dispatch to those bindings; the domain never executes
//! module code itself.
//!
//! All state sits behind interior locks so a published domain can be shared
//! as `Arc<Domain>`. Locks are never held while a native binding runs.

use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::debug::{DebugService, DomainException, StackFrame};
use crate::error::{DomainError, DomainResult, ParseError};
use crate::image::{MethodDef, ModuleImage, SymbolImage};
use crate::native_registry::{
    NativeCall, NativeCallResult, NativeFunctionRegistry, ResolvedNatives,
};
use crate::types::TypeTable;
use crate::value::Value;

/// Raw (decoded, not yet parsed) artifacts for one load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotFixBundle {
    /// Module image bytes
    pub module_bytes: Vec<u8>,
    /// Symbol image bytes, omitted in production
    pub symbol_bytes: Option<Vec<u8>>,
}

impl HotFixBundle {
    /// Bundle without symbols
    pub fn new(module_bytes: Vec<u8>) -> Self {
        Self {
            module_bytes,
            symbol_bytes: None,
        }
    }

    /// Attach symbol bytes
    pub fn with_symbols(mut self, symbol_bytes: Vec<u8>) -> Self {
        self.symbol_bytes = Some(symbol_bytes);
        self
    }

    /// Total retained bytes
    pub fn byte_len(&self) -> usize {
        self.module_bytes.len() + self.symbol_bytes.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Debug)]
struct LoadedModule {
    name: String,
    checksum: String,
    types: Arc<TypeTable>,
    native_bindings: Vec<String>,
    symbols: Option<SymbolImage>,
}

/// A resolved method, ready to be invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodHandle {
    /// Declaring type id
    pub type_id: u32,
    /// Declaring type name
    pub type_name: String,
    /// Method definition
    pub def: MethodDef,
}

impl MethodHandle {
    /// `Type::Method` for messages
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.type_name, self.def.name)
    }
}

/// Container for one loaded hot-fix module
#[derive(Debug, Default)]
pub struct Domain {
    module: RwLock<Option<LoadedModule>>,
    bundle: Mutex<Option<HotFixBundle>>,
    natives: RwLock<Option<Arc<ResolvedNatives>>>,
    active_contexts: AtomicUsize,
    disposed: AtomicBool,
    debug: Arc<DebugService>,
}

impl Domain {
    /// Create an empty domain
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a bundle and make its types available.
    ///
    /// Symbols, when present, must describe exactly this module.
    pub fn load_module(&self, bundle: HotFixBundle) -> Result<(), ParseError> {
        if self.is_disposed() {
            return Err(ParseError::Disposed);
        }
        if let Some(existing) = self.module.read().as_ref() {
            return Err(ParseError::AlreadyLoaded(existing.name.clone()));
        }

        let image = ModuleImage::decode(&bundle.module_bytes)?;
        let symbols = match &bundle.symbol_bytes {
            Some(bytes) => {
                let symbols = SymbolImage::decode(bytes)?;
                if !symbols.matches(&image) {
                    return Err(ParseError::SymbolMismatch {
                        module: image.checksum_hex(),
                        symbols: hex::encode(symbols.module_checksum),
                    });
                }
                Some(symbols)
            }
            None => None,
        };
        let types = TypeTable::build(&image)?;

        tracing::debug!(
            module = %image.name,
            types = types.len(),
            natives = image.native_bindings.len(),
            symbols = symbols.is_some(),
            "module parsed"
        );

        *self.module.write() = Some(LoadedModule {
            name: image.name.clone(),
            checksum: image.checksum_hex(),
            types: Arc::new(types),
            native_bindings: image.native_bindings,
            symbols,
        });
        *self.bundle.lock() = Some(bundle);
        Ok(())
    }

    /// Whether a module is loaded
    pub fn is_loaded(&self) -> bool {
        self.module.read().is_some()
    }

    /// Name of the loaded module
    pub fn module_name(&self) -> Option<String> {
        self.module.read().as_ref().map(|m| m.name.clone())
    }

    /// SHA-256 of the loaded module payload, hex encoded
    pub fn module_checksum(&self) -> Option<String> {
        self.module.read().as_ref().map(|m| m.checksum.clone())
    }

    /// Native binding names the module expects from the host
    pub fn native_bindings(&self) -> Vec<String> {
        self.module
            .read()
            .as_ref()
            .map(|m| m.native_bindings.clone())
            .unwrap_or_default()
    }

    /// Whether symbols were attached at load
    pub fn has_symbols(&self) -> bool {
        self.module
            .read()
            .as_ref()
            .is_some_and(|m| m.symbols.is_some())
    }

    /// Bytes still retained from the loaded bundle
    pub fn retained_bytes(&self) -> usize {
        self.bundle.lock().as_ref().map_or(0, HotFixBundle::byte_len)
    }

    /// The loaded type graph
    pub fn type_table(&self) -> DomainResult<Arc<TypeTable>> {
        self.ensure_live()?;
        self.module
            .read()
            .as_ref()
            .map(|m| m.types.clone())
            .ok_or(DomainError::ModuleNotLoaded)
    }

    /// Source location of a type or method, when symbols are loaded
    pub fn source_location(&self, type_name: &str, method: Option<&str>) -> Option<(String, u32)> {
        let module = self.module.read();
        let symbols = module.as_ref()?.symbols.as_ref()?;
        symbols
            .location(type_name, method)
            .map(|loc| (loc.file.to_string(), loc.line))
    }

    /// Find a method by declaring type, name, and parameter count
    pub fn find_method(
        &self,
        type_name: &str,
        method: &str,
        arity: u32,
    ) -> DomainResult<MethodHandle> {
        let types = self.type_table()?;
        let ty = types
            .get_by_name(type_name)
            .ok_or_else(|| DomainError::TypeNotFound(type_name.to_string()))?;
        let def = ty
            .method(method, arity)
            .ok_or_else(|| DomainError::MethodNotFound {
                type_name: type_name.to_string(),
                method: method.to_string(),
                arity,
            })?;
        Ok(MethodHandle {
            type_id: ty.id,
            type_name: ty.full_name.clone(),
            def: def.clone(),
        })
    }

    /// Link the module's native binding table against a host registry
    pub fn register_bindings(&self, registry: &NativeFunctionRegistry) -> DomainResult<()> {
        self.ensure_live()?;
        let module = self.module.read();
        let module = module.as_ref().ok_or(DomainError::ModuleNotLoaded)?;
        let resolved = ResolvedNatives::link(&module.native_bindings, registry)
            .map_err(DomainError::UnresolvedNative)?;
        tracing::debug!(module = %module.name, bindings = resolved.len(), "native bindings linked");
        *self.natives.write() = Some(Arc::new(resolved));
        Ok(())
    }

    /// Whether bindings are currently registered
    pub fn bindings_registered(&self) -> bool {
        self.natives.read().is_some()
    }

    /// Unregister all native bindings
    pub fn shutdown_bindings(&self) {
        if self.natives.write().take().is_some() {
            tracing::debug!("native bindings unregistered");
        }
    }

    /// Debug hooks for this domain, shared with attached debuggers
    pub fn debug_service(&self) -> &Arc<DebugService> {
        &self.debug
    }

    /// Open a scoped invocation of `method`
    pub fn begin_invoke(&self, method: &MethodHandle) -> DomainResult<InvocationContext<'_>> {
        self.ensure_live()?;
        self.active_contexts.fetch_add(1, Ordering::SeqCst);
        Ok(InvocationContext {
            domain: self,
            method: method.clone(),
            args: Vec::with_capacity(method.def.param_count as usize),
        })
    }

    /// Number of invocation contexts currently open
    pub fn active_invocations(&self) -> usize {
        self.active_contexts.load(Ordering::SeqCst)
    }

    /// Release bindings, buffers, observers, and the type graph.
    ///
    /// Idempotent. Any later query or invocation fails with `Disposed`.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown_bindings();
        self.bundle.lock().take();
        self.debug.clear_observers();
        if let Some(module) = self.module.write().take() {
            tracing::debug!(module = %module.name, "domain disposed");
        }
    }

    /// Whether `dispose` has run
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> DomainResult<()> {
        if self.is_disposed() {
            Err(DomainError::Disposed)
        } else {
            Ok(())
        }
    }

    fn raise(&self, method: &MethodHandle, kind: &str, message: String) -> DomainError {
        let exception = DomainException::new(kind, message).with_frame(StackFrame {
            type_name: method.type_name.clone(),
            method: method.def.name.clone(),
            location: self.source_location(&method.type_name, Some(&method.def.name)),
        });
        self.debug.report(&exception);
        DomainError::Exception(exception)
    }

    fn dispatch(&self, method: &MethodHandle, args: &[Value]) -> DomainResult<Value> {
        self.ensure_live()?;
        let expected = method.def.param_count;
        if args.len() != expected as usize {
            return Err(DomainError::ArityMismatch {
                method: method.qualified_name(),
                expected,
                actual: args.len(),
            });
        }
        let slot = method.def.native_id.ok_or_else(|| DomainError::UnboundMethod {
            type_name: method.type_name.clone(),
            method: method.def.name.clone(),
        })?;
        let natives = self
            .natives
            .read()
            .clone()
            .ok_or(DomainError::BindingsNotRegistered)?;

        let call = NativeCall {
            type_name: &method.type_name,
            method_name: &method.def.name,
        };
        match catch_unwind(AssertUnwindSafe(|| natives.call(slot, &call, args))) {
            Ok(NativeCallResult::Value(value)) => Ok(value),
            Ok(NativeCallResult::Error(message)) => Err(self.raise(method, "NativeError", message)),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "native binding panicked".to_string());
                Err(self.raise(method, "Panic", message))
            }
        }
    }
}

/// Scoped invocation of one method.
///
/// Arguments are pushed in order, then `invoke` dispatches. The domain's
/// open-context count drops when the context is dropped, on every path.
#[derive(Debug)]
pub struct InvocationContext<'d> {
    domain: &'d Domain,
    method: MethodHandle,
    args: Vec<Value>,
}

impl InvocationContext<'_> {
    /// Push the next argument
    pub fn push(&mut self, value: impl Into<Value>) -> &mut Self {
        self.args.push(value.into());
        self
    }

    /// Arguments pushed so far
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Method being invoked
    pub fn method(&self) -> &MethodHandle {
        &self.method
    }

    /// Dispatch with the pushed arguments, consuming them
    pub fn invoke(&mut self) -> DomainResult<Value> {
        let args = std::mem::take(&mut self.args);
        self.domain.dispatch(&self.method, &args)
    }
}

impl Drop for InvocationContext<'_> {
    fn drop(&mut self) {
        self.domain.active_contexts.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::TypeDef;

    fn bundle() -> (HotFixBundle, ModuleImage) {
        let mut module = ModuleImage::new("gameplay");
        let greet = module.add_native("host.greet");
        module.add_type(
            TypeDef::class("Game.Greeter")
                .with_method(MethodDef::new_static("Greet", 1).bound_to(greet))
                .with_method(MethodDef::new_static("Idle", 0)),
        );
        let bytes = module.encode();
        let decoded = ModuleImage::decode(&bytes).unwrap();
        (HotFixBundle::new(bytes), decoded)
    }

    fn registry() -> NativeFunctionRegistry {
        let mut registry = NativeFunctionRegistry::new();
        registry.register("host.greet", |_call, args| match args[0].as_str() {
            Some("fail") => NativeCallResult::error("refused"),
            Some("panic") => panic!("greeter exploded"),
            Some(name) => NativeCallResult::value(format!("hello {}", name)),
            None => NativeCallResult::error("expected string"),
        });
        registry
    }

    fn loaded() -> Domain {
        let domain = Domain::new();
        domain.load_module(bundle().0).unwrap();
        domain.register_bindings(&registry()).unwrap();
        domain
    }

    #[test]
    fn test_load_and_invoke() {
        let domain = loaded();
        assert_eq!(domain.module_name().as_deref(), Some("gameplay"));
        let method = domain.find_method("Game.Greeter", "Greet", 1).unwrap();
        let mut ctx = domain.begin_invoke(&method).unwrap();
        ctx.push("world");
        assert_eq!(ctx.invoke().unwrap(), Value::from("hello world"));
    }

    #[test]
    fn test_context_count_released_on_error() {
        let domain = loaded();
        let method = domain.find_method("Game.Greeter", "Greet", 1).unwrap();
        {
            let mut ctx = domain.begin_invoke(&method).unwrap();
            assert_eq!(domain.active_invocations(), 1);
            ctx.push("fail");
            assert!(matches!(ctx.invoke(), Err(DomainError::Exception(_))));
        }
        assert_eq!(domain.active_invocations(), 0);
    }

    #[test]
    fn test_native_panic_becomes_exception() {
        let domain = loaded();
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        domain
            .debug_service()
            .add_exception_observer(move |exc| sink.lock().push(exc.clone()));

        let method = domain.find_method("Game.Greeter", "Greet", 1).unwrap();
        let mut ctx = domain.begin_invoke(&method).unwrap();
        ctx.push("panic");
        match ctx.invoke() {
            Err(DomainError::Exception(exc)) => {
                assert_eq!(exc.kind, "Panic");
                assert_eq!(exc.message, "greeter exploded");
                assert_eq!(exc.stack[0].method, "Greet");
            }
            other => panic!("expected exception, got {:?}", other),
        }
        assert_eq!(reports.lock().len(), 1);
    }

    #[test]
    fn test_lookup_failures() {
        let domain = loaded();
        assert_eq!(
            domain.find_method("Game.Missing", "Greet", 1),
            Err(DomainError::TypeNotFound("Game.Missing".into()))
        );
        assert!(matches!(
            domain.find_method("Game.Greeter", "Greet", 2),
            Err(DomainError::MethodNotFound { arity: 2, .. })
        ));
    }

    #[test]
    fn test_unbound_method_and_arity() {
        let domain = loaded();
        let idle = domain.find_method("Game.Greeter", "Idle", 0).unwrap();
        let mut ctx = domain.begin_invoke(&idle).unwrap();
        assert!(matches!(ctx.invoke(), Err(DomainError::UnboundMethod { .. })));

        let greet = domain.find_method("Game.Greeter", "Greet", 1).unwrap();
        let mut ctx = domain.begin_invoke(&greet).unwrap();
        assert!(matches!(
            ctx.invoke(),
            Err(DomainError::ArityMismatch { expected: 1, actual: 0, .. })
        ));
    }

    #[test]
    fn test_unresolved_bindings() {
        let domain = Domain::new();
        domain.load_module(bundle().0).unwrap();
        assert_eq!(
            domain.register_bindings(&NativeFunctionRegistry::new()),
            Err(DomainError::UnresolvedNative(vec!["host.greet".into()]))
        );
    }

    #[test]
    fn test_symbols_must_match_module() {
        let (bundle, _) = bundle();
        let foreign = SymbolImage::new([9u8; 32]).encode();
        let err = Domain::new()
            .load_module(bundle.with_symbols(foreign))
            .unwrap_err();
        assert!(matches!(err, ParseError::SymbolMismatch { .. }));
        assert!(err.is_structural());
    }

    #[test]
    fn test_symbols_attach_source_locations() {
        let (bundle, image) = bundle();
        let mut symbols = SymbolImage::new(image.checksum);
        let file = symbols.add_source_file("src/greeter.hfx");
        symbols.types.push(crate::image::TypeSymbols {
            type_name: "Game.Greeter".into(),
            source_file: file,
            line: 3,
            methods: vec![crate::image::MethodSymbols {
                name: "Greet".into(),
                line: 5,
            }],
        });

        let domain = Domain::new();
        domain.load_module(bundle.with_symbols(symbols.encode())).unwrap();
        domain.register_bindings(&registry()).unwrap();
        assert!(domain.has_symbols());

        let method = domain.find_method("Game.Greeter", "Greet", 1).unwrap();
        let mut ctx = domain.begin_invoke(&method).unwrap();
        ctx.push("fail");
        match ctx.invoke() {
            Err(DomainError::Exception(exc)) => {
                assert_eq!(exc.stack[0].location, Some(("src/greeter.hfx".into(), 5)));
            }
            other => panic!("expected exception, got {:?}", other),
        }
    }

    #[test]
    fn test_dispose_releases_everything() {
        let domain = loaded();
        assert!(domain.retained_bytes() > 0);
        assert!(domain.bindings_registered());

        domain.dispose();
        assert!(domain.is_disposed());
        assert!(!domain.is_loaded());
        assert!(!domain.bindings_registered());
        assert_eq!(domain.retained_bytes(), 0);
        assert_eq!(
            domain.find_method("Game.Greeter", "Greet", 1),
            Err(DomainError::Disposed)
        );
        assert_eq!(domain.load_module(bundle().0), Err(ParseError::Disposed));
    }

    #[test]
    fn test_second_load_rejected() {
        let domain = loaded();
        assert_eq!(
            domain.load_module(bundle().0),
            Err(ParseError::AlreadyLoaded("gameplay".into()))
        );
    }
}
