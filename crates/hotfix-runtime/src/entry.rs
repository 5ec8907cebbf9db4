//! Entry point invocation

use hotfix_engine::{Domain, DomainError, Value};
use std::sync::Arc;

use crate::error::{HotfixError, HotfixResult};
use crate::sink::ExceptionSink;

/// Fixed entry point coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryDescriptor {
    /// Declaring type
    pub type_name: &'static str,
    /// Method name
    pub method: &'static str,
    /// Parameter count
    pub arity: u32,
}

/// `Hotfix.Core.Entry::Enter(string)`
pub const ENTRY: EntryDescriptor = EntryDescriptor {
    type_name: "Hotfix.Core.Entry",
    method: "Enter",
    arity: 1,
};

/// Invokes the entry point with one string argument.
///
/// Domain exceptions reach the sink through the domain's exception hook;
/// lookup and binding failures are forwarded here.
pub struct EntryInvoker {
    descriptor: EntryDescriptor,
    sink: Arc<dyn ExceptionSink>,
}

impl std::fmt::Debug for EntryInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryInvoker")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl EntryInvoker {
    /// Invoker for [`ENTRY`]
    pub fn new(sink: Arc<dyn ExceptionSink>) -> Self {
        Self::with_descriptor(ENTRY, sink)
    }

    /// Invoker for another entry point
    pub fn with_descriptor(descriptor: EntryDescriptor, sink: Arc<dyn ExceptionSink>) -> Self {
        Self { descriptor, sink }
    }

    /// Entry point this invoker calls
    pub fn descriptor(&self) -> EntryDescriptor {
        self.descriptor
    }

    /// Call the entry point with `argument`
    pub fn invoke(&self, domain: &Domain, argument: &str) -> HotfixResult<Value> {
        let d = self.descriptor;
        tracing::info!(
            entry = %format!("{}::{}", d.type_name, d.method),
            argument,
            "entering hot-fix"
        );

        let result = domain
            .find_method(d.type_name, d.method, d.arity)
            .and_then(|method| {
                let mut ctx = domain.begin_invoke(&method)?;
                ctx.push(argument);
                ctx.invoke()
            });

        result.map_err(|err| {
            if !matches!(err, DomainError::Exception(_)) {
                self.sink.surface(&format!(
                    "Entry {}::{}/{} failed: {}",
                    d.type_name, d.method, d.arity, err
                ));
            }
            tracing::error!(error = %err, "entry invocation failed");
            HotfixError::EntryInvocation(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use hotfix_engine::{
        HotFixBundle, MethodDef, ModuleImage, NativeCallResult, NativeFunctionRegistry, TypeDef,
    };

    fn domain_with_entry() -> Domain {
        let mut module = ModuleImage::new("m");
        let enter = module.add_native("host.enter");
        module.add_type(
            TypeDef::class(ENTRY.type_name)
                .with_method(MethodDef::new_static(ENTRY.method, 1).bound_to(enter)),
        );
        let domain = Domain::new();
        domain.load_module(HotFixBundle::new(module.encode())).unwrap();

        let mut natives = NativeFunctionRegistry::new();
        natives.register("host.enter", |_call, args| NativeCallResult::Value(args[0].clone()));
        domain.register_bindings(&natives).unwrap();
        domain
    }

    #[test]
    fn test_invoke_passes_argument() {
        let sink = Arc::new(MemorySink::new());
        let invoker = EntryInvoker::new(sink.clone());
        let domain = domain_with_entry();

        let value = invoker.invoke(&domain, "scene/Main").unwrap();
        assert_eq!(value, Value::from("scene/Main"));
        assert_eq!(domain.active_invocations(), 0);
        assert!(sink.surfaced().is_empty());
    }

    #[test]
    fn test_missing_entry_is_reported() {
        let mut module = ModuleImage::new("m");
        module.add_type(TypeDef::class("Other"));
        let domain = Domain::new();
        domain.load_module(HotFixBundle::new(module.encode())).unwrap();

        let sink = Arc::new(MemorySink::new());
        let err = EntryInvoker::new(sink.clone())
            .invoke(&domain, "scene/Main")
            .unwrap_err();
        assert!(matches!(
            err,
            HotfixError::EntryInvocation(DomainError::TypeNotFound(_))
        ));
        assert_eq!(sink.surfaced().len(), 1);
        assert!(sink.surfaced()[0].contains("Hotfix.Core.Entry::Enter/1"));
        assert_eq!(domain.active_invocations(), 0);
    }
}
