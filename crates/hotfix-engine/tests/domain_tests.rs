//! Domain Integration Tests
//!
//! Exercises the public engine API end to end:
//! - Building a module image and loading it into a domain
//! - Walking the type graph
//! - Linking native bindings and invoking through a scoped context
//! - Disposal and isolation between domains
//!
//! # Running Tests
//! ```bash
//! cargo test --test domain_tests
//! ```

use hotfix_engine::{
    Domain, DomainError, HotFixBundle, MethodDef, ModuleImage, NativeCallResult,
    NativeFunctionRegistry, ParseError, TypeDef, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn game_module() -> Vec<u8> {
    let mut module = ModuleImage::new("game");
    let count = module.add_native("host.count");
    let base = module.add_type(TypeDef::abstract_class("Hotfix.Core.Behaviour"));
    let a = module.add_type(TypeDef::class("Game.A").extends(base));
    module.add_type(
        TypeDef::class("Game.B")
            .extends(a)
            .with_method(MethodDef::new("Tick", 0).bound_to(count)),
    );
    module.add_type(TypeDef::class("Game.C"));
    module.encode()
}

// ===== Type Graph Tests =====

#[test]
fn test_type_graph_after_load() {
    let domain = Domain::new();
    domain.load_module(HotFixBundle::new(game_module())).unwrap();

    let table = domain.type_table().unwrap();
    let base = table.get_by_name("Hotfix.Core.Behaviour").unwrap().id;
    let b = table.get_by_name("Game.B").unwrap();
    let c = table.get_by_name("Game.C").unwrap();

    assert!(table.is_subclass_of(b.id, base));
    assert!(!table.is_subclass_of(c.id, base));
    assert_eq!(table.base_chain(b.id).len(), 2);
}

#[test]
fn test_corrupt_bundle_is_format_error() {
    let mut bytes = game_module();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;

    let err = Domain::new().load_module(HotFixBundle::new(bytes)).unwrap_err();
    assert!(matches!(err, ParseError::Module(_)));
    assert!(!err.is_structural());
}

#[test]
fn test_malformed_graph_is_structural_error() {
    let mut module = ModuleImage::new("broken");
    module.add_type(TypeDef::class("Game.A").extends(42));
    let err = Domain::new()
        .load_module(HotFixBundle::new(module.encode()))
        .unwrap_err();
    assert!(err.is_structural());
}

// ===== Invocation Tests =====

#[test]
fn test_invoke_through_registered_binding() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut natives = NativeFunctionRegistry::new();
    natives.register("host.count", move |call, _args| {
        assert_eq!(call.type_name, "Game.B");
        NativeCallResult::value(counter.fetch_add(1, Ordering::SeqCst) as i64 + 1)
    });

    let domain = Domain::new();
    domain.load_module(HotFixBundle::new(game_module())).unwrap();
    domain.register_bindings(&natives).unwrap();

    let tick = domain.find_method("Game.B", "Tick", 0).unwrap();
    for expected in 1..=3i64 {
        let mut ctx = domain.begin_invoke(&tick).unwrap();
        assert_eq!(ctx.invoke().unwrap(), Value::Int(expected));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(domain.active_invocations(), 0);
}

#[test]
fn test_invoke_after_shutdown_bindings() {
    let mut natives = NativeFunctionRegistry::new();
    natives.register("host.count", |_call, _args| NativeCallResult::null());

    let domain = Domain::new();
    domain.load_module(HotFixBundle::new(game_module())).unwrap();
    domain.register_bindings(&natives).unwrap();
    domain.shutdown_bindings();

    let tick = domain.find_method("Game.B", "Tick", 0).unwrap();
    let mut ctx = domain.begin_invoke(&tick).unwrap();
    assert_eq!(ctx.invoke(), Err(DomainError::BindingsNotRegistered));
}

// ===== Lifecycle Tests =====

#[test]
fn test_domains_are_isolated() {
    let first = Domain::new();
    let second = Domain::new();
    first.load_module(HotFixBundle::new(game_module())).unwrap();

    assert!(first.is_loaded());
    assert!(!second.is_loaded());
    assert_eq!(second.type_table().unwrap_err(), DomainError::ModuleNotLoaded);

    first.dispose();
    assert!(first.is_disposed());
    assert!(!second.is_disposed());
}

#[test]
fn test_dispose_is_idempotent() {
    let domain = Domain::new();
    domain.load_module(HotFixBundle::new(game_module())).unwrap();
    domain.dispose();
    domain.dispose();
    assert_eq!(domain.type_table().unwrap_err(), DomainError::Disposed);
}
