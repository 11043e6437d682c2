//! End-to-end behavior of the runtime core through its public API.
//!
//! Each test drives the runtime the way generated code would: contexts,
//! bare-identifier resolution, the reference protocol, class loading and
//! the interceptor bus.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::sync::Arc;

use cinder_runtime::{
    buffer_sink, points, Arguments, ClassDefinition, ErrorKind, Function, InterceptorHandle,
    Property, Query, QueryRef, Referenceable, Runtime, RuntimeError, Scope, Symbol, Value,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

fn sym(name: &str) -> Symbol {
    Symbol::new(name)
}

fn runtime() -> Arc<Runtime> {
    Runtime::builder().output(buffer_sink()).build().unwrap()
}

// =============================================================================
// Identifiers
// =============================================================================

/// Names compare case-insensitively but keep their spelling.
#[test]
fn symbols_ignore_case() {
    let lower = sym("firstname");
    let upper = sym("FIRSTNAME");
    let mixed = sym("firstName");
    assert_eq!(lower, upper);
    assert_eq!(upper, mixed);
    assert!(!mixed.eq_exact(&upper));
    assert_eq!(mixed.to_string(), "firstName");
}

/// Short all-digit names share the numeric representation.
#[test]
fn small_integers_take_the_fast_path() {
    assert_eq!(sym("7"), Symbol::from_int(7));
    assert!(sym("7").is_numeric());
    assert!(sym("007").is_numeric());
    assert!(!sym("1234").is_numeric());
}

// =============================================================================
// Resolution
// =============================================================================

/// A bound iteration shadows a local variable of the same name.
#[test]
fn iteration_beats_local() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    let mut query = Query::new(["x"]);
    query.add_row(vec![Value::string("from query")]);
    let query = QueryRef::new(query);

    request
        .register_function(Function::new("probe", move |ctx| {
            ctx.default_assignment_scope().put("x", Value::string("from local"));
            ctx.register_iteration(&query, 0);
            Ok(ctx.resolve_nearby(&Symbol::new("x"), None, false)?.value_or_null())
        }))
        .unwrap();

    let value = request.invoke(&sym("probe"), Arguments::None).unwrap();
    assert_eq!(value, Value::string("from query"));
}

/// `shallow` stops at the current context.
#[test]
fn shallow_flag_skips_parent() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    request.default_assignment_scope().put("x", Value::Int(1));
    let child = request.catch_context("e", RuntimeError::new("boom"));

    assert!(child.resolve_nearby(&sym("x"), None, true).is_err());
    assert_eq!(
        child.resolve_nearby(&sym("x"), None, false).unwrap().value,
        Some(Value::Int(1))
    );
}

// =============================================================================
// Output
// =============================================================================

/// A pushed buffer holds output back from the parent.
#[test]
fn buffer_flush_suppression() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();

    request.push_buffer();
    request.write_str("captured");
    request.flush(false);
    assert!(root.buffer().is_empty());

    let captured = request.pop_buffer().unwrap();
    assert_eq!(captured.contents(), "captured");
    request.write_str("visible");
    request.flush(true);
    assert_eq!(runtime.output().captured(), "visible");
}

// =============================================================================
// Classes
// =============================================================================

/// A child's property default wins over its parent's.
#[test]
fn inheritance_merge_precedence() {
    let runtime = runtime();
    let ctx = runtime.root_context();
    let parent = ClassDefinition::builder("Parent")
        .property(Property::new("p").with_default(Value::Int(1)))
        .build();
    let child = ClassDefinition::builder("Child")
        .extends(parent)
        .property(Property::new("p").with_default(Value::Int(2)))
        .build()
        .instantiate(&ctx)
        .unwrap();

    assert_eq!(child.dereference(&ctx, &sym("p"), false).unwrap(), Value::Int(2));
}

/// Only the bottom class enables accessors; parent code still reads and
/// writes the bottom instance.
#[test]
fn bottom_class_accessor_anchoring() {
    let runtime = runtime();
    let ctx = runtime.root_context();
    let grand = ClassDefinition::builder("Grand")
        .property(Property::new("color").with_default(Value::string("red")))
        .build();
    let parent = ClassDefinition::builder("Parent")
        .extends(grand)
        .function(Function::new("paint", |ctx| {
            let this = ctx.lookup(&Symbol::new("this"), false)?;
            this.dereference_and_invoke(
                ctx,
                &Symbol::new("setColor"),
                Arguments::positional([Value::string("blue")]),
                false,
            )?;
            this.dereference_and_invoke(ctx, &Symbol::new("getColor"), Arguments::None, false)
        }))
        .build();
    let child = ClassDefinition::builder("Child")
        .extends(parent)
        .annotation("accessors", Value::Bool(true))
        .build()
        .instantiate(&ctx)
        .unwrap();
    let parent = child.parent().unwrap();

    let color = parent
        .dereference_and_invoke(&ctx, &sym("paint"), Arguments::None, false)
        .unwrap();

    assert_eq!(color, Value::string("blue"));
    assert_eq!(child.variables().get(&sym("color")), Some(Value::string("blue")));
    assert_eq!(parent.variables().get(&sym("color")), Some(Value::string("red")));
}

// =============================================================================
// Interceptors
// =============================================================================

/// The first failing subscriber stops the announcement and names the point.
#[test]
fn fail_fast_announce() {
    let runtime = runtime();
    let bus = runtime.interceptors();
    let reached = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&reached);

    let failing = InterceptorHandle::from_fn(|_: &Symbol, _: &Scope| Err(RuntimeError::new("no")));
    let second = InterceptorHandle::from_fn(move |_: &Symbol, _: &Scope| {
        *flag.lock() = true;
        Ok(())
    });
    bus.subscribe(&failing, ["onOrderPlaced"]);
    bus.subscribe(&second, ["onOrderPlaced"]);

    let error = bus.announce(&sym("onOrderPlaced"), &Scope::linked()).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::InterceptorFailure { .. }));
    assert!(error.message.contains("onOrderPlaced"));
    assert!(!*reached.lock());

    bus.announce(&sym("nobodyListens"), &Scope::linked()).unwrap();
}

/// Session lifecycle reaches subscribers through the runtime's bus.
#[test]
fn session_events_are_announced() {
    let runtime = runtime();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let handle = InterceptorHandle::from_fn(move |point: &Symbol, data: &Scope| {
        let id = data.get(&Symbol::new("sessionId")).unwrap_or(Value::Null);
        log.lock().push(format!("{point}:{id}"));
        Ok(())
    });
    runtime
        .interceptors()
        .subscribe(&handle, [points::ON_SESSION_START, points::ON_SESSION_END]);

    let app = runtime.application("store").unwrap();
    app.session("s1").unwrap();
    app.shutdown().unwrap();

    assert_eq!(*seen.lock(), vec!["onSessionStart:s1", "onSessionEnd:s1"]);
}

// =============================================================================
// Scenario
// =============================================================================

/// A request variable resolves by name, and a constructed class exposes its
/// property default.
#[test]
fn end_to_end_scenario() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    request.default_assignment_scope().put("name", Value::string("luis"));

    let found = request.resolve_nearby(&sym("name"), None, false).unwrap();
    assert_eq!(found.value, Some(Value::string("luis")));

    let greeter = ClassDefinition::builder("Greeter")
        .property(Property::new("greeting").with_default(Value::string("hi")))
        .build();
    let instance = cinder_runtime::ClassInstance::new(greeter);
    instance.construct(&request).unwrap();

    assert_eq!(
        instance.dereference(&request, &sym("greeting"), false).unwrap(),
        Value::string("hi")
    );
}
