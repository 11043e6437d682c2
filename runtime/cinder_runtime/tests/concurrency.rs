//! Shared structures under concurrent call chains.
//!
//! Contexts never cross threads; each worker builds its own chain against
//! one shared runtime.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cinder_runtime::{
    points, silent_sink, Arguments, ClassDefinition, Function, InterceptorHandle, Runtime, Scope,
    Symbol, Value,
};
use pretty_assertions::assert_eq;
use rayon::prelude::*;

fn runtime() -> Arc<Runtime> {
    Runtime::builder().output(silent_sink()).build().unwrap()
}

/// Racing requests for one session id create and announce it once.
#[test]
fn session_is_created_once_under_contention() {
    let runtime = runtime();
    let starts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&starts);
    let handle = InterceptorHandle::from_fn(move |_: &Symbol, _: &Scope| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    runtime.interceptors().subscribe(&handle, [points::ON_SESSION_START]);
    let app = runtime.application("store").unwrap();

    let sessions: Vec<_> = (0..64)
        .into_par_iter()
        .map(|_| app.session("shared").unwrap())
        .collect();

    assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
    assert_eq!(app.session_count(), 1);
    assert_eq!(starts.load(Ordering::SeqCst), 1);
}

/// Many sessions end in parallel on shutdown.
#[test]
fn shutdown_ends_sessions_in_parallel() {
    let runtime = runtime();
    let ends = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ends);
    let handle = InterceptorHandle::from_fn(move |_: &Symbol, _: &Scope| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    runtime.interceptors().subscribe(&handle, [points::ON_SESSION_END]);
    let app = runtime.application("store").unwrap();
    (0..200).into_par_iter().for_each(|i| {
        app.session(format!("session-{i}")).unwrap();
    });
    assert_eq!(app.session_count(), 200);

    runtime.shutdown().unwrap();

    assert_eq!(ends.load(Ordering::SeqCst), 200);
    assert_eq!(app.session_count(), 0);
}

/// Announcing while other threads register states and subscribers.
#[test]
fn bus_announces_while_registering() {
    let runtime = runtime();
    let bus = runtime.interceptors();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let handle = InterceptorHandle::from_fn(move |_: &Symbol, _: &Scope| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    bus.subscribe(&handle, ["tick"]);
    let tick = Symbol::new("tick");

    (0..100).into_par_iter().for_each(|i| {
        if i % 2 == 0 {
            bus.announce(&tick, &Scope::linked()).unwrap();
        } else {
            let other = InterceptorHandle::from_fn(|_: &Symbol, _: &Scope| Ok(()));
            bus.subscribe(&other, [format!("point{i}")]);
        }
    });

    assert_eq!(hits.load(Ordering::SeqCst), 50);
    assert_eq!(bus.point_names().len(), 1 + 50 + points::CORE_POINTS.len());
}

/// Instances of one class share its static scope across threads.
#[test]
fn static_scope_is_shared_across_threads() {
    let runtime = runtime();
    let definition = ClassDefinition::builder("Counter").build();

    (0..32_i32).into_par_iter().for_each(|i| {
        let ctx = runtime.root_context();
        let instance = definition.instantiate(&ctx).unwrap();
        instance.static_scope().put(format!("slot{i}"), Value::from(i));
    });

    assert_eq!(definition.static_scope().len(), 32);
    assert_eq!(
        definition.static_scope().get(&Symbol::new("SLOT7")),
        Some(Value::Int(7))
    );
}

/// Parallel requests keep their variables apart.
#[test]
fn requests_are_isolated() {
    let runtime = runtime();
    let results: Vec<Value> = (0..16_i32)
        .into_par_iter()
        .map(|i| {
            let root = runtime.root_context();
            let request = root.request_context();
            request.default_assignment_scope().put("n", Value::from(i));
            request
                .register_function(Function::new("double", |ctx| {
                    match ctx.lookup(&Symbol::new("n"), false)? {
                        Value::Int(n) => Ok(Value::Int(n * 2)),
                        other => Ok(other),
                    }
                }))
                .unwrap();
            request.invoke(&Symbol::new("double"), Arguments::None).unwrap()
        })
        .collect();

    let expected: Vec<Value> = (0..16_i64).map(|i| Value::Int(i * 2)).collect();
    assert_eq!(results, expected);
}
