#![allow(clippy::unwrap_used, reason = "Tests can panic")]

use super::*;
use crate::class::ClassDefinition;
use crate::errors::{ErrorKind, RuntimeError};
use crate::interceptor::{points, InterceptorHandle};
use crate::output::buffer_sink;
use crate::reference::Referenceable;
use crate::value::{Arguments, Param, Query};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

fn sym(name: &str) -> Symbol {
    Symbol::new(name)
}

fn runtime() -> Arc<Runtime> {
    Runtime::builder().output(buffer_sink()).build().unwrap()
}

fn runtime_with_depth(limit: usize) -> Arc<Runtime> {
    let config = RuntimeConfig {
        max_call_depth: Some(limit),
        ..RuntimeConfig::default()
    };
    Runtime::builder().config(config).output(buffer_sink()).build().unwrap()
}

fn people() -> QueryRef {
    let mut query = Query::new(["name", "age"]);
    query.add_row(vec![Value::string("ada"), Value::Int(36)]);
    query.add_row(vec![Value::string("alan"), Value::Int(41)]);
    QueryRef::new(query)
}

fn text(value: &Value) -> String {
    value.cast_string().unwrap()
}

// Resolution

#[test]
fn iteration_cell_beats_local_scope() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    let cursor = people();
    request
        .register_function(Function::new("probe", move |ctx| {
            ctx.default_assignment_scope().put("name", Value::string("local"));
            ctx.register_iteration(&cursor, 1);
            ctx.resolve_nearby(&Symbol::new("name"), None, false)
                .map(ScopeSearchResult::value_or_null)
        }))
        .unwrap();

    let value = request.invoke(&sym("probe"), Arguments::None).unwrap();
    assert_eq!(text(&value), "alan");
}

#[test]
fn iteration_exposes_synthetic_names() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    let query = people();
    request.register_iteration(&query, 1);

    let lookup = |name: &str| request.lookup(&sym(name), false).unwrap();
    assert_eq!(lookup("recordCount"), Value::Int(2));
    assert_eq!(lookup("CURRENTROW"), Value::Int(2));
    assert_eq!(text(&lookup("columnList")), "name,age");
    assert_eq!(lookup("age"), Value::Int(41));
}

#[test]
fn newest_iteration_wins_but_older_columns_stay_visible() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    let outer = people();
    let mut inner = Query::new(["name"]);
    inner.add_row(vec![Value::string("grace")]);
    let inner = QueryRef::new(inner);

    request.register_iteration(&outer, 0);
    request.register_iteration(&inner, 0);

    assert_eq!(text(&request.lookup(&sym("name"), false).unwrap()), "grace");
    assert_eq!(request.lookup(&sym("age"), false).unwrap(), Value::Int(36));
    assert_eq!(request.lookup(&sym("recordCount"), false).unwrap(), Value::Int(1));

    request.unregister_iteration(&inner);
    assert_eq!(text(&request.lookup(&sym("name"), false).unwrap()), "ada");
}

#[test]
fn shallow_search_never_consults_parent() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    request.default_assignment_scope().put("x", Value::Int(1));
    let catch = request.catch_context("e", RuntimeError::new("boom"));

    let error = catch.resolve_nearby(&sym("x"), None, true).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::SymbolNotFound { .. }));

    let found = catch.resolve_nearby(&sym("X"), None, false).unwrap();
    assert_eq!(found.value, Some(Value::Int(1)));
}

#[test]
fn miss_returns_default_scope_without_value() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    let fallback = Scope::linked();

    let found = request.resolve_nearby(&sym("missing"), Some(&fallback), false).unwrap();
    assert!(!found.is_found());
    assert!(Scope::ptr_eq(&found.scope.unwrap(), &fallback));
}

#[test]
fn safe_lookup_turns_miss_into_null() {
    let runtime = runtime();
    let root = runtime.root_context();
    assert_eq!(root.lookup(&sym("nothing"), true).unwrap(), Value::Null);
    let error = root.lookup(&sym("nothing"), false).unwrap_err();
    assert_eq!(error.type_name(), "SymbolNotFound");
}

#[test]
fn global_search_only_sees_global_scopes() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    request.default_assignment_scope().put("x", Value::Int(1));
    let catch = request.catch_context("e", RuntimeError::new("boom"));

    let found = catch.resolve_global(&sym("request"), None).unwrap();
    assert!(matches!(found.value, Some(Value::Struct(_))));
    let found = catch.resolve_global(&sym("server"), None).unwrap();
    let server = found.value.unwrap();
    assert!(Scope::ptr_eq(server.as_struct().unwrap(), runtime.server_scope()));

    assert!(catch.resolve_global(&sym("x"), None).is_err());
    assert!(catch.resolve_global(&sym("variables"), None).is_err());
}

#[test]
fn function_sees_arguments_and_caller_variables() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    request.default_assignment_scope().put("greeting", Value::string("hello"));
    request
        .register_function(
            Function::new("greet", |ctx| {
                let greeting = ctx.lookup(&Symbol::new("greeting"), false)?;
                let who = ctx.lookup(&Symbol::new("who"), false)?;
                Ok(Value::string(format!(
                    "{} {}",
                    greeting.cast_string()?,
                    who.cast_string()?
                )))
            })
            .with_param(Param::new("who").required()),
        )
        .unwrap();

    let value = request
        .invoke_positional(&sym("GREET"), vec![Value::string("luis")])
        .unwrap();
    assert_eq!(text(&value), "hello luis");

    let error = request.invoke(&sym("greet"), Arguments::None).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::MissingArgument { .. }));
}

#[test]
fn class_code_does_not_see_caller_variables() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    request.default_assignment_scope().put("secret", Value::string("s3cr3t"));
    let definition = ClassDefinition::builder("Spy")
        .function(Function::new("peek", |ctx| ctx.lookup(&Symbol::new("secret"), true)))
        .build();
    let spy = definition.instantiate(&request).unwrap();

    let value = spy
        .dereference_and_invoke(&request, &sym("peek"), Arguments::None, false)
        .unwrap();
    assert_eq!(value, Value::Null);
}

#[test]
fn assignment_targets_binding_or_local() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    let variables = request.default_assignment_scope();
    variables.put("count", Value::Int(1));
    request
        .register_function(Function::new("touch", |ctx| {
            ctx.assign_nearby(&Symbol::new("count"), Value::Int(2))?;
            ctx.assign_nearby(&Symbol::new("fresh"), Value::Bool(true))?;
            ctx.get_scope_nearby(&Symbol::new("local"), true)
                .map(|local| Value::Bool(local.contains_key(&Symbol::new("fresh"))))
        }))
        .unwrap();

    let fresh_in_local = request.invoke(&sym("touch"), Arguments::None).unwrap();
    assert_eq!(fresh_in_local, Value::Bool(true));
    assert_eq!(variables.get(&sym("count")), Some(Value::Int(2)));
    assert!(!variables.contains_key(&sym("fresh")));
}

#[test]
fn named_scopes() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    let catch = request.catch_context("e", RuntimeError::new("boom"));

    let server = catch.get_scope(&sym("SERVER")).unwrap();
    assert!(Scope::ptr_eq(&server, runtime.server_scope()));
    assert!(catch.get_scope(&sym("variables")).is_err());

    let variables = catch.get_scope_nearby(&sym("variables"), false).unwrap();
    assert!(Scope::ptr_eq(&variables, &request.default_assignment_scope()));
    let error = catch.get_scope_nearby(&sym("variables"), true).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::ScopeNotFound { .. }));
}

#[test]
fn application_and_session_scopes_resolve_by_name() {
    let runtime = runtime();
    let root = runtime.root_context();
    let app = runtime.application("shop").unwrap();
    let session = app.session("abc").unwrap();
    let app_ctx = root.application_context(Arc::clone(&app));
    let session_ctx = app_ctx.session_context(Arc::clone(&session));
    let request = session_ctx.request_context();

    let application = request.get_scope(&sym("application")).unwrap();
    assert!(Scope::ptr_eq(&application, &app.scope()));
    let found = request.resolve_global(&sym("session"), None).unwrap();
    assert!(Scope::ptr_eq(found.value.unwrap().as_struct().unwrap(), session.scope()));
}

#[test]
fn catch_variable_and_rethrow() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();

    let error = request.rethrow();
    assert!(matches!(error.kind, ErrorKind::RethrowOutsideCatch));

    let catch = request.catch_context("err", RuntimeError::new("boom"));
    let data = catch.lookup(&sym("ERR"), false).unwrap();
    let message = data.as_struct().unwrap().get(&sym("message")).unwrap();
    assert_eq!(text(&message), "boom");

    let nested = catch.child(ContextKind::Runtime);
    assert_eq!(nested.rethrow().message, "boom");
}

#[test]
fn config_items_are_readable() {
    let runtime = runtime_with_depth(25);
    let root = runtime.root_context();
    assert_eq!(root.config_item(&sym("maxCallDepth")), Some(Value::Int(25)));
    assert_eq!(root.config_item(&sym("nope")), None);
}

// Context chain

#[test]
fn parent_of_type_walks_self_then_parents() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    let catch = request.catch_context("e", RuntimeError::new("boom"));

    let found = catch.parent_of_type(ContextType::Request).unwrap();
    assert_eq!(found.kind().context_type(), ContextType::Request);
    assert_eq!(catch.parent_of_type(ContextType::Catch).unwrap().kind().context_type(), ContextType::Catch);
    assert!(catch.parent_of_type(ContextType::Session).is_none());
    assert_eq!(catch.ancestors().count(), 3);
}

#[test]
fn register_function_targets_kind_scope() {
    let runtime = runtime();
    let root = runtime.root_context();
    let error = root
        .register_function(Function::new("f", |_| Ok(Value::Null)))
        .unwrap_err();
    assert!(matches!(error.kind, ErrorKind::UnsupportedOperation { .. }));

    let request = root.request_context();
    let catch = request.catch_context("e", RuntimeError::new("boom"));
    catch
        .register_function(Function::new("f", |_| Ok(Value::Int(1))))
        .unwrap();
    assert!(request.default_assignment_scope().contains_key(&sym("F")));
}

// Units and components

#[test]
fn closest_unit_is_leaf_biased_and_base_unit_root_biased() {
    let runtime = runtime();
    let root = runtime.root_context();
    assert!(root.find_closest_unit().is_none());
    assert!(root.find_base_unit().is_none());

    root.push_unit(Unit::Template(Arc::new(Template::new("/index.cfm"))));
    let request = root.request_context();
    request.push_unit(Unit::Template(Arc::new(Template::new("/a.cfm"))));
    let catch = request.catch_context("e", RuntimeError::new("boom"));
    {
        let _guard = catch.enter_unit(Unit::Template(Arc::new(
            Template::new("/b.cfm").with_import("models.*"),
        )));
        assert_eq!(catch.find_closest_unit().unwrap().path(), "/b.cfm");
        assert_eq!(catch.find_base_unit().unwrap().path(), "/index.cfm");
        assert_eq!(catch.current_imports(), vec!["models.*".to_string()]);
    }
    assert_eq!(catch.find_closest_unit().unwrap().path(), "/a.cfm");
    assert!(catch.current_imports().is_empty());
}

#[test]
fn closest_component_skips_the_innermost() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    let component = |name: &str| Scope::from_pairs([("name", Value::string(name))]);

    request.push_component(component("form"));
    request.push_component(component("input"));
    let catch = request.catch_context("e", RuntimeError::new("boom"));
    catch.push_component(component("form"));

    let names: Vec<String> = catch
        .components()
        .iter()
        .map(|c| text(&c.get(&sym("name")).unwrap()))
        .collect();
    assert_eq!(names, vec!["form", "input", "form"]);

    let found = catch.find_closest_component(&sym("FORM")).unwrap();
    assert!(Scope::ptr_eq(&found, &request.components()[0]));
    assert!(catch.find_closest_component(&sym("select")).is_none());
    assert_eq!(catch.pop_component().map(|c| c.len()), Some(1));
}

#[test]
fn iteration_rows_advance_in_owning_context() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    let query = people();
    assert_eq!(request.current_row(&query), 0);

    request.register_iteration(&query, 0);
    let catch = request.catch_context("e", RuntimeError::new("boom"));
    assert_eq!(catch.advance(&query), 1);
    assert_eq!(request.current_row(&query), 1);

    let other = people();
    assert_eq!(catch.advance(&other), 1);
    assert_eq!(request.current_row(&other), 0);
    assert_eq!(catch.current_row(&other), 1);
}

// Output

#[test]
fn flush_is_suppressed_while_a_buffer_is_pushed() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();

    request.write_str("hello ");
    let capture = request.push_buffer();
    request.write(&Value::Int(42)).unwrap();
    request.flush(false);
    assert!(root.buffer().is_empty());

    let popped = request.pop_buffer().unwrap();
    assert_eq!(popped.contents(), "42");
    assert_eq!(capture.contents(), "42");
    assert!(request.pop_buffer().is_none());

    request.flush(false);
    assert_eq!(root.buffer().contents(), "hello ");
    assert!(request.buffer().is_empty());
}

#[test]
fn forced_flush_reaches_the_output_sink() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    request.write_str("done");
    request.flush(true);
    assert_eq!(runtime.output().captured(), "done");
    assert!(root.buffer().is_empty());
}

#[test]
fn function_output_lands_in_caller_buffer() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    request
        .register_function(Function::new("shout", |ctx| {
            ctx.write_str("HEY");
            Ok(Value::Null)
        }))
        .unwrap();
    request.invoke(&sym("shout"), Arguments::None).unwrap();
    assert_eq!(request.buffer().contents(), "HEY");
}

#[test]
fn nested_call_output_keeps_call_order() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    request
        .register_function(Function::new("inner", |ctx| {
            ctx.write_str("b");
            Ok(Value::Null)
        }))
        .unwrap();
    request
        .register_function(Function::new("outer", |ctx| {
            ctx.write_str("a");
            ctx.invoke(&Symbol::new("inner"), Arguments::None)?;
            ctx.write_str("c");
            Ok(Value::Null)
        }))
        .unwrap();

    request.invoke(&sym("outer"), Arguments::None).unwrap();

    assert_eq!(request.buffer().contents(), "abc");
}

#[test]
fn pushed_buffer_captures_nested_call_output() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    request
        .register_function(Function::new("inner", |ctx| {
            ctx.write_str("b");
            Ok(Value::Null)
        }))
        .unwrap();
    request
        .register_function(Function::new("outer", |ctx| {
            ctx.push_buffer();
            ctx.invoke(&Symbol::new("inner"), Arguments::None)?;
            let captured = ctx.pop_buffer().map(|buffer| buffer.contents()).unwrap_or_default();
            Ok(Value::string(captured))
        }))
        .unwrap();

    let captured = request.invoke(&sym("outer"), Arguments::None).unwrap();

    assert_eq!(captured, Value::string("b"));
    assert!(request.buffer().is_empty());
}

#[test]
fn writing_a_struct_fails() {
    let runtime = runtime();
    let root = runtime.root_context();
    let error = root.write(&Value::Struct(Scope::linked())).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::CastFailure { .. }));
}

// Calls

#[test]
fn builtins_win_over_user_functions() {
    let runtime = runtime();
    runtime
        .builtins()
        .register("len", |_, args: Arguments| Ok(Value::Int(i64::try_from(args.len()).unwrap_or(0) * 100)));
    let root = runtime.root_context();
    let request = root.request_context();
    request
        .register_function(Function::new("len", |_| Ok(Value::Int(-1))))
        .unwrap();

    let value = request
        .invoke_positional(&sym("LEN"), vec![Value::Null, Value::Null])
        .unwrap();
    assert_eq!(value, Value::Int(200));
}

#[test]
fn invoking_a_non_function_fails() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    request.default_assignment_scope().put("x", Value::Int(1));

    let error = request.invoke(&sym("x"), Arguments::None).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::FunctionNotFound { .. }));
    let error = request.invoke(&sym("missing"), Arguments::None).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::FunctionNotFound { .. }));

    let error = request.invoke_value(&Value::Int(1), Arguments::None).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::NotInvocable { .. }));
}

#[test]
fn named_invocation_binds_by_name() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    request
        .register_function(
            Function::new("pair", |ctx| {
                let a = ctx.lookup(&Symbol::new("a"), false)?;
                let b = ctx.lookup(&Symbol::new("b"), false)?;
                Ok(Value::string(format!("{}{}", a.cast_string()?, b.cast_string()?)))
            })
            .with_param(Param::new("a"))
            .with_param(Param::new("b").with_default(Value::string("!"))),
        )
        .unwrap();

    let value = request
        .invoke_named(&sym("pair"), [("A", Value::string("x"))])
        .unwrap();
    assert_eq!(text(&value), "x!");
}

#[test]
fn recursion_stops_at_call_depth_limit() {
    let runtime = runtime_with_depth(10);
    let root = runtime.root_context();
    let request = root.request_context();
    request
        .register_function(Function::new("recurse", |ctx| {
            assert!(ctx.call_depth() <= 10);
            ctx.invoke(&Symbol::new("recurse"), Arguments::None)
        }))
        .unwrap();

    let error = request.invoke(&sym("recurse"), Arguments::None).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::StackOverflow { limit: 10 }));
    assert_eq!(error.notes.len(), 10);
}

#[test]
fn nested_calls_hang_under_the_request() {
    let runtime = runtime();
    let root = runtime.root_context();
    let request = root.request_context();
    request
        .register_function(Function::new("inner", |ctx| {
            // The caller's local scope is not visible.
            ctx.lookup(&Symbol::new("temp"), true)
        }))
        .unwrap();
    request
        .register_function(Function::new("outer", |ctx| {
            ctx.default_assignment_scope().put("temp", Value::Int(7));
            assert_eq!(ctx.closest_function_name(), Some(Symbol::new("outer")));
            ctx.invoke(&Symbol::new("inner"), Arguments::None)
        }))
        .unwrap();

    assert_eq!(request.invoke(&sym("outer"), Arguments::None).unwrap(), Value::Null);
}

#[test]
fn call_points_are_announced_around_calls() {
    let runtime = runtime();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let handle = InterceptorHandle::from_fn(move |point: &Symbol, data: &Scope| {
        let name = data.get(&Symbol::new("name")).and_then(|v| v.cast_string().ok());
        log.lock().push(format!("{point}:{}", name.unwrap_or_default()));
        Ok(())
    });
    runtime.interceptors().subscribe(
        &handle,
        [points::PRE_FUNCTION_INVOKE, points::POST_FUNCTION_INVOKE, points::ON_EXCEPTION],
    );
    let root = runtime.root_context();
    let request = root.request_context();
    request
        .register_function(Function::new("ok", |_| Ok(Value::Int(1))))
        .unwrap();
    request
        .register_function(Function::new("fail", |_| Err(RuntimeError::new("nope"))))
        .unwrap();

    request.invoke(&sym("ok"), Arguments::None).unwrap();
    let error = request.invoke(&sym("fail"), Arguments::None).unwrap_err();

    assert_eq!(error.notes, vec!["in function [fail]".to_string()]);
    assert_eq!(
        *seen.lock(),
        vec![
            "preFunctionInvoke:ok",
            "postFunctionInvoke:ok",
            "preFunctionInvoke:fail",
            "onException:fail",
        ]
    );
}

#[test]
fn failing_pre_invoke_interceptor_aborts_the_call() {
    let runtime = runtime();
    let handle = InterceptorHandle::from_fn(|_: &Symbol, _: &Scope| Err(RuntimeError::new("denied")));
    runtime.interceptors().subscribe(&handle, [points::PRE_FUNCTION_INVOKE]);
    let root = runtime.root_context();
    let request = root.request_context();
    request
        .register_function(Function::new("guarded", |ctx| {
            ctx.write_str("ran");
            Ok(Value::Null)
        }))
        .unwrap();

    let error = request.invoke(&sym("guarded"), Arguments::None).unwrap_err();
    assert!(matches!(error.kind, ErrorKind::InterceptorFailure { .. }));
    assert!(request.buffer().is_empty());
}
