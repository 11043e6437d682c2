use super::*;
use pretty_assertions::assert_eq;
use std::error::Error;

#[test]
fn factory_messages_name_the_symbol() {
    let error = symbol_not_found(&Symbol::new("userName"));
    assert_eq!(
        error.message,
        "symbol [userName] is not defined in any visible scope"
    );
    assert_eq!(
        error.kind,
        ErrorKind::SymbolNotFound {
            name: "userName".to_string()
        }
    );
}

#[test]
fn key_not_found_names_the_container() {
    let error = key_not_found(&Symbol::new("age"), "the [variables] scope");
    assert_eq!(
        error.to_string(),
        "key [age] was not located in the [variables] scope"
    );
}

#[test]
fn structural_kinds() {
    assert!(rethrow_outside_catch().is_structural());
    let violation = interface_contract_violation(
        &Symbol::new("User"),
        &Symbol::new("Greeter"),
        &Symbol::new("greet"),
    );
    assert!(violation.is_structural());
    assert!(!function_not_found(&Symbol::new("f")).is_structural());
    assert!(!missing_setter_argument(&Symbol::new("setName")).is_structural());
}

#[test]
fn interceptor_failure_wraps_cause() {
    let cause = RuntimeError::new("subscriber exploded");
    let error = interceptor_failure(&Symbol::new("onRequestStart"), cause);
    assert_eq!(error.message, "errors announcing [onRequestStart] interception");
    assert_eq!(error.root_cause().message, "subscriber exploded");
    let source = error.source().map(ToString::to_string);
    assert_eq!(source.as_deref(), Some("subscriber exploded"));
}

#[test]
fn notes_render_after_message() {
    let error = function_not_found(&Symbol::new("missing")).with_note("in function [main]");
    assert_eq!(
        error.to_string(),
        "function [missing] not found\n  note: in function [main]"
    );
}

#[test]
fn thrown_errors_carry_their_type() {
    let error = thrown("MyApp.Validation", "bad input", "field [age] is negative");
    assert_eq!(error.type_name(), "MyApp.Validation");
    assert_eq!(error.message, "bad input");
    assert_eq!(error.detail(), "field [age] is negative");
}

#[test]
fn to_struct_exposes_message_type_detail() {
    let error = scope_not_found(&Symbol::new("cookie")).with_note("while resolving [cookie.id]");
    let data = error.to_struct();
    assert_eq!(data.get(&Symbol::new("message")), Some(Value::string("scope [cookie] not found")));
    assert_eq!(data.get(&Symbol::new("TYPE")), Some(Value::string("ScopeNotFound")));
    assert_eq!(
        data.get(&Symbol::new("detail")),
        Some(Value::string("while resolving [cookie.id]"))
    );
}

#[test]
fn detail_includes_cause_chain() {
    let error = interceptor_failure(&Symbol::new("onSessionStart"), RuntimeError::new("boom"));
    assert_eq!(error.detail(), "caused by: boom");
}
