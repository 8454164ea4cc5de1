//! Security tests - malformed input and evaluation failures must never grant access

use enforcer_rs::core::matcher::{evaluate, CompiledMatcher, Environment, FunctionRegistry};
use enforcer_rs::{Enforcer, EnforcerError, EvalError, MatcherSyntaxError, ModelError, Position, Value};

const DENY_OVERRIDE: &str = "\
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act, eft

[policy_effect]
e = !some(where (p.eft == deny))

[matchers]
m = r.sub == p.sub && r.obj == p.obj && r.act == p.act
";

fn with_matcher(matcher: &str) -> String {
    DENY_OVERRIDE.replace(
        "r.sub == p.sub && r.obj == p.obj && r.act == p.act",
        matcher,
    )
}

#[test]
fn test_truncated_matcher_rejected_at_build() {
    let err = Enforcer::new(&with_matcher("r.sub ==")).err().unwrap();
    match err {
        EnforcerError::Model(ModelError::Matcher(MatcherSyntaxError::ArityMismatch {
            token,
            position,
            ..
        })) => {
            assert_eq!(token, "==");
            assert_eq!(position, Position::new(1, 7));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_malformed_matchers_never_compile() {
    for source in [
        "",
        "r.sub == (p.sub",
        "r.sub == p.sub)",
        "r.sub p.sub",
        "&& r.sub",
        "g(r.sub,, p.sub)",
        "r.",
        "\"unterminated",
        "r.sub == p.sub ;",
    ] {
        assert!(
            CompiledMatcher::compile(source).is_err(),
            "compiled: {:?}",
            source
        );
    }
}

#[test]
fn test_deep_nesting_rejected() {
    let source = format!("{}a{}", "(a + ".repeat(10_000), ")".repeat(10_000));
    assert!(matches!(
        CompiledMatcher::compile(&source),
        Err(MatcherSyntaxError::TooDeep { .. })
    ));

    let source = format!("{}a", "!".repeat(10_000));
    assert!(matches!(
        CompiledMatcher::compile(&source),
        Err(MatcherSyntaxError::TooDeep { .. })
    ));
}

#[test]
fn test_long_flat_chain_compiles() {
    let source = vec!["r.sub"; 200].join(" == ");
    assert!(CompiledMatcher::compile_with_depth(&source, 512).is_ok());
}

#[test]
fn test_eval_error_does_not_fall_back_to_deny_override_allow() {
    // Under deny-override an empty match set allows, so an error that
    // silently skipped rows would grant access
    let enforcer = Enforcer::new(&with_matcher("r.sub == p.owner")).unwrap();
    enforcer.add_policy("p", &["mallory", "data", "read", "deny"]).unwrap();

    assert!(matches!(
        enforcer.enforce(&["mallory", "data", "read"]),
        Err(EnforcerError::Eval(EvalError::UndefinedAttribute { .. }))
    ));
}

#[test]
fn test_type_confusion_is_an_error() {
    let enforcer = Enforcer::new(&with_matcher("r.sub > p.sub")).unwrap();
    enforcer.add_policy("p", &["a", "b", "c", "allow"]).unwrap();
    assert!(enforcer.enforce(&["a", "b", "c"]).is_ok());

    let enforcer = Enforcer::new(&with_matcher("r.sub == p.sub && 1")).unwrap();
    enforcer.add_policy("p", &["a", "b", "c", "deny"]).unwrap();
    assert!(matches!(
        enforcer.enforce(&["a", "b", "c"]),
        Err(EnforcerError::Eval(EvalError::TypeError { .. }))
    ));
}

#[test]
fn test_non_boolean_matcher_result_is_an_error() {
    let enforcer = Enforcer::new(&with_matcher("r.sub")).unwrap();
    enforcer.add_policy("p", &["alice", "data", "read", "deny"]).unwrap();
    assert!(matches!(
        enforcer.enforce(&["alice", "data", "read"]),
        Err(EnforcerError::Eval(EvalError::TypeError { .. }))
    ));
}

#[test]
fn test_request_values_are_data_not_code() {
    let enforcer = Enforcer::new(DENY_OVERRIDE).unwrap();
    enforcer.add_policy("p", &["alice", "data", "read", "deny"]).unwrap();

    // Matcher syntax inside request values is compared literally
    assert!(enforcer
        .enforce(&["alice\" || \"1\" == \"1", "data", "read"])
        .unwrap());
    assert!(!enforcer.enforce(&["alice", "data", "read"]).unwrap());
}

#[test]
fn test_glob_traversal_does_not_escape() {
    let enforcer = Enforcer::new(
        &with_matcher("r.sub == p.sub && glob_match?(r.obj, p.obj) && r.act == p.act")
            .replace("!some(where (p.eft == deny))", "some(where (p.eft == allow))"),
    )
    .unwrap();
    enforcer.add_policy("p", &["alice", "/public/**", "read", "allow"]).unwrap();

    assert!(enforcer.enforce(&["alice", "/public/file.txt", "read"]).unwrap());
    assert!(!enforcer
        .enforce(&["alice", "/public/../private/secret.txt", "read"])
        .unwrap());
    assert!(!enforcer
        .enforce(&["alice", "/public/./../../private/secret.txt", "read"])
        .unwrap());
}

#[test]
fn test_invalid_regex_in_policy_is_an_error() {
    let enforcer = Enforcer::new(
        &with_matcher("r.sub == p.sub && regex_match?(r.obj, p.obj) && r.act == p.act"),
    )
    .unwrap();
    enforcer.add_policy("p", &["alice", "(", "read", "deny"]).unwrap();
    assert!(matches!(
        enforcer.enforce(&["alice", "x", "read"]),
        Err(EnforcerError::Eval(EvalError::FunctionFailed { .. }))
    ));
}

#[test]
fn test_environment_cannot_reach_unbound_symbols() {
    let matcher = CompiledMatcher::compile("secret.admin == \"true\"").unwrap();
    let functions = FunctionRegistry::with_builtins();
    let env = Environment::new(&functions).with("r", Value::map([("sub", "alice")]));
    assert_eq!(
        evaluate(&matcher, &env),
        Err(EvalError::UndefinedVariable("secret".to_string()))
    );
}
