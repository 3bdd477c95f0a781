mod common;

use common::{permissive, profile_allowing, registry, Order};
use indoc::indoc;
use palisade_lib::{CompileError, Error, Evaluator, Value, Vars};

#[test]
fn allowed_member_call_evaluates() {
    let profile = profile_allowing(|p| p.on("Str").member("len"));
    let evaluator = Evaluator::new(registry());
    let callable = evaluator
        .expr(&profile, r#""hello".len"#)
        .context_type("Unit")
        .result_type("Int")
        .compile()
        .unwrap();
    assert_eq!(callable.eval(&Value::Unit).unwrap(), Value::Int(5));
}

#[test]
fn unlisted_member_is_denied() {
    let profile = profile_allowing(|p| p.on("Str").member("len"));
    let evaluator = Evaluator::new(registry());
    let err = evaluator
        .expr(&profile, r#""hello".to_upper"#)
        .context_type("Unit")
        .result_type("Str")
        .compile()
        .unwrap_err();
    let Error::Compile(CompileError::Rejected(report)) = err else {
        panic!("expected rejection, got {err:?}");
    };
    assert!(report.mentions("member `Str.to_upper` is not allowed on `Str`"));
}

#[test]
fn template_concatenates_hole_results() {
    let profile = profile_allowing(|p| p.on("Int").member("+").member("*"));
    let evaluator = Evaluator::new(registry());
    let callable = evaluator
        .expr(&profile, "x=${1+2}, y=${3*4}")
        .template()
        .context_type("Unit")
        .result_type("Str")
        .compile()
        .unwrap();
    assert_eq!(
        callable.eval(&Value::Unit).unwrap(),
        Value::str("x=3, y=12")
    );
}

#[test]
fn later_deny_shadows_earlier_allow() {
    let acl = palisade_lib::Acl::builder()
        .allow(|p| p.on("Any").member("=="))
        .deny(|p| p.on("Any").member("=="))
        .build()
        .unwrap();
    let profile = std::sync::Arc::new(
        palisade_lib::ExpressionProfile::builder("eq-shadowed")
            .acl(acl)
            .build(),
    );
    let evaluator = Evaluator::new(registry());
    let err = evaluator
        .expr(&profile, "1 == 2")
        .context_type("Unit")
        .result_type("Bool")
        .compile()
        .unwrap_err();
    let Error::Compile(CompileError::Rejected(report)) = err else {
        panic!("expected rejection");
    };
    assert!(report.mentions("member `Any.==` is not allowed on `Int`"));
}

#[test]
fn identical_defs_share_the_cached_callable() {
    let profile = permissive();
    let evaluator = Evaluator::new(registry());
    let build = || {
        evaluator
            .expr(&profile, "1 + 2")
            .context_type("Unit")
            .result_type("Int")
            .compile()
            .unwrap()
    };
    let first = build();
    let second = build();
    assert!(first.same_as(&second));
    assert_eq!(first.eval(&Value::Unit).unwrap(), Value::Int(3));
    assert_eq!(second.eval(&Value::Unit).unwrap(), Value::Int(3));
}

#[test]
fn compiles_are_deterministic_across_evaluators() {
    let profile = permissive();
    let a = Evaluator::new(registry());
    let b = Evaluator::new(registry());
    for source in ["1 + 2 * 3", "if (1 < 2) \"a\" else \"b\"", "{ 1; 2 }"] {
        let ra = a
            .expr(&profile, source)
            .context_type("Unit")
            .result_type("Any")
            .compile()
            .unwrap()
            .eval(&Value::Unit)
            .unwrap();
        let rb = b
            .expr(&profile, source)
            .context_type("Unit")
            .result_type("Any")
            .compile()
            .unwrap()
            .eval(&Value::Unit)
            .unwrap();
        assert_eq!(ra, rb, "diverged on {source:?}");
    }
}

#[test]
fn context_fields_and_this() {
    let profile = permissive();
    let evaluator = Evaluator::new(registry());
    let ctx = Order::value("urgent", 40);

    let bare = evaluator
        .expr(&profile, "note.len + amount")
        .context_type("Order")
        .result_type("Int")
        .compile()
        .unwrap();
    assert_eq!(bare.eval(&ctx).unwrap(), Value::Int(46));

    let explicit = evaluator
        .expr(&profile, "this.amount * 2")
        .context_type("Order")
        .result_type("Int")
        .compile()
        .unwrap();
    assert_eq!(explicit.eval(&ctx).unwrap(), Value::Int(80));
}

#[test]
fn setter_writes_through_the_context() {
    let profile = permissive();
    let evaluator = Evaluator::new(registry());
    let ctx = Order::value("old", 1);

    let setter = evaluator
        .expr(&profile, "this.note")
        .setter()
        .context_type("Order")
        .result_type("Str")
        .compile()
        .unwrap();
    setter.set(&ctx, Value::str("new note")).unwrap();

    let getter = evaluator
        .expr(&profile, "this.note")
        .context_type("Order")
        .result_type("Str")
        .compile()
        .unwrap();
    assert_eq!(getter.eval(&ctx).unwrap(), Value::str("new note"));
}

#[test]
fn setter_template_is_a_single_hole() {
    let profile = permissive();
    let evaluator = Evaluator::new(registry());

    let setter = evaluator
        .expr(&profile, "${this.amount}")
        .template()
        .setter()
        .context_type("Order")
        .result_type("Int")
        .compile()
        .unwrap();
    let ctx = Order::value("x", 7);
    setter.set(&ctx, Value::Int(99)).unwrap();
    let getter = evaluator
        .expr(&profile, "amount")
        .context_type("Order")
        .result_type("Int")
        .compile()
        .unwrap();
    assert_eq!(getter.eval(&ctx).unwrap(), Value::Int(99));

    let err = evaluator
        .expr(&profile, "a=${this.amount}")
        .template()
        .setter()
        .context_type("Order")
        .result_type("Int")
        .compile()
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Compile(CompileError::Template(_))
    ));
}

#[test]
fn variables_are_supplied_by_name() {
    let profile = permissive();
    let evaluator = Evaluator::new(registry());
    let callable = evaluator
        .expr(&profile, "greeting.len + offset")
        .context_type("Unit")
        .result_type("Int")
        .variable("greeting", "Str")
        .variable("offset", "Int")
        .compile()
        .unwrap();

    let vars = Vars::new().set("greeting", "hey").set("offset", 10i64);
    assert_eq!(callable.eval_with(&Value::Unit, &vars).unwrap(), Value::Int(13));

    let missing = Vars::new().set("greeting", "hey");
    let err = callable.eval_with(&Value::Unit, &missing).unwrap_err();
    assert!(matches!(
        err,
        Error::Eval(palisade_lib::EvalError::MissingVariable(name)) if name == "offset"
    ));
}

#[test]
fn evicted_callables_transparently_recompile() {
    let profile = permissive();
    let evaluator = Evaluator::new(registry());
    let callable = evaluator
        .expr(&profile, "2 * 21")
        .context_type("Unit")
        .result_type("Int")
        .compile()
        .unwrap();
    assert_eq!(callable.eval(&Value::Unit).unwrap(), Value::Int(42));

    assert!(evaluator.evict(callable.def()));
    // The strong artifact reference is gone; the next call re-resolves.
    assert_eq!(callable.eval(&Value::Unit).unwrap(), Value::Int(42));
}

#[test]
fn reset_invalidates_but_callables_survive() {
    let profile = permissive();
    let evaluator = Evaluator::new(registry());
    let callable = evaluator
        .expr(&profile, "1 + 1")
        .context_type("Unit")
        .result_type("Int")
        .compile()
        .unwrap();
    assert_eq!(callable.eval(&Value::Unit).unwrap(), Value::Int(2));

    evaluator.reset();
    assert_eq!(callable.eval(&Value::Unit).unwrap(), Value::Int(2));
}

#[test]
fn runtime_errors_surface_unchanged() {
    let profile = permissive();
    let evaluator = Evaluator::new(registry());
    let callable = evaluator
        .expr(&profile, "1 / 0")
        .context_type("Unit")
        .result_type("Int")
        .compile()
        .unwrap();
    let err = callable.eval(&Value::Unit).unwrap_err();
    assert!(matches!(
        err,
        Error::Eval(palisade_lib::EvalError::DivisionByZero)
    ));
}

#[test]
fn utilities_are_visible_to_expressions() {
    let acl = palisade_lib::Acl::builder()
        .allow(|p| p.on("Str").member("len"))
        .build()
        .unwrap();
    let profile = std::sync::Arc::new(
        palisade_lib::ExpressionProfile::builder("with-utils")
            .acl(acl)
            .utilities(indoc! {r#"
                let greeting = "hello"
                let shout = greeting.to_upper()
            "#})
            .build(),
    );
    let evaluator = Evaluator::new(registry());
    let callable = evaluator
        .expr(&profile, "shout.len")
        .context_type("Unit")
        .result_type("Int")
        .compile()
        .unwrap();
    assert_eq!(callable.eval(&Value::Unit).unwrap(), Value::Int(5));
}

#[test]
fn header_sees_the_context() {
    let profile = {
        let acl = palisade_lib::Acl::builder()
            .allow(|p| p.on("Any").all_members())
            .build()
            .unwrap();
        std::sync::Arc::new(
            palisade_lib::ExpressionProfile::builder("with-header")
                .acl(acl)
                .header("let doubled = this.amount * 2")
                .build(),
        )
    };
    let evaluator = Evaluator::new(registry());
    let callable = evaluator
        .expr(&profile, "doubled + 1")
        .context_type("Order")
        .result_type("Int")
        .compile()
        .unwrap();
    assert_eq!(callable.eval(&Order::value("n", 21)).unwrap(), Value::Int(43));
}

#[test]
fn diagnostics_remap_into_template_holes() {
    let profile = permissive();
    let evaluator = Evaluator::new(registry());
    let err = evaluator
        .expr(&profile, "value is ${nonsense}")
        .template()
        .context_type("Unit")
        .result_type("Str")
        .compile()
        .unwrap_err();
    let Error::Compile(CompileError::Rejected(report)) = err else {
        panic!("expected rejection");
    };
    let entry = &report.entries[0];
    assert!(entry.message.contains("unknown name `nonsense`"));
    // The position points into the original template text.
    assert_eq!(entry.line, "value is ${nonsense}");
    assert_eq!(entry.column, "value is ${".len() + 1);
}
