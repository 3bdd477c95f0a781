mod common;

use std::sync::Arc;

use common::{permissive, registry};
use palisade_lib::{
    Acl, Evaluator, ExpressionProfile, TypeDef, TypeRegistry, TypeRep, Value,
};

fn doc_registry(size_result: TypeRep) -> TypeRegistry {
    let mut reg = TypeRegistry::with_builtins();
    let result = size_result.clone();
    reg.register(
        TypeDef::new("Doc").method("size", &[], size_result, move |_| {
            Ok(match result.name.as_str() {
                "Float" => Value::Float(2.5),
                _ => Value::Int(2),
            })
        }),
    );
    reg
}

fn evaluator_at(dir: &std::path::Path, reg: TypeRegistry) -> Evaluator {
    Evaluator::builder(reg)
        .artifact_dir(dir)
        .host_token("test")
        .build()
        .unwrap()
}

#[test]
fn artifacts_and_signatures_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let profile = permissive();
    let evaluator = evaluator_at(dir.path(), registry());
    let callable = evaluator
        .expr(&profile, r#""hello".len"#)
        .context_type("Unit")
        .result_type("Int")
        .compile()
        .unwrap();
    assert_eq!(callable.eval(&Value::Unit).unwrap(), Value::Int(5));

    let unit = callable.def().unit_name();
    let unit_dir = dir.path().join(&unit);
    assert!(unit_dir.join(format!("{unit}.plb")).exists());
    assert!(unit_dir.join(format!("{unit}.pex")).exists());
    let sig = std::fs::read_to_string(unit_dir.join(format!("{unit}.sig"))).unwrap();
    assert!(sig.starts_with("SIGNATURES:\n"));
    assert!(sig.contains("Str.len(): Int"));
    assert!(sig.contains("Str()i64"));

    assert_eq!(
        std::fs::read_to_string(dir.path().join("cacheVersion"))
            .unwrap()
            .trim(),
        "1.test"
    );
}

#[test]
fn restart_with_unchanged_signatures_reuses_the_artifact() {
    let dir = tempfile::tempdir().unwrap();

    // First process: a permissive profile compiles and persists.
    {
        let profile = permissive();
        let evaluator = evaluator_at(dir.path(), registry());
        let callable = evaluator
            .expr(&profile, r#""hello".len"#)
            .context_type("Unit")
            .result_type("Int")
            .compile()
            .unwrap();
        assert_eq!(callable.eval(&Value::Unit).unwrap(), Value::Int(5));
    }

    // Second process: a profile with the same name and an EMPTY ACL. A
    // fresh compile would be denied; a signature-cache hit skips
    // compilation entirely, so this succeeding proves reuse.
    {
        let profile = Arc::new(
            ExpressionProfile::builder("permissive")
                .acl(Acl::builder().build().unwrap())
                .build(),
        );
        let evaluator = evaluator_at(dir.path(), registry());
        let callable = evaluator
            .expr(&profile, r#""hello".len"#)
            .context_type("Unit")
            .result_type("Int")
            .compile()
            .unwrap();
        assert_eq!(callable.eval(&Value::Unit).unwrap(), Value::Int(5));
    }
}

#[test]
fn changed_signature_forces_recompile() {
    let dir = tempfile::tempdir().unwrap();
    let profile = permissive();

    {
        let evaluator = evaluator_at(dir.path(), doc_registry(TypeRep::int()));
        let callable = evaluator
            .expr(&profile, "this.size")
            .context_type("Doc")
            .result_type("Any")
            .compile()
            .unwrap();
        // The context object is irrelevant for a native zero-arg method.
        assert_eq!(callable.eval(&Value::Unit).unwrap(), Value::Int(2));
    }

    // The host library changed: `Doc.size` now returns Float. The stored
    // signature no longer resolves, so the unit recompiles against the new
    // registry and produces the new result type.
    {
        let evaluator = evaluator_at(dir.path(), doc_registry(TypeRep::float()));
        let callable = evaluator
            .expr(&profile, "this.size")
            .context_type("Doc")
            .result_type("Any")
            .compile()
            .unwrap();
        assert_eq!(callable.eval(&Value::Unit).unwrap(), Value::Float(2.5));
    }
}

#[test]
fn version_token_change_clears_the_directory() {
    let dir = tempfile::tempdir().unwrap();
    let profile = permissive();

    let unit = {
        let evaluator = evaluator_at(dir.path(), registry());
        let callable = evaluator
            .expr(&profile, "1 + 2")
            .context_type("Unit")
            .result_type("Int")
            .compile()
            .unwrap();
        callable.def().unit_name()
    };
    assert!(dir.path().join(&unit).exists());

    // A different host token reconciles by clearing everything.
    let _evaluator = Evaluator::builder(registry())
        .artifact_dir(dir.path())
        .host_token("other")
        .build()
        .unwrap();
    assert!(!dir.path().join(&unit).exists());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("cacheVersion"))
            .unwrap()
            .trim(),
        "1.other"
    );
}

#[test]
fn corrupt_artifact_is_a_miss_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let profile = permissive();

    let unit = {
        let evaluator = evaluator_at(dir.path(), registry());
        let callable = evaluator
            .expr(&profile, "6 * 7")
            .context_type("Unit")
            .result_type("Int")
            .compile()
            .unwrap();
        callable.def().unit_name()
    };

    // Flip bytes in the stored artifact.
    let plb = dir.path().join(&unit).join(format!("{unit}.plb"));
    let mut bytes = std::fs::read(&plb).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    std::fs::write(&plb, bytes).unwrap();

    // The next process recompiles silently.
    let evaluator = evaluator_at(dir.path(), registry());
    let callable = evaluator
        .expr(&profile, "6 * 7")
        .context_type("Unit")
        .result_type("Int")
        .compile()
        .unwrap();
    assert_eq!(callable.eval(&Value::Unit).unwrap(), Value::Int(42));
}
