mod common;

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, FixedOffset};
use common::{TestResult, init_logging, strings};
use metaschema::{
    AtomicValue, DocumentBuilder, DynamicContext, ErrorCode, Item, MetapathExpression, QName,
    Sequence, StaticContext, StaticContextConfig, StaticContextRegistry,
};

const NS: &str = "urn:example:model";

fn namespaced_document() -> metaschema::Document {
    let builder = DocumentBuilder::new(Some("file:///ns.json"), QName::namespaced(NS, "root"));
    let root = builder.root();
    builder
        .new_field(root, QName::namespaced(NS, "f"), Some(AtomicValue::string("value")))
        .expect("field");
    builder.build()
}

#[test]
fn test_config_from_json_drives_name_resolution() -> TestResult {
    init_logging();
    let config = StaticContextConfig::from_json(&format!(
        r#"{{
            "base-uri": "file:///ns.json",
            "default-model-namespace": "{NS}",
            "namespaces": {{ "ex": "{NS}" }},
            "variables": ["limit"]
        }}"#
    ))?;
    let static_context = Arc::new(config.into_builder()?.build());
    assert_eq!(static_context.base_uri(), Some("file:///ns.json"));
    assert_eq!(static_context.namespace_for_prefix("ex"), Some(NS));

    let document = namespaced_document();
    let ctx = DynamicContext::builder(Arc::clone(&static_context))
        .variable(QName::local("limit"), Sequence::from_atomic(AtomicValue::integer(3)))
        .build();
    let focus = || Some(Item::Node(document.document_node()));

    let unprefixed = MetapathExpression::compile("/root/f", &static_context)?;
    assert_eq!(strings(&unprefixed.evaluate(&ctx, focus())?), ["value"]);
    let prefixed = MetapathExpression::compile("/ex:root/ex:f", &static_context)?;
    assert_eq!(strings(&prefixed.evaluate(&ctx, focus())?), ["value"]);
    let variable = MetapathExpression::compile("$limit * 2", &static_context)?;
    assert_eq!(variable.evaluate_as_string(&ctx, None)?, "6");
    Ok(())
}

#[test]
fn test_config_rejects_unknown_keys() {
    let err = StaticContextConfig::from_json(r#"{ "base_uri": "x" }"#).unwrap_err();
    assert!(err.to_string().contains("invalid static context configuration"));
}

#[test]
fn test_undeclared_names_fail_to_compile() {
    let context = StaticContext::default();
    assert_eq!(
        MetapathExpression::compile("$limit", &context).unwrap_err().code(),
        ErrorCode::XPST0008
    );
    assert_eq!(
        MetapathExpression::compile("ex:root", &context).unwrap_err().code(),
        ErrorCode::XPST0081
    );
}

#[test]
fn test_registry_interns_one_context_per_base_uri() {
    let registry = StaticContextRegistry::new();
    let contexts: Vec<Arc<StaticContext>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    registry.get_or_insert_with("file:///a.json", || {
                        StaticContext::builder().base_uri("file:///a.json").build()
                    })
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker thread"))
            .collect()
    });
    assert!(contexts.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(registry.len(), 1);

    registry.get_or_insert_with("file:///b.json", StaticContext::default);
    assert_eq!(registry.len(), 2);
    assert!(registry.get("file:///missing.json").is_none());
    registry.clear();
    assert!(registry.is_empty());
}

#[test]
fn test_function_results_are_cached_per_context() -> TestResult {
    init_logging();
    let static_context = Arc::new(StaticContext::default());
    let expr = MetapathExpression::compile("upper-case('abc'), upper-case('abc')", &static_context)?;

    let ctx = DynamicContext::new(Arc::clone(&static_context));
    assert_eq!(strings(&expr.evaluate(&ctx, None)?), ["ABC", "ABC"]);
    assert_eq!(ctx.cache_len(), 1);

    let uncached = DynamicContext::builder(static_context).disable_cache().build();
    assert_eq!(strings(&expr.evaluate(&uncached, None)?), ["ABC", "ABC"]);
    assert_eq!(uncached.cache_len(), 0);
    Ok(())
}

#[test]
fn test_failures_are_not_cached() {
    let static_context = Arc::new(StaticContext::default());
    let ctx = DynamicContext::<metaschema::Node<'static>>::new(Arc::clone(&static_context));
    let expr = MetapathExpression::compile("array:get([1], 5)", &static_context).unwrap();
    assert_eq!(expr.evaluate(&ctx, None).unwrap_err().code(), ErrorCode::FOAY0001);
    assert_eq!(ctx.cache_len(), 0);
}

#[test]
fn test_clock_is_fixed_per_context() -> TestResult {
    let now: DateTime<FixedOffset> = DateTime::parse_from_rfc3339("2024-03-15T10:30:00+01:00")?;
    let static_context = Arc::new(StaticContext::default());
    let ctx = DynamicContext::<metaschema::Node<'static>>::builder(Arc::clone(&static_context))
        .current_date_time(now)
        .build();
    let same = MetapathExpression::compile("current-date-time() eq current-date-time()", &static_context)?;
    assert!(same.evaluate_as_boolean(&ctx, None)?);
    let year = MetapathExpression::compile("year-from-date(current-date())", &static_context)?;
    assert_eq!(year.evaluate_as_string(&ctx, None)?, "2024");
    Ok(())
}
