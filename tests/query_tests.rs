mod common;

use common::fixtures::catalog_document;
use common::{TestResult, eval, eval_doc, strings, truth};
use metaschema::{ErrorCode, query};

#[test]
fn test_predicates_and_aggregates() -> TestResult {
    let document = catalog_document();
    let titles = eval_doc(&document, "//control[prop/@value > 4]/title")?;
    assert_eq!(strings(&titles), ["Accounts", "Audit"]);

    let total = eval_doc(&document, "sum(//prop/@value)")?;
    assert_eq!(strings(&total), ["15"]);
    assert!(eval_doc(&document, "avg(//prop/@value) eq 5")?.effective_boolean_value()?);
    assert_eq!(strings(&eval_doc(&document, "max(//prop/@value)")?), ["7"]);
    Ok(())
}

#[test]
fn test_string_functions_over_nodes() -> TestResult {
    let document = catalog_document();
    let joined = eval_doc(&document, "string-join(//control/@id, ',')")?;
    assert_eq!(strings(&joined), ["ac-1,ac-2,au-1"]);
    let upper = eval_doc(&document, "//group ! upper-case(@id)")?;
    assert_eq!(strings(&upper), ["AC", "AU"]);
    let matching = eval_doc(&document, "//control[matches(@id, '^au-')]/title")?;
    assert_eq!(strings(&matching), ["Audit"]);
    Ok(())
}

#[test]
fn test_node_functions() -> TestResult {
    let document = catalog_document();
    let path = eval_doc(&document, "path((//control)[3]/@id)")?;
    assert_eq!(strings(&path), ["/catalog/group[2]/control[1]/@id"]);
    let names = eval_doc(&document, "/catalog/* ! name()")?;
    assert_eq!(strings(&names), ["metadata", "group", "group"]);
    assert!(eval_doc(&document, "has-children(/catalog/metadata)")?.effective_boolean_value()?);
    assert!(!eval_doc(&document, "has-children((//title)[1])")?.effective_boolean_value()?);
    let uri = eval_doc(&document, "document-uri(/)")?;
    assert_eq!(strings(&uri), ["file:///catalog.json"]);
    Ok(())
}

#[test]
fn test_flwor_style_expressions() -> TestResult {
    let document = catalog_document();
    let counts = eval_doc(
        &document,
        "for $g in //group return $g/@id || '=' || count($g/control)",
    )?;
    assert_eq!(strings(&counts), ["ac=2", "au=1"]);
    assert!(eval_doc(&document, "every $c in //control satisfies exists($c/title)")?
        .effective_boolean_value()?);
    let labels = eval_doc(
        &document,
        "let $min := 4 return //control ! (if (prop/@value ge $min) then 'high' else 'low')",
    )?;
    assert_eq!(strings(&labels), ["low", "high", "high"]);
    Ok(())
}

#[test]
fn test_maps_and_arrays() -> TestResult {
    let by_id = eval(
        "let $m := map { 'a': 1, 'b': 2 } return (map:size($m), $m?b, map:contains($m, 'c'))",
    )?;
    assert_eq!(strings(&by_id), ["2", "2", "false"]);
    assert!(eval("map { 'a': 1 }?missing")?.is_empty());
    let arrays = eval("array:size(array:append([1, 2], 3)), [1, [2, 3]]?2?1")?;
    assert_eq!(strings(&arrays), ["3", "2"]);
    let flattened = eval("array:flatten([1, [2, [3]]])")?;
    assert_eq!(strings(&flattened), ["1", "2", "3"]);
    Ok(())
}

#[test]
fn test_higher_order_functions() -> TestResult {
    let applied = eval("let $double := function($x) { $x * 2 } return (1, 2, 3) ! $double(.)")?;
    assert_eq!(strings(&applied), ["2", "4", "6"]);
    let named = eval("let $f := upper-case#1 return $f('abc')")?;
    assert_eq!(strings(&named), ["ABC"]);
    let arrow = eval("'a b c' => tokenize() => count()")?;
    assert_eq!(strings(&arrow), ["3"]);
    Ok(())
}

#[test]
fn test_dynamic_errors_carry_codes() {
    assert_eq!(eval("1 div 0").unwrap_err().code(), ErrorCode::FOAR0001);
    assert_eq!(eval("'a' + 1").unwrap_err().code(), ErrorCode::XPTY0004);
    assert_eq!(eval("error()").unwrap_err().code(), ErrorCode::FOER0000);
    assert_eq!(eval("./x").unwrap_err().code(), ErrorCode::XPDY0002);
    assert!(truth("empty(())"));
}

#[test]
fn test_query_facade() -> TestResult {
    let document = catalog_document();
    let result = query(&document, "count(//control)")?;
    assert_eq!(strings(&result), ["3"]);
    Ok(())
}
