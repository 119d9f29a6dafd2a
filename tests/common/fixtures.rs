use metaschema::{AtomicValue, DataType, Document, DocumentBuilder, QName};

fn q(name: &str) -> QName {
    QName::local(name)
}

/// A root assembly `root` holding a single field `f` with the value `"hello"`.
pub fn hello_document() -> Document {
    let builder = DocumentBuilder::new(Some("file:///hello.json"), q("root"));
    let root = builder.root();
    builder
        .new_field(root, q("f"), Some(AtomicValue::string("hello")))
        .expect("field under root");
    builder.build()
}

/// ```text
/// catalog @version=1.0
///   metadata/title "Sample"
///   group @id=ac
///     control @id=ac-1 /title "Policy" /prop @value=3
///     control @id=ac-2 /title "Accounts" /prop @value=7
///   group @id=au
///     control @id=au-1 /title "Audit" /prop @value=5
/// ```
pub fn catalog_document() -> Document {
    let builder = DocumentBuilder::new(Some("file:///catalog.json"), q("catalog"));
    let root = builder.root();
    builder
        .new_flag(root, q("version"), AtomicValue::string("1.0"))
        .expect("version flag");
    let metadata = builder.new_assembly(root, q("metadata")).expect("metadata");
    builder
        .new_field(metadata, q("title"), Some(AtomicValue::string("Sample")))
        .expect("metadata title");

    let groups = [
        ("ac", vec![("ac-1", "Policy", 3), ("ac-2", "Accounts", 7)]),
        ("au", vec![("au-1", "Audit", 5)]),
    ];
    for (group_id, controls) in groups {
        let group = builder.new_assembly(root, q("group")).expect("group");
        builder
            .new_flag(group, q("id"), token(group_id))
            .expect("group id");
        for (control_id, title, value) in controls {
            let control = builder.new_assembly(group, q("control")).expect("control");
            builder
                .new_flag(control, q("id"), token(control_id))
                .expect("control id");
            builder
                .new_field(control, q("title"), Some(AtomicValue::string(title)))
                .expect("control title");
            let prop = builder.new_assembly(control, q("prop")).expect("prop");
            builder
                .new_flag(prop, q("value"), AtomicValue::integer(value))
                .expect("prop value");
        }
    }
    builder.build()
}

fn token(text: &str) -> AtomicValue {
    DataType::Token.parse(text).expect("valid token")
}
