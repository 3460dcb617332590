use protoschema_parse::{
    ast::{OptionElement, OptionValue},
    parse, Location,
};
use similar_asserts::assert_eq;

use super::{IdentifierSet, MarkSet};
use crate::{
    file::descriptor_file,
    link::link,
    schema::{Schema, Type},
    types::{ProtoMember, ProtoType},
};

const CHAIN: &str = r#"
    package p;
    message A {
        optional B b = 1;
        optional int32 x = 2;
    }
    message B { optional C c = 1; }
    message C { optional string s = 1; }
    message D {}
"#;

fn schema(source: &str) -> Schema {
    link(vec![parse(Location::get("test.proto"), source).unwrap()]).unwrap()
}

fn schema_with_descriptor(source: &str) -> Schema {
    link(vec![
        parse(Location::get("test.proto"), source).unwrap(),
        descriptor_file().clone(),
    ])
    .unwrap()
}

fn prune(schema: &Schema, includes: &[&str], excludes: &[&str]) -> Schema {
    let identifier_set = IdentifierSet::builder()
        .include_all(includes.iter().copied())
        .exclude_all(excludes.iter().copied())
        .build()
        .unwrap();
    schema.prune(&identifier_set)
}

fn type_names(schema: &Schema) -> Vec<String> {
    fn add(types: &[Type], names: &mut Vec<String>) {
        for ty in types {
            match ty {
                Type::Enclosing(_) => names.push(format!("{} (enclosing)", ty.ty())),
                Type::Message(_) | Type::Enum(_) => names.push(ty.ty().to_string()),
            }
            add(ty.nested_types(), names);
        }
    }

    let mut names = Vec::new();
    for file in schema.proto_files() {
        if file.path() == "test.proto" {
            add(file.types(), &mut names);
        }
    }
    names
}

fn field_names(schema: &Schema, name: &str) -> Vec<String> {
    match schema.get_type(name) {
        Some(Type::Message(message)) => message
            .fields_and_one_of_fields()
            .chain(message.extension_fields())
            .map(|field| field.qualified_name().to_owned())
            .collect(),
        _ => panic!("{} is not a message", name),
    }
}

#[test]
fn retain_type_closure() {
    let pruned = prune(&schema(CHAIN), &["p.A"], &[]);

    assert_eq!(type_names(&pruned), ["p.A", "p.B", "p.C"]);
    assert_eq!(field_names(&pruned, "p.A"), ["b", "x"]);
}

#[test]
fn retain_member_closure() {
    let pruned = prune(&schema(CHAIN), &["p.A#b"], &[]);

    assert_eq!(type_names(&pruned), ["p.A", "p.B", "p.C"]);
    assert_eq!(field_names(&pruned, "p.A"), ["b"]);
    assert_eq!(field_names(&pruned, "p.B"), ["c"]);
}

#[test]
fn exclude_drops_referencing_fields() {
    let pruned = prune(&schema(CHAIN), &["p.A"], &["p.C"]);

    assert_eq!(type_names(&pruned), ["p.A", "p.B"]);
    assert_eq!(field_names(&pruned, "p.B"), Vec::<String>::new());
}

#[test]
fn exclude_without_includes() {
    let original = schema(CHAIN);
    let pruned = prune(&original, &[], &["p.C", "p.A#x"]);

    assert_eq!(type_names(&pruned), ["p.A", "p.B", "p.D"]);
    assert_eq!(field_names(&pruned, "p.A"), ["b"]);
    assert_eq!(field_names(&pruned, "p.B"), Vec::<String>::new());

    assert_eq!(type_names(&original), ["p.A", "p.B", "p.C", "p.D"]);
}

#[test]
fn empty_identifier_set_retains_everything() {
    let original = schema(CHAIN);
    let pruned = prune(&original, &[], &[]);

    assert_eq!(type_names(&pruned), type_names(&original));
    assert_eq!(
        pruned.proto_files()[0].to_schema(),
        original.proto_files()[0].to_schema()
    );
}

#[test]
fn one_of_siblings_are_dropped() {
    let pruned = prune(
        &schema(
            "message M { oneof choice { string a = 1; string b = 2; } optional int32 c = 3; }",
        ),
        &["M#a"],
        &[],
    );

    let Some(Type::Message(message)) = pruned.get_type("M") else {
        panic!("expected a message")
    };
    assert!(message.fields().is_empty());
    assert_eq!(message.one_ofs().len(), 1);
    assert_eq!(message.one_ofs()[0].name(), "choice");
    assert_eq!(message.one_ofs()[0].fields().len(), 1);
    assert_eq!(message.one_ofs()[0].fields()[0].name(), "a");
}

#[test]
fn cyclic_types() {
    let pruned = prune(
        &schema(
            "message Node { optional Node next = 1; repeated Node children = 2; optional Leaf leaf = 3; } message Leaf { optional Node parent = 1; } message Unused {}",
        ),
        &["Node"],
        &[],
    );

    assert_eq!(type_names(&pruned), ["Node", "Leaf"]);
}

#[test]
fn map_types_are_marked() {
    let pruned = prune(
        &schema("message M { map<string, V> values = 1; } message V {} message Unused {}"),
        &["M"],
        &[],
    );

    assert_eq!(type_names(&pruned), ["M", "V"]);
}

#[test]
fn enclosing_types() {
    let pruned = prune(
        &schema(
            "package p; message Outer { optional int32 x = 1; message Inner { optional int32 y = 1; } message Other {} }",
        ),
        &["p.Outer.Inner"],
        &[],
    );

    assert_eq!(type_names(&pruned), ["p.Outer (enclosing)", "p.Outer.Inner"]);
    assert_eq!(
        pruned.proto_files()[0].to_schema(),
        "package p;\n\nmessage Outer {\n  message Inner {\n    optional int32 y = 1;\n  }\n}\n"
    );
}

#[test]
fn excluded_types_drop_nested_types() {
    let source = "package p; message Outer { message Inner {} } message M { optional Outer.Inner i = 1; optional int32 x = 2; }";

    let pruned = prune(&schema(source), &[], &["p.Outer"]);
    assert_eq!(type_names(&pruned), ["p.M"]);
    assert_eq!(field_names(&pruned, "p.M"), ["x"]);

    let pruned = prune(&schema(source), &["p.M"], &["p.Outer"]);
    assert_eq!(type_names(&pruned), ["p.M"]);
    assert!(pruned.get_type("p.Outer.Inner").is_none());
}

#[test]
fn services() {
    let source = r#"
        message Req {}
        message Res {}
        message Other {}
        service S {
            rpc A (Req) returns (Res);
            rpc B (Other) returns (Other);
        }
    "#;

    let pruned = prune(&schema(source), &["S#A"], &[]);
    let service = pruned.get_service("S").unwrap();
    assert_eq!(service.rpcs().len(), 1);
    assert_eq!(service.rpcs()[0].name(), "A");
    assert_eq!(type_names(&pruned), ["Req", "Res"]);

    let pruned = prune(&schema(source), &["S"], &["Other"]);
    let service = pruned.get_service("S").unwrap();
    assert_eq!(service.rpcs().len(), 1);

    let pruned = prune(&schema(source), &["Req"], &[]);
    assert!(pruned.get_service("S").is_none());
    assert_eq!(type_names(&pruned), ["Req"]);
}

#[test]
fn enum_constants() {
    let pruned = prune(
        &schema("enum E { A = 0; B = 1; C = 2; } message M { optional E e = 1; }"),
        &["M"],
        &["E#B"],
    );

    let Some(Type::Enum(enum_)) = pruned.get_type("E") else {
        panic!("expected an enum")
    };
    let names: Vec<_> = enum_.constants().iter().map(|constant| constant.name()).collect();
    assert_eq!(names, ["A", "C"]);
}

#[test]
fn wildcards() {
    let pruned = prune(
        &schema("package a.b; message M { optional N n = 1; } message N {} message O {}"),
        &["a.*"],
        &["a.b.O"],
    );

    assert_eq!(type_names(&pruned), ["a.b.M", "a.b.N"]);
}

#[test]
fn custom_options() {
    let source = r#"
        package foo;
        import "google/protobuf/descriptor.proto";

        extend google.protobuf.FieldOptions {
            optional string label = 50000;
            optional string unused = 50001;
        }

        message M {
            optional int32 a = 1 [(label) = "x"];
        }
    "#;
    let label = ProtoMember::get("google.protobuf.FieldOptions#foo.label").unwrap();

    let pruned = prune(&schema_with_descriptor(source), &["foo.M"], &[]);
    let field = pruned.get_field(&ProtoMember::get("foo.M#a").unwrap()).unwrap();
    assert!(field.options().get(&label).is_some());
    assert_eq!(
        field_names(&pruned, "google.protobuf.FieldOptions"),
        ["foo.label"]
    );
    assert!(pruned.get_type("google.protobuf.MessageOptions").is_none());
    assert_eq!(pruned.proto_file("test.proto").unwrap().extends().len(), 1);

    let pruned = prune(
        &schema_with_descriptor(source),
        &["foo.M"],
        &["google.protobuf.FieldOptions#foo.label"],
    );
    let field = pruned.get_field(&ProtoMember::get("foo.M#a").unwrap()).unwrap();
    assert!(field.options().is_empty());
    assert!(pruned.get_type("google.protobuf.FieldOptions").is_none());
    assert!(pruned.proto_file("test.proto").unwrap().extends().is_empty());
}

#[test]
fn excluded_option_fields_are_not_printed() {
    let source = r#"
        package foo;
        import "google/protobuf/descriptor.proto";

        message Rule {
            optional string keep = 1;
            optional string secret = 2;
        }

        extend google.protobuf.FieldOptions {
            optional Rule rule = 50000;
        }

        message M {
            optional int32 a = 1 [(rule) = { keep: "k", secret: "s" }];
            optional int32 b = 2 [(rule).secret = "s"];
        }
    "#;

    let pruned = prune(
        &schema_with_descriptor(source),
        &["foo.M"],
        &["foo.Rule#secret"],
    );

    assert_eq!(field_names(&pruned, "foo.Rule"), ["keep"]);
    let a = pruned.get_field(&ProtoMember::get("foo.M#a").unwrap()).unwrap();
    assert_eq!(
        a.options().elements(),
        [OptionElement {
            name: "rule".to_owned(),
            value: OptionValue::Map(vec![(
                "keep".to_owned(),
                OptionValue::String("k".to_owned())
            )]),
            is_parenthesized: true,
        }]
    );
    let b = pruned.get_field(&ProtoMember::get("foo.M#b").unwrap()).unwrap();
    assert!(b.options().is_empty());

    let printed = pruned.proto_file("test.proto").unwrap().to_schema();
    assert!(printed.contains("keep: \"k\""));
    assert!(!printed.contains("secret"));
}

#[test]
fn structural_options_are_always_retained() {
    let pruned = prune(
        &schema_with_descriptor(
            "message M { repeated int32 a = 1 [packed = true, deprecated = true]; optional string b = 2 [default = \"x\"]; }",
        ),
        &[],
        &["google.protobuf.FieldOptions"],
    );

    assert!(pruned.get_type("google.protobuf.FieldOptions").is_none());
    let a = pruned.get_field(&ProtoMember::get("M#a").unwrap()).unwrap();
    assert!(a.is_packed());
    assert!(a.is_deprecated());
    let b = pruned.get_field(&ProtoMember::get("M#b").unwrap()).unwrap();
    assert!(b.default().is_some());
}

#[test]
fn unused_rules_are_reported() {
    let identifier_set = IdentifierSet::builder()
        .include("p.A")
        .include("p.Missing")
        .exclude("p.C")
        .exclude("q.*")
        .build()
        .unwrap();
    schema(CHAIN).prune(&identifier_set);

    assert_eq!(identifier_set.unused_includes(), ["p.Missing"]);
    assert_eq!(identifier_set.unused_excludes(), ["q.*"]);
}

#[test]
fn mark_set_members() {
    let identifier_set = IdentifierSet::builder()
        .include("a.A")
        .exclude("a.B#x")
        .build()
        .unwrap();
    let mut marks = MarkSet::new(&identifier_set);

    let a = ProtoType::get("a.A");
    let b = ProtoType::get("a.B");
    marks.root_type(a.clone());
    assert!(marks.contains_all_members(&a));
    assert!(marks.contains_member(&ProtoMember::new(a.clone(), "y")));

    assert!(marks.mark_member(ProtoMember::new(b.clone(), "y")));
    assert!(!marks.mark_member(ProtoMember::new(b.clone(), "y")));
    assert!(!marks.mark_member(ProtoMember::new(b.clone(), "x")));
    assert!(marks.contains_type(&b));
    assert!(!marks.contains_all_members(&b));
    assert!(!marks.contains_member(&ProtoMember::new(b.clone(), "z")));

    assert!(marks.mark_type(b.clone()));
    assert!(!marks.mark_type(b.clone()));
    assert!(marks.contains_all_members(&b));
    assert!(marks.contains_member(&ProtoMember::new(b.clone(), "z")));
    assert!(!marks.contains_member(&ProtoMember::new(b, "x")));

    assert!(marks.contains_type(&ProtoType::get("map<string, a.A>")));
    assert!(!marks.contains_type(&ProtoType::get("map<string, a.C>")));
}

#[test]
#[should_panic(expected = "already a root")]
fn mark_set_reroot() {
    let identifier_set = IdentifierSet::builder().include("a.A").build().unwrap();
    let mut marks = MarkSet::new(&identifier_set);
    marks.root_type(ProtoType::get("a.A"));
    marks.root_type(ProtoType::get("a.A"));
}

#[test]
#[should_panic(expected = "cannot root excluded member")]
fn mark_set_root_excluded() {
    let identifier_set = IdentifierSet::builder()
        .include("a.A")
        .exclude("a.A#b")
        .build()
        .unwrap();
    let mut marks = MarkSet::new(&identifier_set);
    marks.root_member(ProtoMember::get("a.A#b").unwrap());
}
