use protoschema_parse::{parse, Location};
use similar_asserts::assert_eq;

use super::*;
use crate::{file::descriptor_file, link::link, options::Value};

const SOURCE: &str = r#"syntax = "proto2";
package shop;

import "google/protobuf/descriptor.proto";

option java_package = "com.shop";

// An order placed by a customer.
message Order {
  optional string id = 1;
  repeated Item items = 2 [deprecated = true];
  map<string, int32> counts = 3;

  oneof payment {
    string card = 4;
    string voucher = 5;
  }

  extensions 100 to 199;

  message Item {
    optional int64 sku = 1;
  }
}

enum Status {
  option allow_alias = true;

  PENDING = 0;
  STARTED = 1;
  RUNNING = 1;
}

extend Order {
  optional string note = 100;
}

service Orders {
  rpc Place (Order) returns (Order);
  rpc Watch (Order) returns (stream Order);
}
"#;

fn schema() -> Schema {
    link(vec![
        parse(Location::get("shop.proto"), SOURCE).unwrap(),
        descriptor_file().clone(),
    ])
    .unwrap()
}

fn order(schema: &Schema) -> &MessageType {
    match schema.get_type("shop.Order") {
        Some(Type::Message(message)) => message,
        _ => panic!("expected a message"),
    }
}

#[test]
fn print_linked_file() {
    let schema = schema();
    let file = schema.proto_file("shop.proto").unwrap();

    assert_eq!(file.to_schema(), SOURCE);
    assert_eq!(file.package_name(), Some("shop"));
    assert_eq!(file.imports(), ["google/protobuf/descriptor.proto"]);
    assert!(!file.is_empty());
}

#[test]
fn lookup_types() {
    let schema = schema();

    assert!(matches!(schema.get_type("shop.Order"), Some(Type::Message(_))));
    assert!(matches!(schema.get_type(".shop.Order.Item"), Some(Type::Message(_))));
    assert!(matches!(schema.get_type("shop.Status"), Some(Type::Enum(_))));
    assert!(schema.get_type("shop.Orders").is_none());
    assert!(schema.get_type("Order").is_none());

    let service = schema.get_service("shop.Orders").unwrap();
    assert_eq!(service.name(), "Orders");
    assert!(!service.rpc("Place").unwrap().response_streaming());
    assert!(service.rpc("Watch").unwrap().response_streaming());
    assert_eq!(
        service.rpc("Watch").unwrap().request_type(),
        &ProtoType::get("shop.Order")
    );
    assert!(schema.get_service("shop.Order").is_none());
}

#[test]
fn message_fields() {
    let schema = schema();
    let order = order(&schema);

    let names: Vec<_> = order.fields_and_one_of_fields().map(Field::name).collect();
    assert_eq!(names, ["id", "items", "counts", "card", "voucher"]);

    let items = order.field("items").unwrap();
    assert!(items.is_repeated());
    assert!(items.is_deprecated());
    assert_eq!(items.element_type(), "Item");
    assert_eq!(items.ty(), &ProtoType::get("shop.Order.Item"));

    let counts = order.field("counts").unwrap();
    assert_eq!(counts.ty().key_type(), Some(&ProtoType::get("string")));
    assert_eq!(counts.ty().value_type(), Some(&ProtoType::get("int32")));

    assert_eq!(order.field_by_tag(5).map(Field::name), Some("voucher"));
    assert!(order.is_extension_tag(150));
    assert!(!order.is_extension_tag(200));
}

#[test]
fn extension_fields() {
    let schema = schema();
    let order = order(&schema);

    let note = order.extension_field("shop.note").unwrap();
    assert!(note.is_extension());
    assert_eq!(note.name(), "note");
    assert_eq!(note.tag(), 100);
    assert_eq!(order.field_by_tag(100).map(Field::name), Some("note"));
    assert!(order.field("note").is_none());

    let member = ProtoMember::get("shop.Order#shop.note").unwrap();
    assert_eq!(schema.get_field(&member).map(Field::tag), Some(100));
    assert_eq!(
        schema.proto_file("shop.proto").unwrap().extends()[0].ty(),
        &ProtoType::get("shop.Order")
    );
}

#[test]
fn enum_constants() {
    let schema = schema();
    let Some(Type::Enum(status)) = schema.get_type("shop.Status") else {
        panic!("expected an enum")
    };

    assert!(status.allow_alias());
    assert_eq!(status.constant_by_tag(1).map(EnumConstant::name), Some("STARTED"));
    assert_eq!(status.constant("RUNNING").map(EnumConstant::tag), Some(1));
}

#[test]
fn documentation_and_options() {
    let schema = schema();
    let order = order(&schema);

    assert_eq!(order.documentation(), "An order placed by a customer.");
    assert_eq!(order.location().to_string(), "shop.proto:9:1");

    let java_package = ProtoMember::get("google.protobuf.FileOptions#java_package").unwrap();
    let file = schema.proto_file("shop.proto").unwrap();
    assert_eq!(
        file.options().get(&java_package),
        Some(&Value::String("com.shop".to_owned()))
    );
    assert_eq!(file.options().options_type(), &ProtoType::get("google.protobuf.FileOptions"));
}

#[test]
fn json_names() {
    let schema = link(vec![parse(
        Location::get("test.proto"),
        "message M { optional int32 foo_bar = 1; optional int32 baz = 2 [json_name = \"qux\"]; }",
    )
    .unwrap()])
    .unwrap();

    let foo_bar = schema.get_field(&ProtoMember::get("M#foo_bar").unwrap()).unwrap();
    assert_eq!(foo_bar.json_name(), "fooBar");
    let baz = schema.get_field(&ProtoMember::get("M#baz").unwrap()).unwrap();
    assert_eq!(baz.json_name(), "qux");
}
