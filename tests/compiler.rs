use std::io;

use miette::Diagnostic;
use prost::Message;
use prost_types::FileDescriptorSet;
use protoschema::{Compiler, Error, IdentifierSet, Loader, Location, ProtoMember, Schema, Type};
use similar_asserts::assert_eq;

struct TestLoader {
    files: &'static [(&'static str, &'static str)],
}

impl Loader for TestLoader {
    fn load(&self, name: &str) -> Result<(Location, String), Error> {
        if name == "customerror.proto" {
            return Err(Error::new(io::Error::new(
                io::ErrorKind::Other,
                "failed to load file!",
            )));
        }

        for file in self.files {
            if file.0 == name {
                return Ok((Location::get(name), file.1.to_owned()));
            }
        }

        Err(Error::file_not_found(name))
    }
}

fn compile(files: &'static [(&'static str, &'static str)]) -> Result<Schema, Error> {
    let mut compiler = Compiler::with_loader(TestLoader { files });
    compiler.open_file(files[0].0)?;
    compiler.link()
}

const DIRECTORY: &[(&str, &str)] = &[
    (
        "directory.proto",
        r#"syntax = "proto3";
package directory;

import "google/protobuf/descriptor.proto";
import "common.proto";

message Person {
  string name = 1;
  string email = 2 [(sensitive) = true];
  common.Address address = 3;
  repeated PhoneNumber phones = 4;

  message PhoneNumber {
    string number = 1;
    common.PhoneType type = 2;
  }
}

message Team {
  string name = 1;
  repeated Person members = 2;
}

extend google.protobuf.FieldOptions {
  bool sensitive = 50000;
}

service Directory {
  rpc GetPerson (common.Id) returns (Person);
  rpc GetTeam (common.Id) returns (Team);
}
"#,
    ),
    (
        "common.proto",
        r#"syntax = "proto3";
package common;

message Id {
  string value = 1;
}

message Address {
  string street = 1;
  string city = 2;
}

enum PhoneType {
  MOBILE = 0;
  HOME = 1;
}
"#,
    ),
];

#[test]
fn print_round_trip() {
    let schema = compile(DIRECTORY).unwrap();

    let paths: Vec<_> = schema.proto_files().iter().map(|file| file.path()).collect();
    assert_eq!(
        paths,
        [
            "directory.proto",
            "google/protobuf/descriptor.proto",
            "common.proto"
        ]
    );
    for &(path, source) in DIRECTORY {
        assert_eq!(schema.proto_file(path).unwrap().to_schema(), source);
    }
}

#[test]
fn prune_rpc() {
    let schema = compile(DIRECTORY).unwrap();
    let identifier_set = IdentifierSet::builder()
        .include("directory.Directory#GetPerson")
        .exclude("directory.Person#phones")
        .exclude("common.Address#street")
        .build()
        .unwrap();

    let pruned = schema.prune(&identifier_set);

    assert_eq!(
        pruned.proto_file("directory.proto").unwrap().to_schema(),
        r#"syntax = "proto3";
package directory;

import "google/protobuf/descriptor.proto";
import "common.proto";

message Person {
  string name = 1;
  string email = 2 [(sensitive) = true];
  common.Address address = 3;
}

extend google.protobuf.FieldOptions {
  bool sensitive = 50000;
}

service Directory {
  rpc GetPerson (common.Id) returns (Person);
}
"#
    );
    assert_eq!(
        pruned.proto_file("common.proto").unwrap().to_schema(),
        r#"syntax = "proto3";
package common;

message Id {
  string value = 1;
}

message Address {
  string city = 2;
}
"#
    );
    assert!(identifier_set.unused_includes().is_empty());
    assert!(identifier_set.unused_excludes().is_empty());
}

#[test]
fn prune_drops_unused_custom_options() {
    let schema = compile(DIRECTORY).unwrap();
    let identifier_set = IdentifierSet::builder()
        .include("common.*")
        .build()
        .unwrap();

    let pruned = schema.prune(&identifier_set);

    assert!(pruned
        .proto_file("directory.proto")
        .unwrap()
        .types()
        .is_empty());
    assert!(pruned
        .proto_file("directory.proto")
        .unwrap()
        .extends()
        .is_empty());
    assert!(matches!(
        pruned.get_type("common.PhoneType"),
        Some(Type::Enum(_))
    ));
    assert!(pruned
        .get_type("google.protobuf.FieldOptions")
        .is_none());
}

#[test]
fn prune_keeps_referenced_custom_options() {
    let schema = compile(DIRECTORY).unwrap();
    let identifier_set = IdentifierSet::builder()
        .include("directory.Person#email")
        .build()
        .unwrap();

    let pruned = schema.prune(&identifier_set);

    let sensitive = ProtoMember::get("google.protobuf.FieldOptions#directory.sensitive").unwrap();
    let email = pruned
        .get_field(&ProtoMember::get("directory.Person#email").unwrap())
        .unwrap();
    assert!(email.options().get(&sensitive).is_some());
    assert!(pruned
        .get_field(&ProtoMember::get("directory.Person#name").unwrap())
        .is_none());
    assert!(pruned.get_type("common.Address").is_none());
}

#[test]
fn file_descriptor_set() {
    let schema = compile(DIRECTORY).unwrap();

    let file_descriptor_set = schema.to_file_descriptor_set();
    let bytes = file_descriptor_set.encode_to_vec();
    let decoded = FileDescriptorSet::decode(bytes.as_slice()).unwrap();
    assert_eq!(decoded, file_descriptor_set);

    let directory = &decoded.file[0];
    assert_eq!(directory.dependency, ["google/protobuf/descriptor.proto", "common.proto"]);
    assert_eq!(directory.extension[0].extendee(), ".google.protobuf.FieldOptions");
    assert_eq!(directory.service[0].method[1].output_type(), ".directory.Team");

    let person = &directory.message_type[0];
    assert_eq!(person.field[2].type_name(), ".common.Address");
    assert_eq!(person.nested_type[0].field[1].type_name(), ".common.PhoneType");
    assert_eq!(
        person.nested_type[0].field[1].r#type(),
        prost_types::field_descriptor_proto::Type::Enum
    );
}

#[test]
fn syntax_errors() {
    let err = compile(&[
        ("root.proto", "import \"a.proto\";\nimport \"b.proto\";"),
        ("a.proto", "message Foo {\n  int32 a = ;\n}"),
        ("b.proto", "syntax = \"proto4\";"),
    ])
    .unwrap_err();

    assert!(err.is_parse());
    assert_eq!(
        err.to_string(),
        "Syntax error in a.proto:2:13: expected an integer, but found ';'\nSyntax error in b.proto:1:10: 'syntax' must be 'proto2' or 'proto3'"
    );
    let related: Vec<_> = err.related().unwrap().collect();
    assert_eq!(related.len(), 2);
    assert!(related[0].labels().is_some());
}

#[test]
fn link_errors() {
    let err = compile(&[(
        "root.proto",
        "message A { optional B b = 1; optional int32 c = 0; }",
    )])
    .unwrap_err();

    assert!(err.is_schema());
    assert_eq!(
        err.to_string(),
        "unable to resolve B\n  for field b (root.proto:1:13)\n  in message A (root.proto:1:1)\n  in file root.proto\n\
         tag is out of range: 0\n  for field c (root.proto:1:31)\n  in message A (root.proto:1:1)\n  in file root.proto"
    );
}

#[test]
fn missing_file() {
    let err = compile(&[("root.proto", "import \"missing.proto\";")]).unwrap_err();
    assert!(err.is_file_not_found());

    let err = compile(&[("root.proto", "import \"customerror.proto\";")]).unwrap_err();
    assert!(!err.is_file_not_found());
    assert_eq!(err.to_string(), "failed to load file!");
}
