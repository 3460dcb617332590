use std::io;

use similar_asserts::assert_eq;

use super::*;
use crate::{Location, MemoryLoader, ProtoMember};

struct FailingLoader;

impl Loader for FailingLoader {
    fn load(&self, name: &str) -> Result<(Location, String), Error> {
        if name == "root.proto" {
            return Ok((Location::get(name), "import \"broken.proto\";".to_owned()));
        }
        Err(Error::new(io::Error::new(
            io::ErrorKind::Other,
            "failed to load file!",
        )))
    }
}

fn file_names(compiler: &Compiler) -> Vec<&str> {
    compiler
        .files()
        .iter()
        .map(|file| file.location.path())
        .collect()
}

#[test]
fn follows_imports() {
    let loader = MemoryLoader::new([
        ("a.proto", "import \"b.proto\"; import public \"c.proto\";"),
        ("b.proto", "import \"c.proto\";"),
        ("c.proto", "import \"d.proto\";"),
        ("d.proto", ""),
        ("unused.proto", ""),
    ]);

    let mut compiler = Compiler::with_loader(loader);
    compiler.open_file("a.proto").unwrap();

    assert_eq!(
        file_names(&compiler),
        ["a.proto", "b.proto", "c.proto", "d.proto"]
    );
}

#[test]
fn files_are_opened_once() {
    let loader = MemoryLoader::new([
        ("a.proto", "import \"c.proto\";"),
        ("b.proto", "import \"c.proto\";"),
        ("c.proto", "message C {}"),
    ]);

    let mut compiler = Compiler::with_loader(loader);
    compiler
        .open_files(["a.proto", "b.proto"])
        .unwrap()
        .open_file("c.proto")
        .unwrap();

    assert_eq!(file_names(&compiler), ["a.proto", "b.proto", "c.proto"]);
    assert!(compiler.link().is_ok());
}

#[test]
fn syntax_errors_are_collected() {
    let loader = MemoryLoader::new([
        ("root.proto", "import \"a.proto\"; import \"b.proto\";"),
        ("a.proto", "message {}"),
        ("b.proto", "enum E { A = ; }"),
    ]);

    let err = Compiler::with_loader(loader)
        .open_file("root.proto")
        .unwrap_err();

    assert!(err.is_parse());
    let messages: Vec<String> = err
        .syntax_errors()
        .iter()
        .map(|err| format!("{}: {}", err.location(), err.message()))
        .collect();
    assert_eq!(
        messages,
        [
            "a.proto:1:9: expected an identifier, but found '{'",
            "b.proto:1:14: expected an integer, but found ';'",
        ]
    );
}

#[test]
fn missing_import() {
    let loader = MemoryLoader::new([("a.proto", "import \"missing.proto\";")]);

    let err = Compiler::with_loader(loader)
        .open_file("a.proto")
        .unwrap_err();

    assert!(err.is_file_not_found());
    assert_eq!(err.to_string(), "file 'missing.proto' not found");
}

#[test]
fn loader_errors_are_returned() {
    let err = Compiler::with_loader(FailingLoader)
        .open_file("root.proto")
        .unwrap_err();

    assert!(!err.is_file_not_found());
    assert_eq!(err.to_string(), "failed to load file!");
}

#[test]
fn bundled_descriptor() {
    let loader = MemoryLoader::new([(
        "a.proto",
        r#"
            import "google/protobuf/descriptor.proto";
            extend google.protobuf.MessageOptions {
                optional string label = 50000;
            }
            message A {
                option (label) = "a";
            }
        "#,
    )]);

    let mut compiler = Compiler::with_loader(loader);
    compiler.open_file("a.proto").unwrap();
    assert_eq!(file_names(&compiler), ["a.proto", DESCRIPTOR_NAME]);

    let schema = compiler.link().unwrap();
    let label = ProtoMember::get("google.protobuf.MessageOptions#label").unwrap();
    let message = schema.get_type("A").unwrap();
    assert!(message.options().unwrap().get(&label).is_some());
}

#[test]
fn include_descriptor() {
    let loader = MemoryLoader::new([(
        "a.proto",
        "message A { repeated int32 values = 1 [packed = true]; }",
    )]);
    let packed = ProtoMember::get("google.protobuf.FieldOptions#packed").unwrap();
    let values = ProtoMember::get("A#values").unwrap();

    let mut compiler = Compiler::with_loader(loader.clone());
    compiler.open_file("a.proto").unwrap();
    assert_eq!(file_names(&compiler), ["a.proto"]);
    let schema = compiler.link().unwrap();
    let field = schema.get_field(&values).unwrap();
    assert!(field.options().get(&packed).is_some());
    assert!(field.is_packed());

    let mut compiler = Compiler::with_loader(loader);
    compiler.include_descriptor(false).open_file("a.proto").unwrap();
    let schema = compiler.link().unwrap();
    let field = schema.get_field(&values).unwrap();
    assert!(field.options().get(&packed).is_none());
    assert!(field.is_packed());
    assert!(schema.get_type("google.protobuf.FieldOptions").is_none());
}

#[test]
fn link_errors() {
    let loader = MemoryLoader::new([("a.proto", "message A { optional B b = 1; }")]);

    let mut compiler = Compiler::with_loader(loader);
    let err = compiler.open_file("a.proto").unwrap().link().unwrap_err();

    assert!(err.is_schema());
    assert_eq!(
        err.schema_error().unwrap().messages(),
        ["unable to resolve B\n  for field b (a.proto:1:13)\n  in message A (a.proto:1:1)\n  in file a.proto"]
    );
}

#[test]
fn fmt_debug() {
    let compiler = Compiler::with_loader(MemoryLoader::default());

    assert_eq!(
        format!("{:?}", compiler),
        "Compiler { files: [], include_descriptor: true, .. }"
    );
}
