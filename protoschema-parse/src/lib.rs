//! Parsing of `.proto` source files into an element tree.
//!
//! See the documentation for [`parse()`] for details.
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod ast;
mod error;
mod lex;
mod lines;
mod location;
mod parse;

pub use crate::error::SyntaxError;
pub use crate::location::Location;

/// Parses a single `.proto` source file.
///
/// `location` identifies the file, and is attached to every element in the result with the line
/// and column of the element's declaration. Comments immediately preceding a declaration, or
/// following it on the same line, become its documentation.
///
/// Only the syntax of the file is checked. Type references are kept as written, and no
/// validation of tags, names or options is performed.
///
/// # Examples
///
/// ```
/// # use protoschema_parse::{parse, Location, ast::TypeElement};
/// let source = r#"
///     syntax = "proto3";
///     package greeting;
///
///     // Says hello.
///     message Hello {
///         string name = 1;
///     }
/// "#;
///
/// let file = parse(Location::get("hello.proto"), source).unwrap();
/// assert_eq!(file.package_name.as_deref(), Some("greeting"));
///
/// let TypeElement::Message(message) = &file.types[0] else { panic!() };
/// assert_eq!(message.name, "Hello");
/// assert_eq!(message.documentation, "Says hello.");
/// assert_eq!(message.location.to_string(), "hello.proto:6:5");
/// assert_eq!(message.fields[0].ty, "string");
/// ```
///
/// Errors carry the position of the offending token:
///
/// ```
/// # use protoschema_parse::{parse, Location};
/// let err = parse(Location::get("bad.proto"), "message Foo {\n  int32 a = ;\n}").unwrap_err();
/// assert_eq!(
///     err.to_string(),
///     "Syntax error in bad.proto:2:13: expected an integer, but found ';'"
/// );
/// ```
pub fn parse(location: Location, source: &str) -> Result<ast::ProtoFileElement, SyntaxError> {
    parse::parse_file(location, source)
}
