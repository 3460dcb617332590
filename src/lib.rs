//! Parsing, linking and pruning of protobuf schemas.
//!
//! Files are loaded through a [`Loader`] and parsed into element trees (see [`ast`]). A
//! [`Compiler`] follows imports and links the parsed files into a [`Schema`], in which every
//! type reference is resolved to a fully-qualified [`ProtoType`] and every option is matched to
//! the field it sets. A schema can then be reduced with [`Schema::prune()`] to the declarations
//! reachable from a chosen set of roots, printed back to `.proto` source, or converted to a
//! [`FileDescriptorSet`](prost_types::FileDescriptorSet).
//!
//! # Examples
//!
//! ```
//! use protoschema::{Compiler, IdentifierSet, MemoryLoader};
//!
//! let loader = MemoryLoader::new([
//!     (
//!         "shop.proto",
//!         r#"
//!             syntax = "proto3";
//!             package shop;
//!             import "money.proto";
//!
//!             message Order {
//!                 string id = 1;
//!                 money.Price total = 2;
//!             }
//!
//!             message Customer {
//!                 string name = 1;
//!             }
//!         "#,
//!     ),
//!     (
//!         "money.proto",
//!         r#"
//!             syntax = "proto3";
//!             package money;
//!
//!             message Price {
//!                 int64 cents = 1;
//!                 string currency = 2;
//!             }
//!         "#,
//!     ),
//! ]);
//!
//! let schema = Compiler::with_loader(loader)
//!     .open_file("shop.proto")?
//!     .link()?;
//!
//! let identifier_set = IdentifierSet::builder()
//!     .include("shop.Order")
//!     .exclude("money.Price#currency")
//!     .build()?;
//! let pruned = schema.prune(&identifier_set);
//!
//! assert!(pruned.get_type("shop.Customer").is_none());
//! assert_eq!(
//!     pruned.proto_file("money.proto").unwrap().to_schema(),
//!     "syntax = \"proto3\";\npackage money;\n\nmessage Price {\n  int64 cents = 1;\n}\n"
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Error messages
//!
//! Errors implement [`miette::Diagnostic`]. Syntax errors carry the source text and the span of
//! the offending token, so returning a [`miette::Result`] with the `fancy` feature enabled
//! prints them with context:
//!
//! ```text
//! Error:
//!   × Syntax error in foo.proto:2:13: expected an integer, but found ';'
//!    ╭─[foo.proto:1:1]
//!  1 │ message Foo {
//!  2 │   int32 a = ;
//!    ·             ┬
//!    ·             ╰── found here
//!  3 │ }
//!    ╰────
//! ```
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

mod case;
mod compile;
mod descriptor;
mod error;
mod file;
mod link;
mod options;
mod prune;
mod schema;
mod types;

pub use prost;
pub use prost_types;
pub use protoschema_parse;

pub use protoschema_parse::{ast, parse, Location, SyntaxError};

pub use self::compile::Compiler;
pub use self::error::{Error, SchemaError};
pub use self::file::{Loader, MemoryLoader};
pub use self::link::link;
pub use self::options::{Options, Value};
pub use self::prune::{IdentifierSet, IdentifierSetBuilder, IdentifierSetError};
pub use self::schema::{
    EnclosingType, EnumConstant, EnumType, Extend, Field, MessageType, OneOf, ProtoFile, Rpc,
    Schema, Service, Type,
};
pub use self::types::{ProtoMember, ProtoType, Scalar};
