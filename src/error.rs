use std::{fmt, io};

use miette::Diagnostic;
use protoschema_parse::SyntaxError;
use thiserror::Error;

/// An error that can occur when loading, parsing or linking protobuf files.
#[derive(Diagnostic, Error)]
#[error(transparent)]
#[diagnostic(transparent)]
pub struct Error {
    kind: Box<ErrorKind>,
}

#[derive(Debug, Diagnostic, Error)]
pub(crate) enum ErrorKind {
    #[error("{}", join_lines(.errors))]
    Parse {
        #[related]
        errors: Vec<SyntaxError>,
    },
    #[error("{}", err)]
    #[diagnostic(forward(err))]
    Schema { err: SchemaError },
    #[error("file '{name}' not found")]
    FileNotFound { name: String },
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

/// The problems found while linking a set of files into a [`Schema`](crate::Schema).
///
/// Linking does not stop at the first problem: every message collected during linking is
/// reported. Each message names the problem, followed by the declarations it occurred in,
/// innermost first:
///
/// ```text
/// unable to resolve Bar
///   for field bar (foo.proto:4:3)
///   in message pkg.Foo (foo.proto:3:1)
///   in file foo.proto
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
#[error("{}", .messages.join("\n"))]
pub struct SchemaError {
    messages: Vec<String>,
}

impl SchemaError {
    pub(crate) fn new(messages: Vec<String>) -> Self {
        debug_assert!(!messages.is_empty());
        SchemaError { messages }
    }

    /// Every problem found, in the order they were encountered.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl Error {
    /// Creates an instance of [`struct@Error`] with an arbitrary payload.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::from_kind(ErrorKind::Custom(error.into()))
    }

    /// Creates an instance of [`struct@Error`] indicating that a file could not be found.
    ///
    /// This error should be returned by [`Loader`](crate::Loader) instances if a file does not
    /// exist.
    pub fn file_not_found(name: &str) -> Self {
        Error::from_kind(ErrorKind::FileNotFound {
            name: name.to_owned(),
        })
    }

    pub(crate) fn parse(errors: Vec<SyntaxError>) -> Self {
        debug_assert!(!errors.is_empty());
        Error::from_kind(ErrorKind::Parse { errors })
    }

    pub(crate) fn from_kind(kind: ErrorKind) -> Self {
        Error {
            kind: Box::new(kind),
        }
    }

    #[cfg(test)]
    pub(crate) fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns true if this is an instance of [`Error::file_not_found()`].
    pub fn is_file_not_found(&self) -> bool {
        matches!(&*self.kind, ErrorKind::FileNotFound { .. })
    }

    /// Returns true if this error is caused by one or more invalid protobuf source files.
    pub fn is_parse(&self) -> bool {
        matches!(&*self.kind, ErrorKind::Parse { .. })
    }

    /// Returns true if the files parsed successfully but could not be linked.
    pub fn is_schema(&self) -> bool {
        matches!(&*self.kind, ErrorKind::Schema { .. })
    }

    /// The syntax errors, if this error was caused by invalid source files.
    pub fn syntax_errors(&self) -> &[SyntaxError] {
        match &*self.kind {
            ErrorKind::Parse { errors } => errors,
            _ => &[],
        }
    }

    /// The link error, if the files parsed successfully but could not be linked.
    pub fn schema_error(&self) -> Option<&SchemaError> {
        match &*self.kind {
            ErrorKind::Schema { err } => Some(err),
            _ => None,
        }
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::from_kind(ErrorKind::Schema { err })
    }
}

impl From<SyntaxError> for Error {
    fn from(err: SyntaxError) -> Self {
        Error::parse(vec![err])
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::new(err)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.kind {
            ErrorKind::Parse { errors } => {
                for (index, err) in errors.iter().enumerate() {
                    if index != 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{:?}", err)?;
                }
                Ok(())
            }
            ErrorKind::Schema { err } => write!(f, "{}", err),
            ErrorKind::FileNotFound { .. } => write!(f, "{}", self),
            ErrorKind::Custom(err) => fmt::Debug::fmt(err, f),
        }
    }
}

fn join_lines<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use protoschema_parse::{parse, Location};

    use super::*;

    #[test]
    fn fmt_debug_parse() {
        let first = parse(Location::get("a.proto"), "message {}").unwrap_err();
        let second = parse(Location::get("b.proto"), "enum E { A = ; }").unwrap_err();
        let err = Error::parse(vec![first, second]);

        assert!(err.is_parse());
        assert!(!err.is_schema());
        assert_eq!(err.syntax_errors().len(), 2);
        assert_eq!(
            format!("{:?}", err),
            "a.proto:1:9: expected an identifier, but found '{'\nb.proto:1:14: expected an integer, but found ';'"
        );
        assert_eq!(
            err.to_string(),
            "Syntax error in a.proto:1:9: expected an identifier, but found '{'\nSyntax error in b.proto:1:14: expected an integer, but found ';'"
        );
    }

    #[test]
    fn fmt_schema() {
        let err = Error::from(SchemaError::new(vec![
            "unable to resolve Foo".to_owned(),
            "tag is out of range: 0".to_owned(),
        ]));

        assert!(err.is_schema());
        assert!(matches!(err.kind(), ErrorKind::Schema { .. }));
        assert_eq!(
            err.schema_error().map(|err| err.messages().len()),
            Some(2)
        );
        assert_eq!(err.to_string(), "unable to resolve Foo\ntag is out of range: 0");
        assert_eq!(format!("{:?}", err), err.to_string());
    }

    #[test]
    fn file_not_found() {
        let err = Error::file_not_found("missing.proto");

        assert!(err.is_file_not_found());
        assert!(!err.is_parse());
        assert_eq!(err.to_string(), "file 'missing.proto' not found");
    }

    #[test]
    fn custom_io() {
        let err = Error::from(io::Error::new(io::ErrorKind::Other, "io error"));

        assert!(matches!(err.kind(), ErrorKind::Custom(_)));
        assert_eq!(format!("{:?}", err), "Custom { kind: Other, error: \"io error\" }");
        assert_eq!(err.to_string(), "io error");
    }
}
