use std::fmt;

use logos::Span;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::Location;

/// An error that may occur while parsing a `.proto` source file.
#[derive(Error, Diagnostic)]
#[error("Syntax error in {location}: {message}")]
pub struct SyntaxError {
    location: Location,
    message: String,
    #[label("found here")]
    span: Option<SourceSpan>,
    #[source_code]
    source_code: NamedSource,
}

impl SyntaxError {
    pub(crate) fn new(location: Location, message: String, span: Option<Span>, source: &str) -> Self {
        let source_code = NamedSource::new(location.path(), source.to_owned());
        SyntaxError {
            location,
            message,
            span: span.map(SourceSpan::from),
            source_code,
        }
    }

    /// The file, line and column at which the error occurred.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// A description of the error, without its location.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The byte range of the offending token, or `None` if the end of the file was reached.
    pub fn span(&self) -> Option<Span> {
        self.span
            .map(|span| span.offset()..(span.offset() + span.len()))
    }
}

impl fmt::Debug for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}
