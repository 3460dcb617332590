use crate::Location;

/// Maps byte offsets within a source file to 1-indexed line and column numbers.
pub(crate) struct LineResolver {
    lines: Vec<usize>,
}

impl LineResolver {
    pub fn new(source_code: &str) -> Self {
        let lines = source_code
            .match_indices('\n')
            .map(|(index, _)| index + 1)
            .collect();
        LineResolver { lines }
    }

    /// Returns the zero-based line and column of `offset`.
    pub fn resolve(&self, offset: usize) -> (usize, usize) {
        match self.lines.binary_search(&offset) {
            Ok(index) => (index + 1, 0),
            Err(0) => (0, offset),
            Err(index) => (index, offset - self.lines[index - 1]),
        }
    }

    pub fn location(&self, file: &Location, offset: usize) -> Location {
        let (line, column) = self.resolve(offset);
        file.at(to_i32(line) + 1, to_i32(column) + 1)
    }
}

fn to_i32(index: usize) -> i32 {
    index.try_into().unwrap_or(i32::MAX)
}

#[test]
fn resolve_line_number() {
    let resolver = LineResolver::new("hello\nworld\nfoo");

    assert_eq!(resolver.resolve(0), (0, 0));
    assert_eq!(resolver.resolve(4), (0, 4));
    assert_eq!(resolver.resolve(5), (0, 5));
    assert_eq!(resolver.resolve(6), (1, 0));
    assert_eq!(resolver.resolve(7), (1, 1));
    assert_eq!(resolver.resolve(11), (1, 5));
    assert_eq!(resolver.resolve(12), (2, 0));
    assert_eq!(resolver.resolve(14), (2, 2));
}

#[test]
fn resolve_location() {
    let resolver = LineResolver::new("message Foo {\n  int32 a = 1;\n}\n");
    let file = Location::get("foo.proto");

    let location = resolver.location(&file, 16);
    assert_eq!(location.line(), 2);
    assert_eq!(location.column(), 3);
    assert_eq!(location.to_string(), "foo.proto:2:3");
}
