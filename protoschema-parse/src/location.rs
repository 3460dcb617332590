use std::{
    fmt,
    hash::{Hash, Hasher},
};

/// The position of an element or error within a `.proto` source file.
///
/// Lines and columns are 1-indexed, with `-1` meaning "unknown". Two locations in the same
/// file compare equal regardless of their line and column, so element trees built from
/// different renderings of the same file can be compared structurally.
#[derive(Debug, Clone, Eq)]
pub struct Location {
    base: String,
    path: String,
    line: i32,
    column: i32,
}

impl Location {
    /// Creates a location for the file at `path`, relative to the directory or archive `base`.
    pub fn new(base: impl Into<String>, path: impl Into<String>) -> Self {
        Location {
            base: base.into(),
            path: path.into(),
            line: -1,
            column: -1,
        }
    }

    /// Creates a location for the file at `path` with no base.
    pub fn get(path: impl Into<String>) -> Self {
        Location::new("", path)
    }

    /// Returns a copy of this location pointing at the given line and column.
    pub fn at(&self, line: i32, column: i32) -> Self {
        Location {
            base: self.base.clone(),
            path: self.path.clone(),
            line,
            column,
        }
    }

    /// Returns a copy of this location with the base removed.
    pub fn without_base(&self) -> Self {
        Location {
            base: String::new(),
            path: self.path.clone(),
            line: self.line,
            column: self.column,
        }
    }

    /// The directory or archive the file was loaded from. May be empty.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The path of the file, relative to its base. This is the name used by `import` statements.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The 1-indexed line, or `-1` if unknown.
    pub fn line(&self) -> i32 {
        self.line
    }

    /// The 1-indexed column, or `-1` if unknown.
    pub fn column(&self) -> i32 {
        self.column
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.path == other.path
    }
}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base.hash(state);
        self.path.hash(state);
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.base.is_empty() {
            write!(f, "{}/", self.base)?;
        }
        write!(f, "{}", self.path)?;
        if self.line != -1 {
            write!(f, ":{}", self.line)?;
            if self.column != -1 {
                write!(f, ":{}", self.column)?;
            }
        }
        Ok(())
    }
}
