//! Locating protobuf source files.

mod google;

pub(crate) use google::{descriptor_file, DESCRIPTOR_NAME};

use std::collections::HashMap;

use protoschema_parse::Location;

use crate::Error;

/// A strategy for locating protobuf source files by the name used to import them.
///
/// The library does not read from the file system itself. [`MemoryLoader`] serves sources held
/// in memory, and other implementations may read from directories, archives or the network.
pub trait Loader {
    /// Loads the file with the given import name, returning its location and source text.
    ///
    /// # Errors
    ///
    /// If the file does not exist, the implementation should return
    /// [`Error::file_not_found()`].
    fn load(&self, name: &str) -> Result<(Location, String), Error>;
}

impl<T> Loader for &T
where
    T: Loader + ?Sized,
{
    fn load(&self, name: &str) -> Result<(Location, String), Error> {
        (**self).load(name)
    }
}

impl<T> Loader for Box<T>
where
    T: Loader + ?Sized,
{
    fn load(&self, name: &str) -> Result<(Location, String), Error> {
        (**self).load(name)
    }
}

/// A [`Loader`] over a fixed set of in-memory sources.
///
/// # Examples
///
/// ```
/// # use protoschema::{Loader, MemoryLoader};
/// let mut loader = MemoryLoader::new([("foo.proto", "message Foo {}")]);
/// loader.add("bar.proto", "import \"foo.proto\";");
///
/// let (location, source) = loader.load("foo.proto").unwrap();
/// assert_eq!(location.path(), "foo.proto");
/// assert_eq!(source, "message Foo {}");
/// assert!(loader.load("baz.proto").unwrap_err().is_file_not_found());
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    files: HashMap<String, String>,
}

impl MemoryLoader {
    /// Creates a loader serving each `(name, source)` pair.
    pub fn new<I, N, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        MemoryLoader {
            files: files
                .into_iter()
                .map(|(name, source)| (name.into(), source.into()))
                .collect(),
        }
    }

    /// Adds or replaces the source of the file `name`.
    pub fn add(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.files.insert(name.into(), source.into());
        self
    }
}

impl Loader for MemoryLoader {
    fn load(&self, name: &str) -> Result<(Location, String), Error> {
        match self.files.get(name) {
            Some(source) => Ok((Location::get(name), source.clone())),
            None => Err(Error::file_not_found(name)),
        }
    }
}
