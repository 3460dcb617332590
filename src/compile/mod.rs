use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt,
};

use protoschema_parse::{ast::ProtoFileElement, parse, SyntaxError};
use tracing::{debug, trace};

use crate::{
    file::{descriptor_file, Loader, DESCRIPTOR_NAME},
    link::link,
    Error, Schema,
};

#[cfg(test)]
mod tests;

/// Loads a set of protobuf files along with everything they import, and links them into a
/// [`Schema`].
///
/// # Examples
///
/// ```
/// # use protoschema::{Compiler, MemoryLoader};
/// let loader = MemoryLoader::new([
///     ("foo.proto", "package foo; import \"bar.proto\"; message Foo { bar.Bar bar = 1; }"),
///     ("bar.proto", "package bar; message Bar {}"),
/// ]);
///
/// let schema = Compiler::with_loader(loader)
///     .open_file("foo.proto")
///     .unwrap()
///     .link()
///     .unwrap();
/// assert!(schema.get_type("bar.Bar").is_some());
/// ```
pub struct Compiler {
    loader: Box<dyn Loader>,
    files: Vec<ProtoFileElement>,
    file_names: HashMap<String, usize>,
    include_descriptor: bool,
}

impl Compiler {
    /// Creates a new [`Compiler`] which looks up files, including imports, with `loader`.
    pub fn with_loader<L>(loader: L) -> Self
    where
        L: Loader + 'static,
    {
        Compiler {
            loader: Box::new(loader),
            files: Vec::new(),
            file_names: HashMap::new(),
            include_descriptor: true,
        }
    }

    /// Set whether the bundled `google/protobuf/descriptor.proto` should be linked along with the
    /// opened files, so that built-in options such as `packed` or `deprecated` are resolved.
    ///
    /// This is enabled by default. A `google/protobuf/descriptor.proto` served by the loader
    /// always takes precedence over the bundled copy.
    pub fn include_descriptor(&mut self, yes: bool) -> &mut Self {
        self.include_descriptor = yes;
        self
    }

    /// Loads and parses the file `name`, and every file it imports.
    pub fn open_file(&mut self, name: impl Into<String>) -> Result<&mut Self, Error> {
        self.open_files([name])
    }

    /// Loads and parses each of `names`, and every file they import.
    ///
    /// Files are only parsed once, no matter how often they are imported. If any file fails to
    /// parse, the remaining files are still parsed and all syntax errors are returned together.
    /// Errors from the loader, such as a missing file, are returned immediately.
    pub fn open_files(
        &mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<&mut Self, Error> {
        let mut queue: VecDeque<String> = names.into_iter().map(Into::into).collect();
        let mut errors: Vec<SyntaxError> = Vec::new();
        let mut failed: HashSet<String> = HashSet::new();
        let opened = self.files.len();

        while let Some(name) = queue.pop_front() {
            if self.file_names.contains_key(&name) || failed.contains(&name) {
                continue;
            }

            let file = match self.load(&name)? {
                Ok(file) => file,
                Err(err) => {
                    trace!(%name, "failed to parse file");
                    errors.push(err);
                    failed.insert(name);
                    continue;
                }
            };

            trace!(%name, imports = file.imports.len() + file.public_imports.len(), "parsed file");
            queue.extend(file.imports.iter().cloned());
            queue.extend(file.public_imports.iter().cloned());

            self.file_names.insert(name, self.files.len());
            self.files.push(file);
        }

        if !errors.is_empty() {
            return Err(Error::parse(errors));
        }

        debug!(
            opened = self.files.len() - opened,
            total = self.files.len(),
            "opened files"
        );
        Ok(self)
    }

    fn load(&self, name: &str) -> Result<Result<ProtoFileElement, SyntaxError>, Error> {
        match self.loader.load(name) {
            Ok((location, source)) => Ok(parse(location, &source)),
            Err(err) if err.is_file_not_found() && name == DESCRIPTOR_NAME => {
                Ok(Ok(descriptor_file().clone()))
            }
            Err(err) => Err(err),
        }
    }

    /// The parsed files, in the order they were opened.
    pub fn files(&self) -> &[ProtoFileElement] {
        &self.files
    }

    /// Links every opened file into a [`Schema`].
    pub fn link(&self) -> Result<Schema, Error> {
        let mut files = self.files.clone();
        if self.include_descriptor && !self.file_names.contains_key(DESCRIPTOR_NAME) {
            files.push(descriptor_file().clone());
        }

        Ok(link(files)?)
    }
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("files", &self.file_names.keys().collect::<Vec<_>>())
            .field("include_descriptor", &self.include_descriptor)
            .finish_non_exhaustive()
    }
}
