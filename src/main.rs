use std::{
    fs, io,
    path::{Path, PathBuf},
};

use clap::Parser;
use miette::{miette, IntoDiagnostic, Result};
use protoschema::{prost::Message, Compiler, Error, IdentifierSet, Loader, Location, Schema};

#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Args {
    /// The source file(s) to load, by the name used to import them.
    #[clap(value_name = "PROTO_FILES", required = true, value_parser)]
    files: Vec<String>,
    /// The directory in which to search for imports.
    #[clap(
        short = 'I',
        long = "include-path",
        visible_alias = "proto_path",
        value_name = "PATH",
        default_value = ".",
        value_parser
    )]
    includes: Vec<PathBuf>,
    /// Types or members to keep, along with everything they depend on.
    #[clap(long = "root", value_name = "IDENTIFIERS", value_delimiter = ',')]
    roots: Vec<String>,
    /// Types or members to remove.
    #[clap(long = "prune", value_name = "IDENTIFIERS", value_delimiter = ',')]
    prunes: Vec<String>,
    /// The output path to write a file descriptor set to.
    #[clap(
        short = 'o',
        long = "output",
        visible_alias = "descriptor_set_out",
        value_name = "PATH",
        value_parser
    )]
    output: Option<PathBuf>,
    /// Print the resulting schema as `.proto` source.
    #[clap(long)]
    print: bool,
}

/// Loads files from the first include directory that contains them.
#[derive(Debug)]
struct DirectoryLoader {
    includes: Vec<PathBuf>,
}

impl Loader for DirectoryLoader {
    fn load(&self, name: &str) -> Result<(Location, String), Error> {
        for include in &self.includes {
            match fs::read_to_string(include.join(name)) {
                Ok(source) => return Ok((Location::new(display(include), name), source)),
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(Error::file_not_found(name))
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

pub fn main() -> Result<()> {
    miette::set_panic_hook();

    let args = Args::parse();

    let mut compiler = Compiler::with_loader(DirectoryLoader {
        includes: args.includes,
    });
    compiler.open_files(&args.files)?;
    let mut schema = compiler.link()?;

    if !args.roots.is_empty() || !args.prunes.is_empty() {
        schema = prune(&schema, &args.roots, &args.prunes)?;
    }

    if args.print {
        for file in schema.proto_files() {
            if !file.is_empty() {
                println!("// {}\n{}", file.path(), file.to_schema());
            }
        }
    }

    if let Some(output) = args.output {
        fs::write(output, schema.to_file_descriptor_set().encode_to_vec()).into_diagnostic()?;
    }
    Ok(())
}

fn prune(schema: &Schema, roots: &[String], prunes: &[String]) -> Result<Schema> {
    if let Some(invalid) = roots
        .iter()
        .chain(prunes)
        .find(|identifier| !IdentifierSet::is_valid_rule(identifier))
    {
        return Err(miette!("invalid identifier '{}'", invalid));
    }

    let identifier_set = IdentifierSet::builder()
        .include_all(roots)
        .exclude_all(prunes)
        .build()?;
    let pruned = schema.prune(&identifier_set);

    for include in identifier_set.unused_includes() {
        eprintln!("warning: unused root '{}'", include);
    }
    for exclude in identifier_set.unused_excludes() {
        eprintln!("warning: unused prune '{}'", exclude);
    }
    Ok(pruned)
}
