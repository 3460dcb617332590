//! Resolution of parsed files into a [`Schema`].

mod options;
mod validate;

use std::collections::{HashMap, HashSet};

use protoschema_parse::{
    ast::{
        EnumElement, ExtendElement, FieldElement, GroupElement, MessageElement, OneOfElement,
        ProtoFileElement, RpcElement, ServiceElement, TypeElement,
    },
    Location,
};
use tracing::{debug, trace};

use crate::{
    error::SchemaError,
    options::{
        Options, ENUM_OPTIONS, ENUM_VALUE_OPTIONS, FIELD_OPTIONS, FILE_OPTIONS, MESSAGE_OPTIONS,
        METHOD_OPTIONS, ONEOF_OPTIONS, SERVICE_OPTIONS,
    },
    schema::{
        EnumConstant, EnumType, Extend, Field, MessageType, OneOf, ProtoFile, Rpc, Schema,
        Service, Type,
    },
    types::{split_map_type, ProtoType, Scalar},
};

/// Links a complete set of parsed files into a [`Schema`].
///
/// Every file referenced by an `import` must be included in `files`. All problems found are
/// reported together in the returned [`SchemaError`].
///
/// # Examples
///
/// ```
/// # use protoschema::{link, Location, parse, ProtoMember};
/// let a = parse(Location::get("a.proto"), "package a; message A { b.B b = 1; }").unwrap();
/// let b = parse(Location::get("b.proto"), "package a.b; message B {}").unwrap();
///
/// let err = link(vec![a.clone(), b.clone()]).unwrap_err();
/// assert_eq!(
///     err.to_string(),
///     "a.proto needs to import b.proto\n  for field b (a.proto:1:24)\n  in message a.A (a.proto:1:12)\n  in file a.proto"
/// );
///
/// let a = parse(
///     Location::get("a.proto"),
///     "package a; import \"b.proto\"; message A { b.B b = 1; }",
/// )
/// .unwrap();
/// let schema = link(vec![a, b]).unwrap();
/// let field = schema.get_field(&ProtoMember::get("a.A#b").unwrap()).unwrap();
/// assert_eq!(field.ty().to_string(), "a.b.B");
/// ```
pub fn link(files: Vec<ProtoFileElement>) -> Result<Schema, SchemaError> {
    let mut linker = Linker::new(&files);

    linker.register();
    debug!(
        files = files.len(),
        types = linker.types.len(),
        services = linker.services.len(),
        "registered declarations"
    );

    let linked = linker.link_files();
    let mut schema = Schema::new(linked);
    attach_extension_fields(&mut schema);
    debug!(errors = linker.errors.len(), "resolved type references");

    linker.link_options(&mut schema);
    debug!(errors = linker.errors.len(), "resolved options");

    linker.validate(&schema);
    debug!(errors = linker.errors.len(), "validated schema");

    if linker.errors.is_empty() {
        Ok(schema)
    } else {
        Err(SchemaError::new(linker.errors))
    }
}

struct Linker<'a> {
    files: &'a [ProtoFileElement],
    file_names: HashMap<&'a str, usize>,
    types: HashMap<String, Registered>,
    services: HashMap<String, Registered>,
    /// For each file, the files whose declarations it may reference.
    visible: Vec<HashSet<usize>>,
    file: usize,
    package: Option<&'a str>,
    context: Vec<Context>,
    errors: Vec<String>,
}

#[derive(Debug, Clone)]
struct Registered {
    file: usize,
    kind: Kind,
    location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Message,
    Enum,
    Service,
}

/// A declaration being linked, used to scope name lookups and to describe errors.
#[derive(Debug)]
struct Context {
    kind: ContextKind,
    name: String,
    location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextKind {
    File,
    Message,
    Enum,
    Service,
    Rpc,
    Extend,
    Field,
    Group,
}

impl<'a> Linker<'a> {
    fn new(files: &'a [ProtoFileElement]) -> Self {
        let file_names = files
            .iter()
            .enumerate()
            .map(|(index, file)| (file.location.path(), index))
            .collect();

        Linker {
            files,
            file_names,
            types: HashMap::new(),
            services: HashMap::new(),
            visible: Vec::new(),
            file: 0,
            package: None,
            context: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn register(&mut self) {
        let files = self.files;
        for (index, file) in files.iter().enumerate() {
            self.enter_file(index);

            for ty in &file.types {
                self.register_type(index, file.package_name.as_deref(), ty);
            }
            for service in &file.services {
                let name = qualify(file.package_name.as_deref(), &service.name);
                self.register_name(index, name, Kind::Service, &service.location);
            }

            self.exit();
        }

        let visible = (0..files.len())
            .map(|index| self.visible_files(index))
            .collect();
        self.visible = visible;
    }

    fn register_type(&mut self, file: usize, prefix: Option<&str>, ty: &TypeElement) {
        let name = qualify(prefix, ty.name());
        let kind = match ty {
            TypeElement::Message(_) => Kind::Message,
            TypeElement::Enum(_) => Kind::Enum,
        };

        self.register_name(file, name.clone(), kind, ty.location());
        if let TypeElement::Message(message) = ty {
            self.enter(ContextKind::Message, name.clone(), &message.location);
            let groups = message
                .groups
                .iter()
                .chain(message.one_ofs.iter().flat_map(|one_of| &one_of.groups));
            for group in groups {
                self.reject_group(group);
            }
            self.exit();
        }
        for nested in ty.nested_types() {
            self.register_type(file, Some(&name), nested);
        }
    }

    fn register_name(&mut self, file: usize, name: String, kind: Kind, location: &Location) {
        let existing = self
            .types
            .get(&name)
            .or_else(|| self.services.get(&name))
            .map(|registered| registered.location.clone());
        if let Some(existing) = existing {
            self.add_error(format!(
                "multiple types share name {}:\n  1. {} ({})\n  2. {} ({})",
                name, name, existing, name, location
            ));
            return;
        }

        let registered = Registered {
            file,
            kind,
            location: location.clone(),
        };
        match kind {
            Kind::Message | Kind::Enum => self.types.insert(name, registered),
            Kind::Service => self.services.insert(name, registered),
        };
    }

    /// The file itself, its imports, and every file reachable from those through public imports.
    fn visible_files(&self, index: usize) -> HashSet<usize> {
        let mut visible = HashSet::new();
        visible.insert(index);

        let file = &self.files[index];
        for import in file.imports.iter().chain(&file.public_imports) {
            if let Some(&import) = self.file_names.get(import.as_str()) {
                self.add_public_imports(import, &mut visible);
            }
        }
        visible
    }

    fn add_public_imports(&self, index: usize, visible: &mut HashSet<usize>) {
        if !visible.insert(index) {
            return;
        }
        for import in &self.files[index].public_imports {
            if let Some(&import) = self.file_names.get(import.as_str()) {
                self.add_public_imports(import, visible);
            }
        }
    }

    fn link_files(&mut self) -> Vec<ProtoFile> {
        let files = self.files;
        files
            .iter()
            .enumerate()
            .map(|(index, file)| {
                self.enter_file(index);

                let types = file.types.iter().map(|ty| self.link_type(ty)).collect();
                let services = file
                    .services
                    .iter()
                    .map(|service| self.link_service(service))
                    .collect();
                let extends = file
                    .extend_declarations
                    .iter()
                    .map(|extend| self.link_extend(extend))
                    .collect();

                self.exit();
                ProtoFile {
                    location: file.location.clone(),
                    package_name: file.package_name.clone(),
                    syntax: file.syntax,
                    imports: file.imports.clone(),
                    public_imports: file.public_imports.clone(),
                    types,
                    services,
                    extends,
                    options: Options::new(FILE_OPTIONS, file.options.clone()),
                }
            })
            .collect()
    }

    fn link_type(&mut self, ty: &TypeElement) -> Type {
        match ty {
            TypeElement::Message(message) => Type::Message(self.link_message(message)),
            TypeElement::Enum(enum_) => Type::Enum(self.link_enum(enum_)),
        }
    }

    fn link_message(&mut self, message: &MessageElement) -> MessageType {
        let name = qualify(self.scope().as_deref(), &message.name);
        self.enter(ContextKind::Message, name.clone(), &message.location);

        let fields = message
            .fields
            .iter()
            .map(|field| self.link_field(field, false))
            .collect();
        let one_ofs = message
            .one_ofs
            .iter()
            .map(|one_of| self.link_one_of(one_of))
            .collect();
        let nested_types = message
            .nested_types
            .iter()
            .map(|ty| self.link_type(ty))
            .collect();
        let nested_extends = message
            .extend_declarations
            .iter()
            .map(|extend| self.link_extend(extend))
            .collect();

        self.exit();
        MessageType {
            ty: ProtoType::Named(name),
            location: message.location.clone(),
            documentation: message.documentation.clone(),
            fields,
            one_ofs,
            extension_fields: Vec::new(),
            nested_types,
            nested_extends,
            extensions: message.extensions.clone(),
            reserveds: message.reserveds.clone(),
            options: Options::new(MESSAGE_OPTIONS, message.options.clone()),
        }
    }

    fn link_enum(&mut self, enum_: &EnumElement) -> EnumType {
        let name = qualify(self.scope().as_deref(), &enum_.name);

        let constants = enum_
            .constants
            .iter()
            .map(|constant| EnumConstant {
                location: constant.location.clone(),
                name: constant.name.clone(),
                tag: constant.tag,
                documentation: constant.documentation.clone(),
                options: Options::new(ENUM_VALUE_OPTIONS, constant.options.clone()),
            })
            .collect();

        EnumType {
            ty: ProtoType::Named(name),
            location: enum_.location.clone(),
            documentation: enum_.documentation.clone(),
            constants,
            reserveds: enum_.reserveds.clone(),
            options: Options::new(ENUM_OPTIONS, enum_.options.clone()),
        }
    }

    fn link_one_of(&mut self, one_of: &OneOfElement) -> OneOf {
        OneOf {
            location: one_of.location.clone(),
            name: one_of.name.clone(),
            documentation: one_of.documentation.clone(),
            fields: one_of
                .fields
                .iter()
                .map(|field| self.link_field(field, false))
                .collect(),
            options: Options::new(ONEOF_OPTIONS, one_of.options.clone()),
        }
    }

    fn reject_group(&mut self, group: &GroupElement) {
        self.enter(ContextKind::Group, group.name.clone(), &group.location);
        self.add_error("groups are not supported");
        self.exit();
    }

    fn link_field(&mut self, field: &FieldElement, is_extension: bool) -> Field {
        self.enter(ContextKind::Field, field.name.clone(), &field.location);
        let ty = self.resolve_field_type(&field.ty);
        self.exit();

        let qualified_name = match self.package {
            Some(package) if is_extension => format!("{}.{}", package, field.name),
            _ => field.name.clone(),
        };

        Field {
            location: field.location.clone(),
            label: field.label,
            name: field.name.clone(),
            qualified_name,
            tag: field.tag,
            documentation: field.documentation.clone(),
            element_type: field.ty.clone(),
            ty,
            options: Options::new(FIELD_OPTIONS, field.options.clone()),
            is_extension,
        }
    }

    fn link_extend(&mut self, extend: &ExtendElement) -> Extend {
        self.enter(ContextKind::Extend, extend.name.clone(), &extend.location);
        let ty = self.resolve_message_type(&extend.name);
        let fields = extend
            .fields
            .iter()
            .map(|field| self.link_field(field, true))
            .collect();
        self.exit();

        Extend {
            location: extend.location.clone(),
            name: extend.name.clone(),
            documentation: extend.documentation.clone(),
            ty,
            fields,
        }
    }

    fn link_service(&mut self, service: &ServiceElement) -> Service {
        let name = qualify(self.package, &service.name);
        self.enter(ContextKind::Service, name.clone(), &service.location);
        let rpcs = service.rpcs.iter().map(|rpc| self.link_rpc(rpc)).collect();
        self.exit();

        Service {
            ty: ProtoType::Named(name),
            location: service.location.clone(),
            documentation: service.documentation.clone(),
            rpcs,
            options: Options::new(SERVICE_OPTIONS, service.options.clone()),
        }
    }

    fn link_rpc(&mut self, rpc: &RpcElement) -> Rpc {
        self.enter(ContextKind::Rpc, rpc.name.clone(), &rpc.location);
        let request_type = self.resolve_message_type(&rpc.request_type);
        let response_type = self.resolve_message_type(&rpc.response_type);
        self.exit();

        Rpc {
            location: rpc.location.clone(),
            name: rpc.name.clone(),
            documentation: rpc.documentation.clone(),
            request_type_name: rpc.request_type.clone(),
            request_type,
            request_streaming: rpc.request_streaming,
            response_type_name: rpc.response_type.clone(),
            response_type,
            response_streaming: rpc.response_streaming,
            options: Options::new(METHOD_OPTIONS, rpc.options.clone()),
        }
    }

    fn resolve_field_type(&mut self, name: &str) -> ProtoType {
        if let Some(scalar) = Scalar::from_name(name).filter(|&scalar| scalar != Scalar::Any) {
            return ProtoType::Scalar(scalar);
        }
        if let Some((key, value)) = split_map_type(name) {
            return ProtoType::Map(
                Box::new(self.resolve_field_type(key)),
                Box::new(self.resolve_field_type(value)),
            );
        }

        match self.resolve(name, Kind::Message) {
            Some((resolved, _)) => ProtoType::Named(resolved),
            None => ProtoType::get(name),
        }
    }

    fn resolve_message_type(&mut self, name: &str) -> ProtoType {
        match self.resolve(name, Kind::Message) {
            Some((resolved, Kind::Message)) => ProtoType::Named(resolved),
            Some((resolved, _)) => {
                self.add_error(format!("expected a message but was {}", resolved));
                ProtoType::Named(resolved)
            }
            None => ProtoType::get(name),
        }
    }

    /// Resolves a type name relative to the current scope, reporting an error if it is not found
    /// or is declared in a file that is not imported.
    fn resolve(&mut self, name: &str, expected: Kind) -> Option<(String, Kind)> {
        let (resolved, registered) = match self.lookup(name) {
            Some(found) => found,
            None => {
                self.add_error(format!("unable to resolve {}", name));
                return None;
            }
        };
        trace!(name, resolved = %resolved, ?expected, "resolved type name");

        if !self.visible[self.file].contains(&registered.file) {
            let message = format!(
                "{} needs to import {}",
                self.files[self.file].location.path(),
                self.files[registered.file].location.path()
            );
            self.add_error(message);
        }

        Some((resolved, registered.kind))
    }

    fn lookup(&self, name: &str) -> Option<(String, Registered)> {
        if let Some(absolute) = name.strip_prefix('.') {
            return self
                .types
                .get(absolute)
                .map(|registered| (absolute.to_owned(), registered.clone()));
        }

        for candidate in candidates(self.scope().as_deref(), name) {
            if let Some(registered) = self.types.get(&candidate) {
                return Some((candidate, registered.clone()));
            }
        }
        None
    }

    /// The fully-qualified name of the innermost message being linked, or the package.
    fn scope(&self) -> Option<String> {
        self.context
            .iter()
            .rev()
            .find(|context| context.kind == ContextKind::Message)
            .map(|context| context.name.clone())
            .or_else(|| self.package.map(ToOwned::to_owned))
    }

    fn enter_file(&mut self, index: usize) {
        let files = self.files;
        let file = &files[index];
        self.file = index;
        self.package = file.package_name.as_deref();
        self.enter(
            ContextKind::File,
            file.location.path().to_owned(),
            &file.location,
        );
    }

    fn enter(&mut self, kind: ContextKind, name: String, location: &Location) {
        self.context.push(Context {
            kind,
            name,
            location: location.clone(),
        });
    }

    fn exit(&mut self) {
        self.context.pop();
    }

    /// Records an error, followed by the declarations currently being linked.
    fn add_error(&mut self, message: impl Into<String>) {
        let mut error = message.into();
        for (depth, context) in self.context.iter().rev().enumerate() {
            let prefix = if depth == 0 { "for" } else { "in" };
            let description = match context.kind {
                ContextKind::File => format!("file {}", context.name),
                ContextKind::Message => format!("message {} ({})", context.name, context.location),
                ContextKind::Enum => format!("enum {} ({})", context.name, context.location),
                ContextKind::Service => format!("service {} ({})", context.name, context.location),
                ContextKind::Rpc => format!("rpc {} ({})", context.name, context.location),
                ContextKind::Extend => format!("extend {} ({})", context.name, context.location),
                ContextKind::Field => format!("field {} ({})", context.name, context.location),
                ContextKind::Group => format!("group {} ({})", context.name, context.location),
            };
            error.push_str("\n  ");
            error.push_str(prefix);
            error.push(' ');
            error.push_str(&description);
        }
        self.errors.push(error);
    }
}

fn qualify(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}.{}", prefix, name),
        None => name.to_owned(),
    }
}

/// The names `name` may refer to from within `scope`, most specific first: `name` appended to
/// each prefix of the scope, then `name` itself.
fn candidates(scope: Option<&str>, name: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut prefix = scope;
    while let Some(current) = prefix {
        result.push(format!("{}.{}", current, name));
        prefix = current.rfind('.').map(|dot| &current[..dot]);
    }
    result.push(name.to_owned());
    result
}

/// Copies the fields of every `extend` block into the message it extends, replacing any
/// previous copies.
pub(crate) fn attach_extension_fields(schema: &mut Schema) {
    fn clear(types: &mut [Type]) {
        for ty in types {
            if let Type::Message(message) = ty {
                message.extension_fields.clear();
            }
            if let Some(nested) = ty.nested_types_mut() {
                clear(nested);
            }
        }
    }

    fn collect(extends: &[Extend], result: &mut HashMap<String, Vec<Field>>) {
        for extend in extends {
            if let Some(name) = extend.ty.as_named() {
                result
                    .entry(name.to_owned())
                    .or_default()
                    .extend(extend.fields.iter().cloned());
            }
        }
    }

    fn collect_nested(types: &[Type], result: &mut HashMap<String, Vec<Field>>) {
        for ty in types {
            if let Type::Message(message) = ty {
                collect(&message.nested_extends, result);
            }
            collect_nested(ty.nested_types(), result);
        }
    }

    for file in schema.files_mut() {
        clear(&mut file.types);
    }

    let mut extensions = HashMap::new();
    for file in schema.proto_files() {
        collect(&file.extends, &mut extensions);
        collect_nested(&file.types, &mut extensions);
    }

    for (name, fields) in extensions {
        if let Some(Type::Message(message)) = schema.get_type_mut(&name) {
            message.extension_fields = fields;
        }
    }
}
