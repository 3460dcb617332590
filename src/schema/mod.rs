//! The linked form of a set of protobuf files.

mod element;
#[cfg(test)]
mod tests;

use std::collections::HashMap;

use protoschema_parse::{
    ast::{ExtensionsElement, Label, OptionValue, ReservedElement, Syntax},
    Location,
};

use crate::{
    case::to_json_name,
    options::Options,
    prune::{IdentifierSet, Pruner},
    types::{ProtoMember, ProtoType},
};

/// A set of linked files, in which every type reference has been resolved and every option
/// has been matched to its declaring field.
///
/// Schemas are created by [`link()`](crate::link) or [`Compiler::link()`](crate::Compiler::link).
#[derive(Debug, Clone)]
pub struct Schema {
    files: Vec<ProtoFile>,
    index: HashMap<String, Declaration>,
}

/// The position of a type or service within [`Schema::files`].
#[derive(Debug, Clone)]
enum Declaration {
    Type { file: usize, path: Vec<usize> },
    Service { file: usize, index: usize },
}

/// A linked `.proto` file.
#[derive(Debug, Clone)]
pub struct ProtoFile {
    pub(crate) location: Location,
    pub(crate) package_name: Option<String>,
    pub(crate) syntax: Option<Syntax>,
    pub(crate) imports: Vec<String>,
    pub(crate) public_imports: Vec<String>,
    pub(crate) types: Vec<Type>,
    pub(crate) services: Vec<Service>,
    pub(crate) extends: Vec<Extend>,
    pub(crate) options: Options,
}

/// A message or enum, or a message that only survived pruning as a container for its nested
/// types.
#[derive(Debug, Clone)]
pub enum Type {
    Message(MessageType),
    Enum(EnumType),
    Enclosing(EnclosingType),
}

#[derive(Debug, Clone)]
pub struct MessageType {
    pub(crate) ty: ProtoType,
    pub(crate) location: Location,
    pub(crate) documentation: String,
    pub(crate) fields: Vec<Field>,
    pub(crate) one_ofs: Vec<OneOf>,
    /// Fields declared by `extend` blocks targeting this message, in any file.
    pub(crate) extension_fields: Vec<Field>,
    pub(crate) nested_types: Vec<Type>,
    pub(crate) nested_extends: Vec<Extend>,
    pub(crate) extensions: Vec<ExtensionsElement>,
    pub(crate) reserveds: Vec<ReservedElement>,
    pub(crate) options: Options,
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub(crate) ty: ProtoType,
    pub(crate) location: Location,
    pub(crate) documentation: String,
    pub(crate) constants: Vec<EnumConstant>,
    pub(crate) reserveds: Vec<ReservedElement>,
    pub(crate) options: Options,
}

/// A message kept only because some of its nested types are.
#[derive(Debug, Clone)]
pub struct EnclosingType {
    pub(crate) ty: ProtoType,
    pub(crate) location: Location,
    pub(crate) documentation: String,
    pub(crate) nested_types: Vec<Type>,
}

#[derive(Debug, Clone)]
pub struct EnumConstant {
    pub(crate) location: Location,
    pub(crate) name: String,
    pub(crate) tag: i32,
    pub(crate) documentation: String,
    pub(crate) options: Options,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) location: Location,
    pub(crate) label: Option<Label>,
    pub(crate) name: String,
    pub(crate) qualified_name: String,
    pub(crate) tag: i32,
    pub(crate) documentation: String,
    pub(crate) element_type: String,
    pub(crate) ty: ProtoType,
    pub(crate) options: Options,
    pub(crate) is_extension: bool,
}

#[derive(Debug, Clone)]
pub struct OneOf {
    pub(crate) location: Location,
    pub(crate) name: String,
    pub(crate) documentation: String,
    pub(crate) fields: Vec<Field>,
    pub(crate) options: Options,
}

#[derive(Debug, Clone)]
pub struct Extend {
    pub(crate) location: Location,
    pub(crate) name: String,
    pub(crate) documentation: String,
    pub(crate) ty: ProtoType,
    pub(crate) fields: Vec<Field>,
}

#[derive(Debug, Clone)]
pub struct Service {
    pub(crate) ty: ProtoType,
    pub(crate) location: Location,
    pub(crate) documentation: String,
    pub(crate) rpcs: Vec<Rpc>,
    pub(crate) options: Options,
}

#[derive(Debug, Clone)]
pub struct Rpc {
    pub(crate) location: Location,
    pub(crate) name: String,
    pub(crate) documentation: String,
    pub(crate) request_type_name: String,
    pub(crate) request_type: ProtoType,
    pub(crate) request_streaming: bool,
    pub(crate) response_type_name: String,
    pub(crate) response_type: ProtoType,
    pub(crate) response_streaming: bool,
    pub(crate) options: Options,
}

impl Schema {
    pub(crate) fn new(files: Vec<ProtoFile>) -> Self {
        let mut index = HashMap::new();
        for (file_index, file) in files.iter().enumerate() {
            let mut path = Vec::new();
            index_types(&file.types, file_index, &mut path, &mut index);
            for (service_index, service) in file.services.iter().enumerate() {
                index.insert(
                    service.ty.to_string(),
                    Declaration::Service {
                        file: file_index,
                        index: service_index,
                    },
                );
            }
        }

        Schema { files, index }
    }

    pub fn proto_files(&self) -> &[ProtoFile] {
        &self.files
    }

    /// Gets a file by the path used to import it.
    pub fn proto_file(&self, path: &str) -> Option<&ProtoFile> {
        self.files.iter().find(|file| file.path() == path)
    }

    /// Gets a message, enum or enclosing type by its fully-qualified name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use protoschema::{MemoryLoader, Compiler, Type};
    /// let loader = MemoryLoader::new([(
    ///     "foo.proto",
    ///     "package foo; message Bar { message Baz {} }",
    /// )]);
    /// let schema = Compiler::with_loader(loader)
    ///     .open_files(["foo.proto"])
    ///     .unwrap()
    ///     .link()
    ///     .unwrap();
    ///
    /// let ty = schema.get_type("foo.Bar.Baz").unwrap();
    /// assert!(matches!(ty, Type::Message(_)));
    /// assert_eq!(ty.ty().to_string(), "foo.Bar.Baz");
    /// assert!(schema.get_type(".foo.Bar").is_some());
    /// assert!(schema.get_type("Bar").is_none());
    /// ```
    pub fn get_type(&self, name: &str) -> Option<&Type> {
        let name = name.strip_prefix('.').unwrap_or(name);
        match self.index.get(name)? {
            Declaration::Type { file, path } => {
                let (first, rest) = path.split_first()?;
                let mut ty = self.files[*file].types.get(*first)?;
                for &nested in rest {
                    ty = ty.nested_types().get(nested)?;
                }
                Some(ty)
            }
            Declaration::Service { .. } => None,
        }
    }

    pub fn get_service(&self, name: &str) -> Option<&Service> {
        let name = name.strip_prefix('.').unwrap_or(name);
        match self.index.get(name)? {
            Declaration::Service { file, index } => self.files[*file].services.get(*index),
            Declaration::Type { .. } => None,
        }
    }

    /// Gets a field or extension field of a message by its member name.
    pub fn get_field(&self, member: &ProtoMember) -> Option<&Field> {
        match self.get_type(member.ty().as_named()?)? {
            Type::Message(message) => message.member_field(member.member()),
            Type::Enum(_) | Type::Enclosing(_) => None,
        }
    }

    /// Returns a copy of this schema with only the types and members selected by
    /// `identifier_set`, along with everything they depend on.
    ///
    /// If `identifier_set` has no includes, everything not excluded is kept.
    pub fn prune(&self, identifier_set: &IdentifierSet) -> Schema {
        Pruner::new(self, identifier_set).prune()
    }

    pub(crate) fn files_mut(&mut self) -> &mut [ProtoFile] {
        &mut self.files
    }

    pub(crate) fn get_type_mut(&mut self, name: &str) -> Option<&mut Type> {
        match self.index.get(name)? {
            Declaration::Type { file, path } => {
                let (first, rest) = path.split_first()?;
                let mut ty = self.files[*file].types.get_mut(*first)?;
                for &nested in rest {
                    ty = ty.nested_types_mut()?.get_mut(nested)?;
                }
                Some(ty)
            }
            Declaration::Service { .. } => None,
        }
    }
}

fn index_types(
    types: &[Type],
    file: usize,
    path: &mut Vec<usize>,
    index: &mut HashMap<String, Declaration>,
) {
    for (position, ty) in types.iter().enumerate() {
        path.push(position);
        index.insert(
            ty.ty().to_string(),
            Declaration::Type {
                file,
                path: path.clone(),
            },
        );
        index_types(ty.nested_types(), file, path, index);
        path.pop();
    }
}

impl ProtoFile {
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The path used to import this file.
    pub fn path(&self) -> &str {
        self.location.path()
    }

    pub fn package_name(&self) -> Option<&str> {
        self.package_name.as_deref()
    }

    pub fn syntax(&self) -> Option<Syntax> {
        self.syntax
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn public_imports(&self) -> &[String] {
        &self.public_imports
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// The `extend` blocks declared at the top level of this file.
    pub fn extends(&self) -> &[Extend] {
        &self.extends
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns true if this file declares nothing.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.services.is_empty() && self.extends.is_empty()
    }

    /// Prints this file as `.proto` source.
    pub fn to_schema(&self) -> String {
        self.to_element().to_schema()
    }
}

impl Type {
    /// The fully-qualified name of this type.
    pub fn ty(&self) -> &ProtoType {
        match self {
            Type::Message(message) => &message.ty,
            Type::Enum(enum_) => &enum_.ty,
            Type::Enclosing(enclosing) => &enclosing.ty,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            Type::Message(message) => &message.location,
            Type::Enum(enum_) => &enum_.location,
            Type::Enclosing(enclosing) => &enclosing.location,
        }
    }

    pub fn documentation(&self) -> &str {
        match self {
            Type::Message(message) => &message.documentation,
            Type::Enum(enum_) => &enum_.documentation,
            Type::Enclosing(enclosing) => &enclosing.documentation,
        }
    }

    pub fn nested_types(&self) -> &[Type] {
        match self {
            Type::Message(message) => &message.nested_types,
            Type::Enum(_) => &[],
            Type::Enclosing(enclosing) => &enclosing.nested_types,
        }
    }

    /// The options of this type. Enclosing types have none.
    pub fn options(&self) -> Option<&Options> {
        match self {
            Type::Message(message) => Some(&message.options),
            Type::Enum(enum_) => Some(&enum_.options),
            Type::Enclosing(_) => None,
        }
    }

    pub(crate) fn nested_types_mut(&mut self) -> Option<&mut Vec<Type>> {
        match self {
            Type::Message(message) => Some(&mut message.nested_types),
            Type::Enum(_) => None,
            Type::Enclosing(enclosing) => Some(&mut enclosing.nested_types),
        }
    }
}

impl MessageType {
    pub fn ty(&self) -> &ProtoType {
        &self.ty
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    /// Fields declared directly in this message, not including those in oneofs.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn one_ofs(&self) -> &[OneOf] {
        &self.one_ofs
    }

    /// Fields added to this message by `extend` blocks.
    pub fn extension_fields(&self) -> &[Field] {
        &self.extension_fields
    }

    pub fn nested_types(&self) -> &[Type] {
        &self.nested_types
    }

    /// The `extend` blocks declared inside this message.
    pub fn extends(&self) -> &[Extend] {
        &self.nested_extends
    }

    pub fn extensions(&self) -> &[ExtensionsElement] {
        &self.extensions
    }

    pub fn reserveds(&self) -> &[ReservedElement] {
        &self.reserveds
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Declared fields followed by the fields of each oneof.
    pub fn fields_and_one_of_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .chain(self.one_ofs.iter().flat_map(|one_of| one_of.fields.iter()))
    }

    /// Gets a declared or oneof field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields_and_one_of_fields()
            .find(|field| field.name == name)
    }

    /// Gets an extension field by its qualified name.
    pub fn extension_field(&self, qualified_name: &str) -> Option<&Field> {
        self.extension_fields
            .iter()
            .find(|field| field.qualified_name == qualified_name)
    }

    pub fn field_by_tag(&self, tag: i32) -> Option<&Field> {
        self.fields_and_one_of_fields()
            .chain(&self.extension_fields)
            .find(|field| field.tag == tag)
    }

    pub(crate) fn member_field(&self, member: &str) -> Option<&Field> {
        self.field(member).or_else(|| self.extension_field(member))
    }

    /// Returns true if `tag` falls in one of this message's `extensions` ranges.
    pub fn is_extension_tag(&self, tag: i32) -> bool {
        self.extensions
            .iter()
            .any(|range| range.start <= tag && tag <= range.end)
    }
}

impl EnumType {
    pub fn ty(&self) -> &ProtoType {
        &self.ty
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn constants(&self) -> &[EnumConstant] {
        &self.constants
    }

    pub fn reserveds(&self) -> &[ReservedElement] {
        &self.reserveds
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn constant(&self, name: &str) -> Option<&EnumConstant> {
        self.constants.iter().find(|constant| constant.name == name)
    }

    /// The first constant with the given tag.
    pub fn constant_by_tag(&self, tag: i32) -> Option<&EnumConstant> {
        self.constants.iter().find(|constant| constant.tag == tag)
    }

    /// Returns true if several constants may share a tag.
    pub fn allow_alias(&self) -> bool {
        self.options.is_true("allow_alias")
    }
}

impl EnclosingType {
    pub fn ty(&self) -> &ProtoType {
        &self.ty
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn nested_types(&self) -> &[Type] {
        &self.nested_types
    }
}

impl EnumConstant {
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> i32 {
        self.tag
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

impl Field {
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn label(&self) -> Option<Label> {
        self.label
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name used to identify this field as a member of its message. For extension fields
    /// this is prefixed with the package of the declaring file.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn tag(&self) -> i32 {
        self.tag
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    /// The type as written in the source file.
    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    /// The resolved type.
    pub fn ty(&self) -> &ProtoType {
        &self.ty
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn is_extension(&self) -> bool {
        self.is_extension
    }

    pub fn is_repeated(&self) -> bool {
        self.label == Some(Label::Repeated)
    }

    pub fn is_required(&self) -> bool {
        self.label == Some(Label::Required)
    }

    pub fn is_packed(&self) -> bool {
        self.options.is_true("packed")
    }

    pub fn is_deprecated(&self) -> bool {
        self.options.is_true("deprecated")
    }

    /// The `default` pseudo-option, as written.
    pub fn default(&self) -> Option<&OptionValue> {
        self.options.element("default")
    }

    /// The `json_name` pseudo-option if set, otherwise the name derived from the field name.
    pub fn json_name(&self) -> String {
        match self.options.element("json_name") {
            Some(OptionValue::String(name)) => name.clone(),
            _ => to_json_name(&self.name),
        }
    }
}

impl OneOf {
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

impl Extend {
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The extended type's name as written.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    /// The resolved extended type.
    pub fn ty(&self) -> &ProtoType {
        &self.ty
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

impl Service {
    /// The fully-qualified name of this service.
    pub fn ty(&self) -> &ProtoType {
        &self.ty
    }

    pub fn name(&self) -> String {
        self.ty.simple_name()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn rpcs(&self) -> &[Rpc] {
        &self.rpcs
    }

    pub fn rpc(&self, name: &str) -> Option<&Rpc> {
        self.rpcs.iter().find(|rpc| rpc.name == name)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

impl Rpc {
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn request_type(&self) -> &ProtoType {
        &self.request_type
    }

    pub fn response_type(&self) -> &ProtoType {
        &self.response_type
    }

    pub fn request_streaming(&self) -> bool {
        self.request_streaming
    }

    pub fn response_streaming(&self) -> bool {
        self.response_streaming
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}
