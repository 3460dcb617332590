//! The element model produced by [`parse()`](crate::parse).
//!
//! Elements are plain values: every declaration in a source file becomes one element, and
//! elements own the declarations nested inside them. Type references are kept as the text
//! written in the source; resolving them is the job of a linker.

mod print;

use std::{fmt, ops::RangeInclusive};

use crate::Location;

/// The largest tag that may be assigned to a message field.
pub const MAX_TAG_VALUE: i32 = 536_870_911;

/// A parsed `.proto` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoFileElement {
    pub location: Location,
    pub package_name: Option<String>,
    pub syntax: Option<Syntax>,
    pub imports: Vec<String>,
    pub public_imports: Vec<String>,
    pub types: Vec<TypeElement>,
    pub services: Vec<ServiceElement>,
    pub extend_declarations: Vec<ExtendElement>,
    pub options: Vec<OptionElement>,
}

impl ProtoFileElement {
    /// Creates an empty file at `location`.
    pub fn empty(location: Location) -> Self {
        ProtoFileElement {
            location,
            package_name: None,
            syntax: None,
            imports: Vec::new(),
            public_imports: Vec::new(),
            types: Vec::new(),
            services: Vec::new(),
            extend_declarations: Vec::new(),
            options: Vec::new(),
        }
    }
}

/// The value of a file's `syntax` declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syntax {
    Proto2,
    Proto3,
}

impl Syntax {
    pub fn as_str(&self) -> &'static str {
        match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
        }
    }
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message or enum declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeElement {
    Message(MessageElement),
    Enum(EnumElement),
}

impl TypeElement {
    pub fn location(&self) -> &Location {
        match self {
            TypeElement::Message(message) => &message.location,
            TypeElement::Enum(enum_) => &enum_.location,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TypeElement::Message(message) => &message.name,
            TypeElement::Enum(enum_) => &enum_.name,
        }
    }

    pub fn documentation(&self) -> &str {
        match self {
            TypeElement::Message(message) => &message.documentation,
            TypeElement::Enum(enum_) => &enum_.documentation,
        }
    }

    pub fn options(&self) -> &[OptionElement] {
        match self {
            TypeElement::Message(message) => &message.options,
            TypeElement::Enum(enum_) => &enum_.options,
        }
    }

    /// Types declared inside this one. Enums never have nested types.
    pub fn nested_types(&self) -> &[TypeElement] {
        match self {
            TypeElement::Message(message) => &message.nested_types,
            TypeElement::Enum(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub nested_types: Vec<TypeElement>,
    pub options: Vec<OptionElement>,
    pub reserveds: Vec<ReservedElement>,
    pub fields: Vec<FieldElement>,
    pub one_ofs: Vec<OneOfElement>,
    pub extensions: Vec<ExtensionsElement>,
    pub groups: Vec<GroupElement>,
    pub extend_declarations: Vec<ExtendElement>,
}

impl MessageElement {
    pub fn new(location: Location, name: impl Into<String>) -> Self {
        MessageElement {
            location,
            name: name.into(),
            documentation: String::new(),
            nested_types: Vec::new(),
            options: Vec::new(),
            reserveds: Vec::new(),
            fields: Vec::new(),
            one_ofs: Vec::new(),
            extensions: Vec::new(),
            groups: Vec::new(),
            extend_declarations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub options: Vec<OptionElement>,
    pub constants: Vec<EnumConstantElement>,
    pub reserveds: Vec<ReservedElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConstantElement {
    pub location: Location,
    pub name: String,
    pub tag: i32,
    pub documentation: String,
    pub options: Vec<OptionElement>,
}

/// A field label. Fields declared without one have no label at all, which is distinct from
/// [`Label::Optional`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Optional,
    Required,
    Repeated,
    /// Assigned to fields declared inside a `oneof`. Never written in source.
    OneOf,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Optional => "optional",
            Label::Required => "required",
            Label::Repeated => "repeated",
            Label::OneOf => "oneof",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldElement {
    pub location: Location,
    pub label: Option<Label>,
    /// The type as written, e.g. `int32`, `.foo.Bar` or `map<string, Bar>`.
    pub ty: String,
    pub name: String,
    pub tag: i32,
    pub documentation: String,
    pub options: Vec<OptionElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneOfElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub fields: Vec<FieldElement>,
    pub groups: Vec<GroupElement>,
    pub options: Vec<OptionElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupElement {
    pub location: Location,
    pub label: Option<Label>,
    pub name: String,
    pub tag: i32,
    pub documentation: String,
    pub fields: Vec<FieldElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendElement {
    pub location: Location,
    /// The extended type as written.
    pub name: String,
    pub documentation: String,
    pub fields: Vec<FieldElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub rpcs: Vec<RpcElement>,
    pub options: Vec<OptionElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub request_type: String,
    pub response_type: String,
    pub request_streaming: bool,
    pub response_streaming: bool,
    pub options: Vec<OptionElement>,
}

/// A single `extensions` range. Both ends are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionsElement {
    pub location: Location,
    pub documentation: String,
    pub start: i32,
    pub end: i32,
}

/// A `reserved` declaration, which may mix tags, ranges and names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedElement {
    pub location: Location,
    pub documentation: String,
    pub tags: Vec<i32>,
    pub ranges: Vec<RangeInclusive<i32>>,
    pub names: Vec<String>,
}

impl ReservedElement {
    pub fn matches_tag(&self, tag: i32) -> bool {
        self.tags.contains(&tag) || self.ranges.iter().any(|range| range.contains(&tag))
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// An option declaration, such as `option java_package = "foo";` or the `deprecated = true`
/// in `int32 a = 1 [deprecated = true];`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionElement {
    /// The option name, without parentheses.
    pub name: String,
    pub value: OptionValue,
    /// Whether the name was written in parentheses, marking it as an extension.
    pub is_parenthesized: bool,
}

impl OptionElement {
    pub fn new(name: impl Into<String>, value: OptionValue) -> Self {
        OptionElement {
            name: name.into(),
            value,
            is_parenthesized: false,
        }
    }

    pub fn kind(&self) -> OptionKind {
        self.value.kind()
    }

    /// Finds the first option named `name` in `options`.
    pub fn find<'a>(options: &'a [OptionElement], name: &str) -> Option<&'a OptionElement> {
        options.iter().find(|option| option.name == name)
    }
}

/// The kind of an [`OptionValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    String,
    Boolean,
    Number,
    Enum,
    Map,
    List,
    Option,
}

/// The value of an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    String(String),
    Boolean(bool),
    /// A numeric literal, kept as written (including any sign or hex prefix).
    Number(String),
    /// A bare identifier referring to an enum constant.
    Enum(String),
    /// A text-format message. Keys are field names, or `[name]` for extensions. Keys are unique:
    /// repeated keys are merged into a list while parsing.
    Map(Vec<(String, OptionValue)>),
    List(Vec<OptionValue>),
    /// A nested field path, as in `option (foo).bar = 1;`.
    Option(Box<OptionElement>),
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::String(_) => OptionKind::String,
            OptionValue::Boolean(_) => OptionKind::Boolean,
            OptionValue::Number(_) => OptionKind::Number,
            OptionValue::Enum(_) => OptionKind::Enum,
            OptionValue::Map(_) => OptionKind::Map,
            OptionValue::List(_) => OptionKind::List,
            OptionValue::Option(_) => OptionKind::Option,
        }
    }

    /// Returns `true` if this is the boolean `true`.
    pub fn is_true(&self) -> bool {
        matches!(self, OptionValue::Boolean(true))
    }
}
