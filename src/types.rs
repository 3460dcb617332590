use std::fmt;

/// The name of a type: a scalar, a map, or a fully-qualified message, enum or service name.
///
/// The string form of a named type never has a leading `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtoType {
    Scalar(Scalar),
    Map(Box<ProtoType>, Box<ProtoType>),
    Named(String),
}

/// The built-in value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scalar {
    Bool,
    Bytes,
    Double,
    Float,
    Fixed32,
    Fixed64,
    Int32,
    Int64,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
    String,
    Uint32,
    Uint64,
    /// Any value. Only used for option values that are not yet typed.
    Any,
}

const SCALARS: &[(&str, Scalar)] = &[
    ("bool", Scalar::Bool),
    ("bytes", Scalar::Bytes),
    ("double", Scalar::Double),
    ("float", Scalar::Float),
    ("fixed32", Scalar::Fixed32),
    ("fixed64", Scalar::Fixed64),
    ("int32", Scalar::Int32),
    ("int64", Scalar::Int64),
    ("sfixed32", Scalar::Sfixed32),
    ("sfixed64", Scalar::Sfixed64),
    ("sint32", Scalar::Sint32),
    ("sint64", Scalar::Sint64),
    ("string", Scalar::String),
    ("uint32", Scalar::Uint32),
    ("uint64", Scalar::Uint64),
    ("any", Scalar::Any),
];

impl Scalar {
    /// Looks up a scalar by the keyword used for it in source files.
    pub fn from_name(name: &str) -> Option<Scalar> {
        SCALARS
            .iter()
            .find(|(scalar_name, _)| *scalar_name == name)
            .map(|&(_, scalar)| scalar)
    }

    pub fn as_str(&self) -> &'static str {
        SCALARS
            .iter()
            .find(|(_, scalar)| scalar == self)
            .map(|&(name, _)| name)
            .unwrap_or("any")
    }

    /// Returns true if repeated fields of this type may use the packed encoding.
    pub fn is_packable(&self) -> bool {
        !matches!(self, Scalar::Bytes | Scalar::String | Scalar::Any)
    }

    /// Returns true if this type may be used as the key of a map field.
    pub fn is_valid_map_key(&self) -> bool {
        !matches!(
            self,
            Scalar::Bytes | Scalar::Double | Scalar::Float | Scalar::Any
        )
    }
}

impl ProtoType {
    /// Creates a type from its string form: a scalar keyword, `map<K, V>`, or a
    /// fully-qualified name with or without a leading `.`.
    pub fn get(name: &str) -> ProtoType {
        if let Some(scalar) = Scalar::from_name(name) {
            return ProtoType::Scalar(scalar);
        }
        if let Some((key, value)) = split_map_type(name) {
            return ProtoType::Map(
                Box::new(ProtoType::get(key)),
                Box::new(ProtoType::get(value)),
            );
        }
        ProtoType::Named(name.strip_prefix('.').unwrap_or(name).to_owned())
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ProtoType::Scalar(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, ProtoType::Map(..))
    }

    /// The fully-qualified name of a message, enum or service type.
    pub fn as_named(&self) -> Option<&str> {
        match self {
            ProtoType::Named(name) => Some(name),
            _ => None,
        }
    }

    pub fn key_type(&self) -> Option<&ProtoType> {
        match self {
            ProtoType::Map(key, _) => Some(key),
            _ => None,
        }
    }

    pub fn value_type(&self) -> Option<&ProtoType> {
        match self {
            ProtoType::Map(_, value) => Some(value),
            _ => None,
        }
    }

    /// The last component of a named type, or the string form of any other type.
    pub fn simple_name(&self) -> String {
        match self {
            ProtoType::Named(name) => match name.rfind('.') {
                Some(dot) => name[dot + 1..].to_owned(),
                None => name.clone(),
            },
            _ => self.to_string(),
        }
    }

    /// The enclosing message or package of a named type.
    pub fn enclosing_type_or_package(&self) -> Option<&str> {
        match self {
            ProtoType::Named(name) => name.rfind('.').map(|dot| &name[..dot]),
            _ => None,
        }
    }

    /// The type named `name` nested inside this one.
    pub fn nested_type(&self, name: &str) -> ProtoType {
        assert!(
            matches!(self, ProtoType::Named(_)),
            "only named types may have nested types"
        );
        ProtoType::Named(format!("{}.{}", self, name))
    }
}

impl fmt::Display for ProtoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtoType::Scalar(scalar) => f.write_str(scalar.as_str()),
            ProtoType::Map(key, value) => write!(f, "map<{}, {}>", key, value),
            ProtoType::Named(name) => f.write_str(name),
        }
    }
}

/// Splits `map<K, V>` into its key and value type names.
pub(crate) fn split_map_type(name: &str) -> Option<(&str, &str)> {
    let inner = name.strip_prefix("map<")?.strip_suffix('>')?;
    let (key, value) = inner.split_once(',')?;
    Some((key.trim(), value.trim()))
}

/// A field, enum constant or rpc of a type, written `Type#member`.
///
/// Extension fields are identified by their qualified name, such as
/// `google.protobuf.FieldOptions#my.pkg.validate`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtoMember {
    ty: ProtoType,
    member: String,
}

impl ProtoMember {
    pub fn new(ty: ProtoType, member: impl Into<String>) -> Self {
        ProtoMember {
            ty,
            member: member.into(),
        }
    }

    /// Parses the `Type#member` form. Returns `None` if there is no `#`.
    pub fn get(text: &str) -> Option<Self> {
        let (ty, member) = text.split_once('#')?;
        if ty.is_empty() || member.is_empty() {
            return None;
        }
        Some(ProtoMember::new(ProtoType::get(ty), member))
    }

    /// The type declaring this member.
    pub fn ty(&self) -> &ProtoType {
        &self.ty
    }

    pub fn member(&self) -> &str {
        &self.member
    }
}

impl fmt::Display for ProtoMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.ty, self.member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_scalar() {
        assert_eq!(ProtoType::get("int32"), ProtoType::Scalar(Scalar::Int32));
        assert_eq!(ProtoType::get("any"), ProtoType::Scalar(Scalar::Any));
        assert_eq!(ProtoType::get("sfixed64").to_string(), "sfixed64");
    }

    #[test]
    fn get_map() {
        let ty = ProtoType::get("map<string, .foo.Bar>");
        assert_eq!(ty.key_type(), Some(&ProtoType::Scalar(Scalar::String)));
        assert_eq!(ty.value_type(), Some(&ProtoType::Named("foo.Bar".to_owned())));
        assert_eq!(ty.to_string(), "map<string, foo.Bar>");
    }

    #[test]
    fn named() {
        let ty = ProtoType::get(".foo.bar.Baz");
        assert_eq!(ty.to_string(), "foo.bar.Baz");
        assert_eq!(ty.simple_name(), "Baz");
        assert_eq!(ty.enclosing_type_or_package(), Some("foo.bar"));
        assert_eq!(ty.nested_type("Qux").to_string(), "foo.bar.Baz.Qux");
        assert_eq!(ProtoType::get("Baz").enclosing_type_or_package(), None);
    }

    #[test]
    fn member() {
        let member = ProtoMember::get("foo.Bar#baz").unwrap();
        assert_eq!(member.ty(), &ProtoType::get("foo.Bar"));
        assert_eq!(member.member(), "baz");
        assert_eq!(member.to_string(), "foo.Bar#baz");

        let extension = ProtoMember::get("google.protobuf.FieldOptions#a.b.c").unwrap();
        assert_eq!(extension.member(), "a.b.c");

        assert_eq!(ProtoMember::get("foo.Bar"), None);
        assert_eq!(ProtoMember::get("#baz"), None);
    }

    #[test]
    fn packable() {
        assert!(Scalar::Int32.is_packable());
        assert!(Scalar::Bool.is_packable());
        assert!(!Scalar::String.is_packable());
        assert!(!Scalar::Bytes.is_packable());
    }

    #[test]
    fn map_keys() {
        assert!(Scalar::String.is_valid_map_key());
        assert!(Scalar::Sint64.is_valid_map_key());
        assert!(!Scalar::Float.is_valid_map_key());
        assert!(!Scalar::Bytes.is_valid_map_key());
    }
}
