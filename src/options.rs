use std::{collections::BTreeMap, fmt};

use protoschema_parse::ast::{OptionElement, OptionValue};

use crate::types::{ProtoMember, ProtoType};

pub(crate) const FILE_OPTIONS: &str = "google.protobuf.FileOptions";
pub(crate) const MESSAGE_OPTIONS: &str = "google.protobuf.MessageOptions";
pub(crate) const FIELD_OPTIONS: &str = "google.protobuf.FieldOptions";
pub(crate) const ONEOF_OPTIONS: &str = "google.protobuf.OneofOptions";
pub(crate) const ENUM_OPTIONS: &str = "google.protobuf.EnumOptions";
pub(crate) const ENUM_VALUE_OPTIONS: &str = "google.protobuf.EnumValueOptions";
pub(crate) const SERVICE_OPTIONS: &str = "google.protobuf.ServiceOptions";
pub(crate) const METHOD_OPTIONS: &str = "google.protobuf.MethodOptions";

/// Options that are kept by pruning even when nothing marks them.
pub(crate) const ALWAYS_RETAINED: &[(&str, &str)] = &[
    (FILE_OPTIONS, "java_package"),
    (FIELD_OPTIONS, "packed"),
    (FIELD_OPTIONS, "deprecated"),
    (ENUM_OPTIONS, "allow_alias"),
];

/// The options declared on a file, message, field, enum, enum constant, oneof, service or rpc.
///
/// Options are kept in two forms. [`elements()`](Options::elements) returns the declarations
/// as written. [`map()`](Options::map) holds the values of every option whose name resolved to a
/// field of the options container type, keyed by that field. Options that name no known field,
/// such as `default` on a field, only appear in the first form.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub(crate) options_type: ProtoType,
    pub(crate) elements: Vec<OptionElement>,
    /// The top-level member each element resolved to, and the value it sets.
    pub(crate) resolved: Vec<Option<(ProtoMember, Value)>>,
    pub(crate) map: BTreeMap<ProtoMember, Value>,
}

/// A resolved option value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Bool(bool),
    /// A numeric literal, as written.
    Number(String),
    /// The name of an enum constant.
    Enum(String),
    List(Vec<Value>),
    Message(BTreeMap<ProtoMember, Value>),
}

impl Options {
    pub(crate) fn new(options_type: &str, elements: Vec<OptionElement>) -> Self {
        let resolved = vec![None; elements.len()];
        Options {
            options_type: ProtoType::get(options_type),
            elements,
            resolved,
            map: BTreeMap::new(),
        }
    }

    /// The options container type, such as `google.protobuf.FieldOptions`.
    pub fn options_type(&self) -> &ProtoType {
        &self.options_type
    }

    pub fn elements(&self) -> &[OptionElement] {
        &self.elements
    }

    pub fn map(&self) -> &BTreeMap<ProtoMember, Value> {
        &self.map
    }

    pub fn get(&self, member: &ProtoMember) -> Option<&Value> {
        self.map.get(member)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The value of the unparenthesized option `name`, as written.
    pub fn element(&self, name: &str) -> Option<&OptionValue> {
        self.elements
            .iter()
            .find(|element| !element.is_parenthesized && element.name == name)
            .map(|element| &element.value)
    }

    /// Returns true if the option `name` is set to `true`.
    pub fn is_true(&self, name: &str) -> bool {
        self.element(name).map_or(false, OptionValue::is_true)
    }

    /// Every member referenced by a resolved value, including fields of nested message values.
    pub(crate) fn referenced_members(&self) -> Vec<&ProtoMember> {
        fn collect<'a>(value: &'a Value, result: &mut Vec<&'a ProtoMember>) {
            match value {
                Value::Message(map) => {
                    for (member, value) in map {
                        result.push(member);
                        collect(value, result);
                    }
                }
                Value::List(items) => {
                    for item in items {
                        collect(item, result);
                    }
                }
                Value::String(_) | Value::Bool(_) | Value::Number(_) | Value::Enum(_) => (),
            }
        }

        let mut result = Vec::new();
        for (member, value) in &self.map {
            result.push(member);
            collect(value, &mut result);
        }
        result
    }
}

impl Value {
    /// Combines two values set for the same option. Messages are merged field by field and
    /// lists are concatenated. Any other pair conflicts and is returned unchanged.
    pub(crate) fn union(self, other: Value) -> Result<Value, (Value, Value)> {
        match (self, other) {
            (Value::Message(mut map), Value::Message(other)) => {
                for (member, value) in other {
                    let merged = match map.remove(&member) {
                        Some(existing) => existing.union(value)?,
                        None => value,
                    };
                    map.insert(member, merged);
                }
                Ok(Value::Message(map))
            }
            (Value::List(mut items), Value::List(other)) => {
                items.extend(other);
                Ok(Value::List(items))
            }
            (this, other) => Err((this, other)),
        }
    }

    /// Converts this value back to the form it is written in. Extension fields of message values
    /// are written in brackets.
    pub(crate) fn to_option_value(&self) -> OptionValue {
        match self {
            Value::String(value) => OptionValue::String(value.clone()),
            Value::Bool(value) => OptionValue::Boolean(*value),
            Value::Number(value) => OptionValue::Number(value.clone()),
            Value::Enum(value) => OptionValue::Enum(value.clone()),
            Value::List(items) => {
                OptionValue::List(items.iter().map(Value::to_option_value).collect())
            }
            Value::Message(map) => OptionValue::Map(
                map.iter()
                    .map(|(member, value)| {
                        let key = if member.member().contains('.') {
                            format!("[{}]", member.member())
                        } else {
                            member.member().to_owned()
                        };
                        (key, value.to_option_value())
                    })
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(value) => write!(f, "\"{}\"", value),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Number(value) | Value::Enum(value) => f.write_str(value),
            Value::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Message(map) => {
                f.write_str("{")?;
                for (index, (member, value)) in map.iter().enumerate() {
                    if index != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", member.member(), value)?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str) -> ProtoMember {
        ProtoMember::new(ProtoType::get("foo.Bar"), name)
    }

    #[test]
    fn union_messages() {
        let a = Value::Message([(member("a"), Value::Bool(true))].into_iter().collect());
        let b = Value::Message(
            [(member("b"), Value::Number("1".to_owned()))]
                .into_iter()
                .collect(),
        );

        let merged = a.union(b).unwrap();
        assert_eq!(merged.to_string(), "{a: true, b: 1}");
    }

    #[test]
    fn union_lists() {
        let a = Value::List(vec![Value::Enum("A".to_owned())]);
        let b = Value::List(vec![Value::Enum("B".to_owned())]);

        assert_eq!(a.union(b).unwrap().to_string(), "[A, B]");
    }

    #[test]
    fn union_conflict() {
        let a = Value::String("x".to_owned());
        let b = Value::String("y".to_owned());

        let (a, b) = a.union(b).unwrap_err();
        assert_eq!(format!("{}, {}", a, b), "\"x\", \"y\"");
    }

    #[test]
    fn option_values() {
        let value = Value::Message(
            [
                (member("name"), Value::String("x".to_owned())),
                (
                    ProtoMember::new(ProtoType::get("foo.Bar"), "foo.ext"),
                    Value::List(vec![Value::Enum("A".to_owned())]),
                ),
            ]
            .into_iter()
            .collect(),
        );

        assert_eq!(
            value.to_option_value(),
            OptionValue::Map(vec![
                (
                    "[foo.ext]".to_owned(),
                    OptionValue::List(vec![OptionValue::Enum("A".to_owned())])
                ),
                ("name".to_owned(), OptionValue::String("x".to_owned())),
            ])
        );
    }

    #[test]
    fn raw_elements() {
        let options = Options::new(
            FIELD_OPTIONS,
            vec![
                OptionElement::new("packed", OptionValue::Boolean(true)),
                OptionElement {
                    name: "deprecated".to_owned(),
                    value: OptionValue::Boolean(true),
                    is_parenthesized: true,
                },
            ],
        );

        assert!(options.is_true("packed"));
        assert!(!options.is_true("deprecated"));
        assert_eq!(options.options_type().to_string(), FIELD_OPTIONS);
        assert!(options.map().is_empty());
    }
}
