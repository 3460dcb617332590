use protoschema_parse::{ast::OptionElement, Location};

use super::MarkSet;
use crate::{
    options::{Options, Value, ALWAYS_RETAINED},
    schema::{
        EnclosingType, EnumType, Extend, Field, MessageType, OneOf, ProtoFile, Rpc, Service, Type,
    },
    types::{ProtoMember, ProtoType},
};

impl ProtoFile {
    pub(crate) fn retain_all(&self, marks: &MarkSet) -> ProtoFile {
        ProtoFile {
            location: self.location.clone(),
            package_name: self.package_name.clone(),
            syntax: self.syntax,
            imports: self.imports.clone(),
            public_imports: self.public_imports.clone(),
            types: retain_types(&self.types, marks),
            services: self
                .services
                .iter()
                .filter_map(|service| service.retain_all(marks))
                .collect(),
            extends: self
                .extends
                .iter()
                .filter_map(|extend| extend.retain_all(marks))
                .collect(),
            options: self.options.retain_all(marks),
        }
    }
}

fn retain_types(types: &[Type], marks: &MarkSet) -> Vec<Type> {
    types.iter().filter_map(|ty| ty.retain_all(marks)).collect()
}

impl Type {
    fn retain_all(&self, marks: &MarkSet) -> Option<Type> {
        match self {
            Type::Message(message) => message.retain_all(marks),
            Type::Enum(enum_) => enum_.retain_all(marks).map(Type::Enum),
            Type::Enclosing(enclosing) => enclosing_type(
                &enclosing.ty,
                &enclosing.location,
                &enclosing.documentation,
                retain_types(&enclosing.nested_types, marks),
            ),
        }
    }
}

/// A container for `nested_types`, or nothing if there are none.
fn enclosing_type(
    ty: &ProtoType,
    location: &Location,
    documentation: &str,
    nested_types: Vec<Type>,
) -> Option<Type> {
    if nested_types.is_empty() {
        return None;
    }
    Some(Type::Enclosing(EnclosingType {
        ty: ty.clone(),
        location: location.clone(),
        documentation: documentation.to_owned(),
        nested_types,
    }))
}

impl MessageType {
    fn retain_all(&self, marks: &MarkSet) -> Option<Type> {
        let nested_types = retain_types(&self.nested_types, marks);
        if !marks.contains_type(&self.ty) {
            return enclosing_type(&self.ty, &self.location, &self.documentation, nested_types);
        }

        let fields = retain_fields(&self.ty, &self.fields, marks);
        let one_ofs: Vec<OneOf> = self
            .one_ofs
            .iter()
            .filter_map(|one_of| one_of.retain_all(&self.ty, marks))
            .collect();
        let extension_fields = retain_fields(&self.ty, &self.extension_fields, marks);

        if !marks.contains_all_members(&self.ty)
            && fields.is_empty()
            && one_ofs.is_empty()
            && extension_fields.is_empty()
        {
            return enclosing_type(&self.ty, &self.location, &self.documentation, nested_types);
        }

        Some(Type::Message(MessageType {
            ty: self.ty.clone(),
            location: self.location.clone(),
            documentation: self.documentation.clone(),
            fields,
            one_ofs,
            extension_fields,
            nested_types,
            nested_extends: self
                .nested_extends
                .iter()
                .filter_map(|extend| extend.retain_all(marks))
                .collect(),
            extensions: self.extensions.clone(),
            reserveds: self.reserveds.clone(),
            options: self.options.retain_all(marks),
        }))
    }
}

/// The fields of `ty` that are marked and whose types are retained.
fn retain_fields(ty: &ProtoType, fields: &[Field], marks: &MarkSet) -> Vec<Field> {
    fields
        .iter()
        .filter(|field| {
            marks.contains_member(&ProtoMember::new(ty.clone(), field.qualified_name.as_str()))
                && marks.contains_type(&field.ty)
        })
        .map(|field| field.retain_all(marks))
        .collect()
}

impl Field {
    fn retain_all(&self, marks: &MarkSet) -> Field {
        Field {
            options: self.options.retain_all(marks),
            ..self.clone()
        }
    }
}

impl OneOf {
    fn retain_all(&self, ty: &ProtoType, marks: &MarkSet) -> Option<OneOf> {
        let fields = retain_fields(ty, &self.fields, marks);
        if fields.is_empty() {
            return None;
        }
        Some(OneOf {
            location: self.location.clone(),
            name: self.name.clone(),
            documentation: self.documentation.clone(),
            fields,
            options: self.options.retain_all(marks),
        })
    }
}

impl EnumType {
    fn retain_all(&self, marks: &MarkSet) -> Option<EnumType> {
        if !marks.contains_type(&self.ty) {
            return None;
        }

        let constants: Vec<_> = self
            .constants
            .iter()
            .filter(|constant| {
                marks.contains_member(&ProtoMember::new(self.ty.clone(), constant.name.as_str()))
            })
            .map(|constant| {
                let mut constant = constant.clone();
                constant.options = constant.options.retain_all(marks);
                constant
            })
            .collect();
        if constants.is_empty() && !marks.contains_all_members(&self.ty) {
            return None;
        }

        Some(EnumType {
            ty: self.ty.clone(),
            location: self.location.clone(),
            documentation: self.documentation.clone(),
            constants,
            reserveds: self.reserveds.clone(),
            options: self.options.retain_all(marks),
        })
    }
}

impl Extend {
    fn retain_all(&self, marks: &MarkSet) -> Option<Extend> {
        let fields = retain_fields(&self.ty, &self.fields, marks);
        if fields.is_empty() {
            return None;
        }
        Some(Extend {
            location: self.location.clone(),
            name: self.name.clone(),
            documentation: self.documentation.clone(),
            ty: self.ty.clone(),
            fields,
        })
    }
}

impl Service {
    fn retain_all(&self, marks: &MarkSet) -> Option<Service> {
        if !marks.contains_type(&self.ty) {
            return None;
        }

        let rpcs: Vec<Rpc> = self
            .rpcs
            .iter()
            .filter(|rpc| {
                marks.contains_member(&ProtoMember::new(self.ty.clone(), rpc.name.as_str()))
                    && marks.contains_type(&rpc.request_type)
                    && marks.contains_type(&rpc.response_type)
            })
            .map(|rpc| Rpc {
                options: rpc.options.retain_all(marks),
                ..rpc.clone()
            })
            .collect();
        if rpcs.is_empty() {
            return None;
        }

        Some(Service {
            ty: self.ty.clone(),
            location: self.location.clone(),
            documentation: self.documentation.clone(),
            rpcs,
            options: self.options.retain_all(marks),
        })
    }
}

impl Options {
    /// Keeps options whose fields are marked, as well as unresolved options and those that
    /// affect how the declaration is encoded. Declarations that set unmarked fields of a message
    /// value are rewritten without them.
    pub(crate) fn retain_all(&self, marks: &MarkSet) -> Options {
        let mut elements = Vec::new();
        let mut resolved = Vec::new();
        for (element, option) in self.elements.iter().zip(&self.resolved) {
            match option {
                Some((member, _)) if is_always_retained(member) => (),
                Some((member, value)) if marks.contains_member(member) => {
                    match value.retain_option(marks) {
                        Some(retained) if retained == *value => (),
                        Some(retained) => {
                            elements.push(retained_element(element, &retained));
                            resolved.push(Some((member.clone(), retained)));
                            continue;
                        }
                        None => continue,
                    }
                }
                Some(_) => continue,
                None => (),
            }
            elements.push(element.clone());
            resolved.push(option.clone());
        }

        let map = self
            .map
            .iter()
            .filter_map(|(member, value)| {
                if is_always_retained(member) {
                    Some((member.clone(), value.clone()))
                } else if marks.contains_member(member) {
                    Some((member.clone(), value.retain_option(marks)?))
                } else {
                    None
                }
            })
            .collect();

        Options {
            options_type: self.options_type.clone(),
            elements,
            resolved,
            map,
        }
    }
}

/// `element` setting `value` in place of what it was written with.
fn retained_element(element: &OptionElement, value: &Value) -> OptionElement {
    let name = if element.is_parenthesized {
        element.name.clone()
    } else {
        // A dotted name sets a field of the first part's value, which `value` already contains.
        element
            .name
            .split_once('.')
            .map_or_else(|| element.name.clone(), |(first, _)| first.to_owned())
    };
    OptionElement {
        name,
        value: value.to_option_value(),
        is_parenthesized: element.is_parenthesized,
    }
}

fn is_always_retained(member: &ProtoMember) -> bool {
    ALWAYS_RETAINED
        .iter()
        .any(|&(ty, name)| member.ty().as_named() == Some(ty) && member.member() == name)
}

impl Value {
    /// The marked part of an option's value, or `None` if nothing is left of a message value.
    fn retain_option(&self, marks: &MarkSet) -> Option<Value> {
        let retained = self.retain_all(marks);
        match &retained {
            Value::Message(map) if map.is_empty() && retained != *self => None,
            _ => Some(retained),
        }
    }

    fn retain_all(&self, marks: &MarkSet) -> Value {
        match self {
            Value::Message(map) => Value::Message(
                map.iter()
                    .filter(|(member, _)| marks.contains_member(member))
                    .map(|(member, value)| (member.clone(), value.retain_all(marks)))
                    .collect(),
            ),
            Value::List(items) => {
                Value::List(items.iter().map(|item| item.retain_all(marks)).collect())
            }
            Value::String(_) | Value::Bool(_) | Value::Number(_) | Value::Enum(_) => self.clone(),
        }
    }
}
