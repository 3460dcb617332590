use std::collections::{btree_map, BTreeMap, HashMap};

use protoschema_parse::ast::{OptionElement, OptionValue};
use tracing::trace;

use super::{attach_extension_fields, candidates, ContextKind, Linker};
use crate::{
    options::{Options, Value},
    schema::{Extend, Field, Schema, Type},
    types::{ProtoMember, ProtoType},
};

/// The fields and extension fields of every message, as needed to resolve option names.
struct OptionFields {
    messages: HashMap<String, MessageFields>,
}

#[derive(Default)]
struct MessageFields {
    fields: HashMap<String, FieldInfo>,
    extensions: HashMap<String, FieldInfo>,
}

#[derive(Debug, Clone)]
struct FieldInfo {
    member: ProtoMember,
    ty: ProtoType,
    repeated: bool,
    /// The path of the file declaring the field.
    file: String,
}

impl OptionFields {
    fn new(schema: &Schema) -> Self {
        fn add_types(types: &[Type], messages: &mut HashMap<String, MessageFields>) {
            for ty in types {
                if let Type::Message(message) = ty {
                    let mut fields = MessageFields::default();
                    for field in message.fields_and_one_of_fields() {
                        fields
                            .fields
                            .insert(field.name.clone(), FieldInfo::new(&message.ty, field));
                    }
                    for field in &message.extension_fields {
                        fields
                            .extensions
                            .insert(field.qualified_name.clone(), FieldInfo::new(&message.ty, field));
                    }
                    messages.insert(message.ty.to_string(), fields);
                }
                add_types(ty.nested_types(), messages);
            }
        }

        let mut messages = HashMap::new();
        for file in schema.proto_files() {
            add_types(&file.types, &mut messages);
        }
        OptionFields { messages }
    }

    fn field(&self, ty: &ProtoType, name: &str) -> Option<&FieldInfo> {
        self.messages.get(ty.as_named()?)?.fields.get(name)
    }

    fn extension(&self, ty: &ProtoType, qualified_name: &str) -> Option<&FieldInfo> {
        self.messages
            .get(ty.as_named()?)?
            .extensions
            .get(qualified_name)
    }
}

impl FieldInfo {
    fn new(message: &ProtoType, field: &Field) -> Self {
        FieldInfo {
            member: ProtoMember::new(message.clone(), field.qualified_name.clone()),
            ty: field.ty.clone(),
            repeated: field.is_repeated(),
            file: field.location.path().to_owned(),
        }
    }
}

impl<'a> Linker<'a> {
    /// Resolves the options of every declaration against the fields of their options container.
    pub(super) fn link_options(&mut self, schema: &mut Schema) {
        let lookup = OptionFields::new(schema);

        for (index, file) in schema.files_mut().iter_mut().enumerate() {
            self.enter_file(index);

            self.resolve_options(&lookup, &mut file.options);
            for ty in &mut file.types {
                self.link_type_options(&lookup, ty);
            }
            for service in &mut file.services {
                self.enter(ContextKind::Service, service.ty.to_string(), &service.location);
                self.resolve_options(&lookup, &mut service.options);
                for rpc in &mut service.rpcs {
                    self.enter(ContextKind::Rpc, rpc.name.clone(), &rpc.location);
                    self.resolve_options(&lookup, &mut rpc.options);
                    self.exit();
                }
                self.exit();
            }
            for extend in &mut file.extends {
                self.link_extend_options(&lookup, extend);
            }

            self.exit();
        }

        // Refresh the copies of extension fields so they carry resolved options.
        attach_extension_fields(schema);
    }

    fn link_type_options(&mut self, lookup: &OptionFields, ty: &mut Type) {
        match ty {
            Type::Message(message) => {
                self.enter(
                    ContextKind::Message,
                    message.ty.to_string(),
                    &message.location,
                );
                self.resolve_options(lookup, &mut message.options);
                for field in &mut message.fields {
                    self.link_field_options(lookup, field);
                }
                for one_of in &mut message.one_ofs {
                    self.resolve_options(lookup, &mut one_of.options);
                    for field in &mut one_of.fields {
                        self.link_field_options(lookup, field);
                    }
                }
                for nested in &mut message.nested_types {
                    self.link_type_options(lookup, nested);
                }
                for extend in &mut message.nested_extends {
                    self.link_extend_options(lookup, extend);
                }
                self.exit();
            }
            Type::Enum(enum_) => {
                self.enter(ContextKind::Enum, enum_.ty.to_string(), &enum_.location);
                self.resolve_options(lookup, &mut enum_.options);
                for constant in &mut enum_.constants {
                    self.resolve_options(lookup, &mut constant.options);
                }
                self.exit();
            }
            Type::Enclosing(_) => (),
        }
    }

    fn link_extend_options(&mut self, lookup: &OptionFields, extend: &mut Extend) {
        self.enter(ContextKind::Extend, extend.name.clone(), &extend.location);
        for field in &mut extend.fields {
            self.link_field_options(lookup, field);
        }
        self.exit();
    }

    fn link_field_options(&mut self, lookup: &OptionFields, field: &mut Field) {
        self.enter(ContextKind::Field, field.name.clone(), &field.location);
        self.resolve_options(lookup, &mut field.options);
        self.exit();
    }

    fn resolve_options(&mut self, lookup: &OptionFields, options: &mut Options) {
        if options.elements.is_empty() {
            return;
        }

        let mut resolved = Vec::with_capacity(options.elements.len());
        let mut map = BTreeMap::new();
        for element in &options.elements {
            let option = self.resolve_option(lookup, &options.options_type, element);
            if let Some((member, value)) = &option {
                self.merge_option(&mut map, member.clone(), value.clone());
            }
            resolved.push(option);
        }

        options.resolved = resolved;
        options.map = map;
    }

    /// Resolves one option declaration to the container field it sets and its value.
    ///
    /// Returns `None` if the option's name is not a field of the container. Such options are kept
    /// as written without being reported. Unknown extensions are reported.
    fn resolve_option(
        &mut self,
        lookup: &OptionFields,
        container: &ProtoType,
        element: &OptionElement,
    ) -> Option<(ProtoMember, Value)> {
        let mut path = Vec::new();
        if element.is_parenthesized {
            match self.resolve_extension(lookup, container, &element.name) {
                Some(field) => path.push(field),
                None => {
                    self.add_error(format!(
                        "unable to resolve option ({}) on {}",
                        element.name, container
                    ));
                    return None;
                }
            }
        } else {
            let mut parts = element.name.split('.');
            path.push(lookup.field(container, parts.next()?)?.clone());
            for part in parts {
                let next = self.dereference_or_report(lookup, &path[path.len() - 1].ty, part)?;
                path.push(next);
            }
        }

        let mut value = &element.value;
        while let OptionValue::Option(nested) = value {
            let parent = path[path.len() - 1].ty.clone();
            if nested.is_parenthesized {
                match self.resolve_extension(lookup, &parent, &nested.name) {
                    Some(field) => path.push(field),
                    None => {
                        self.add_error(format!(
                            "unable to resolve option ({}) on {}",
                            nested.name, parent
                        ));
                        return None;
                    }
                }
            } else {
                for part in nested.name.split('.') {
                    let next =
                        self.dereference_or_report(lookup, &path[path.len() - 1].ty, part)?;
                    path.push(next);
                }
            }
            value = &nested.value;
        }

        let (first, rest) = path.split_first()?;
        trace!(option = %element.name, member = %first.member, "resolved option");

        let last = rest.last().unwrap_or(first);
        let mut result = self.canonicalize(lookup, last, value);
        for field in rest.iter().rev() {
            result = Value::Message(BTreeMap::from([(field.member.clone(), result)]));
        }
        Some((first.member.clone(), result))
    }

    /// Resolves an extension of `container` relative to the current scope, reporting an error if
    /// it is declared in a file that is not imported.
    fn resolve_extension(
        &mut self,
        lookup: &OptionFields,
        container: &ProtoType,
        name: &str,
    ) -> Option<FieldInfo> {
        let field = match name.strip_prefix('.') {
            Some(absolute) => lookup.extension(container, absolute),
            None => candidates(self.scope().as_deref(), name)
                .iter()
                .find_map(|candidate| lookup.extension(container, candidate)),
        }?
        .clone();

        if let Some(&declared_in) = self.file_names.get(field.file.as_str()) {
            if !self.visible[self.file].contains(&declared_in) {
                let message = format!(
                    "{} needs to import {}",
                    self.files[self.file].location.path(),
                    field.file
                );
                self.add_error(message);
            }
        }
        Some(field)
    }

    /// Resolves a field of a message-typed option value: either a plain field name, or an
    /// extension name in brackets.
    fn dereference(
        &mut self,
        lookup: &OptionFields,
        ty: &ProtoType,
        name: &str,
    ) -> Option<FieldInfo> {
        if let Some(extension) = name.strip_prefix('[').and_then(|name| name.strip_suffix(']')) {
            return self.resolve_extension(lookup, ty, extension);
        }
        lookup
            .field(ty, name)
            .cloned()
            .or_else(|| self.resolve_extension(lookup, ty, name))
    }

    fn dereference_or_report(
        &mut self,
        lookup: &OptionFields,
        ty: &ProtoType,
        name: &str,
    ) -> Option<FieldInfo> {
        let field = self.dereference(lookup, ty, name);
        if field.is_none() {
            self.add_error(format!("unable to resolve option {} on {}", name, ty));
        }
        field
    }

    /// Converts a value as written into the value of `field`. Values of repeated fields are
    /// always lists.
    fn canonicalize(&mut self, lookup: &OptionFields, field: &FieldInfo, value: &OptionValue) -> Value {
        let value = self.canonicalize_value(lookup, &field.ty, value);
        if field.repeated && !matches!(value, Value::List(_)) {
            Value::List(vec![value])
        } else {
            value
        }
    }

    fn canonicalize_value(&mut self, lookup: &OptionFields, ty: &ProtoType, value: &OptionValue) -> Value {
        match value {
            OptionValue::String(value) => Value::String(value.clone()),
            OptionValue::Boolean(value) => Value::Bool(*value),
            OptionValue::Number(value) => Value::Number(value.clone()),
            OptionValue::Enum(value) => Value::Enum(value.clone()),
            OptionValue::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.canonicalize_value(lookup, ty, item))
                    .collect(),
            ),
            OptionValue::Map(entries) => {
                let mut map = BTreeMap::new();
                for (name, value) in entries {
                    if let Some(field) = self.dereference_or_report(lookup, ty, name) {
                        let value = self.canonicalize(lookup, &field, value);
                        self.merge_option(&mut map, field.member, value);
                    }
                }
                Value::Message(map)
            }
            OptionValue::Option(nested) => {
                let name = if nested.is_parenthesized {
                    format!("[{}]", nested.name)
                } else {
                    nested.name.clone()
                };
                let mut map = BTreeMap::new();
                if let Some(field) = self.dereference_or_report(lookup, ty, &name) {
                    let value = self.canonicalize(lookup, &field, &nested.value);
                    map.insert(field.member, value);
                }
                Value::Message(map)
            }
        }
    }

    /// Adds `value` to `map`, combining it with any value already set for `member`.
    fn merge_option(
        &mut self,
        map: &mut BTreeMap<ProtoMember, Value>,
        member: ProtoMember,
        value: Value,
    ) {
        match map.entry(member) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(value);
            }
            btree_map::Entry::Occupied(entry) => {
                let (member, existing) = entry.remove_entry();
                match existing.union(value) {
                    Ok(merged) => {
                        map.insert(member, merged);
                    }
                    Err((existing, value)) => {
                        self.add_error(format!("conflicting options: {}, {}", existing, value));
                        map.insert(member, existing);
                    }
                }
            }
        }
    }
}
