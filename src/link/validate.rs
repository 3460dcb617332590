use std::{collections::BTreeMap, fmt::Write, ops::RangeInclusive};

use protoschema_parse::ast::{ReservedElement, MAX_TAG_VALUE};

use super::{ContextKind, Linker};
use crate::{
    schema::{EnumConstant, EnumType, Extend, Field, MessageType, Rpc, Schema, Service, Type},
    types::ProtoType,
};

/// Tags used internally by the protobuf implementation.
const RESERVED_TAGS: RangeInclusive<i32> = 19_000..=19_999;

fn is_valid_tag(tag: i32) -> bool {
    (1..=MAX_TAG_VALUE).contains(&tag) && !RESERVED_TAGS.contains(&tag)
}

impl<'a> Linker<'a> {
    /// Checks the constraints that need every type to have been resolved.
    pub(super) fn validate(&mut self, schema: &Schema) {
        for (index, file) in schema.proto_files().iter().enumerate() {
            self.enter_file(index);

            self.validate_enum_constant_names(&file.types);
            for ty in &file.types {
                self.validate_type(schema, ty);
            }
            for service in &file.services {
                self.validate_service(service);
            }
            for extend in &file.extends {
                self.validate_extend(schema, extend);
            }

            self.exit();
        }
    }

    fn validate_type(&mut self, schema: &Schema, ty: &Type) {
        match ty {
            Type::Message(message) => self.validate_message(schema, message),
            Type::Enum(enum_) => self.validate_enum(enum_),
            Type::Enclosing(_) => (),
        }
    }

    fn validate_message(&mut self, schema: &Schema, message: &MessageType) {
        self.enter(
            ContextKind::Message,
            message.ty.to_string(),
            &message.location,
        );

        for field in message.fields_and_one_of_fields() {
            self.enter(ContextKind::Field, field.name.clone(), &field.location);
            self.validate_field(schema, field);
            self.validate_reserved(&message.reserveds, &field.name, field.tag);
            self.exit();
        }

        for range in &message.extensions {
            if !is_valid_tag(range.start) || !is_valid_tag(range.end) {
                self.add_error(format!(
                    "tags are out of range: {} to {}",
                    range.start, range.end
                ));
            }
        }

        self.validate_field_uniqueness(
            message
                .fields_and_one_of_fields()
                .chain(&message.extension_fields),
        );

        self.validate_enum_constant_names(&message.nested_types);
        for nested in &message.nested_types {
            self.validate_type(schema, nested);
        }
        for extend in &message.nested_extends {
            self.validate_extend(schema, extend);
        }

        self.exit();
    }

    fn validate_field(&mut self, schema: &Schema, field: &Field) {
        if !is_valid_tag(field.tag) {
            self.add_error(format!("tag is out of range: {}", field.tag));
        }

        if field.is_packed() && !is_packable(schema, &field.ty) {
            self.add_error(format!("packed=true not permitted on {}", field.ty));
        }

        if let Some(key) = field.ty.key_type() {
            let valid = match key {
                ProtoType::Scalar(scalar) => scalar.is_valid_map_key(),
                ProtoType::Map(..) | ProtoType::Named(_) => false,
            };
            if !valid {
                self.add_error("invalid map key type");
            }
        }
    }

    /// Reports a field or enum constant that uses a reserved tag or name. Both are reported if
    /// both are reserved.
    fn validate_reserved(&mut self, reserveds: &[ReservedElement], name: &str, tag: i32) {
        for reserved in reserveds {
            if reserved.matches_tag(tag) {
                self.add_error(format!("tag {} is reserved ({})", tag, reserved.location));
            }
            if reserved.matches_name(name) {
                self.add_error(format!("name '{}' is reserved ({})", name, reserved.location));
            }
        }
    }

    fn validate_field_uniqueness<'f>(&mut self, fields: impl Iterator<Item = &'f Field>) {
        let mut by_tag: BTreeMap<i32, Vec<&Field>> = BTreeMap::new();
        let mut by_name: BTreeMap<&str, Vec<&Field>> = BTreeMap::new();
        for field in fields {
            by_tag.entry(field.tag).or_default().push(field);
            by_name
                .entry(field.qualified_name.as_str())
                .or_default()
                .push(field);
        }

        for (tag, fields) in by_tag {
            if fields.len() > 1 {
                let mut message = format!("multiple fields share tag {}:", tag);
                for (index, field) in fields.iter().enumerate() {
                    let _ = write!(
                        message,
                        "\n  {}. {} ({})",
                        index + 1,
                        field.qualified_name,
                        field.location
                    );
                }
                self.add_error(message);
            }
        }

        for (name, fields) in by_name {
            if fields.len() > 1 {
                let mut message = format!("multiple fields share name {}:", name);
                for (index, field) in fields.iter().enumerate() {
                    let _ = write!(
                        message,
                        "\n  {}. {} ({})",
                        index + 1,
                        field.qualified_name,
                        field.location
                    );
                }
                self.add_error(message);
            }
        }
    }

    fn validate_enum(&mut self, enum_: &EnumType) {
        self.enter(ContextKind::Enum, enum_.ty.to_string(), &enum_.location);

        if !enum_.allow_alias() {
            let mut by_tag: BTreeMap<i32, Vec<&EnumConstant>> = BTreeMap::new();
            for constant in &enum_.constants {
                by_tag.entry(constant.tag).or_default().push(constant);
            }

            for (tag, constants) in by_tag {
                if constants.len() > 1 {
                    let mut message = format!("multiple enum constants share tag {}:", tag);
                    for (index, constant) in constants.iter().enumerate() {
                        let _ = write!(
                            message,
                            "\n  {}. {} ({})",
                            index + 1,
                            constant.name,
                            constant.location
                        );
                    }
                    self.add_error(message);
                }
            }
        }

        for constant in &enum_.constants {
            self.validate_reserved(&enum_.reserveds, &constant.name, constant.tag);
        }

        self.exit();
    }

    /// Enum constants are scoped to the declaration enclosing their enum, so sibling enums may
    /// not share constant names.
    fn validate_enum_constant_names(&mut self, types: &[Type]) {
        let mut by_name: BTreeMap<&str, Vec<(&ProtoType, &EnumConstant)>> = BTreeMap::new();
        for ty in types {
            if let Type::Enum(enum_) = ty {
                for constant in &enum_.constants {
                    by_name
                        .entry(constant.name.as_str())
                        .or_default()
                        .push((&enum_.ty, constant));
                }
            }
        }

        for (name, constants) in by_name {
            if constants.len() > 1 {
                let mut message = format!("multiple enums share constant {}:", name);
                for (index, (ty, constant)) in constants.iter().enumerate() {
                    let _ = write!(
                        message,
                        "\n  {}. {}.{} ({})",
                        index + 1,
                        ty,
                        constant.name,
                        constant.location
                    );
                }
                self.add_error(message);
            }
        }
    }

    fn validate_extend(&mut self, schema: &Schema, extend: &Extend) {
        self.enter(ContextKind::Extend, extend.name.clone(), &extend.location);

        let target = extend.ty.as_named().and_then(|name| schema.get_type(name));
        for field in &extend.fields {
            self.enter(ContextKind::Field, field.name.clone(), &field.location);

            self.validate_field(schema, field);
            if field.is_required() {
                self.add_error("extension fields cannot be required");
            }
            if let Some(Type::Message(message)) = target {
                if !message.is_extension_tag(field.tag) {
                    self.add_error(format!(
                        "{} does not declare {} as an extension number",
                        message.ty, field.tag
                    ));
                }
            }

            self.exit();
        }

        self.exit();
    }

    fn validate_service(&mut self, service: &Service) {
        self.enter(ContextKind::Service, service.ty.to_string(), &service.location);

        let mut by_name: BTreeMap<&str, Vec<&Rpc>> = BTreeMap::new();
        for rpc in &service.rpcs {
            by_name.entry(rpc.name.as_str()).or_default().push(rpc);
        }
        for (name, rpcs) in by_name {
            if rpcs.len() > 1 {
                let mut message = format!("multiple rpcs share name {}:", name);
                for (index, rpc) in rpcs.iter().enumerate() {
                    let _ = write!(message, "\n  {}. {} ({})", index + 1, rpc.name, rpc.location);
                }
                self.add_error(message);
            }
        }

        self.exit();
    }
}

/// Only scalar numeric types, `bool` and enums may use the packed encoding.
fn is_packable(schema: &Schema, ty: &ProtoType) -> bool {
    match ty {
        ProtoType::Scalar(scalar) => scalar.is_packable(),
        ProtoType::Named(name) => matches!(schema.get_type(name), Some(Type::Enum(_))),
        ProtoType::Map(..) => false,
    }
}
