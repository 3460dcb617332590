//! Conversion of a [`Schema`] to `google.protobuf.FileDescriptorSet`.

use prost_types::{
    descriptor_proto, enum_descriptor_proto, field_descriptor_proto, DescriptorProto,
    EnumDescriptorProto, EnumOptions, EnumValueDescriptorProto, EnumValueOptions,
    FieldDescriptorProto, FieldOptions, FileDescriptorProto, FileDescriptorSet, FileOptions,
    MessageOptions, MethodDescriptorProto, MethodOptions, OneofDescriptorProto,
    ServiceDescriptorProto, ServiceOptions,
};
use protoschema_parse::ast::{Label, OptionValue, ReservedElement, Syntax};

use crate::{
    case::map_entry_name,
    options::Options,
    schema::{EnumType, Extend, Field, MessageType, ProtoFile, Service, Type},
    types::{ProtoType, Scalar},
    Schema,
};

impl Schema {
    /// Converts every file of this schema to a [`FileDescriptorSet`], the format consumed by
    /// code generators such as `prost-build`.
    ///
    /// Map fields get a generated nested `...Entry` message, as `protoc` does. Of the options,
    /// only well-known ones such as `packed`, `deprecated` or `java_package` are encoded.
    ///
    /// # Examples
    ///
    /// ```
    /// # use protoschema::{Compiler, MemoryLoader};
    /// let loader = MemoryLoader::new([(
    ///     "foo.proto",
    ///     "syntax = \"proto3\"; package foo; message Foo { map<string, int32> counts = 1; }",
    /// )]);
    /// let schema = Compiler::with_loader(loader)
    ///     .include_descriptor(false)
    ///     .open_file("foo.proto")
    ///     .unwrap()
    ///     .link()
    ///     .unwrap();
    ///
    /// let file_descriptor_set = schema.to_file_descriptor_set();
    /// let message = &file_descriptor_set.file[0].message_type[0];
    /// assert_eq!(message.nested_type[0].name(), "CountsEntry");
    /// assert_eq!(message.field[0].type_name(), ".foo.Foo.CountsEntry");
    /// ```
    pub fn to_file_descriptor_set(&self) -> FileDescriptorSet {
        FileDescriptorSet {
            file: self
                .proto_files()
                .iter()
                .map(|file| self.file_descriptor(file))
                .collect(),
        }
    }

    fn file_descriptor(&self, file: &ProtoFile) -> FileDescriptorProto {
        let mut dependency = file.imports.clone();
        let mut public_dependency = Vec::new();
        for import in &file.public_imports {
            public_dependency.push(index_to_i32(dependency.len()));
            dependency.push(import.clone());
        }

        let mut message_type = Vec::new();
        let mut enum_type = Vec::new();
        self.add_types(&file.types, &mut message_type, &mut enum_type);

        FileDescriptorProto {
            name: Some(file.path().to_owned()),
            package: file.package_name.clone(),
            dependency,
            public_dependency,
            weak_dependency: vec![],
            message_type,
            enum_type,
            service: file
                .services
                .iter()
                .map(service_descriptor)
                .collect(),
            extension: self.extension_descriptors(&file.extends),
            options: file_options(&file.options),
            source_code_info: None,
            syntax: match file.syntax {
                Some(Syntax::Proto3) => Some("proto3".to_owned()),
                Some(Syntax::Proto2) | None => None,
            },
        }
    }

    fn add_types(
        &self,
        types: &[Type],
        messages: &mut Vec<DescriptorProto>,
        enums: &mut Vec<EnumDescriptorProto>,
    ) {
        for ty in types {
            match ty {
                Type::Message(message) => messages.push(self.message_descriptor(message)),
                Type::Enum(enum_) => enums.push(enum_descriptor(enum_)),
                Type::Enclosing(enclosing) => {
                    let mut descriptor = DescriptorProto {
                        name: Some(enclosing.ty.simple_name()),
                        ..Default::default()
                    };
                    self.add_types(
                        &enclosing.nested_types,
                        &mut descriptor.nested_type,
                        &mut descriptor.enum_type,
                    );
                    messages.push(descriptor);
                }
            }
        }
    }

    fn message_descriptor(&self, message: &MessageType) -> DescriptorProto {
        let mut descriptor = DescriptorProto {
            name: Some(message.ty.simple_name()),
            ..Default::default()
        };

        for field in &message.fields {
            let field = self.field_descriptor(&message.ty, field, &mut descriptor.nested_type);
            descriptor.field.push(field);
        }

        for (index, one_of) in message.one_ofs.iter().enumerate() {
            descriptor.oneof_decl.push(OneofDescriptorProto {
                name: Some(one_of.name.clone()),
                options: None,
            });
            for field in &one_of.fields {
                let field = self.field_descriptor(&message.ty, field, &mut descriptor.nested_type);
                descriptor.field.push(FieldDescriptorProto {
                    oneof_index: Some(index_to_i32(index)),
                    ..field
                });
            }
        }

        self.add_types(
            &message.nested_types,
            &mut descriptor.nested_type,
            &mut descriptor.enum_type,
        );
        descriptor.extension = self.extension_descriptors(&message.nested_extends);

        descriptor.extension_range = message
            .extensions
            .iter()
            .map(|extensions| descriptor_proto::ExtensionRange {
                start: Some(extensions.start),
                end: Some(extensions.end + 1),
                options: None,
            })
            .collect();
        for reserved in &message.reserveds {
            descriptor.reserved_range.extend(
                reserved_ranges(reserved).map(|(start, end)| descriptor_proto::ReservedRange {
                    start: Some(start),
                    end: Some(end + 1),
                }),
            );
            descriptor.reserved_name.extend(reserved.names.iter().cloned());
        }

        let deprecated = bool_option(&message.options, "deprecated");
        if deprecated.is_some() {
            descriptor.options = Some(MessageOptions {
                deprecated,
                ..Default::default()
            });
        }

        descriptor
    }

    fn extension_descriptors(&self, extends: &[Extend]) -> Vec<FieldDescriptorProto> {
        let mut result = Vec::new();
        for extend in extends {
            for field in &extend.fields {
                let field = self.field_descriptor(&extend.ty, field, &mut Vec::new());
                result.push(FieldDescriptorProto {
                    extendee: Some(type_name(&extend.ty)),
                    ..field
                });
            }
        }
        result
    }

    /// Converts a field of `parent`, adding a generated entry message to `nested_types` if it is a
    /// map field.
    fn field_descriptor(
        &self,
        parent: &ProtoType,
        field: &Field,
        nested_types: &mut Vec<DescriptorProto>,
    ) -> FieldDescriptorProto {
        let mut label = match field.label {
            Some(Label::Required) => field_descriptor_proto::Label::Required,
            Some(Label::Repeated) => field_descriptor_proto::Label::Repeated,
            Some(Label::Optional) | Some(Label::OneOf) | None => {
                field_descriptor_proto::Label::Optional
            }
        };

        let (r#type, type_name) = match &field.ty {
            ProtoType::Map(key, value) => {
                let entry_name = map_entry_name(&field.name);
                nested_types.push(self.map_entry_descriptor(&entry_name, key, value));
                label = field_descriptor_proto::Label::Repeated;
                (
                    Some(field_descriptor_proto::Type::Message),
                    Some(format!(".{}.{}", parent, entry_name)),
                )
            }
            ty => self.field_type(ty),
        };

        FieldDescriptorProto {
            name: Some(field.name.clone()),
            number: Some(field.tag),
            label: Some(label as i32),
            r#type: r#type.map(|ty| ty as i32),
            type_name,
            extendee: None,
            default_value: field.default().map(default_value),
            oneof_index: None,
            json_name: Some(field.json_name()),
            options: field_options(&field.options),
            proto3_optional: None,
        }
    }

    fn map_entry_descriptor(
        &self,
        name: &str,
        key: &ProtoType,
        value: &ProtoType,
    ) -> DescriptorProto {
        let entry_field = |name: &str, number: i32, ty: &ProtoType| {
            let (r#type, type_name) = self.field_type(ty);
            FieldDescriptorProto {
                name: Some(name.to_owned()),
                number: Some(number),
                label: Some(field_descriptor_proto::Label::Optional as i32),
                r#type: r#type.map(|ty| ty as i32),
                type_name,
                json_name: Some(name.to_owned()),
                ..Default::default()
            }
        };

        DescriptorProto {
            name: Some(name.to_owned()),
            field: vec![entry_field("key", 1, key), entry_field("value", 2, value)],
            options: Some(MessageOptions {
                map_entry: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn field_type(&self, ty: &ProtoType) -> (Option<field_descriptor_proto::Type>, Option<String>) {
        match ty {
            ProtoType::Scalar(scalar) => (scalar_type(*scalar), None),
            ProtoType::Named(name) => {
                let r#type = match self.get_type(name) {
                    Some(Type::Enum(_)) => field_descriptor_proto::Type::Enum,
                    Some(Type::Message(_)) | Some(Type::Enclosing(_)) | None => {
                        field_descriptor_proto::Type::Message
                    }
                };
                (Some(r#type), Some(type_name(ty)))
            }
            ProtoType::Map(..) => (Some(field_descriptor_proto::Type::Message), None),
        }
    }
}

fn enum_descriptor(enum_: &EnumType) -> EnumDescriptorProto {
    let mut reserved_range = Vec::new();
    let mut reserved_name = Vec::new();
    for reserved in &enum_.reserveds {
        reserved_range.extend(reserved_ranges(reserved).map(|(start, end)| {
            enum_descriptor_proto::EnumReservedRange {
                start: Some(start),
                end: Some(end),
            }
        }));
        reserved_name.extend(reserved.names.iter().cloned());
    }

    let allow_alias = bool_option(&enum_.options, "allow_alias");
    let deprecated = bool_option(&enum_.options, "deprecated");

    EnumDescriptorProto {
        name: Some(enum_.ty.simple_name()),
        value: enum_
            .constants
            .iter()
            .map(|constant| EnumValueDescriptorProto {
                name: Some(constant.name.clone()),
                number: Some(constant.tag),
                options: bool_option(&constant.options, "deprecated").map(|deprecated| {
                    EnumValueOptions {
                        deprecated: Some(deprecated),
                        ..Default::default()
                    }
                }),
            })
            .collect(),
        options: (allow_alias.is_some() || deprecated.is_some()).then(|| EnumOptions {
            allow_alias,
            deprecated,
            ..Default::default()
        }),
        reserved_range,
        reserved_name,
    }
}

fn service_descriptor(service: &Service) -> ServiceDescriptorProto {
    ServiceDescriptorProto {
        name: Some(service.ty.simple_name()),
        method: service
            .rpcs
            .iter()
            .map(|rpc| MethodDescriptorProto {
                name: Some(rpc.name.clone()),
                input_type: Some(type_name(&rpc.request_type)),
                output_type: Some(type_name(&rpc.response_type)),
                options: bool_option(&rpc.options, "deprecated").map(|deprecated| MethodOptions {
                    deprecated: Some(deprecated),
                    ..Default::default()
                }),
                client_streaming: rpc.request_streaming.then_some(true),
                server_streaming: rpc.response_streaming.then_some(true),
            })
            .collect(),
        options: bool_option(&service.options, "deprecated").map(|deprecated| ServiceOptions {
            deprecated: Some(deprecated),
            ..Default::default()
        }),
    }
}

fn file_options(options: &Options) -> Option<FileOptions> {
    let file_options = FileOptions {
        java_package: string_option(options, "java_package"),
        java_outer_classname: string_option(options, "java_outer_classname"),
        java_multiple_files: bool_option(options, "java_multiple_files"),
        go_package: string_option(options, "go_package"),
        deprecated: bool_option(options, "deprecated"),
        ..Default::default()
    };
    (file_options != FileOptions::default()).then_some(file_options)
}

fn field_options(options: &Options) -> Option<FieldOptions> {
    let packed = bool_option(options, "packed");
    let deprecated = bool_option(options, "deprecated");
    (packed.is_some() || deprecated.is_some()).then(|| FieldOptions {
        packed,
        deprecated,
        ..Default::default()
    })
}

fn bool_option(options: &Options, name: &str) -> Option<bool> {
    match options.element(name)? {
        OptionValue::Boolean(value) => Some(*value),
        _ => None,
    }
}

fn string_option(options: &Options, name: &str) -> Option<String> {
    match options.element(name)? {
        OptionValue::String(value) => Some(value.clone()),
        _ => None,
    }
}

fn default_value(value: &OptionValue) -> String {
    match value {
        OptionValue::String(value) | OptionValue::Number(value) | OptionValue::Enum(value) => {
            value.clone()
        }
        value => value.to_string(),
    }
}

/// Every tag range of a `reserved` declaration, with inclusive ends.
fn reserved_ranges(reserved: &ReservedElement) -> impl Iterator<Item = (i32, i32)> + '_ {
    reserved
        .tags
        .iter()
        .map(|&tag| (tag, tag))
        .chain(reserved.ranges.iter().map(|range| (*range.start(), *range.end())))
}

fn scalar_type(scalar: Scalar) -> Option<field_descriptor_proto::Type> {
    use field_descriptor_proto::Type;

    Some(match scalar {
        Scalar::Bool => Type::Bool,
        Scalar::Bytes => Type::Bytes,
        Scalar::Double => Type::Double,
        Scalar::Float => Type::Float,
        Scalar::Fixed32 => Type::Fixed32,
        Scalar::Fixed64 => Type::Fixed64,
        Scalar::Int32 => Type::Int32,
        Scalar::Int64 => Type::Int64,
        Scalar::Sfixed32 => Type::Sfixed32,
        Scalar::Sfixed64 => Type::Sfixed64,
        Scalar::Sint32 => Type::Sint32,
        Scalar::Sint64 => Type::Sint64,
        Scalar::String => Type::String,
        Scalar::Uint32 => Type::Uint32,
        Scalar::Uint64 => Type::Uint64,
        Scalar::Any => return None,
    })
}

fn type_name(ty: &ProtoType) -> String {
    format!(".{}", ty)
}

fn index_to_i32(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}
