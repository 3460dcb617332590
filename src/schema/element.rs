use protoschema_parse::ast::{
    EnumConstantElement, EnumElement, ExtendElement, FieldElement, MessageElement, OneOfElement,
    ProtoFileElement, RpcElement, ServiceElement, TypeElement,
};

use super::{
    EnclosingType, EnumConstant, EnumType, Extend, Field, MessageType, OneOf, ProtoFile, Rpc,
    Service, Type,
};

impl ProtoFile {
    /// Converts this file back into an element tree, for printing.
    pub fn to_element(&self) -> ProtoFileElement {
        ProtoFileElement {
            location: self.location.clone(),
            package_name: self.package_name.clone(),
            syntax: self.syntax,
            imports: self.imports.clone(),
            public_imports: self.public_imports.clone(),
            types: self.types.iter().map(Type::to_element).collect(),
            services: self.services.iter().map(Service::to_element).collect(),
            extend_declarations: self.extends.iter().map(Extend::to_element).collect(),
            options: self.options.elements().to_vec(),
        }
    }
}

impl Type {
    pub fn to_element(&self) -> TypeElement {
        match self {
            Type::Message(message) => TypeElement::Message(message.to_element()),
            Type::Enum(enum_) => TypeElement::Enum(enum_.to_element()),
            Type::Enclosing(enclosing) => TypeElement::Message(enclosing.to_element()),
        }
    }
}

impl MessageType {
    pub fn to_element(&self) -> MessageElement {
        MessageElement {
            location: self.location.clone(),
            name: self.ty.simple_name(),
            documentation: self.documentation.clone(),
            nested_types: self.nested_types.iter().map(Type::to_element).collect(),
            options: self.options.elements().to_vec(),
            reserveds: self.reserveds.clone(),
            fields: self.fields.iter().map(Field::to_element).collect(),
            one_ofs: self.one_ofs.iter().map(OneOf::to_element).collect(),
            extensions: self.extensions.clone(),
            groups: Vec::new(),
            extend_declarations: self.nested_extends.iter().map(Extend::to_element).collect(),
        }
    }
}

impl EnclosingType {
    /// Converts this type into an element with only nested types.
    pub fn to_element(&self) -> MessageElement {
        let mut element = MessageElement::new(self.location.clone(), self.ty.simple_name());
        element.documentation = self.documentation.clone();
        element.nested_types = self.nested_types.iter().map(Type::to_element).collect();
        element
    }
}

impl EnumType {
    pub fn to_element(&self) -> EnumElement {
        EnumElement {
            location: self.location.clone(),
            name: self.ty.simple_name(),
            documentation: self.documentation.clone(),
            options: self.options.elements().to_vec(),
            constants: self.constants.iter().map(EnumConstant::to_element).collect(),
            reserveds: self.reserveds.clone(),
        }
    }
}

impl EnumConstant {
    pub fn to_element(&self) -> EnumConstantElement {
        EnumConstantElement {
            location: self.location.clone(),
            name: self.name.clone(),
            tag: self.tag,
            documentation: self.documentation.clone(),
            options: self.options.elements().to_vec(),
        }
    }
}

impl Field {
    pub fn to_element(&self) -> FieldElement {
        FieldElement {
            location: self.location.clone(),
            label: self.label,
            ty: self.element_type.clone(),
            name: self.name.clone(),
            tag: self.tag,
            documentation: self.documentation.clone(),
            options: self.options.elements().to_vec(),
        }
    }
}

impl OneOf {
    pub fn to_element(&self) -> OneOfElement {
        OneOfElement {
            location: self.location.clone(),
            name: self.name.clone(),
            documentation: self.documentation.clone(),
            fields: self.fields.iter().map(Field::to_element).collect(),
            groups: Vec::new(),
            options: self.options.elements().to_vec(),
        }
    }
}

impl Extend {
    pub fn to_element(&self) -> ExtendElement {
        ExtendElement {
            location: self.location.clone(),
            name: self.name.clone(),
            documentation: self.documentation.clone(),
            fields: self.fields.iter().map(Field::to_element).collect(),
        }
    }
}

impl Service {
    pub fn to_element(&self) -> ServiceElement {
        ServiceElement {
            location: self.location.clone(),
            name: self.ty.simple_name(),
            documentation: self.documentation.clone(),
            rpcs: self.rpcs.iter().map(Rpc::to_element).collect(),
            options: self.options.elements().to_vec(),
        }
    }
}

impl Rpc {
    pub fn to_element(&self) -> RpcElement {
        RpcElement {
            location: self.location.clone(),
            name: self.name.clone(),
            documentation: self.documentation.clone(),
            request_type: self.request_type_name.clone(),
            response_type: self.response_type_name.clone(),
            request_streaming: self.request_streaming,
            response_streaming: self.response_streaming,
            options: self.options.elements().to_vec(),
        }
    }
}
