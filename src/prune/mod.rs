//! Reduction of a [`Schema`] to the declarations reachable from a set of roots.

mod identifier_set;
mod mark_set;
mod sweep;
#[cfg(test)]
mod tests;

pub use identifier_set::{Builder as IdentifierSetBuilder, IdentifierSet, IdentifierSetError};
pub(crate) use mark_set::MarkSet;

use std::collections::VecDeque;

use tracing::debug;

use crate::{
    link::attach_extension_fields,
    options::Options,
    schema::{Field, Rpc, Schema, Type},
    types::{ProtoMember, ProtoType},
};

/// Marks everything reachable from the roots of an [`IdentifierSet`], then copies the marked
/// parts of the schema.
pub(crate) struct Pruner<'a> {
    schema: &'a Schema,
    identifier_set: &'a IdentifierSet,
    marks: MarkSet<'a>,
    queue: VecDeque<Mark>,
}

/// A marked identifier whose dependencies have not yet been marked.
#[derive(Debug)]
enum Mark {
    Type(ProtoType),
    Member(ProtoMember),
}

impl<'a> Pruner<'a> {
    pub(crate) fn new(schema: &'a Schema, identifier_set: &'a IdentifierSet) -> Self {
        Pruner {
            schema,
            identifier_set,
            marks: MarkSet::new(identifier_set),
            queue: VecDeque::new(),
        }
    }

    pub(crate) fn prune(mut self) -> Schema {
        if !self.marks.is_mark_all() {
            self.mark_roots();
            debug!(roots = self.queue.len(), "marked roots");

            self.mark_reachable();
            debug!(
                types = self.marks.type_count(),
                members = self.marks.member_count(),
                "marked reachable declarations"
            );
        }

        let files = self
            .schema
            .proto_files()
            .iter()
            .map(|file| file.retain_all(&self.marks))
            .collect();
        let mut schema = Schema::new(files);
        attach_extension_fields(&mut schema);
        schema
    }

    fn mark_roots(&mut self) {
        let schema = self.schema;
        for file in schema.proto_files() {
            self.mark_root_types(&file.types);

            for service in &file.services {
                let rpcs = service.rpcs.iter().map(|rpc| rpc.name.as_str());
                self.mark_root(&service.ty, rpcs.collect());
            }
        }
    }

    fn mark_root_types(&mut self, types: &[Type]) {
        for ty in types {
            match ty {
                Type::Message(message) => {
                    let members = message
                        .fields_and_one_of_fields()
                        .chain(&message.extension_fields)
                        .map(|field| field.qualified_name.as_str());
                    self.mark_root(&message.ty, members.collect());
                }
                Type::Enum(enum_) => {
                    let members = enum_.constants.iter().map(|constant| constant.name.as_str());
                    self.mark_root(&enum_.ty, members.collect());
                }
                Type::Enclosing(_) => (),
            }
            self.mark_root_types(ty.nested_types());
        }
    }

    /// Roots `ty` if it is included as a whole, otherwise roots each of its included members.
    fn mark_root(&mut self, ty: &ProtoType, members: Vec<&str>) {
        if self.identifier_set.includes_type(ty) {
            self.marks.root_type(ty.clone());
            self.queue.push_back(Mark::Type(ty.clone()));
            return;
        }

        for member in members {
            let member = ProtoMember::new(ty.clone(), member);
            if self.identifier_set.includes_member(&member) {
                self.marks.root_member(member.clone());
                self.queue.push_back(Mark::Member(member));
            }
        }
    }

    fn mark_reachable(&mut self) {
        while let Some(mark) = self.queue.pop_front() {
            match mark {
                Mark::Type(ty) => self.mark_type_dependencies(&ty),
                Mark::Member(member) => self.mark_member_dependencies(&member),
            }
        }
    }

    /// Marks everything used by a type reached as a whole.
    fn mark_type_dependencies(&mut self, ty: &ProtoType) {
        let schema = self.schema;
        let name = match ty.as_named() {
            Some(name) => name,
            None => return,
        };

        if let Some(service) = schema.get_service(name) {
            self.mark_options(&service.options);
            for rpc in &service.rpcs {
                if self.contains_member(ty, &rpc.name) {
                    self.mark_rpc(rpc);
                }
            }
            return;
        }

        match schema.get_type(name) {
            Some(Type::Message(message)) => {
                self.mark_options(&message.options);
                for one_of in &message.one_ofs {
                    self.mark_options(&one_of.options);
                }
                for field in message
                    .fields_and_one_of_fields()
                    .chain(&message.extension_fields)
                {
                    if self.contains_member(ty, &field.qualified_name) {
                        self.mark_field(field);
                    }
                }
            }
            Some(Type::Enum(enum_)) => {
                self.mark_options(&enum_.options);
                for constant in &enum_.constants {
                    if self.contains_member(ty, &constant.name) {
                        self.mark_options(&constant.options);
                    }
                }
            }
            Some(Type::Enclosing(_)) | None => (),
        }
    }

    /// Marks everything used by a single member, along with the options of its declaring type.
    fn mark_member_dependencies(&mut self, member: &ProtoMember) {
        let schema = self.schema;
        let name = match member.ty().as_named() {
            Some(name) => name,
            None => return,
        };

        if let Some(service) = schema.get_service(name) {
            self.mark_options(&service.options);
            if let Some(rpc) = service.rpc(member.member()) {
                self.mark_rpc(rpc);
            }
            return;
        }

        match schema.get_type(name) {
            Some(Type::Message(message)) => {
                self.mark_options(&message.options);
                for one_of in &message.one_ofs {
                    if one_of.fields.iter().any(|field| field.name == member.member()) {
                        self.mark_options(&one_of.options);
                    }
                }
                if let Some(field) = message.member_field(member.member()) {
                    self.mark_field(field);
                }
            }
            Some(Type::Enum(enum_)) => {
                self.mark_options(&enum_.options);
                if let Some(constant) = enum_.constant(member.member()) {
                    self.mark_options(&constant.options);
                }
            }
            Some(Type::Enclosing(_)) | None => (),
        }
    }

    fn mark_field(&mut self, field: &Field) {
        self.mark_field_type(&field.ty);
        self.mark_options(&field.options);
    }

    fn mark_rpc(&mut self, rpc: &Rpc) {
        self.mark_field_type(&rpc.request_type);
        self.mark_field_type(&rpc.response_type);
        self.mark_options(&rpc.options);
    }

    fn mark_field_type(&mut self, ty: &ProtoType) {
        match ty {
            ProtoType::Scalar(_) => (),
            ProtoType::Map(key, value) => {
                self.mark_field_type(key);
                self.mark_field_type(value);
            }
            ProtoType::Named(_) => {
                if self.marks.mark_type(ty.clone()) {
                    self.queue.push_back(Mark::Type(ty.clone()));
                }
            }
        }
    }

    /// Marks the option fields set by `options`, including the fields of nested message values.
    fn mark_options(&mut self, options: &Options) {
        for member in options.referenced_members() {
            if self.marks.mark_member(member.clone()) {
                self.queue.push_back(Mark::Member(member.clone()));
            }
        }
    }

    fn contains_member(&self, ty: &ProtoType, member: &str) -> bool {
        self.marks
            .contains_member(&ProtoMember::new(ty.clone(), member))
    }
}
