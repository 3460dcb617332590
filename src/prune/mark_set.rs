use std::collections::{HashMap, HashSet};

use super::IdentifierSet;
use crate::types::{ProtoMember, ProtoType};

/// The types and members reached while pruning.
///
/// A type may be reached as a whole, in which case all of its members are retained, or only
/// through some of its members. Anything excluded by the identifier set is never marked.
///
/// If the identifier set has no includes, every identifier that is not excluded is considered
/// marked.
#[derive(Debug)]
pub(crate) struct MarkSet<'a> {
    identifier_set: &'a IdentifierSet,
    mark_all: bool,
    types: HashSet<ProtoType>,
    members: HashMap<ProtoType, HashSet<ProtoMember>>,
}

impl<'a> MarkSet<'a> {
    pub(crate) fn new(identifier_set: &'a IdentifierSet) -> Self {
        MarkSet {
            identifier_set,
            mark_all: identifier_set.includes().is_empty(),
            types: HashSet::new(),
            members: HashMap::new(),
        }
    }

    /// Returns true if marks are only made implicitly, because there are no includes.
    pub(crate) fn is_mark_all(&self) -> bool {
        self.mark_all
    }

    /// Marks `ty` as a root of the pruned schema.
    ///
    /// # Panics
    ///
    /// Panics if `ty` is excluded or is already a root.
    pub(crate) fn root_type(&mut self, ty: ProtoType) {
        assert!(
            !self.identifier_set.excludes_type(&ty),
            "cannot root excluded type {}",
            ty
        );
        let inserted = self.types.insert(ty.clone());
        assert!(inserted, "type {} is already a root", ty);
    }

    /// Marks `member` as a root of the pruned schema, without marking the rest of its type.
    ///
    /// # Panics
    ///
    /// Panics if `member` is excluded or is already a root.
    pub(crate) fn root_member(&mut self, member: ProtoMember) {
        assert!(
            !self.identifier_set.excludes_member(&member),
            "cannot root excluded member {}",
            member
        );
        let message = format!("member {} is already a root", member);
        let inserted = self
            .members
            .entry(member.ty().clone())
            .or_default()
            .insert(member);
        assert!(inserted, "{}", message);
    }

    /// Marks all of `ty`. Returns true if it was not already marked as a whole.
    pub(crate) fn mark_type(&mut self, ty: ProtoType) -> bool {
        if self.mark_all || self.identifier_set.excludes_type(&ty) {
            return false;
        }
        self.types.insert(ty)
    }

    /// Marks a single member. Returns true if neither it nor its whole type was already marked.
    pub(crate) fn mark_member(&mut self, member: ProtoMember) -> bool {
        if self.mark_all
            || self.types.contains(member.ty())
            || self.identifier_set.excludes_member(&member)
        {
            return false;
        }
        self.members
            .entry(member.ty().clone())
            .or_default()
            .insert(member)
    }

    /// Returns true if `ty` is retained, either as a whole or through some of its members.
    pub(crate) fn contains_type(&self, ty: &ProtoType) -> bool {
        match ty {
            ProtoType::Scalar(_) => true,
            ProtoType::Map(key, value) => self.contains_type(key) && self.contains_type(value),
            ProtoType::Named(_) => {
                if self.identifier_set.excludes_type(ty) {
                    false
                } else {
                    self.mark_all || self.types.contains(ty) || self.members.contains_key(ty)
                }
            }
        }
    }

    /// Returns true if `ty` was reached as a whole, rather than only through specific members.
    pub(crate) fn contains_all_members(&self, ty: &ProtoType) -> bool {
        if self.identifier_set.excludes_type(ty) {
            false
        } else {
            self.mark_all || self.types.contains(ty)
        }
    }

    pub(crate) fn contains_member(&self, member: &ProtoMember) -> bool {
        if self.identifier_set.excludes_member(member) {
            return false;
        }
        self.mark_all
            || self.types.contains(member.ty())
            || self
                .members
                .get(member.ty())
                .map_or(false, |members| members.contains(member))
    }

    pub(crate) fn type_count(&self) -> usize {
        self.types.len()
    }

    pub(crate) fn member_count(&self) -> usize {
        self.members.values().map(HashSet::len).sum()
    }
}
