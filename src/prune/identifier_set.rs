use std::{cell::RefCell, collections::BTreeSet};

use miette::Diagnostic;
use thiserror::Error;

use crate::types::{ProtoMember, ProtoType};

/// Include and exclude rules selecting the types and members kept by
/// [`Schema::prune()`](crate::Schema::prune).
///
/// Each rule is one of:
///
/// * a fully-qualified type or service name, such as `foo.Bar`,
/// * a member name, such as `foo.Bar#baz`, naming a field, enum constant or rpc,
/// * a wildcard, such as `foo.*`, matching every type in the package `foo` and its subpackages,
///   or `*`, matching everything.
///
/// A rule also applies to everything it encloses: excluding `foo.Bar` excludes every member of
/// `foo.Bar` and every type nested in it. Including `foo.Bar` does not include its nested types.
/// Excludes always take precedence over includes.
///
/// # Examples
///
/// ```
/// # use protoschema::{IdentifierSet, ProtoType, ProtoMember};
/// let set = IdentifierSet::builder()
///     .include("foo.*")
///     .exclude("foo.Bar#secret")
///     .build()
///     .unwrap();
///
/// assert!(set.includes_type(&ProtoType::get("foo.Bar")));
/// assert!(set.includes_type(&ProtoType::get("foo.baz.Qux")));
/// assert!(!set.includes_type(&ProtoType::get("other.Bar")));
/// assert!(set.includes_member(&ProtoMember::get("foo.Bar#name").unwrap()));
/// assert!(set.excludes_member(&ProtoMember::get("foo.Bar#secret").unwrap()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct IdentifierSet {
    includes: Vec<String>,
    excludes: Vec<String>,
    used_includes: RefCell<BTreeSet<String>>,
    used_excludes: RefCell<BTreeSet<String>>,
}

/// Collects the rules for an [`IdentifierSet`].
#[derive(Debug, Clone, Default)]
pub struct Builder {
    includes: Vec<String>,
    excludes: Vec<String>,
}

/// An identifier was both included and excluded.
#[derive(Debug, Clone, PartialEq, Eq, Diagnostic, Error)]
#[error("conflicting include/exclude rules: {}", .identifiers.join(", "))]
pub struct IdentifierSetError {
    identifiers: Vec<String>,
}

/// The most specific include and exclude rules matching an identifier.
struct RuleMatch {
    include: Option<String>,
    exclude: Option<String>,
}

impl IdentifierSet {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// Returns true if `identifier` is a well-formed include or exclude rule.
    pub fn is_valid_rule(identifier: &str) -> bool {
        is_valid_rule(identifier)
    }

    /// Returns true if this set has no rules, and so prunes nothing.
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    /// Returns true if `ty` is matched by an include rule and not by any exclude rule. If there
    /// are no include rules, every type that is not excluded is included.
    pub fn includes_type(&self, ty: &ProtoType) -> bool {
        match ty.as_named() {
            Some(name) => self.includes_identifier(name),
            None => true,
        }
    }

    pub fn includes_member(&self, member: &ProtoMember) -> bool {
        self.includes_identifier(&member.to_string())
    }

    /// Returns true if `ty` is matched by an exclude rule. Scalar and map types are never
    /// excluded.
    pub fn excludes_type(&self, ty: &ProtoType) -> bool {
        match ty.as_named() {
            Some(name) => self.excludes_identifier(name),
            None => false,
        }
    }

    pub fn excludes_member(&self, member: &ProtoMember) -> bool {
        self.excludes_identifier(&member.to_string())
    }

    /// Include rules that have not matched anything since this set was built.
    pub fn unused_includes(&self) -> Vec<String> {
        let used = self.used_includes.borrow();
        self.includes
            .iter()
            .filter(|include| !used.contains(*include))
            .cloned()
            .collect()
    }

    /// Exclude rules that have not matched anything since this set was built.
    pub fn unused_excludes(&self) -> Vec<String> {
        let used = self.used_excludes.borrow();
        self.excludes
            .iter()
            .filter(|exclude| !used.contains(*exclude))
            .cloned()
            .collect()
    }

    fn includes_identifier(&self, identifier: &str) -> bool {
        let rule = self.find_rules(identifier);
        if let Some(exclude) = rule.exclude {
            self.used_excludes.borrow_mut().insert(exclude);
            false
        } else if let Some(include) = rule.include {
            self.used_includes.borrow_mut().insert(include);
            true
        } else {
            self.includes.is_empty()
        }
    }

    fn excludes_identifier(&self, identifier: &str) -> bool {
        match self.find_rules(identifier).exclude {
            Some(exclude) => {
                self.used_excludes.borrow_mut().insert(exclude);
                true
            }
            None => false,
        }
    }

    fn find_rules(&self, identifier: &str) -> RuleMatch {
        let mut result = RuleMatch {
            include: None,
            exclude: None,
        };

        let mut rule = Some(identifier.to_owned());
        while let Some(current) = rule {
            if result.include.is_none() && self.includes.contains(&current) {
                result.include = Some(current.clone());
            }
            if result.exclude.is_none() {
                if self.excludes.contains(&current) {
                    result.exclude = Some(current.clone());
                } else if let Some(enclosing_type) = current.strip_suffix(".*") {
                    // An excluded type also excludes the types nested within it.
                    if self.excludes.iter().any(|exclude| exclude == enclosing_type) {
                        result.exclude = Some(enclosing_type.to_owned());
                    }
                }
            }
            rule = enclosing(&current);
        }
        result
    }
}

impl Builder {
    /// Adds an include rule.
    ///
    /// # Panics
    ///
    /// Panics if `identifier` is not a valid rule.
    pub fn include(&mut self, identifier: impl Into<String>) -> &mut Self {
        add_rule(&mut self.includes, identifier.into());
        self
    }

    /// Adds an exclude rule.
    ///
    /// # Panics
    ///
    /// Panics if `identifier` is not a valid rule.
    pub fn exclude(&mut self, identifier: impl Into<String>) -> &mut Self {
        add_rule(&mut self.excludes, identifier.into());
        self
    }

    pub fn include_all<I>(&mut self, identifiers: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for identifier in identifiers {
            self.include(identifier);
        }
        self
    }

    pub fn exclude_all<I>(&mut self, identifiers: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for identifier in identifiers {
            self.exclude(identifier);
        }
        self
    }

    /// Builds the set, failing if any identifier is both included and excluded.
    pub fn build(&self) -> Result<IdentifierSet, IdentifierSetError> {
        let conflicts: Vec<String> = self
            .includes
            .iter()
            .filter(|include| self.excludes.contains(include))
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            return Err(IdentifierSetError {
                identifiers: conflicts,
            });
        }

        Ok(IdentifierSet {
            includes: self.includes.clone(),
            excludes: self.excludes.clone(),
            used_includes: RefCell::default(),
            used_excludes: RefCell::default(),
        })
    }
}

impl IdentifierSetError {
    /// The identifiers that were both included and excluded.
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }
}

fn add_rule(rules: &mut Vec<String>, identifier: String) {
    assert!(
        is_valid_rule(&identifier),
        "invalid identifier '{}'",
        identifier
    );
    if !rules.contains(&identifier) {
        rules.push(identifier);
    }
}

fn is_valid_rule(identifier: &str) -> bool {
    if identifier == "*" {
        return true;
    }

    match identifier.split_once('#') {
        Some((ty, member)) => is_dotted_name(ty) && is_dotted_name(member),
        None => is_dotted_name(identifier.strip_suffix(".*").unwrap_or(identifier)),
    }
}

fn is_dotted_name(name: &str) -> bool {
    name.split('.').all(|part| {
        !part.is_empty()
            && part
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    })
}

/// The next broader rule that applies to `identifier`: `foo.Bar#baz` is enclosed by `foo.Bar`,
/// which is enclosed by `foo.*`, which is enclosed by `*`.
fn enclosing(identifier: &str) -> Option<String> {
    if identifier == "*" {
        return None;
    }
    if let Some((ty, _)) = identifier.split_once('#') {
        return Some(ty.to_owned());
    }

    let name = identifier.strip_suffix(".*").unwrap_or(identifier);
    match name.rfind('.') {
        Some(dot) => Some(format!("{}.*", &name[..dot])),
        None => Some("*".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclosing_chain() {
        let mut chain = vec![];
        let mut rule = Some("a.b.C#d".to_owned());
        while let Some(current) = rule {
            rule = enclosing(&current);
            chain.push(current);
        }
        assert_eq!(chain, ["a.b.C#d", "a.b.C", "a.b.*", "a.*", "*"]);
    }

    #[test]
    fn rule_syntax() {
        assert!(is_valid_rule("*"));
        assert!(is_valid_rule("Foo"));
        assert!(is_valid_rule("foo.Bar#baz"));
        assert!(is_valid_rule("foo.Bar#pkg.ext"));
        assert!(is_valid_rule("foo.*"));
        assert!(!is_valid_rule(""));
        assert!(!is_valid_rule(".foo.Bar"));
        assert!(!is_valid_rule("foo.*#bar"));
        assert!(!is_valid_rule("foo bar"));
    }

    #[test]
    #[should_panic(expected = "invalid identifier")]
    fn invalid_rule() {
        IdentifierSet::builder().include("foo..Bar");
    }

    #[test]
    fn conflicting_rules() {
        let err = IdentifierSet::builder()
            .include("a.A")
            .include("b.*")
            .exclude("b.*")
            .exclude("a.A")
            .build()
            .unwrap_err();

        assert_eq!(err.identifiers(), ["a.A", "b.*"]);
        assert_eq!(
            err.to_string(),
            "conflicting include/exclude rules: a.A, b.*"
        );
    }

    #[test]
    fn member_exclude_under_type_include() {
        let set = IdentifierSet::builder()
            .include("a.A")
            .exclude("a.A#b")
            .build()
            .unwrap();

        assert!(set.includes_type(&ProtoType::get("a.A")));
        assert!(set.includes_member(&ProtoMember::get("a.A#c").unwrap()));
        assert!(!set.includes_member(&ProtoMember::get("a.A#b").unwrap()));
        assert!(!set.excludes_type(&ProtoType::get("a.A")));
    }

    #[test]
    fn exclude_wins_over_narrower_include() {
        let set = IdentifierSet::builder()
            .include("a.A")
            .exclude("a.*")
            .build()
            .unwrap();

        assert!(!set.includes_type(&ProtoType::get("a.A")));
        assert!(set.excludes_type(&ProtoType::get("a.A")));
        assert!(set.excludes_member(&ProtoMember::get("a.A#b").unwrap()));
    }

    #[test]
    fn exclude_nested_types() {
        let set = IdentifierSet::builder()
            .include("a.Outer")
            .exclude("a.Other")
            .build()
            .unwrap();

        assert!(!set.includes_type(&ProtoType::get("a.Outer.Inner")));
        assert!(set.excludes_type(&ProtoType::get("a.Other.Inner")));
        assert!(set.excludes_type(&ProtoType::get("a.Other.Inner.Deeper")));
        assert!(set.excludes_member(&ProtoMember::get("a.Other.Inner#x").unwrap()));
        assert!(!set.excludes_type(&ProtoType::get("a.Outer.Inner")));
        assert!(!set.excludes_type(&ProtoType::get("a.OtherType")));
        assert!(set.unused_excludes().is_empty());
    }

    #[test]
    fn no_includes() {
        let set = IdentifierSet::builder().exclude("a.B").build().unwrap();

        assert!(set.includes_type(&ProtoType::get("a.A")));
        assert!(!set.includes_type(&ProtoType::get("a.B")));
        assert!(set.includes_type(&ProtoType::get("string")));
        assert!(!set.excludes_type(&ProtoType::get("string")));
    }

    #[test]
    fn unused_rules() {
        let set = IdentifierSet::builder()
            .include("a.A")
            .include("a.Unused")
            .exclude("a.A#b")
            .exclude("c.*")
            .build()
            .unwrap();

        assert!(set.includes_type(&ProtoType::get("a.A")));
        assert!(set.excludes_member(&ProtoMember::get("a.A#b").unwrap()));

        assert_eq!(set.unused_includes(), ["a.Unused"]);
        assert_eq!(set.unused_excludes(), ["c.*"]);
    }
}
