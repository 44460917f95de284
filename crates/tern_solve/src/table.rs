// ==============================================================================
// Type Table
// ==============================================================================
//
// The solver's window onto the surrounding type system: superclasses,
// protocol conformances, literal-protocol defaults, and member signatures.
// The front-end registers everything up front; the solver only queries.
// Member lookup is by exact nominal head — inherited members are the
// front-end's business, and keeping lookup exact is what lets the supertype
// fallback discover that a member lives on a superclass.

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tern_ty::{ProtocolId, Ty, TyRef};

#[derive(Debug, Default)]
pub struct TypeTable {
    superclasses: FxHashMap<SmolStr, TyRef>,
    conformances: FxHashMap<SmolStr, FxHashSet<ProtocolId>>,
    default_literals: FxHashMap<ProtocolId, TyRef>,
    alternative_literals: FxHashMap<ProtocolId, Vec<TyRef>>,
    value_members: FxHashMap<(SmolStr, SmolStr), TyRef>,
    type_members: FxHashMap<(SmolStr, SmolStr), TyRef>,
}

impl TypeTable {
    pub fn new() -> Self {
        TypeTable::default()
    }

    // --------------------------------------------------------------------------
    // Registration
    // --------------------------------------------------------------------------

    pub fn set_superclass(&mut self, class: impl Into<SmolStr>, superclass: TyRef) {
        self.superclasses.insert(class.into(), superclass);
    }

    pub fn add_conformance(&mut self, nominal: impl Into<SmolStr>, protocol: ProtocolId) {
        self.conformances
            .entry(nominal.into())
            .or_default()
            .insert(protocol);
    }

    pub fn set_default_literal(&mut self, protocol: ProtocolId, ty: TyRef) {
        self.default_literals.insert(protocol, ty);
    }

    pub fn add_alternative_literals(&mut self, protocol: ProtocolId, tys: Vec<TyRef>) {
        self.alternative_literals.entry(protocol).or_default().extend(tys);
    }

    pub fn add_value_member(
        &mut self,
        nominal: impl Into<SmolStr>,
        member: impl Into<SmolStr>,
        ty: TyRef,
    ) {
        self.value_members.insert((nominal.into(), member.into()), ty);
    }

    pub fn add_type_member(
        &mut self,
        nominal: impl Into<SmolStr>,
        member: impl Into<SmolStr>,
        ty: TyRef,
    ) {
        self.type_members.insert((nominal.into(), member.into()), ty);
    }

    // --------------------------------------------------------------------------
    // Queries
    // --------------------------------------------------------------------------

    /// Direct superclass of a class type, if it has one.
    pub fn superclass_of(&self, ty: &TyRef) -> Option<TyRef> {
        if !ty.may_have_superclass() {
            return None;
        }
        self.superclasses.get(ty.nominal_head()?).cloned()
    }

    /// Whether a concrete type conforms to a protocol, walking the
    /// superclass chain for inherited conformances.
    pub fn conforms(&self, ty: &TyRef, protocol: &ProtocolId) -> bool {
        let mut cur = ty.clone();
        loop {
            let Some(head) = cur.nominal_head() else {
                return false;
            };
            if self
                .conformances
                .get(head)
                .is_some_and(|set| set.contains(protocol))
            {
                return true;
            }
            match self.superclass_of(&cur) {
                Some(sup) => cur = sup,
                None => return false,
            }
        }
    }

    /// The nominal type a literal protocol defaults to, if any.
    pub fn default_literal_type(&self, protocol: &ProtocolId) -> Option<&TyRef> {
        self.default_literals.get(protocol)
    }

    /// Other types expressible by the same literal kind, tried when the
    /// default admits no solution.
    pub fn alternative_literal_types(&self, protocol: &ProtocolId) -> &[TyRef] {
        self.alternative_literals
            .get(protocol)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn value_member(&self, base: &Ty, member: &SmolStr) -> Option<&TyRef> {
        let head = base.nominal_head()?;
        self.value_members.get(&(head.clone(), member.clone()))
    }

    pub fn type_member(&self, base: &Ty, member: &SmolStr) -> Option<&TyRef> {
        let head = base.nominal_head()?;
        self.type_members.get(&(head.clone(), member.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_ty::ty;

    #[test]
    fn conformance_walks_superclasses() {
        let mut table = TypeTable::new();
        let base = Ty::class("Base");
        table.set_superclass("Derived", base.clone());
        table.add_conformance("Base", ProtocolId::new("Printable"));

        let derived = Ty::class("Derived");
        assert!(table.conforms(&derived, &ProtocolId::new("Printable")));
        assert!(!table.conforms(&derived, &ProtocolId::new("Hashable")));
        assert!(!table.conforms(&ty!(Int), &ProtocolId::new("Printable")));
    }

    #[test]
    fn superclass_requires_class_kind() {
        let mut table = TypeTable::new();
        table.set_superclass("Derived", Ty::class("Base"));
        // A struct named Derived never reaches the superclass map.
        assert_eq!(table.superclass_of(&ty!(Derived)), None);
        assert_eq!(table.superclass_of(&Ty::class("Derived")), Some(Ty::class("Base")));
    }

    #[test]
    fn member_lookup_is_exact_nominal() {
        let mut table = TypeTable::new();
        table.set_superclass("Derived", Ty::class("Base"));
        table.add_value_member("Base", "speak", ty!(String));

        assert_eq!(
            table.value_member(&Ty::class("Base"), &"speak".into()),
            Some(&ty!(String))
        );
        // No inheritance walk: the solver discovers this via supertype
        // fallback instead.
        assert_eq!(table.value_member(&Ty::class("Derived"), &"speak".into()), None);
    }
}
