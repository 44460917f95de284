// ==============================================================================
// Constraint Data Model and Storage
// ==============================================================================
//
// Constraints live in an arena and are identified by index; insertion order is
// list order. Membership moves between the active list, the retired list, and
// detached storage (disjunction alternatives) purely by relinking, which is
// what makes backtracking cheap: a scope records list cursors and splices
// nodes back on exit instead of copying anything.

use derive_more::Debug;
use smol_str::SmolStr;
use tern_ty::{ProtocolId, TyRef};

/// Identity of a constraint: an index into the arena. Stable for the life
/// of the constraint system; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[debug("c{_0}")]
pub struct ConstraintId(pub u32);

impl ConstraintId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A conversion restriction: the specific coercion path a relational
/// constraint committed to. Recorded per `(type, type)` pair so a solution
/// can replay its conversions without re-searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionRestriction {
    DeepEquality,
    Superclass,
    LValueToRValue,
    TupleToTuple,
    ScalarToTuple,
    ValueToOptional,
    OptionalToOptional,
}

/// One element of a locator path. The last element occasionally drives
/// search heuristics (interpolation arguments short-circuit disjunction
/// enumeration once an alternative succeeds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathElem {
    ApplyArgument,
    ApplyFunction,
    GenericArgument(u32),
    Member,
    InterpolationArgument,
}

/// Opaque diagnostic anchor: the expression that produced a constraint or
/// overload set, plus a path refining the position within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[debug("@{anchor}{path:?}")]
pub struct Locator {
    pub anchor: u32,
    pub path: Vec<PathElem>,
}

impl Locator {
    pub fn at(anchor: u32) -> Self {
        Locator {
            anchor,
            path: Vec::new(),
        }
    }

    pub fn with(mut self, elem: PathElem) -> Self {
        self.path.push(elem);
        self
    }

    pub(crate) fn last_path_element(&self) -> Option<&PathElem> {
        self.path.last()
    }
}

/// A candidate declaration an overload set can resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadChoice {
    pub name: SmolStr,
    pub ty: TyRef,
}

impl OverloadChoice {
    pub fn new(name: impl Into<SmolStr>, ty: TyRef) -> Self {
        OverloadChoice {
            name: name.into(),
            ty,
        }
    }
}

/// The constraint language. Relational kinds are ordered by strength:
/// `Bind`/`Equal` unify, the subtype kinds admit representation-preserving
/// widening, `Conversion` admits every coercion the simplifier knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintKind {
    Bind(TyRef, TyRef),
    Equal(TyRef, TyRef),
    TrivialSubtype(TyRef, TyRef),
    Subtype(TyRef, TyRef),
    Conversion(TyRef, TyRef),
    /// First type is the function type built from the call site
    /// (arguments → result variable); second must resolve to a callee
    /// function type.
    ApplicableFn(TyRef, TyRef),

    /// The type must be a class.
    Class(TyRef),
    /// The type must not be an l-value.
    Materializable(TyRef),

    ValueMember {
        base: TyRef,
        member: SmolStr,
        member_ty: TyRef,
    },
    TypeMember {
        base: TyRef,
        member: SmolStr,
        member_ty: TyRef,
    },

    ConformsTo(TyRef, ProtocolId),
    SelfObjectOfProtocol(TyRef, ProtocolId),

    /// Commit to one candidate of an overload set: binds the type to the
    /// (opened) choice type and records the selection.
    BindOverload {
        ty: TyRef,
        choice: OverloadChoice,
    },

    /// Only ever nested inside a disjunction; top-level conjunctions are
    /// broken apart on construction.
    Conjunction(Vec<ConstraintId>),
    Disjunction(Vec<ConstraintId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Relational,
    TypeProperty,
    Member,
    Conjunction,
    Disjunction,
}

impl ConstraintKind {
    pub fn classification(&self) -> Classification {
        match self {
            ConstraintKind::Bind(..)
            | ConstraintKind::Equal(..)
            | ConstraintKind::TrivialSubtype(..)
            | ConstraintKind::Subtype(..)
            | ConstraintKind::Conversion(..)
            | ConstraintKind::ApplicableFn(..)
            | ConstraintKind::ConformsTo(..)
            | ConstraintKind::SelfObjectOfProtocol(..)
            | ConstraintKind::BindOverload { .. } => Classification::Relational,
            ConstraintKind::Class(..) | ConstraintKind::Materializable(..) => {
                Classification::TypeProperty
            }
            ConstraintKind::ValueMember { .. } | ConstraintKind::TypeMember { .. } => {
                Classification::Member
            }
            ConstraintKind::Conjunction(..) => Classification::Conjunction,
            ConstraintKind::Disjunction(..) => Classification::Disjunction,
        }
    }

    pub fn first_type(&self) -> Option<&TyRef> {
        match self {
            ConstraintKind::Bind(a, _)
            | ConstraintKind::Equal(a, _)
            | ConstraintKind::TrivialSubtype(a, _)
            | ConstraintKind::Subtype(a, _)
            | ConstraintKind::Conversion(a, _)
            | ConstraintKind::ApplicableFn(a, _)
            | ConstraintKind::Class(a)
            | ConstraintKind::Materializable(a)
            | ConstraintKind::ConformsTo(a, _)
            | ConstraintKind::SelfObjectOfProtocol(a, _) => Some(a),
            ConstraintKind::ValueMember { base, .. } | ConstraintKind::TypeMember { base, .. } => {
                Some(base)
            }
            ConstraintKind::BindOverload { ty, .. } => Some(ty),
            ConstraintKind::Conjunction(..) | ConstraintKind::Disjunction(..) => None,
        }
    }

    pub fn second_type(&self) -> Option<&TyRef> {
        match self {
            ConstraintKind::Bind(_, b)
            | ConstraintKind::Equal(_, b)
            | ConstraintKind::TrivialSubtype(_, b)
            | ConstraintKind::Subtype(_, b)
            | ConstraintKind::Conversion(_, b)
            | ConstraintKind::ApplicableFn(_, b) => Some(b),
            ConstraintKind::ValueMember { member_ty, .. }
            | ConstraintKind::TypeMember { member_ty, .. } => Some(member_ty),
            _ => None,
        }
    }

    pub fn protocol(&self) -> Option<&ProtocolId> {
        match self {
            ConstraintKind::ConformsTo(_, p) | ConstraintKind::SelfObjectOfProtocol(_, p) => {
                Some(p)
            }
            _ => None,
        }
    }
}

/// Which list a constraint node currently sits in. Maintained by the
/// system-level attach/retire/erase helpers; the lists themselves are
/// place-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Place {
    /// Allocated but in no list (disjunction alternatives, erased nodes).
    Detached,
    /// Circulating: in the active list or a component bucket.
    Active,
    /// Solved and parked on the retired list until scope exit.
    Retired,
}

#[derive(Debug)]
pub(crate) struct ConstraintNode {
    pub kind: ConstraintKind,
    pub restriction: Option<ConversionRestriction>,
    pub locator: Locator,
    /// Pending (re-)simplification: set while the constraint sits in the
    /// worklist, cleared once processed.
    pub active: bool,
    pub place: Place,
    pub prev: Option<ConstraintId>,
    pub next: Option<ConstraintId>,
}

#[derive(Debug, Default)]
pub(crate) struct ConstraintArena {
    nodes: Vec<ConstraintNode>,
}

impl ConstraintArena {
    pub fn alloc(
        &mut self,
        kind: ConstraintKind,
        restriction: Option<ConversionRestriction>,
        locator: Locator,
    ) -> ConstraintId {
        let id = ConstraintId(self.nodes.len() as u32);
        self.nodes.push(ConstraintNode {
            kind,
            restriction,
            locator,
            active: false,
            place: Place::Detached,
            prev: None,
            next: None,
        });
        id
    }

    #[inline]
    pub fn node(&self, id: ConstraintId) -> &ConstraintNode {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: ConstraintId) -> &mut ConstraintNode {
        &mut self.nodes[id.index()]
    }

    /// Every type variable referenced by a constraint's operands,
    /// recursing through nested disjunction/conjunction members.
    pub fn referenced_vars(&self, id: ConstraintId, out: &mut Vec<tern_ty::TyVarId>) {
        let node = self.node(id);
        match &node.kind {
            ConstraintKind::Conjunction(members) | ConstraintKind::Disjunction(members) => {
                for &member in members {
                    self.referenced_vars(member, out);
                }
            }
            kind => {
                if let Some(first) = kind.first_type() {
                    first.type_variables(out);
                }
                if let Some(second) = kind.second_type() {
                    second.type_variables(out);
                }
            }
        }
    }
}

/// A doubly-linked list threaded through arena nodes. O(1) link/unlink is
/// what the scope machinery leans on: retiring and restoring a constraint
/// never copies it.
#[derive(Debug, Default)]
pub(crate) struct ConstraintList {
    head: Option<ConstraintId>,
    tail: Option<ConstraintId>,
    len: usize,
}

impl ConstraintList {
    pub fn new() -> Self {
        ConstraintList::default()
    }

    pub fn head(&self) -> Option<ConstraintId> {
        self.head
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push_back(&mut self, arena: &mut ConstraintArena, id: ConstraintId) {
        let node = arena.node_mut(id);
        debug_assert!(node.prev.is_none() && node.next.is_none());
        node.prev = self.tail;
        node.next = None;
        match self.tail {
            Some(tail) => arena.node_mut(tail).next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
    }

    pub fn push_front(&mut self, arena: &mut ConstraintArena, id: ConstraintId) {
        let node = arena.node_mut(id);
        debug_assert!(node.prev.is_none() && node.next.is_none());
        node.next = self.head;
        node.prev = None;
        match self.head {
            Some(head) => arena.node_mut(head).prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        self.len += 1;
    }

    pub fn unlink(&mut self, arena: &mut ConstraintArena, id: ConstraintId) {
        let (prev, next) = {
            let node = arena.node(id);
            (node.prev, node.next)
        };
        match prev {
            Some(p) => arena.node_mut(p).next = next,
            None => {
                debug_assert_eq!(self.head, Some(id));
                self.head = next;
            }
        }
        match next {
            Some(n) => arena.node_mut(n).prev = prev,
            None => {
                debug_assert_eq!(self.tail, Some(id));
                self.tail = prev;
            }
        }
        let node = arena.node_mut(id);
        node.prev = None;
        node.next = None;
        self.len -= 1;
    }

    /// Insert `id` immediately before `anchor`; append when `anchor` is
    /// `None`. Used to put a detached disjunction back in its old slot.
    pub fn insert_before(
        &mut self,
        arena: &mut ConstraintArena,
        anchor: Option<ConstraintId>,
        id: ConstraintId,
    ) {
        let Some(anchor) = anchor else {
            self.push_back(arena, id);
            return;
        };
        let prev = arena.node(anchor).prev;
        {
            let node = arena.node_mut(id);
            debug_assert!(node.prev.is_none() && node.next.is_none());
            node.prev = prev;
            node.next = Some(anchor);
        }
        arena.node_mut(anchor).prev = Some(id);
        match prev {
            Some(p) => arena.node_mut(p).next = Some(id),
            None => self.head = Some(id),
        }
        self.len += 1;
    }

    pub fn pop_front(&mut self, arena: &mut ConstraintArena) -> Option<ConstraintId> {
        let id = self.head?;
        self.unlink(arena, id);
        Some(id)
    }

    pub fn pop_back(&mut self, arena: &mut ConstraintArena) -> Option<ConstraintId> {
        let id = self.tail?;
        self.unlink(arena, id);
        Some(id)
    }

    /// Snapshot the ids in list order. Iteration happens over the snapshot
    /// so callers are free to relink while walking.
    pub fn ids(&self, arena: &ConstraintArena) -> Vec<ConstraintId> {
        let mut out = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(id) = cursor {
            out.push(id);
            cursor = arena.node(id).next;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena_with(n: usize) -> (ConstraintArena, Vec<ConstraintId>) {
        let mut arena = ConstraintArena::default();
        let ids = (0..n)
            .map(|i| {
                arena.alloc(
                    ConstraintKind::Class(tern_ty::ty!(Int)),
                    None,
                    Locator::at(i as u32),
                )
            })
            .collect();
        (arena, ids)
    }

    #[test]
    fn push_unlink_roundtrip() {
        let (mut arena, ids) = arena_with(3);
        let mut list = ConstraintList::new();
        for &id in &ids {
            list.push_back(&mut arena, id);
        }
        assert_eq!(list.ids(&arena), ids);

        list.unlink(&mut arena, ids[1]);
        assert_eq!(list.ids(&arena), vec![ids[0], ids[2]]);

        list.insert_before(&mut arena, Some(ids[2]), ids[1]);
        assert_eq!(list.ids(&arena), ids);
    }

    #[test]
    fn insert_before_none_appends() {
        let (mut arena, ids) = arena_with(2);
        let mut list = ConstraintList::new();
        list.push_back(&mut arena, ids[0]);
        list.insert_before(&mut arena, None, ids[1]);
        assert_eq!(list.ids(&arena), ids);
    }

    #[test]
    fn pop_both_ends() {
        let (mut arena, ids) = arena_with(3);
        let mut list = ConstraintList::new();
        for &id in &ids {
            list.push_back(&mut arena, id);
        }
        assert_eq!(list.pop_front(&mut arena), Some(ids[0]));
        assert_eq!(list.pop_back(&mut arena), Some(ids[2]));
        assert_eq!(list.pop_front(&mut arena), Some(ids[1]));
        assert!(list.is_empty());
        assert_eq!(list.pop_front(&mut arena), None);
    }
}
