// ==============================================================================
// Substitution Store
// ==============================================================================
//
// Type variables are slots in a vec: a union-find parent link plus an
// optional fixed type. Every mutation appends the variable's prior state to
// the saved-bindings journal, and backtracking replays a journal suffix in
// reverse. There is deliberately no path compression: `representative` must
// stay read-only so journal replay restores the exact prior forest.

use tern_ty::{Ty, TyRef, TyVarId};

#[derive(Debug, Clone)]
struct TypeVarInfo {
    /// Union-find parent; a root points at itself.
    parent: TyVarId,
    /// The concrete type this equivalence class is bound to, if any.
    /// Never references the class itself (the simplifier occurs-checks
    /// before assigning).
    fixed: Option<TyRef>,
    can_bind_to_lvalue: bool,
}

/// One journal entry: a variable and its complete prior state.
#[derive(Debug, Clone)]
pub(crate) struct SavedBinding {
    var: TyVarId,
    parent: TyVarId,
    fixed: Option<TyRef>,
}

#[derive(Debug, Default)]
pub(crate) struct TypeVariableStorage {
    vars: Vec<TypeVarInfo>,
    saved: Vec<SavedBinding>,
}

impl TypeVariableStorage {
    pub fn new() -> Self {
        TypeVariableStorage::default()
    }

    pub fn new_var(&mut self, can_bind_to_lvalue: bool) -> TyVarId {
        let id = TyVarId(self.vars.len() as u32);
        self.vars.push(TypeVarInfo {
            parent: id,
            fixed: None,
            can_bind_to_lvalue,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn can_bind_to_lvalue(&self, v: TyVarId) -> bool {
        self.vars[v.index()].can_bind_to_lvalue
    }

    /// Union-find root of `v`'s equivalence class.
    pub fn representative(&self, v: TyVarId) -> TyVarId {
        let mut cur = v;
        loop {
            let parent = self.vars[cur.index()].parent;
            if parent == cur {
                return cur;
            }
            cur = parent;
        }
    }

    /// The fixed type of `v`'s equivalence class, if bound.
    pub fn fixed(&self, v: TyVarId) -> Option<&TyRef> {
        let rep = self.representative(v);
        self.vars[rep.index()].fixed.as_ref()
    }

    fn record(&mut self, v: TyVarId) {
        let info = &self.vars[v.index()];
        self.saved.push(SavedBinding {
            var: v,
            parent: info.parent,
            fixed: info.fixed.clone(),
        });
    }

    /// Fix the representative of `v` to `ty`. The caller has already
    /// occurs-checked `ty` against the class.
    pub fn assign_fixed(&mut self, v: TyVarId, ty: TyRef) {
        let rep = self.representative(v);
        debug_assert!(
            self.vars[rep.index()].fixed.is_none(),
            "rebinding an already-fixed type variable {rep:?}"
        );
        self.record(rep);
        self.vars[rep.index()].fixed = Some(ty);
    }

    /// Merge the classes of `a` and `b`, keeping `a`'s representative.
    /// Returns `(kept, gone)` roots, or `None` if they already coincide.
    pub fn merge_classes(&mut self, a: TyVarId, b: TyVarId) -> Option<(TyVarId, TyVarId)> {
        let kept = self.representative(a);
        let gone = self.representative(b);
        if kept == gone {
            return None;
        }
        debug_assert!(
            self.vars[gone.index()].fixed.is_none(),
            "merging a fixed type variable {gone:?}"
        );
        self.record(gone);
        self.vars[gone.index()].parent = kept;
        Some((kept, gone))
    }

    pub fn num_saved(&self) -> usize {
        self.saved.len()
    }

    /// Reverse-apply every journal entry past `mark`, restoring the store
    /// to its state when the mark was taken.
    pub fn restore(&mut self, mark: usize) {
        debug_assert!(mark <= self.saved.len());
        while self.saved.len() > mark {
            let entry = self.saved.pop().unwrap();
            let info = &mut self.vars[entry.var.index()];
            info.parent = entry.parent;
            info.fixed = entry.fixed;
        }
    }

    /// Canonicalizing substitution: replace every bound variable by its
    /// fixed type (recursively) and every unbound one by its
    /// representative. The result is a fixed point of further
    /// substitution.
    pub fn simplify_ty(&self, ty: &TyRef) -> TyRef {
        if !ty.has_type_variable() {
            return ty.clone();
        }
        match &**ty {
            Ty::Var(v) => {
                let rep = self.representative(*v);
                match &self.vars[rep.index()].fixed {
                    Some(fixed) => self.simplify_ty(fixed),
                    None if rep == *v => ty.clone(),
                    None => Ty::var(rep),
                }
            }
            Ty::Nominal(n) => {
                let mut n = n.clone();
                n.args = n.args.iter().map(|a| self.simplify_ty(a)).collect();
                Ty::Nominal(n).into()
            }
            Ty::Tuple(t) => {
                let mut t = t.clone();
                for elem in &mut t.elems {
                    elem.ty = self.simplify_ty(&elem.ty);
                }
                Ty::Tuple(t).into()
            }
            Ty::Fn(f) => {
                let mut f = f.clone();
                f.param = self.simplify_ty(&f.param);
                f.result = self.simplify_ty(&f.result);
                Ty::Fn(f).into()
            }
            Ty::LValue(lv) => {
                let mut lv = lv.clone();
                lv.object = self.simplify_ty(&lv.object);
                Ty::LValue(lv).into()
            }
            Ty::GenericParam(_) => ty.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_ty::ty;

    #[test]
    fn fixed_types_survive_simplify() {
        let mut storage = TypeVariableStorage::new();
        let v0 = storage.new_var(false);
        storage.assign_fixed(v0, ty!(Int));
        assert_eq!(storage.simplify_ty(&Ty::var(v0)), ty!(Int));
        // Simplification is a fixed point.
        let once = storage.simplify_ty(&Ty::var(v0));
        assert_eq!(storage.simplify_ty(&once), once);
    }

    #[test]
    fn merge_then_fix_binds_both() {
        let mut storage = TypeVariableStorage::new();
        let v0 = storage.new_var(false);
        let v1 = storage.new_var(false);
        storage.merge_classes(v0, v1).unwrap();
        assert_eq!(storage.representative(v1), v0);
        storage.assign_fixed(v1, ty!(Bool));
        assert_eq!(storage.simplify_ty(&Ty::var(v0)), ty!(Bool));
        assert_eq!(storage.simplify_ty(&Ty::var(v1)), ty!(Bool));
    }

    #[test]
    fn restore_rewinds_exactly() {
        let mut storage = TypeVariableStorage::new();
        let v0 = storage.new_var(false);
        let v1 = storage.new_var(false);
        let mark = storage.num_saved();

        storage.merge_classes(v0, v1).unwrap();
        storage.assign_fixed(v0, ty!(Int));
        storage.restore(mark);

        assert_eq!(storage.representative(v1), v1);
        assert_eq!(storage.fixed(v0), None);
        assert_eq!(storage.fixed(v1), None);
    }

    #[test]
    fn simplify_rebuilds_composites() {
        let mut storage = TypeVariableStorage::new();
        let v0 = storage.new_var(false);
        storage.assign_fixed(v0, ty!(Int));
        let f = Ty::func(Ty::var(v0), ty!(Bool));
        assert_eq!(storage.simplify_ty(&f), ty!(Int -> Bool));
    }
}
