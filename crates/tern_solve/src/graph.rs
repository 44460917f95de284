// ==============================================================================
// Constraint Graph
// ==============================================================================
//
// Bipartite adjacency between type-variable equivalence classes and the
// constraints that mention them. Edges are journaled rather than
// snapshotted: each mutation appends an undo record, a scope remembers the
// journal length on entry, and rewinding replays the suffix in reverse.
//
// Edges live under the representative current at insertion time. Merging
// two classes copies the vanishing root's edges onto the kept root (also
// journaled), so `constraints_on(rep)` always sees everything that mentions
// any member of the class. Duplicate entries are harmless — activation is
// idempotent.

use rustc_hash::FxHashSet;
use tern_ty::TyVarId;

use crate::constraint::{ConstraintArena, ConstraintId, ConstraintList};
use crate::storage::TypeVariableStorage;

#[derive(Debug)]
enum GraphChange {
    /// An edge was appended to `adjacency[var]`; undo pops it.
    AddEdge { var: TyVarId },
    /// An edge was removed from `adjacency[var]` at `index`; undo
    /// re-inserts it there.
    RemoveEdge {
        var: TyVarId,
        index: usize,
        constraint: ConstraintId,
    },
}

#[derive(Debug, Default)]
pub(crate) struct ConstraintGraph {
    adjacency: Vec<Vec<ConstraintId>>,
    journal: Vec<GraphChange>,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        ConstraintGraph::default()
    }

    fn ensure(&mut self, v: TyVarId) {
        if self.adjacency.len() <= v.index() {
            self.adjacency.resize_with(v.index() + 1, Vec::new);
        }
    }

    fn edge_reps(
        arena: &ConstraintArena,
        storage: &TypeVariableStorage,
        id: ConstraintId,
    ) -> Vec<TyVarId> {
        let mut vars = Vec::new();
        arena.referenced_vars(id, &mut vars);
        let mut seen = FxHashSet::default();
        vars.iter()
            .map(|&v| storage.representative(v))
            .filter(|&rep| seen.insert(rep))
            .collect()
    }

    pub fn add_constraint(
        &mut self,
        arena: &ConstraintArena,
        storage: &TypeVariableStorage,
        id: ConstraintId,
    ) {
        for rep in Self::edge_reps(arena, storage, id) {
            self.ensure(rep);
            self.adjacency[rep.index()].push(id);
            self.journal.push(GraphChange::AddEdge { var: rep });
        }
    }

    pub fn remove_constraint(
        &mut self,
        arena: &ConstraintArena,
        storage: &TypeVariableStorage,
        id: ConstraintId,
    ) {
        for rep in Self::edge_reps(arena, storage, id) {
            self.ensure(rep);
            let edges = &mut self.adjacency[rep.index()];
            let Some(index) = edges.iter().rposition(|&c| c == id) else {
                debug_assert!(false, "removing an edge that was never added: {id:?}");
                continue;
            };
            edges.remove(index);
            self.journal.push(GraphChange::RemoveEdge {
                var: rep,
                index,
                constraint: id,
            });
        }
    }

    /// Copy the vanishing root's edges onto the kept root after a class
    /// merge. The originals stay where they are: `gone` is no longer a
    /// representative, so nothing consults them until the merge unwinds.
    pub fn merge_class(&mut self, kept: TyVarId, gone: TyVarId) {
        self.ensure(kept);
        self.ensure(gone);
        let copied: Vec<ConstraintId> = self.adjacency[gone.index()].clone();
        for id in copied {
            self.adjacency[kept.index()].push(id);
            self.journal.push(GraphChange::AddEdge { var: kept });
        }
    }

    pub fn constraints_on(&self, rep: TyVarId) -> &[ConstraintId] {
        self.adjacency
            .get(rep.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn mark(&self) -> usize {
        self.journal.len()
    }

    /// Full adjacency snapshot, for round-trip assertions.
    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<Vec<ConstraintId>> {
        self.adjacency.clone()
    }

    /// Undo every change past `mark`, newest first.
    pub fn rewind(&mut self, mark: usize) {
        debug_assert!(mark <= self.journal.len());
        while self.journal.len() > mark {
            match self.journal.pop().unwrap() {
                GraphChange::AddEdge { var } => {
                    self.adjacency[var.index()].pop();
                }
                GraphChange::RemoveEdge {
                    var,
                    index,
                    constraint,
                } => {
                    self.adjacency[var.index()].insert(index, constraint);
                }
            }
        }
    }

    /// Group the given variables by connectivity through the active
    /// constraints. Variables adjacent to no active constraint get no
    /// component; the returned count covers constraint-bearing components
    /// only.
    pub fn connected_components(
        &self,
        arena: &ConstraintArena,
        storage: &TypeVariableStorage,
        active: &ConstraintList,
        type_variables: &[TyVarId],
    ) -> (rustc_hash::FxHashMap<TyVarId, u32>, u32) {
        use rustc_hash::FxHashMap;

        // Local union-find over representatives, seeded per constraint.
        let mut parent: FxHashMap<TyVarId, TyVarId> = FxHashMap::default();
        fn find(parent: &mut FxHashMap<TyVarId, TyVarId>, v: TyVarId) -> TyVarId {
            let p = *parent.entry(v).or_insert(v);
            if p == v {
                v
            } else {
                let root = find(parent, p);
                parent.insert(v, root);
                root
            }
        }

        let in_scope: FxHashSet<TyVarId> = type_variables
            .iter()
            .map(|&v| storage.representative(v))
            .collect();

        for id in active.ids(arena) {
            let reps: Vec<TyVarId> = Self::edge_reps(arena, storage, id)
                .into_iter()
                .filter(|rep| in_scope.contains(rep))
                .collect();
            for window in reps.windows(2) {
                let a = find(&mut parent, window[0]);
                let b = find(&mut parent, window[1]);
                if a != b {
                    parent.insert(b, a);
                }
            }
            if let Some(&first) = reps.first() {
                // Make sure singleton constraints still claim a component.
                find(&mut parent, first);
            }
        }

        let mut component_of: FxHashMap<TyVarId, u32> = FxHashMap::default();
        let mut roots: FxHashMap<TyVarId, u32> = FxHashMap::default();
        let mut num = 0u32;
        let keys: Vec<TyVarId> = parent.keys().copied().collect();
        for v in keys {
            let root = find(&mut parent, v);
            let comp = *roots.entry(root).or_insert_with(|| {
                let c = num;
                num += 1;
                c
            });
            component_of.insert(v, comp);
        }
        (component_of, num)
    }
}
