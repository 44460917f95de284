use derive_more::Debug;
use smol_str::SmolStr;

use crate::TyRef;

/// Identity of a protocol, by name. The solver never looks inside a
/// protocol; conformances and literal defaults come from the type table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[debug("{_0}")]
pub struct ProtocolId(pub SmolStr);

impl ProtocolId {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        ProtocolId(name.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NominalKind {
    Struct,
    /// Classes participate in the superclass walk.
    Class,
}

/// A nominal type: a name, a declared generic arity, and the applied
/// arguments. `generic_params > 0` with empty `args` is the unspecialized
/// generic form (e.g. a bare literal-default `Array`), which must be
/// opened before binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[debug("{name}{args:?}")]
pub struct NominalTy {
    pub name: SmolStr,
    pub kind: NominalKind,
    pub generic_params: u32,
    pub args: Vec<TyRef>,
}

impl NominalTy {
    pub fn new(name: impl Into<SmolStr>, kind: NominalKind) -> Self {
        NominalTy {
            name: name.into(),
            kind,
            generic_params: 0,
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<SmolStr>, kind: NominalKind, params: u32) -> Self {
        NominalTy {
            name: name.into(),
            kind,
            generic_params: params,
            args: Vec::new(),
        }
    }

    pub fn applied(name: impl Into<SmolStr>, kind: NominalKind, args: Vec<TyRef>) -> Self {
        let params = args.len() as u32;
        NominalTy {
            name: name.into(),
            kind,
            generic_params: params,
            args,
        }
    }

    pub fn is_unspecialized(&self) -> bool {
        self.generic_params > 0 && self.args.is_empty()
    }
}
