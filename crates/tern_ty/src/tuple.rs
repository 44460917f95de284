use derive_more::Debug;
use smol_str::SmolStr;

use crate::TyRef;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[debug("{label:?}: {ty:?}")]
pub struct TupleElem {
    pub label: Option<SmolStr>,
    pub ty: TyRef,
    pub variadic: bool,
}

impl TupleElem {
    pub fn unlabelled(ty: TyRef) -> Self {
        TupleElem {
            label: None,
            ty,
            variadic: false,
        }
    }

    pub fn labelled(label: impl Into<SmolStr>, ty: TyRef) -> Self {
        TupleElem {
            label: Some(label.into()),
            ty,
            variadic: false,
        }
    }

    pub fn variadic(ty: TyRef) -> Self {
        TupleElem {
            label: None,
            ty,
            variadic: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[debug("Tuple{elems:?}")]
pub struct TupleTy {
    pub elems: Vec<TupleElem>,
}

impl TupleTy {
    /// The field a bare scalar can initialize, if the tuple has one.
    /// Only single-element tuples qualify.
    pub fn field_for_scalar_init(&self) -> Option<usize> {
        if self.elems.len() == 1 {
            Some(0)
        } else {
            None
        }
    }

    /// Whether this is a single-element, non-variadic tuple — the shape
    /// that conversion may unwrap to its sole element type.
    pub fn single_scalar_element(&self) -> Option<&TupleElem> {
        match self.elems.as_slice() {
            [elem] if !elem.variadic => Some(elem),
            _ => None,
        }
    }
}
