mod nominal;
mod tuple;

use std::fmt;
use std::sync::Arc;

use derive_more::Debug;

pub use nominal::{NominalKind, NominalTy, ProtocolId};
pub use tuple::{TupleElem, TupleTy};

/// Identity of a type variable. Allocated by the solver's substitution
/// store; two ids are the same unknown iff they are numerically equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[debug("${_0}")]
pub struct TyVarId(pub u32);

impl TyVarId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A function type. `auto_closure` marks parameterless thunks that the
/// front-end inserts implicitly; conversion treats them as a scalar of
/// their result type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[debug("Fn({param:?} -> {result:?})")]
pub struct FnTy {
    pub param: TyRef,
    pub result: TyRef,
    pub auto_closure: bool,
}

/// An l-value wrapper around an object type. `implicit` l-values decay
/// to their object type during conversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[debug("LValue({object:?})")]
pub struct LValueTy {
    pub object: TyRef,
    pub implicit: bool,
}

/// A type expression. Shared immutably via [`TyRef`]; canonical form is
/// structural equality on the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    /// An unknown, subject to the substitution store.
    #[debug("{_0:?}")]
    Var(TyVarId),
    #[debug("{_0:?}")]
    Nominal(NominalTy),
    #[debug("{_0:?}")]
    Tuple(TupleTy),
    #[debug("{_0:?}")]
    Fn(FnTy),
    #[debug("{_0:?}")]
    LValue(LValueTy),
    /// A generic parameter minted when the solver is allowed to leave
    /// unknowns generic (identified by position).
    #[debug("τ{_0}")]
    GenericParam(u32),
}

/// A shared reference to a type tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[debug("{_0:?}")]
pub struct TyRef(Arc<Ty>);

impl From<Ty> for TyRef {
    fn from(value: Ty) -> Self {
        TyRef(Arc::new(value))
    }
}

impl std::ops::Deref for TyRef {
    type Target = Ty;

    fn deref(&self) -> &Ty {
        &self.0
    }
}

impl Ty {
    pub fn var(v: TyVarId) -> TyRef {
        Ty::Var(v).into()
    }

    /// A non-generic nominal struct type.
    pub fn nominal(name: impl Into<smol_str::SmolStr>) -> TyRef {
        Ty::Nominal(NominalTy::new(name, NominalKind::Struct)).into()
    }

    /// A nominal class type (may have a superclass).
    pub fn class(name: impl Into<smol_str::SmolStr>) -> TyRef {
        Ty::Nominal(NominalTy::new(name, NominalKind::Class)).into()
    }

    /// An unspecialized generic nominal of the given declared arity.
    pub fn generic(name: impl Into<smol_str::SmolStr>, params: u32) -> TyRef {
        Ty::Nominal(NominalTy::generic(name, NominalKind::Struct, params)).into()
    }

    /// A generic nominal applied to arguments.
    pub fn applied(name: impl Into<smol_str::SmolStr>, args: Vec<TyRef>) -> TyRef {
        Ty::Nominal(NominalTy::applied(name, NominalKind::Struct, args)).into()
    }

    pub fn optional(inner: TyRef) -> TyRef {
        Ty::applied("Optional", vec![inner])
    }

    pub fn func(param: TyRef, result: TyRef) -> TyRef {
        Ty::Fn(FnTy {
            param,
            result,
            auto_closure: false,
        })
        .into()
    }

    pub fn auto_closure(param: TyRef, result: TyRef) -> TyRef {
        Ty::Fn(FnTy {
            param,
            result,
            auto_closure: true,
        })
        .into()
    }

    pub fn tuple(elems: Vec<TupleElem>) -> TyRef {
        Ty::Tuple(TupleTy { elems }).into()
    }

    pub fn lvalue(object: TyRef) -> TyRef {
        Ty::LValue(LValueTy {
            object,
            implicit: true,
        })
        .into()
    }

    pub fn as_var(&self) -> Option<TyVarId> {
        match self {
            Ty::Var(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_nominal(&self) -> Option<&NominalTy> {
        match self {
            Ty::Nominal(n) => Some(n),
            _ => None,
        }
    }

    /// The wrapped type for `Optional<T>`, if this is one.
    pub fn as_optional(&self) -> Option<&TyRef> {
        match self {
            Ty::Nominal(n) if n.name == "Optional" && n.args.len() == 1 => Some(&n.args[0]),
            _ => None,
        }
    }

    /// The name of the nominal head, ignoring generic arguments.
    pub fn nominal_head(&self) -> Option<&smol_str::SmolStr> {
        self.as_nominal().map(|n| &n.name)
    }

    pub fn is_unspecialized_generic(&self) -> bool {
        self.as_nominal().is_some_and(NominalTy::is_unspecialized)
    }

    /// Whether a superclass lookup can possibly succeed for this type.
    pub fn may_have_superclass(&self) -> bool {
        matches!(self, Ty::Nominal(n) if n.kind == NominalKind::Class)
    }

    /// Visit every node of the tree, parents before children.
    pub fn walk(&self, f: &mut impl FnMut(&Ty)) {
        f(self);
        match self {
            Ty::Var(_) | Ty::GenericParam(_) => {}
            Ty::Nominal(n) => {
                for arg in &n.args {
                    arg.walk(f);
                }
            }
            Ty::Tuple(t) => {
                for elem in &t.elems {
                    elem.ty.walk(f);
                }
            }
            Ty::Fn(func) => {
                func.param.walk(f);
                func.result.walk(f);
            }
            Ty::LValue(lv) => lv.object.walk(f),
        }
    }

    /// Collect every type variable occurring in the tree, in visit order.
    /// Duplicates are kept; callers dedup by representative.
    pub fn type_variables(&self, out: &mut Vec<TyVarId>) {
        self.walk(&mut |t| {
            if let Ty::Var(v) = t {
                out.push(*v);
            }
        });
    }

    pub fn has_type_variable(&self) -> bool {
        match self {
            Ty::Var(_) => true,
            Ty::GenericParam(_) => false,
            Ty::Nominal(n) => n.args.iter().any(|a| a.has_type_variable()),
            Ty::Tuple(t) => t.elems.iter().any(|e| e.ty.has_type_variable()),
            Ty::Fn(f) => f.param.has_type_variable() || f.result.has_type_variable(),
            Ty::LValue(lv) => lv.object.has_type_variable(),
        }
    }
}

impl TyRef {
    /// Strip an l-value wrapper, if any.
    pub fn rvalue(&self) -> TyRef {
        match &**self {
            Ty::LValue(lv) => lv.object.clone(),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Var(v) => write!(f, "${}", v.0),
            Ty::GenericParam(i) => write!(f, "τ{i}"),
            Ty::Nominal(n) => {
                write!(f, "{}", n.name)?;
                if !n.args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in n.args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", **arg)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Ty::Tuple(t) => {
                write!(f, "(")?;
                for (i, elem) in t.elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if let Some(label) = &elem.label {
                        write!(f, "{label}: ")?;
                    }
                    write!(f, "{}", *elem.ty)?;
                    if elem.variadic {
                        write!(f, "...")?;
                    }
                }
                write!(f, ")")
            }
            Ty::Fn(func) => {
                if func.auto_closure {
                    write!(f, "@autoclosure ")?;
                }
                write!(f, "({}) -> {}", *func.param, *func.result)
            }
            Ty::LValue(lv) => write!(f, "@lvalue {}", *lv.object),
        }
    }
}

impl fmt::Display for TyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

/// Shorthand for building type trees in tests and tables.
///
/// `ty!(Int)` is the nominal struct `Int`, `ty!(# 3)` is `$3`, and
/// `ty!(Int -> Bool)` is a function type. Parenthesized forms nest.
#[macro_export]
macro_rules! ty {
    (# $n:expr) => {
        $crate::Ty::var($crate::TyVarId($n))
    };
    (($($inner:tt)*)) => { $crate::ty!($($inner)*) };
    ($arg:tt -> $($ret:tt)*) => {
        $crate::Ty::func($crate::ty!($arg), $crate::ty!($($ret)*))
    };
    ($name:ident) => {
        $crate::Ty::nominal(stringify!($name))
    };
}
