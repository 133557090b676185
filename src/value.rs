//! # Value Representation
//!
//! [`Obj`] is the universal runtime type stored in the [`crate::heap::Heap`]
//! arena: the ten variants carried by every value the machine can push,
//! store, or chase a reference to (activations, closures, algebraic data,
//! tuples, strings, builtins, builtin closures, plus the `Int`/`Bool`/`Unit`
//! leaves). Nothing outside `Heap` ever owns an `Obj` directly — code that
//! needs to read or walk one resolves a [`Ref`] through the heap first.
//!
//! ## References
//! [`Ref`] is a `Copy` handle: either an index into the heap's arena, or one
//! of the three fixed singletons (`True`, `False`, `Unit`) that live outside
//! the arena and are never subject to a collection pass.

use crate::vm::builtins::BuiltinId;

/// A non-owning handle to a value, either in the arena or among the
/// singletons.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Ref {
    /// Index `0` is `False`, `1` is `True`, `2` is `Unit`.
    Singleton(u8),
    /// Index into [`crate::heap::Heap`]'s arena.
    Heap(usize),
}

pub(crate) const SINGLETON_FALSE: Ref = Ref::Singleton(0);
pub(crate) const SINGLETON_TRUE: Ref = Ref::Singleton(1);
pub(crate) const SINGLETON_UNIT: Ref = Ref::Singleton(2);

/// Mark colour used by the tracing collector. A slot's colour is compared
/// against the heap's current colour at sweep time; a mismatch means the
/// slot wasn't reached from a root during the preceding mark and is freed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn flip(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

/// An activation record: one per in-flight (or suspended, via a retained
/// closure) function call.
///
/// `closure` is the callee closure this activation was created to run —
/// `PUSH_VAR`'s frame-walk hops through `closure.previous_activation`, the
/// *lexical* parent, which is distinct from `parent`, the *dynamic* caller
/// this activation returns to.
#[derive(Debug)]
pub struct Activation {
    pub parent: Option<Ref>,
    pub closure: Option<Ref>,
    pub next_ip: Option<usize>,
    /// `None` until `ENTER` runs once for this activation.
    pub state: Option<Vec<Option<Ref>>>,
}

/// The ten value variants a heap slot (or singleton) can hold.
#[derive(Debug)]
pub enum Obj {
    Int(i32),
    Bool(bool),
    Unit,
    Str(String),
    Tuple(Vec<Ref>),
    Data { meta: usize, id: i32, fields: Vec<Ref> },
    /// `previous_activation` is the activation that was current when
    /// `PUSH_CLOSURE` ran — the lexical scope this closure captures.
    Closure { previous_activation: Option<Ref>, ip: usize },
    Activation(Activation),
    /// The entry point of a (possibly curried) native function.
    Builtin(BuiltinId),
    /// One application of a curried builtin. `next` names the stage to
    /// dispatch to if this closure is itself called again.
    BuiltinClosure { previous: Ref, argument: Ref, next: BuiltinId },
}

impl Obj {
    pub fn type_name(&self) -> &'static str {
        match self {
            Obj::Int(_) => "Int",
            Obj::Bool(_) => "Bool",
            Obj::Unit => "Unit",
            Obj::Str(_) => "String",
            Obj::Tuple(_) => "Tuple",
            Obj::Data { .. } => "Data",
            Obj::Closure { .. } => "Closure",
            Obj::Activation(_) => "Activation",
            Obj::Builtin(_) => "Builtin",
            Obj::BuiltinClosure { .. } => "BuiltinClosure",
        }
    }

    /// References this value directly holds, for the mark phase. Activation
    /// state slots that are still `None` (not yet `STORE_VAR`'d) contribute
    /// nothing.
    pub(crate) fn children(&self) -> Vec<Ref> {
        match self {
            Obj::Activation(a) => {
                let mut out = Vec::new();
                out.extend(a.parent);
                out.extend(a.closure);
                if let Some(state) = &a.state {
                    out.extend(state.iter().flatten().copied());
                }
                out
            }
            Obj::Tuple(fields) => fields.clone(),
            Obj::Data { fields, .. } => fields.clone(),
            Obj::Closure { previous_activation, .. } => previous_activation.into_iter().collect(),
            Obj::BuiltinClosure { previous, argument, .. } => vec![*previous, *argument],
            Obj::Int(_) | Obj::Bool(_) | Obj::Unit | Obj::Str(_) | Obj::Builtin(_) => Vec::new(),
        }
    }
}
