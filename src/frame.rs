//! # Activation Chain Helpers
//!
//! Activations are ordinary heap values (`Obj::Activation`); this module
//! collects the two small recursive walks done over them. `walk_frames` hops
//! the *lexical* chain (`closure.previous_activation` links) for `PUSH_VAR`'s
//! frame argument. `activation_depth` instead walks the *dynamic* caller
//! chain (`Activation.parent` links) from the activation a closure captured,
//! for the formatter's closure-depth count.

use crate::error::VmError;
use crate::heap::Heap;
use crate::value::{Obj, Ref};

/// Hop `frames` links up the lexical chain starting at `activation`, via
/// each activation's closure's `previous_activation`. `frames == 0` returns
/// `activation` itself.
pub(crate) fn walk_frames(heap: &Heap, activation: Ref, frames: i32) -> Result<Ref, VmError> {
    let mut current = activation;
    for _ in 0..frames {
        let closure_ref = match heap.get(current) {
            Obj::Activation(a) => a.closure.ok_or_else(|| VmError::StateAbsent {
                op: "PUSH_VAR",
                detail: "activation has no closure to walk a frame through".into(),
            })?,
            other => return Err(VmError::type_mismatch("PUSH_VAR", "Activation", other)),
        };
        current = match heap.get(closure_ref) {
            Obj::Closure { previous_activation, .. } => {
                previous_activation.ok_or_else(|| VmError::BoundsViolation {
                    op: "PUSH_VAR",
                    detail: "frame count exceeds the lexical chain's depth".into(),
                })?
            }
            other => return Err(VmError::type_mismatch("PUSH_VAR", "Closure", other)),
        };
    }
    Ok(current)
}

/// Number of `Activation.parent` links between the activation a closure
/// captured and the root — the dynamic call depth at the point the closure
/// was created. Used by the Raw closure formatter (`c<ip>#<depth>`).
pub(crate) fn activation_depth(heap: &Heap, closure: Ref) -> usize {
    let mut current = match heap.get(closure) {
        Obj::Closure { previous_activation: Some(a), .. } => *a,
        _ => return 0,
    };
    let mut depth = 0;
    loop {
        match heap.get(current) {
            Obj::Activation(a) => match a.parent {
                Some(parent_ref) => {
                    depth += 1;
                    current = parent_ref;
                }
                None => return depth,
            },
            _ => return depth,
        }
    }
}
