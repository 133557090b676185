//! # Value Formatter
//!
//! Three rendering styles, matching the reference machine's `toString`
//! modes:
//!
//! - [`Style::Raw`]: used for debug traces. Closures render as `c<ip>#<depth>`
//!   (`depth` is how many activation links the closure's lexical chain
//!   passes through); strings render unescaped.
//! - [`Style::Literal`]: used when printing a value via the `println`/`print`
//!   builtins. Closures render as the literal word `function`; strings are
//!   quoted and escape `"` and `\`.
//! - [`Style::Typed`]: as `Literal`, plus a trailing `": <type>"`. Used for
//!   the return value printed when the root activation's `RET` halts
//!   execution.

use crate::error::VmError;
use crate::frame::activation_depth;
use crate::heap::Heap;
use crate::value::{Activation, Obj, Ref};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Style {
    Raw,
    Literal,
    Typed,
}

pub fn format_value(heap: &Heap, image: &[u8], r: Ref, style: Style) -> Result<String, VmError> {
    let mut out = String::new();
    append_value(heap, image, r, style, &mut out)?;
    if style == Style::Typed {
        out.push_str(": ");
        append_type(heap, image, r, &mut out)?;
    }
    Ok(out)
}

fn append_value(
    heap: &Heap,
    image: &[u8],
    r: Ref,
    style: Style,
    out: &mut String,
) -> Result<(), VmError> {
    match heap.get(r) {
        Obj::Int(n) => out.push_str(&n.to_string()),
        Obj::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Obj::Unit => out.push_str("()"),
        Obj::Str(s) => append_string(s, style, out),
        Obj::Tuple(items) => {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                append_value(heap, image, *item, style, out)?;
            }
            out.push(')');
        }
        Obj::Data { meta, id, fields } => {
            let names = crate::bytecode::read_data_names_at(image, *meta)?;
            let ctor_name = names.ctor_names.get(*id as usize).ok_or_else(|| {
                VmError::BoundsViolation {
                    op: "format",
                    detail: format!("constructor id {id} out of range"),
                }
            })?;
            out.push_str(ctor_name);
            for field in fields {
                out.push(' ');
                let nested_is_data = matches!(heap.get(*field), Obj::Data { fields, .. } if !fields.is_empty());
                if nested_is_data {
                    out.push('(');
                    append_value(heap, image, *field, style, out)?;
                    out.push(')');
                } else {
                    append_value(heap, image, *field, style, out)?;
                }
            }
        }
        Obj::Closure { ip, .. } => match style {
            Style::Raw => {
                let depth = activation_depth(heap, r);
                out.push('c');
                out.push_str(&ip.to_string());
                out.push('#');
                out.push_str(&depth.to_string());
            }
            Style::Literal | Style::Typed => out.push_str("function"),
        },
        Obj::Activation(a) => append_activation(heap, image, a, style, out)?,
        Obj::Builtin(id) => out.push_str(id.builtin_name()),
        Obj::BuiltinClosure { previous, argument, .. } => {
            out.push('<');
            append_builtin_chain(heap, image, *previous, style, out)?;
            out.push(' ');
            append_value(heap, image, *argument, style, out)?;
            out.push('>');
        }
    }
    Ok(())
}

fn append_string(s: &str, style: Style, out: &mut String) {
    match style {
        Style::Raw => out.push_str(s),
        Style::Literal | Style::Typed => {
            out.push('"');
            for c in s.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
        }
    }
}

fn append_activation(
    heap: &Heap,
    image: &[u8],
    a: &Activation,
    style: Style,
    out: &mut String,
) -> Result<(), VmError> {
    out.push('<');
    match a.parent {
        Some(parent) => append_value(heap, image, parent, style, out)?,
        None => out.push('-'),
    }
    out.push_str(", ");
    match a.closure {
        Some(closure) => append_value(heap, image, closure, style, out)?,
        None => out.push('-'),
    }
    out.push_str(", ");
    match a.next_ip {
        Some(ip) => out.push_str(&ip.to_string()),
        None => out.push('-'),
    }
    out.push_str(", ");
    match &a.state {
        Some(state) if !state.is_empty() => {
            for (i, slot) in state.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                match slot {
                    Some(r) => append_value(heap, image, *r, style, out)?,
                    None => out.push('-'),
                }
            }
        }
        _ => out.push('-'),
    }
    out.push('>');
    Ok(())
}

/// Recurses down a `BuiltinClosure`'s `previous` chain until it bottoms out
/// at a plain `Builtin`, printing names left to right.
fn append_builtin_chain(
    heap: &Heap,
    image: &[u8],
    r: Ref,
    style: Style,
    out: &mut String,
) -> Result<(), VmError> {
    match heap.get(r) {
        Obj::Builtin(id) => {
            out.push_str(id.builtin_name());
            Ok(())
        }
        Obj::BuiltinClosure { previous, argument, .. } => {
            append_builtin_chain(heap, image, *previous, style, out)?;
            out.push(' ');
            append_value(heap, image, *argument, style, out)
        }
        other => Err(VmError::type_mismatch("format", "Builtin", other)),
    }
}

fn append_type(heap: &Heap, image: &[u8], r: Ref, out: &mut String) -> Result<(), VmError> {
    match heap.get(r) {
        Obj::Activation(_) => out.push_str("Activation"),
        Obj::Bool(_) => out.push_str("Bool"),
        Obj::Builtin(_) => out.push_str("Builtin"),
        Obj::BuiltinClosure { .. } => out.push_str("BuiltinClosure"),
        Obj::Closure { .. } => out.push_str("Closure"),
        Obj::Data { meta, .. } => {
            let names = crate::bytecode::read_data_names_at(image, *meta)?;
            out.push_str(names.type_name);
        }
        Obj::Int(_) => out.push_str("Int"),
        Obj::Str(_) => out.push_str("String"),
        Obj::Tuple(items) => {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(" * ");
                }
                append_type(heap, image, *item, out)?;
            }
            out.push(')');
        }
        Obj::Unit => out.push_str("Unit"),
    }
    Ok(())
}
