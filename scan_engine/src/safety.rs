//! Pickle safety scanning policies.
//!
//! Consumes the disassembled opcode stream and flags dangerous or
//! unauthorized symbol imports resolved via `GLOBAL` / `STACK_GLOBAL`.
//! Two policies:
//!
//! - **Blocklist** (default): a fixed table of known-dangerous
//!   `(module, name)` pairs. A hit means the stream can execute commands
//!   when loaded.
//! - **Strict**: an allowlist. Anything not explicitly safe is flagged
//!   with an `UNSAFE_IMPORT:` prefix.
//!
//! The scanner maintains a shadow stack of string pushes only — it does
//! not model the full pickle VM. `POP`/`POP_MARK` blindly discard one
//! slot, and a `STACK_GLOBAL` without two tracked strings is skipped.
//! Adversarial streams that launder names through the memo or mix
//! non-string pushes can evade the tracker; positives are reliable,
//! completeness is not.

use crate::pickle::{Disassembler, OpArg, Opcode};
use crate::types::Threat;

/// Known-dangerous `(module, names)` pairs. Resolving any of these from a
/// model file means sandbox escape on load.
pub const DANGEROUS_GLOBALS: &[(&str, &[&str])] = &[
    ("os", &["system", "popen", "execl", "execvp"]),
    (
        "subprocess",
        &["Popen", "call", "check_call", "check_output", "run"],
    ),
    ("builtins", &["eval", "exec", "compile", "open"]),
    ("posix", &["system", "popen"]),
    ("webbrowser", &["open"]),
    ("socket", &["socket", "connect"]),
];

/// Modules accepted wholesale in strict mode.
pub const SAFE_MODULES: &[&str] = &[
    "torch",
    "numpy",
    "collections",
    "builtins",
    "__builtin__",
    "copyreg",
    "typing",
    "datetime",
    "pathlib",
    "posixpath",
    "ntpath",
    "re",
    "copy",
    "functools",
    "operator",
    "warnings",
    "contextlib",
    "abc",
    "enum",
    "dataclasses",
    "types",
    "_operator",
    "complex",
];

/// Builtins accepted in strict mode when the module is `builtins`.
pub const SAFE_BUILTINS: &[&str] = &[
    "getattr",
    "setattr",
    "bytearray",
    "dict",
    "list",
    "set",
    "tuple",
    "slice",
    "frozenset",
    "range",
    "complex",
    "bool",
    "int",
    "float",
    "str",
    "bytes",
    "object",
];

/// Module prefixes accepted in strict mode. Submodule imports of these
/// packages are routine in serialized checkpoints.
const SAFE_MODULE_PREFIXES: &[&str] = &["torch.", "pathlib.", "re.", "collections."];

/// Which policy the scanner applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanMode {
    /// Flag only the dangerous-globals table.
    #[default]
    Blocklist,
    /// Flag everything outside the strict allowlist.
    Strict,
}

/// Whether a `(module, name)` pair is on the dangerous-globals table.
#[must_use]
pub fn is_dangerous(module: &str, name: &str) -> bool {
    DANGEROUS_GLOBALS
        .iter()
        .any(|(m, names)| *m == module && names.contains(&name))
}

/// Strict-mode allow rule.
#[must_use]
pub fn is_safe_import(module: &str, name: &str) -> bool {
    if SAFE_MODULES.contains(&module) {
        return true;
    }

    if SAFE_MODULE_PREFIXES
        .iter()
        .any(|prefix| module.starts_with(prefix))
    {
        return true;
    }

    if module == "_codecs" && (name == "encode" || name == "decode") {
        return true;
    }

    if module == "builtins" || module == "__builtin__" {
        return SAFE_BUILTINS.contains(&name);
    }

    false
}

/// Split a `GLOBAL` argument into `(module, name)`.
///
/// Both encodings occur in the wild: `"module\nname"` and the
/// space-separated `"module name"`.
#[must_use]
pub fn split_global_arg(arg: &str) -> Option<(&str, &str)> {
    if let Some((module, name)) = arg.split_once('\n') {
        return Some((module, name));
    }
    arg.split_once(' ')
}

/// Scan a pickle stream for dangerous or unauthorized imports.
///
/// Total over arbitrary input: a malformed stream yields whatever threats
/// were resolved before the disassembler halted. Threats come back in
/// discovery order (by byte offset).
#[must_use]
pub fn scan_pickle_stream(data: &[u8], mode: ScanMode) -> Vec<Threat> {
    let mut threats = Vec::new();
    let mut shadow_stack: Vec<String> = Vec::new();

    for op in Disassembler::new(data) {
        if let Some(text) = op.pushed_text() {
            shadow_stack.push(text);
            continue;
        }

        match op.opcode {
            Opcode::Global => {
                if let Some(OpArg::Text(arg)) = &op.arg {
                    if let Some((module, name)) = split_global_arg(arg) {
                        check_import(module, name, mode, &mut threats);
                    }
                }
            }
            Opcode::StackGlobal => {
                // Consumes (name, module) from the top of the stack. With
                // fewer than two tracked strings the op is skipped — the
                // tracker underflowed or the real operands were not strings.
                if shadow_stack.len() >= 2 {
                    let name = shadow_stack.pop().unwrap_or_default();
                    let module = shadow_stack.pop().unwrap_or_default();
                    check_import(&module, &name, mode, &mut threats);
                }
            }
            Opcode::Pop | Opcode::PopMark => {
                // One blind discard; the tracker cannot know what the real
                // stack held.
                shadow_stack.pop();
            }
            _ => {}
        }
    }

    threats
}

/// Apply the active policy to a resolved `(module, name)` pair.
fn check_import(module: &str, name: &str, mode: ScanMode, threats: &mut Vec<Threat>) {
    match mode {
        ScanMode::Blocklist => {
            if is_dangerous(module, name) {
                threats.push(Threat::dangerous(module, name));
            }
        }
        ScanMode::Strict => {
            if !is_safe_import(module, name) {
                threats.push(Threat::unsafe_import(module, name));
            }
        }
    }
}
