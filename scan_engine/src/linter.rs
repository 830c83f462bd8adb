//! Migration-readiness linting for pickle payloads.
//!
//! Checks whether a checkpoint would load under PyTorch's restricted
//! loading path (`weights_only=True`), which only resolves symbols from a
//! small default allowlist. Pure static analysis over the disassembled
//! stream — nothing is executed.
//!
//! The rule is narrower than the safety scanner's strict mode: only the
//! *root* module (the segment before the first dot) is consulted, against
//! the PyTorch default safe-globals set.

use crate::pickle::{Disassembler, OpArg, Opcode};
use crate::safety::split_global_arg;
use crate::types::{LintDiagnostic, LintSeverity};

/// Root modules resolvable under PyTorch's default restricted loader.
pub const PYTORCH_DEFAULT_SAFE_MODULES: &[&str] = &[
    "torch",
    "numpy",
    "collections",
    "builtins",
    "copyreg",
    "datetime",
    "_codecs",
];

/// Lint a pickle stream for symbols outside the default safe-globals set.
///
/// Total over arbitrary input; a malformed stream yields the diagnostics
/// accumulated before the disassembler halted. Diagnostics are ordered by
/// byte offset.
#[must_use]
pub fn lint_pickle(data: &[u8]) -> Vec<LintDiagnostic> {
    let mut diagnostics = Vec::new();
    let mut shadow_stack: Vec<String> = Vec::new();

    for op in Disassembler::new(data) {
        if let Some(text) = op.pushed_text() {
            shadow_stack.push(text);
            continue;
        }

        match op.opcode {
            Opcode::Global => {
                if let Some(OpArg::Text(arg)) = &op.arg {
                    let (module, name) = match split_global_arg(arg) {
                        Some((module, name)) => (module, name),
                        // Degenerate single-token argument; lint the
                        // module anyway.
                        None => (arg.as_str(), "?"),
                    };
                    check_import(module, name, op.offset, &mut diagnostics);
                }
            }
            Opcode::StackGlobal => {
                if shadow_stack.len() >= 2 {
                    let name = shadow_stack.pop().unwrap_or_default();
                    let module = shadow_stack.pop().unwrap_or_default();
                    check_import(&module, &name, op.offset, &mut diagnostics);
                }
            }
            Opcode::Pop | Opcode::PopMark => {
                shadow_stack.pop();
            }
            _ => {}
        }
    }

    diagnostics
}

/// Emit a diagnostic if the symbol's root module is outside the allowlist.
fn check_import(module: &str, name: &str, offset: usize, diagnostics: &mut Vec<LintDiagnostic>) {
    let root_module = module.split('.').next().unwrap_or(module);

    if !PYTORCH_DEFAULT_SAFE_MODULES.contains(&root_module) {
        diagnostics.push(LintDiagnostic {
            offset,
            severity: LintSeverity::Error,
            message: format!("Custom Class Import Detected: {module}.{name}"),
            hint: format!(
                "Module '{root_module}' is not in the PyTorch default allowlist. \
                 Use `torch.serialization.add_safe_globals`."
            ),
        });
    }
}
