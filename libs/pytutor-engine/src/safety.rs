/// Safety Pre-Check - Static Denylist Guard
///
/// **Core Responsibility:**
/// Decide from the source text alone whether a submission may be handed
/// to the interpreter.
///
/// **Limitation:**
/// This is a denylist, not a sandbox. It catches the obvious ways a
/// beginner (or a curious one) reaches the OS, the network or the
/// interpreter internals. Deployments that accept untrusted code still
/// need OS-level isolation around the interpreter process.

use crate::syntax::{Callee, Node, SyntaxTree};
use pytutor_common::types::SafetyVerdict;

/// Top-level modules that may not be imported or referenced
pub const BLOCKED_MODULES: &[&str] = &[
    // OS and filesystem
    "os",
    "sys",
    "shutil",
    "pathlib",
    "tempfile",
    "pty",
    // process spawning
    "subprocess",
    "multiprocessing",
    // networking
    "socket",
    "urllib",
    "requests",
    "http",
    "ftplib",
    "smtplib",
    // persistence and serialization
    "sqlite3",
    "pickle",
    "shelve",
    "marshal",
    // concurrency
    "threading",
    "_thread",
    "asyncio",
    "concurrent",
    "queue",
    // interpreter internals
    "importlib",
    "ctypes",
    "builtins",
    "inspect",
    "atexit",
    "signal",
    "gc",
];

/// Builtins that reflect on or dynamically execute code
pub const BLOCKED_FUNCTIONS: &[&str] = &[
    "open",
    "exec",
    "eval",
    "compile",
    "__import__",
    "globals",
    "locals",
    "vars",
    "dir",
    "getattr",
    "setattr",
    "delattr",
    "hasattr",
    "callable",
    "isinstance",
    "issubclass",
    "super",
];

fn is_blocked_module(module: &str) -> bool {
    let top_level = module.split('.').next().unwrap_or(module);
    BLOCKED_MODULES.contains(&top_level)
}

/// Check a submission before execution
///
/// Pure function of `source`: same text, same verdict. The first offending
/// node in source order decides the reason.
pub fn check_safety(source: &str) -> SafetyVerdict {
    if source.trim().is_empty() {
        return SafetyVerdict::rejected("Code is empty");
    }

    let tree = match SyntaxTree::parse(source) {
        Ok(tree) => tree,
        Err(e) => {
            return SafetyVerdict::rejected(format!("syntax error: {}, line {}", e.message, e.line))
        }
    };

    check_tree(&tree)
}

/// Denylist walk over an already parsed tree
pub fn check_tree(tree: &SyntaxTree) -> SafetyVerdict {
    for node in tree.nodes() {
        match node {
            Node::Import { module } if is_blocked_module(module) => {
                return SafetyVerdict::rejected(format!(
                    "Import '{}' is not allowed for security reasons",
                    module
                ));
            }
            Node::Call(call) => {
                if let Callee::Name(name) = &call.callee {
                    if BLOCKED_FUNCTIONS.contains(&name.as_str()) {
                        return SafetyVerdict::rejected(format!(
                            "Function '{}' is not allowed for security reasons",
                            name
                        ));
                    }
                }
            }
            Node::Attribute {
                base: Some(base),
                attr,
            } if BLOCKED_MODULES.contains(&base.as_str()) => {
                return SafetyVerdict::rejected(format!(
                    "Access to '{}.{}' is not allowed",
                    base, attr
                ));
            }
            _ => {}
        }
    }

    SafetyVerdict::safe()
}
