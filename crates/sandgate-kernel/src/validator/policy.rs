//! Deny-lists shared by every validator.
//!
//! These are process-wide and never mutated. The allow-list is per validator
//! (see [`super::CodeValidator`]).

use std::collections::HashSet;
use std::sync::LazyLock;

/// Modules that may never be imported, whatever the allow-list says.
/// Submodules are covered by prefix matching ([`is_blocked_module`]).
pub const BLOCKED_MODULES: &[&str] = &[
    "os",
    "sys",
    "subprocess",
    "socket",
    "pickle",
    "marshal",
    "ctypes",
    "importlib",
    "importlib.util",
    "importlib.machinery",
    "pty",
    "fcntl",
    "termios",
    "tty",
    "shutil",
    "tempfile",
    "urllib",
    "urllib.request",
    "urllib2",
    "urllib3",
    "requests",
    "resource",
    "signal",
    "multiprocessing",
    "threading",
    "asyncio.subprocess",
    "code",
    "pdb",
    "inspect",
    "gc",
    "weakref",
    "ast",
    "dis",
    "imp",
    "pkgutil",
    "modulefinder",
    "runpy",
    "platform",
];

/// Builtins that may be neither called nor referenced.
pub const BLOCKED_BUILTINS: &[&str] = &[
    "eval",
    "exec",
    "compile",
    "__import__",
    "globals",
    "locals",
    "vars",
    "getattr",
    "setattr",
    "delattr",
    "open",
    "input",
    "raw_input",
    "execfile",
    "reload",
    "breakpoint",
    "help",
    "dir",
    "id",
    "memoryview",
];

/// Dunder and reflection names that earn a warning.
pub const SUSPICIOUS_PATTERNS: &[&str] = &[
    "__builtins__",
    "__globals__",
    "__dict__",
    "__class__",
    "__bases__",
    "__subclasses__",
    "__init__",
    "__code__",
    "func_code",
    "func_globals",
];

/// Attribute names rejected on any object, called or not.
pub const BLOCKED_ATTRIBUTES: &[&str] = &["system", "popen", "spawn", "exec"];

/// Builtins that run a string as code.
pub const DYNAMIC_CODE_BUILTINS: &[&str] = &["eval", "exec", "compile"];

static BLOCKED_MODULE_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| BLOCKED_MODULES.iter().copied().collect());

static BLOCKED_BUILTIN_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| BLOCKED_BUILTINS.iter().copied().collect());

static SUSPICIOUS_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| SUSPICIOUS_PATTERNS.iter().copied().collect());

/// True if `module` or any of its dotted ancestors is blocked.
///
/// `os.path` is blocked because `os` is. Relative names are matched as
/// written, so `.os` is not blocked (it is still rejected by the allow-list).
pub fn is_blocked_module(module: &str) -> bool {
    let blocked = &*BLOCKED_MODULE_SET;
    module
        .match_indices('.')
        .map(|(i, _)| &module[..i])
        .chain(std::iter::once(module))
        .any(|prefix| blocked.contains(prefix))
}

pub fn is_blocked_builtin(name: &str) -> bool {
    BLOCKED_BUILTIN_SET.contains(name)
}

pub fn is_suspicious(name: &str) -> bool {
    SUSPICIOUS_SET.contains(name)
}

pub fn is_blocked_attribute(name: &str) -> bool {
    BLOCKED_ATTRIBUTES.contains(&name)
}

pub fn is_dynamic_code_builtin(name: &str) -> bool {
    DYNAMIC_CODE_BUILTINS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_blocked() {
        assert!(is_blocked_module("os"));
        assert!(is_blocked_module("os.path"));
        assert!(is_blocked_module("importlib.resources.abc"));
        assert!(is_blocked_module("asyncio.subprocess"));
        assert!(!is_blocked_module("asyncio"));
        assert!(!is_blocked_module("osmosis"));
        assert!(!is_blocked_module("json"));
    }

    #[test]
    fn relative_names_match_literally() {
        assert!(!is_blocked_module("."));
        assert!(!is_blocked_module(".os"));
        // ".." then "..os": neither prefix is a listed module
        assert!(!is_blocked_module("..os"));
    }

    #[test]
    fn builtin_and_attribute_lists() {
        assert!(is_blocked_builtin("__import__"));
        assert!(!is_blocked_builtin("print"));
        assert!(is_suspicious("__subclasses__"));
        assert!(is_blocked_attribute("popen"));
        assert!(!is_blocked_attribute("dumps"));
        assert!(is_dynamic_code_builtin("compile"));
        assert!(!is_dynamic_code_builtin("open"));
    }
}
