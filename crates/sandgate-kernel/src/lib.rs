//! sandgate-kernel: static validation of untrusted Python code.
//!
//! Parses Python source with `rustpython-parser` and checks the tree against
//! an import allow-list and deny-lists of modules, builtins and attributes
//! before the code is handed to a sandbox.
//!
//! ```
//! use sandgate_kernel::CodeValidator;
//!
//! let validator = CodeValidator::new(["json"]);
//! assert!(validator.validate("import json\ndata = json.dumps({})").is_valid());
//! assert!(!validator.validate("import os").is_valid());
//! ```

pub mod config;
pub mod parser;
pub mod validator;

pub use config::ValidatorConfig;
pub use parser::{parse, ParseError};
pub use rustpython_parser::ast;
pub use validator::{CodeValidator, SecurityVisitor};
