//! AST walker that enforces the import, builtin and attribute policy.

use std::collections::HashSet;

use rustpython_parser::ast::{self, Ranged};
use rustpython_parser::text_size::TextRange;
use sandgate_types::{IssueCode, Span, ValidationIssue};

use super::policy;

/// Walks parsed statements and collects policy violations.
///
/// Every node is checked and then descended into, children in the order
/// Python's `ast` module lists its fields, so one pass reports every
/// violation.
pub struct SecurityVisitor<'a> {
    /// Modules the embedding application permits.
    allowed_imports: &'a HashSet<String>,
    /// Collected issues, errors and warnings interleaved.
    issues: Vec<ValidationIssue>,
}

impl<'a> SecurityVisitor<'a> {
    pub fn new(allowed_imports: &'a HashSet<String>) -> Self {
        Self {
            allowed_imports,
            issues: Vec::new(),
        }
    }

    /// Walk a module body and return all issues found.
    pub fn visit_module(mut self, body: &[ast::Stmt]) -> Vec<ValidationIssue> {
        self.visit_body(body);
        self.issues
    }

    fn visit_body(&mut self, body: &[ast::Stmt]) {
        for stmt in body {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &ast::Stmt) {
        use ast::Stmt;

        match stmt {
            Stmt::FunctionDef(ast::StmtFunctionDef {
                args,
                body,
                decorator_list,
                returns,
                type_params,
                ..
            })
            | Stmt::AsyncFunctionDef(ast::StmtAsyncFunctionDef {
                args,
                body,
                decorator_list,
                returns,
                type_params,
                ..
            }) => {
                self.visit_arguments(args);
                self.visit_body(body);
                self.visit_exprs(decorator_list);
                self.visit_opt_expr(returns.as_deref());
                self.visit_type_params(type_params);
            }
            Stmt::ClassDef(class) => {
                self.visit_exprs(&class.bases);
                self.visit_keywords(&class.keywords);
                self.visit_body(&class.body);
                self.visit_exprs(&class.decorator_list);
                self.visit_type_params(&class.type_params);
            }
            Stmt::Return(ret) => self.visit_opt_expr(ret.value.as_deref()),
            Stmt::Delete(del) => self.visit_exprs(&del.targets),
            Stmt::Assign(assign) => {
                self.visit_exprs(&assign.targets);
                self.visit_expr(&assign.value);
            }
            Stmt::TypeAlias(alias) => {
                self.visit_expr(&alias.name);
                self.visit_type_params(&alias.type_params);
                self.visit_expr(&alias.value);
            }
            Stmt::AugAssign(aug) => {
                self.visit_expr(&aug.target);
                self.visit_expr(&aug.value);
            }
            Stmt::AnnAssign(ann) => {
                self.visit_expr(&ann.target);
                self.visit_expr(&ann.annotation);
                self.visit_opt_expr(ann.value.as_deref());
            }
            Stmt::For(ast::StmtFor {
                target,
                iter,
                body,
                orelse,
                ..
            })
            | Stmt::AsyncFor(ast::StmtAsyncFor {
                target,
                iter,
                body,
                orelse,
                ..
            }) => {
                self.visit_expr(target);
                self.visit_expr(iter);
                self.visit_body(body);
                self.visit_body(orelse);
            }
            Stmt::While(ast::StmtWhile {
                test, body, orelse, ..
            }) => {
                self.check_while(test);
                self.visit_expr(test);
                self.visit_body(body);
                self.visit_body(orelse);
            }
            Stmt::If(ast::StmtIf {
                test, body, orelse, ..
            }) => {
                self.visit_expr(test);
                self.visit_body(body);
                self.visit_body(orelse);
            }
            Stmt::With(ast::StmtWith { items, body, .. })
            | Stmt::AsyncWith(ast::StmtAsyncWith { items, body, .. }) => {
                for item in items {
                    self.visit_expr(&item.context_expr);
                    self.visit_opt_expr(item.optional_vars.as_deref());
                }
                self.visit_body(body);
            }
            Stmt::Match(ast::StmtMatch { subject, cases, .. }) => {
                self.visit_expr(subject);
                for case in cases {
                    self.visit_pattern(&case.pattern);
                    self.visit_opt_expr(case.guard.as_deref());
                    self.visit_body(&case.body);
                }
            }
            Stmt::Raise(raise) => {
                self.visit_opt_expr(raise.exc.as_deref());
                self.visit_opt_expr(raise.cause.as_deref());
            }
            Stmt::Try(ast::StmtTry {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            })
            | Stmt::TryStar(ast::StmtTryStar {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            }) => {
                self.visit_body(body);
                for ast::ExceptHandler::ExceptHandler(handler) in handlers {
                    self.visit_opt_expr(handler.type_.as_deref());
                    self.visit_body(&handler.body);
                }
                self.visit_body(orelse);
                self.visit_body(finalbody);
            }
            Stmt::Assert(assert) => {
                self.visit_expr(&assert.test);
                self.visit_opt_expr(assert.msg.as_deref());
            }
            Stmt::Import(import) => {
                for alias in &import.names {
                    self.check_module(alias.name.as_str(), span(alias.range));
                }
            }
            Stmt::ImportFrom(import) => {
                let level = import.level.map_or(0, |level| level.to_u32() as usize);
                let name = relative_module_name(import.module.as_ref().map(|m| m.as_str()), level);
                self.check_module(&name, span(import.range));
            }
            Stmt::Expr(expr) => self.visit_expr(&expr.value),
            Stmt::Global(_)
            | Stmt::Nonlocal(_)
            | Stmt::Pass(_)
            | Stmt::Break(_)
            | Stmt::Continue(_) => {}
        }
    }

    /// In `ast.arguments` field order: annotations up to the keyword-only
    /// parameters, their defaults, the `**` annotation, positional defaults.
    fn visit_arguments(&mut self, args: &ast::Arguments) {
        for arg in args.posonlyargs.iter().chain(&args.args) {
            self.visit_opt_expr(arg.def.annotation.as_deref());
        }
        if let Some(vararg) = &args.vararg {
            self.visit_opt_expr(vararg.annotation.as_deref());
        }
        for arg in &args.kwonlyargs {
            self.visit_opt_expr(arg.def.annotation.as_deref());
        }
        for arg in &args.kwonlyargs {
            self.visit_opt_expr(arg.default.as_deref());
        }
        if let Some(kwarg) = &args.kwarg {
            self.visit_opt_expr(kwarg.annotation.as_deref());
        }
        for arg in args.posonlyargs.iter().chain(&args.args) {
            self.visit_opt_expr(arg.default.as_deref());
        }
    }

    fn visit_type_params(&mut self, params: &[ast::TypeParam]) {
        for param in params {
            if let ast::TypeParam::TypeVar(var) = param {
                self.visit_opt_expr(var.bound.as_deref());
            }
        }
    }

    fn visit_keywords(&mut self, keywords: &[ast::Keyword]) {
        for keyword in keywords {
            self.visit_expr(&keyword.value);
        }
    }

    fn visit_opt_expr(&mut self, expr: Option<&ast::Expr>) {
        if let Some(expr) = expr {
            self.visit_expr(expr);
        }
    }

    fn visit_exprs(&mut self, exprs: &[ast::Expr]) {
        for expr in exprs {
            self.visit_expr(expr);
        }
    }

    fn visit_expr(&mut self, expr: &ast::Expr) {
        use ast::Expr;

        match expr {
            Expr::BoolOp(op) => self.visit_exprs(&op.values),
            Expr::NamedExpr(named) => {
                self.visit_expr(&named.target);
                self.visit_expr(&named.value);
            }
            Expr::BinOp(bin) => {
                self.visit_expr(&bin.left);
                self.visit_expr(&bin.right);
            }
            Expr::UnaryOp(unary) => self.visit_expr(&unary.operand),
            Expr::Lambda(lambda) => {
                self.visit_arguments(&lambda.args);
                self.visit_expr(&lambda.body);
            }
            Expr::IfExp(ifexp) => {
                self.visit_expr(&ifexp.test);
                self.visit_expr(&ifexp.body);
                self.visit_expr(&ifexp.orelse);
            }
            Expr::Dict(dict) => {
                for key in dict.keys.iter().flatten() {
                    self.visit_expr(key);
                }
                self.visit_exprs(&dict.values);
            }
            Expr::Set(set) => self.visit_exprs(&set.elts),
            Expr::ListComp(ast::ExprListComp {
                elt, generators, ..
            })
            | Expr::SetComp(ast::ExprSetComp {
                elt, generators, ..
            })
            | Expr::GeneratorExp(ast::ExprGeneratorExp {
                elt, generators, ..
            }) => {
                self.visit_expr(elt);
                self.visit_comprehensions(generators);
            }
            Expr::DictComp(comp) => {
                self.visit_expr(&comp.key);
                self.visit_expr(&comp.value);
                self.visit_comprehensions(&comp.generators);
            }
            Expr::Await(ast::ExprAwait { value, .. })
            | Expr::YieldFrom(ast::ExprYieldFrom { value, .. })
            | Expr::Starred(ast::ExprStarred { value, .. }) => self.visit_expr(value),
            Expr::Yield(ast::ExprYield { value, .. }) => self.visit_opt_expr(value.as_deref()),
            Expr::Compare(compare) => {
                self.visit_expr(&compare.left);
                self.visit_exprs(&compare.comparators);
            }
            Expr::Call(call) => {
                self.check_call(call);
                self.visit_expr(&call.func);
                self.visit_exprs(&call.args);
                self.visit_keywords(&call.keywords);
            }
            Expr::FormattedValue(field) => {
                self.visit_expr(&field.value);
                self.visit_opt_expr(field.format_spec.as_deref());
            }
            Expr::JoinedStr(fstring) => self.visit_exprs(&fstring.values),
            Expr::Constant(_) => {}
            Expr::Attribute(attribute) => {
                self.check_attribute(attribute.attr.as_str(), span(attribute.range));
                self.visit_expr(&attribute.value);
            }
            Expr::Subscript(subscript) => {
                self.visit_expr(&subscript.value);
                self.visit_expr(&subscript.slice);
            }
            // Names being bound or deleted are not references.
            Expr::Name(name) => {
                if matches!(name.ctx, ast::ExprContext::Load) {
                    self.check_name(name.id.as_str(), span(name.range));
                }
            }
            Expr::List(list) => self.visit_exprs(&list.elts),
            Expr::Tuple(tuple) => self.visit_exprs(&tuple.elts),
            Expr::Slice(slice) => {
                self.visit_opt_expr(slice.lower.as_deref());
                self.visit_opt_expr(slice.upper.as_deref());
                self.visit_opt_expr(slice.step.as_deref());
            }
        }
    }

    fn visit_comprehensions(&mut self, generators: &[ast::Comprehension]) {
        for generator in generators {
            self.visit_expr(&generator.target);
            self.visit_expr(&generator.iter);
            self.visit_exprs(&generator.ifs);
        }
    }

    fn visit_pattern(&mut self, pattern: &ast::Pattern) {
        use ast::Pattern;

        match pattern {
            Pattern::MatchValue(value) => self.visit_expr(&value.value),
            Pattern::MatchSingleton(_) | Pattern::MatchStar(_) => {}
            Pattern::MatchSequence(ast::PatternMatchSequence { patterns, .. })
            | Pattern::MatchOr(ast::PatternMatchOr { patterns, .. }) => {
                for p in patterns {
                    self.visit_pattern(p);
                }
            }
            Pattern::MatchMapping(mapping) => {
                self.visit_exprs(&mapping.keys);
                for p in &mapping.patterns {
                    self.visit_pattern(p);
                }
            }
            Pattern::MatchClass(class) => {
                self.visit_expr(&class.cls);
                for p in class.patterns.iter().chain(&class.kwd_patterns) {
                    self.visit_pattern(p);
                }
            }
            Pattern::MatchAs(capture) => {
                if let Some(p) = &capture.pattern {
                    self.visit_pattern(p);
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Checks
    // ═══════════════════════════════════════════════════════════════════

    fn push(&mut self, code: IssueCode, message: String, span: Span) {
        self.issues
            .push(ValidationIssue::new(code, message).with_span(span));
    }

    /// Blocked modules take precedence; only unblocked names are checked
    /// against the allow-list.
    fn check_module(&mut self, name: &str, span: Span) {
        if policy::is_blocked_module(name) {
            self.push(
                IssueCode::BlockedImport,
                format!("Import of blocked module '{}' not allowed", name),
                span,
            );
        } else if !self.allowed_imports.contains(name) {
            let issue = ValidationIssue::new(
                IssueCode::UnapprovedImport,
                format!("Import of module '{}' not in allowed list", name),
            )
            .with_span(span)
            .with_suggestion(format!("add '{}' to allowed_imports if it is safe", name));
            self.issues.push(issue);
        }
    }

    fn check_call(&mut self, call: &ast::ExprCall) {
        let name = match call.func.as_ref() {
            ast::Expr::Name(name) => name.id.as_str(),
            ast::Expr::Attribute(attribute) => attribute.attr.as_str(),
            _ => return,
        };
        let call_span = span(call.range);

        if policy::is_blocked_builtin(name) {
            self.push(
                IssueCode::BlockedBuiltinCall,
                format!("Call to blocked builtin '{}' not allowed", name),
                call_span,
            );
        }
        if name == "system" {
            self.push(
                IssueCode::SystemCall,
                "Call to 'system' function not allowed".to_string(),
                call_span,
            );
        }
        if !policy::is_dynamic_code_builtin(name) {
            return;
        }
        if let Some(first @ ast::Expr::JoinedStr(_)) = call.args.first() {
            self.push(
                IssueCode::DynamicCodeFString,
                format!("Dangerous pattern: {} with f-string", name),
                span(first.range()),
            );
        }
        let concat = call.args.iter().find(|arg| {
            matches!(
                arg,
                ast::Expr::BinOp(ast::ExprBinOp {
                    op: ast::Operator::Add,
                    ..
                })
            )
        });
        if let Some(concat) = concat {
            self.push(
                IssueCode::DynamicCodeConcat,
                format!("Dangerous pattern: {} with string concatenation", name),
                span(concat.range()),
            );
        }
    }

    fn check_attribute(&mut self, attr: &str, span: Span) {
        if policy::is_blocked_attribute(attr) {
            self.push(
                IssueCode::BlockedAttribute,
                format!("Access to attribute '{}' not allowed", attr),
                span,
            );
        }
        if policy::is_suspicious(attr) {
            self.push(
                IssueCode::SuspiciousAttribute,
                format!("Suspicious attribute access: '{}'", attr),
                span,
            );
        }
    }

    fn check_name(&mut self, name: &str, span: Span) {
        if policy::is_blocked_builtin(name) {
            self.push(
                IssueCode::BlockedName,
                format!("Access to blocked name '{}' not allowed", name),
                span,
            );
        }
        if policy::is_suspicious(name) {
            self.push(
                IssueCode::SuspiciousName,
                format!("Suspicious name reference: '{}'", name),
                span,
            );
        }
    }

    /// `while True:` and `while 1:`, in any integer spelling of one.
    fn check_while(&mut self, test: &ast::Expr) {
        let ast::Expr::Constant(constant) = test else {
            return;
        };
        let infinite = match &constant.value {
            ast::Constant::Bool(value) => *value,
            ast::Constant::Int(value) => value.to_string() == "1",
            _ => false,
        };
        if infinite {
            self.push(
                IssueCode::InfiniteLoop,
                "Infinite loop detected: 'while True' or 'while 1'".to_string(),
                span(constant.range),
            );
        }
    }
}

fn span(range: TextRange) -> Span {
    Span::new(usize::from(range.start()), usize::from(range.end()))
}

/// Module name of a `from` import as written, leading dots included.
fn relative_module_name(module: Option<&str>, level: usize) -> String {
    let mut name = ".".repeat(level);
    name.push_str(module.unwrap_or_default());
    name
}
