/// Syntax Tree - Language-Neutral View of Submitted Source
///
/// **Core Responsibility:**
/// Parse Python source once and lower it to a flat, pre-order list of the
/// node shapes the safety check and the structural predicates care about.
///
/// **Critical Properties:**
/// - Parsing never executes anything
/// - Consumers never see parser types, only [`Node`]
/// - Node order is source order (parent before children)

use rustpython_parser::{ast, Parse};
use std::collections::BTreeSet;
use std::fmt;

/// Parse failure with a 1-based line number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, line {}", self.message, self.line)
    }
}

impl std::error::Error for SyntaxError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// `print(...)`
    Name(String),
    /// `receiver.name(...)`; receiver is set only when it is a plain name
    Method {
        receiver: Option<String>,
        name: String,
    },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Bool(bool),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordArg {
    /// `None` for `**kwargs` splats
    pub name: Option<String>,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub callee: Callee,
    /// At least one positional argument is an f-string
    pub has_fstring_arg: bool,
    pub keywords: Vec<KeywordArg>,
}

impl Call {
    pub fn is_named(&self, name: &str) -> bool {
        matches!(&self.callee, Callee::Name(n) if n == name)
    }

    pub fn is_method(&self, name: &str) -> bool {
        matches!(&self.callee, Callee::Method { name: n, .. } if n == name)
    }

    pub fn keyword_is_true(&self, keyword: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| k.name.as_deref() == Some(keyword) && k.value == Literal::Bool(true))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignTarget {
    Name(String),
    /// Tuple or list target; non-name elements are `None`
    Sequence(Vec<Option<String>>),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// One entry per imported module, `from` imports included
    Import { module: String },
    Call(Call),
    /// `base` is the root name of the attribute chain (`os` in `os.path.join`)
    Attribute { base: Option<String>, attr: String },
    Assign { targets: Vec<AssignTarget> },
    Name { id: String, stored: bool },
    FormattedString,
    Slice,
    BinaryOp(BinaryOperator),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
}

impl SyntaxTree {
    pub fn parse(source: &str) -> Result<Self, SyntaxError> {
        let suite = ast::Suite::parse(source, "<submission>").map_err(|err| {
            let offset = (u32::from(err.offset) as usize).min(source.len());
            let line = source.as_bytes()[..offset]
                .iter()
                .filter(|&&b| b == b'\n')
                .count()
                + 1;
            SyntaxError {
                message: err.error.to_string(),
                line,
            }
        })?;

        let mut lowering = Lowering::default();
        lowering.body(&suite);
        Ok(Self {
            nodes: lowering.nodes,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn calls(&self) -> impl Iterator<Item = &Call> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Call(call) => Some(call),
            _ => None,
        })
    }

    pub fn imports(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Import { module } => Some(module.as_str()),
            _ => None,
        })
    }

    pub fn assignments(&self) -> impl Iterator<Item = &[AssignTarget]> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Assign { targets } => Some(targets.as_slice()),
            _ => None,
        })
    }

    /// Names bound by `=` statements, tuple/list targets unpacked
    pub fn assigned_names(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        for targets in self.assignments() {
            for target in targets {
                match target {
                    AssignTarget::Name(name) => {
                        names.insert(name.as_str());
                    }
                    AssignTarget::Sequence(elts) => {
                        names.extend(elts.iter().flatten().map(String::as_str));
                    }
                    AssignTarget::Other => {}
                }
            }
        }
        names
    }

    /// Every name in store position, in source order (loop targets included)
    pub fn stored_names(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Name { id, stored: true } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, predicate: impl Fn(&Node) -> bool) -> bool {
        self.nodes.iter().any(predicate)
    }
}

#[derive(Default)]
struct Lowering {
    nodes: Vec<Node>,
}

impl Lowering {
    fn body(&mut self, stmts: &[ast::Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &ast::Stmt) {
        match stmt {
            ast::Stmt::FunctionDef(ast::StmtFunctionDef {
                args,
                body,
                decorator_list,
                returns,
                ..
            })
            | ast::Stmt::AsyncFunctionDef(ast::StmtAsyncFunctionDef {
                args,
                body,
                decorator_list,
                returns,
                ..
            }) => {
                self.exprs(decorator_list);
                self.arguments(args);
                self.opt_expr(returns);
                self.body(body);
            }
            ast::Stmt::ClassDef(ast::StmtClassDef {
                bases,
                keywords,
                body,
                decorator_list,
                ..
            }) => {
                self.exprs(decorator_list);
                self.exprs(bases);
                for keyword in keywords {
                    self.expr(&keyword.value);
                }
                self.body(body);
            }
            ast::Stmt::Return(ast::StmtReturn { value, .. }) => self.opt_expr(value),
            ast::Stmt::Delete(ast::StmtDelete { targets, .. }) => self.exprs(targets),
            ast::Stmt::Assign(ast::StmtAssign { targets, value, .. }) => {
                self.nodes.push(Node::Assign {
                    targets: targets.iter().map(assign_target).collect(),
                });
                self.exprs(targets);
                self.expr(value);
            }
            ast::Stmt::AugAssign(ast::StmtAugAssign { target, value, .. }) => {
                self.expr(target);
                self.expr(value);
            }
            ast::Stmt::AnnAssign(ast::StmtAnnAssign {
                target,
                annotation,
                value,
                ..
            }) => {
                self.expr(target);
                self.expr(annotation);
                self.opt_expr(value);
            }
            ast::Stmt::For(ast::StmtFor {
                target,
                iter,
                body,
                orelse,
                ..
            })
            | ast::Stmt::AsyncFor(ast::StmtAsyncFor {
                target,
                iter,
                body,
                orelse,
                ..
            }) => {
                self.expr(target);
                self.expr(iter);
                self.body(body);
                self.body(orelse);
            }
            ast::Stmt::While(ast::StmtWhile {
                test, body, orelse, ..
            })
            | ast::Stmt::If(ast::StmtIf {
                test, body, orelse, ..
            }) => {
                self.expr(test);
                self.body(body);
                self.body(orelse);
            }
            ast::Stmt::With(ast::StmtWith { items, body, .. })
            | ast::Stmt::AsyncWith(ast::StmtAsyncWith { items, body, .. }) => {
                for item in items {
                    self.expr(&item.context_expr);
                    self.opt_expr(&item.optional_vars);
                }
                self.body(body);
            }
            ast::Stmt::Match(ast::StmtMatch { subject, cases, .. }) => {
                self.expr(subject);
                for case in cases {
                    self.pattern(&case.pattern);
                    self.opt_expr(&case.guard);
                    self.body(&case.body);
                }
            }
            ast::Stmt::Raise(ast::StmtRaise { exc, cause, .. }) => {
                self.opt_expr(exc);
                self.opt_expr(cause);
            }
            ast::Stmt::Try(ast::StmtTry {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            })
            | ast::Stmt::TryStar(ast::StmtTryStar {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            }) => {
                self.body(body);
                for handler in handlers {
                    let ast::ExceptHandler::ExceptHandler(ast::ExceptHandlerExceptHandler {
                        type_,
                        body,
                        ..
                    }) = handler;
                    self.opt_expr(type_);
                    self.body(body);
                }
                self.body(orelse);
                self.body(finalbody);
            }
            ast::Stmt::Assert(ast::StmtAssert { test, msg, .. }) => {
                self.expr(test);
                self.opt_expr(msg);
            }
            ast::Stmt::Import(ast::StmtImport { names, .. }) => {
                for alias in names {
                    self.nodes.push(Node::Import {
                        module: alias.name.as_str().to_string(),
                    });
                }
            }
            ast::Stmt::ImportFrom(ast::StmtImportFrom { module, .. }) => {
                // Relative imports without a module name (`from . import x`) have nothing to check
                if let Some(module) = module {
                    self.nodes.push(Node::Import {
                        module: module.as_str().to_string(),
                    });
                }
            }
            ast::Stmt::Expr(ast::StmtExpr { value, .. }) => self.expr(value),
            _ => {}
        }
    }

    fn exprs(&mut self, exprs: &[ast::Expr]) {
        for expr in exprs {
            self.expr(expr);
        }
    }

    fn opt_expr(&mut self, expr: &Option<Box<ast::Expr>>) {
        if let Some(expr) = expr {
            self.expr(expr);
        }
    }

    /// Defaults and annotations are evaluated when the `def`/`lambda` runs
    fn arguments(&mut self, args: &ast::Arguments) {
        for arg in args.posonlyargs.iter().chain(&args.args).chain(&args.kwonlyargs) {
            self.opt_expr(&arg.def.annotation);
            self.opt_expr(&arg.default);
        }
        for arg in args.vararg.iter().chain(&args.kwarg) {
            self.opt_expr(&arg.annotation);
        }
    }

    fn pattern(&mut self, pattern: &ast::Pattern) {
        match pattern {
            ast::Pattern::MatchValue(ast::PatternMatchValue { value, .. }) => self.expr(value),
            ast::Pattern::MatchSingleton(_) | ast::Pattern::MatchStar(_) => {}
            ast::Pattern::MatchSequence(ast::PatternMatchSequence { patterns, .. })
            | ast::Pattern::MatchOr(ast::PatternMatchOr { patterns, .. }) => {
                for p in patterns {
                    self.pattern(p);
                }
            }
            ast::Pattern::MatchMapping(ast::PatternMatchMapping { keys, patterns, .. }) => {
                self.exprs(keys);
                for p in patterns {
                    self.pattern(p);
                }
            }
            ast::Pattern::MatchClass(ast::PatternMatchClass {
                cls,
                patterns,
                kwd_patterns,
                ..
            }) => {
                self.expr(cls);
                for p in patterns.iter().chain(kwd_patterns) {
                    self.pattern(p);
                }
            }
            ast::Pattern::MatchAs(ast::PatternMatchAs { pattern, .. }) => {
                if let Some(pattern) = pattern {
                    self.pattern(pattern);
                }
            }
        }
    }

    fn comprehensions(&mut self, generators: &[ast::Comprehension]) {
        for generator in generators {
            self.expr(&generator.target);
            self.expr(&generator.iter);
            self.exprs(&generator.ifs);
        }
    }

    fn expr(&mut self, expr: &ast::Expr) {
        match expr {
            ast::Expr::BoolOp(ast::ExprBoolOp { values, .. }) => self.exprs(values),
            ast::Expr::NamedExpr(ast::ExprNamedExpr { target, value, .. }) => {
                self.expr(target);
                self.expr(value);
            }
            ast::Expr::BinOp(ast::ExprBinOp {
                left, op, right, ..
            }) => {
                self.nodes.push(Node::BinaryOp(binary_operator(op)));
                self.expr(left);
                self.expr(right);
            }
            ast::Expr::UnaryOp(ast::ExprUnaryOp { operand, .. }) => self.expr(operand),
            ast::Expr::Lambda(ast::ExprLambda { args, body, .. }) => {
                self.arguments(args);
                self.expr(body);
            }
            ast::Expr::IfExp(ast::ExprIfExp {
                test, body, orelse, ..
            }) => {
                self.expr(test);
                self.expr(body);
                self.expr(orelse);
            }
            ast::Expr::Dict(ast::ExprDict { keys, values, .. }) => {
                for key in keys.iter().flatten() {
                    self.expr(key);
                }
                self.exprs(values);
            }
            ast::Expr::Set(ast::ExprSet { elts, .. }) => self.exprs(elts),
            ast::Expr::ListComp(ast::ExprListComp {
                elt, generators, ..
            })
            | ast::Expr::SetComp(ast::ExprSetComp {
                elt, generators, ..
            })
            | ast::Expr::GeneratorExp(ast::ExprGeneratorExp {
                elt, generators, ..
            }) => {
                self.expr(elt);
                self.comprehensions(generators);
            }
            ast::Expr::DictComp(ast::ExprDictComp {
                key,
                value,
                generators,
                ..
            }) => {
                self.expr(key);
                self.expr(value);
                self.comprehensions(generators);
            }
            ast::Expr::Await(ast::ExprAwait { value, .. })
            | ast::Expr::YieldFrom(ast::ExprYieldFrom { value, .. }) => self.expr(value),
            ast::Expr::Yield(ast::ExprYield { value, .. }) => self.opt_expr(value),
            ast::Expr::Compare(ast::ExprCompare {
                left, comparators, ..
            }) => {
                self.expr(left);
                self.exprs(comparators);
            }
            ast::Expr::Call(ast::ExprCall {
                func,
                args,
                keywords,
                ..
            }) => {
                self.nodes.push(Node::Call(Call {
                    callee: callee(func),
                    has_fstring_arg: args.iter().any(|arg| matches!(arg, ast::Expr::JoinedStr(_))),
                    keywords: keywords
                        .iter()
                        .map(|k| KeywordArg {
                            name: k.arg.as_ref().map(|a| a.as_str().to_string()),
                            value: literal(&k.value),
                        })
                        .collect(),
                }));
                self.expr(func);
                self.exprs(args);
                for keyword in keywords {
                    self.expr(&keyword.value);
                }
            }
            ast::Expr::FormattedValue(ast::ExprFormattedValue {
                value, format_spec, ..
            }) => {
                self.expr(value);
                self.opt_expr(format_spec);
            }
            ast::Expr::JoinedStr(ast::ExprJoinedStr { values, .. }) => {
                self.nodes.push(Node::FormattedString);
                self.exprs(values);
            }
            ast::Expr::Attribute(ast::ExprAttribute { value, attr, .. }) => {
                self.nodes.push(Node::Attribute {
                    base: root_name(value),
                    attr: attr.as_str().to_string(),
                });
                self.expr(value);
            }
            ast::Expr::Subscript(ast::ExprSubscript { value, slice, .. }) => {
                self.expr(value);
                self.expr(slice);
            }
            ast::Expr::Starred(ast::ExprStarred { value, .. }) => self.expr(value),
            ast::Expr::Name(ast::ExprName { id, ctx, .. }) => {
                self.nodes.push(Node::Name {
                    id: id.as_str().to_string(),
                    stored: matches!(ctx, ast::ExprContext::Store),
                });
            }
            ast::Expr::List(ast::ExprList { elts, .. })
            | ast::Expr::Tuple(ast::ExprTuple { elts, .. }) => self.exprs(elts),
            ast::Expr::Slice(ast::ExprSlice {
                lower, upper, step, ..
            }) => {
                self.nodes.push(Node::Slice);
                self.opt_expr(lower);
                self.opt_expr(upper);
                self.opt_expr(step);
            }
            _ => {}
        }
    }
}

fn callee(func: &ast::Expr) -> Callee {
    match func {
        ast::Expr::Name(ast::ExprName { id, .. }) => Callee::Name(id.as_str().to_string()),
        ast::Expr::Attribute(ast::ExprAttribute { value, attr, .. }) => Callee::Method {
            receiver: match &**value {
                ast::Expr::Name(ast::ExprName { id, .. }) => Some(id.as_str().to_string()),
                _ => None,
            },
            name: attr.as_str().to_string(),
        },
        _ => Callee::Other,
    }
}

/// Leftmost name of an attribute chain, if the chain starts at a name
fn root_name(expr: &ast::Expr) -> Option<String> {
    match expr {
        ast::Expr::Name(ast::ExprName { id, .. }) => Some(id.as_str().to_string()),
        ast::Expr::Attribute(ast::ExprAttribute { value, .. }) => root_name(value),
        _ => None,
    }
}

fn literal(expr: &ast::Expr) -> Literal {
    match expr {
        ast::Expr::Constant(ast::ExprConstant {
            value: ast::Constant::Bool(b),
            ..
        }) => Literal::Bool(*b),
        _ => Literal::Other,
    }
}

fn assign_target(expr: &ast::Expr) -> AssignTarget {
    match expr {
        ast::Expr::Name(ast::ExprName { id, .. }) => AssignTarget::Name(id.as_str().to_string()),
        ast::Expr::Tuple(ast::ExprTuple { elts, .. }) | ast::Expr::List(ast::ExprList { elts, .. }) => {
            AssignTarget::Sequence(
                elts.iter()
                    .map(|elt| match elt {
                        ast::Expr::Name(ast::ExprName { id, .. }) => Some(id.as_str().to_string()),
                        _ => None,
                    })
                    .collect(),
            )
        }
        _ => AssignTarget::Other,
    }
}

fn binary_operator(op: &ast::Operator) -> BinaryOperator {
    match op {
        ast::Operator::Add => BinaryOperator::Add,
        ast::Operator::Sub => BinaryOperator::Sub,
        ast::Operator::Mult => BinaryOperator::Mult,
        ast::Operator::Div => BinaryOperator::Div,
        ast::Operator::FloorDiv => BinaryOperator::FloorDiv,
        ast::Operator::Mod => BinaryOperator::Mod,
        ast::Operator::Pow => BinaryOperator::Pow,
        _ => BinaryOperator::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reports_line_of_error() {
        let err = SyntaxTree::parse("x = 1\ny = (\n").unwrap_err();
        assert!(err.line >= 2, "line was {}", err.line);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_imports_include_from_imports() {
        let tree = SyntaxTree::parse("import math\nfrom os.path import join\n").unwrap();
        let imports: Vec<&str> = tree.imports().collect();
        assert_eq!(imports, vec!["math", "os.path"]);
    }

    #[test]
    fn test_tuple_assignment_targets() {
        let tree = SyntaxTree::parse("a, b = 1, 2\nc = 3\n").unwrap();
        let names: Vec<&str> = tree.assigned_names().into_iter().collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let first = tree.assignments().next().unwrap();
        assert_eq!(
            first,
            &[AssignTarget::Sequence(vec![Some("a".into()), Some("b".into())])][..]
        );
    }

    #[test]
    fn test_call_shapes() {
        let tree = SyntaxTree::parse("print(f'{x}')\nitems.sort(reverse=True)\n").unwrap();
        let calls: Vec<&Call> = tree.calls().collect();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].is_named("print"));
        assert!(calls[0].has_fstring_arg);
        assert!(calls[1].is_method("sort"));
        assert!(calls[1].keyword_is_true("reverse"));
        assert_eq!(
            calls[1].callee,
            Callee::Method {
                receiver: Some("items".into()),
                name: "sort".into()
            }
        );
    }

    #[test]
    fn test_attribute_root_name() {
        let tree = SyntaxTree::parse("x = os.path.join('a', 'b')\n").unwrap();
        assert!(tree.contains(|n| matches!(
            n,
            Node::Attribute { base: Some(b), attr } if b == "os" && attr == "join"
        )));
    }

    #[test]
    fn test_nested_scopes_are_visited() {
        let source = "def f():\n    for i in range(3):\n        if i:\n            print(nums[1:])\n";
        let tree = SyntaxTree::parse(source).unwrap();
        assert!(tree.contains(|n| matches!(n, Node::Slice)));
        assert!(tree.calls().any(|c| c.is_named("print")));
        assert_eq!(tree.stored_names(), vec!["i"]);
    }

    #[test]
    fn test_division_operator() {
        let tree = SyntaxTree::parse("avg = sum(xs) / len(xs)\n").unwrap();
        assert!(tree.contains(|n| matches!(n, Node::BinaryOp(BinaryOperator::Div))));
        assert!(!tree.contains(|n| matches!(n, Node::BinaryOp(BinaryOperator::FloorDiv))));
    }
}
