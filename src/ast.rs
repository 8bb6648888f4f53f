use std::fmt::{self, Write as _};

use indexmap::IndexMap;

use crate::{diagnostics::Position, value::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "NOT",
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Value),
    Variable(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Built-in call such as `FORMAT(...)`.
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
    ToolCall {
        tool: String,
        args: IndexMap<String, Expr>,
    },
    ListLiteral(Vec<Expr>),
    ObjectLiteral(IndexMap<String, Expr>),
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let {
        name: String,
        value: Expr,
    },
    Call {
        tool: String,
        args: IndexMap<String, Expr>,
    },
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    For {
        binding: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Expr(Expr),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub statements: Vec<Stmt>,
}

impl Script {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }
}

// Printing back to source. Binary and unary expressions are always
// parenthesized, and statements are grouped where the next one could
// otherwise continue them, so the output re-parses to the same tree.

fn write_string_literal(f: &mut impl fmt::Write, text: &str) -> fmt::Result {
    f.write_char('"')?;
    for ch in text.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\0' => f.write_str("\\0")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => f.write_str("NULL"),
        Value::Bool(true) => f.write_str("TRUE"),
        Value::Bool(false) => f.write_str("FALSE"),
        Value::Number(_) => write!(f, "{value}"),
        Value::String(text) => write_string_literal(f, text),
        Value::List(items) => {
            f.write_char('[')?;
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                write_literal(f, item)?;
            }
            f.write_char(']')
        }
        Value::Object(map) => {
            f.write_char('{')?;
            for (idx, (key, item)) in map.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                write_string_literal(f, key)?;
                f.write_str(": ")?;
                write_literal(f, item)?;
            }
            f.write_char('}')
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &IndexMap<String, Expr>) -> fmt::Result {
    if args.is_empty() {
        return f.write_str("{}");
    }
    f.write_str("{ ")?;
    for (idx, (name, expr)) in args.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{name}: {expr}")?;
    }
    f.write_str(" }")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(value) => write_literal(f, value),
            ExprKind::Variable(name) => f.write_str(name),
            ExprKind::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "(NOT {operand})"),
                _ => write!(f, "({}{operand})", op.symbol()),
            },
            ExprKind::FunctionCall { name, args } => {
                write!(f, "{name}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_char(')')
            }
            ExprKind::ToolCall { tool, args } => {
                write!(f, "(CALL {tool} ")?;
                write_args(f, args)?;
                f.write_char(')')
            }
            ExprKind::ListLiteral(elements) => {
                f.write_char('[')?;
                for (idx, element) in elements.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_char(']')
            }
            ExprKind::ObjectLiteral(properties) => {
                f.write_char('{')?;
                for (idx, (key, value)) in properties.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write_string_literal(f, key)?;
                    write!(f, ": {value}")?;
                }
                f.write_char('}')
            }
            ExprKind::Index { object, index } => write!(f, "{object}[{index}]"),
            ExprKind::Member { object, property } => write!(f, "{object}.{property}"),
        }
    }
}

/// Text of an expression statement. Text that would open with `[`, `-` or
/// `+` is grouped so it cannot extend the statement before it.
fn statement_expr_text(expr: &Expr) -> String {
    let text = expr.to_string();
    if text.starts_with(&['[', '-', '+'][..]) {
        format!("({text})")
    } else {
        text
    }
}

fn opens_with_paren(stmt: &Stmt) -> bool {
    matches!(&stmt.kind, StmtKind::Expr(expr) if statement_expr_text(expr).starts_with('('))
}

/// A statement's trailing expression text. When the next statement opens
/// with `(`, a bare trailing identifier would read it as call arguments, so
/// the text is grouped unless it already ends with `)`.
fn guarded(text: String, guard: bool) -> String {
    if guard && !text.ends_with(')') {
        format!("({text})")
    } else {
        text
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, statements: &[Stmt], depth: usize) -> fmt::Result {
    for (idx, stmt) in statements.iter().enumerate() {
        let guard = statements.get(idx + 1).is_some_and(opens_with_paren);
        stmt.write_indented(f, depth, guard)?;
    }
    Ok(())
}

impl Stmt {
    fn write_indented(
        &self,
        f: &mut fmt::Formatter<'_>,
        depth: usize,
        guard: bool,
    ) -> fmt::Result {
        let indent = "    ".repeat(depth);
        match &self.kind {
            StmtKind::Let { name, value } => {
                writeln!(f, "{indent}LET {name} = {}", guarded(value.to_string(), guard))
            }
            StmtKind::Call { tool, args } => {
                write!(f, "{indent}CALL {tool} ")?;
                write_args(f, args)?;
                writeln!(f)
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                writeln!(f, "{indent}IF {condition} THEN")?;
                write_block(f, then_branch, depth + 1)?;
                if let Some(branch) = else_branch {
                    writeln!(f, "{indent}ELSE")?;
                    write_block(f, branch, depth + 1)?;
                }
                writeln!(f, "{indent}END")
            }
            StmtKind::For {
                binding,
                iterable,
                body,
            } => {
                writeln!(f, "{indent}FOR {binding} IN {iterable} DO")?;
                write_block(f, body, depth + 1)?;
                writeln!(f, "{indent}END")
            }
            StmtKind::Expr(expr) => {
                writeln!(f, "{indent}{}", guarded(statement_expr_text(expr), guard))
            }
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0, false)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_block(f, &self.statements, 0)
    }
}
