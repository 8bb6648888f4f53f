use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    ast::{BinaryOp, Expr, ExprKind, Script, Stmt, StmtKind, UnaryOp},
    diagnostics::{NuwaError, Position, Result},
    environment::Scope,
    output::{OutputSink, StdoutSink},
    parser, stdlib,
    tools::{BoxFuture, ToolError, ToolRegistry, ToolSet},
    value::Value,
};

/// Frame for one loop iteration. It is popped on drop, so an error or a run
/// cancelled at a tool call leaves the caller's scope at its original depth.
struct LoopFrame<'a> {
    scope: &'a mut Scope,
}

impl<'a> LoopFrame<'a> {
    fn enter(scope: &'a mut Scope) -> Self {
        scope.push_frame();
        Self { scope }
    }

    fn scope(&mut self) -> &mut Scope {
        self.scope
    }
}

impl Drop for LoopFrame<'_> {
    fn drop(&mut self) {
        self.scope.pop_frame();
    }
}

/// Builds an [`Interpreter`] around a tool registry and an output sink.
#[derive(Default)]
pub struct InterpreterBuilder {
    tools: Option<Arc<dyn ToolRegistry>>,
    output: Option<Arc<dyn OutputSink>>,
}

impl InterpreterBuilder {
    pub fn tools(mut self, tools: impl ToolRegistry + 'static) -> Self {
        self.tools = Some(Arc::new(tools));
        self
    }

    pub fn shared_tools(mut self, tools: Arc<dyn ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn output(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.output = Some(sink);
        self
    }

    pub fn output_fn(self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.output(Arc::new(sink))
    }

    pub fn build(self) -> Interpreter {
        Interpreter {
            tools: self.tools.unwrap_or_else(|| Arc::new(ToolSet::new())),
            output: self.output.unwrap_or_else(|| Arc::new(StdoutSink)),
        }
    }
}

/// Tree-walking evaluator. Holds no per-run state, so one interpreter can
/// serve any number of concurrent executions.
#[derive(Clone)]
pub struct Interpreter {
    tools: Arc<dyn ToolRegistry>,
    output: Arc<dyn OutputSink>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder::default()
    }

    pub fn with_tools(tools: impl ToolRegistry + 'static) -> Self {
        Self::builder().tools(tools).build()
    }

    /// Lexes, parses and executes `source`.
    pub async fn run(&self, source: &str, variables: IndexMap<String, Value>) -> Result<Scope> {
        let script = parser::parse(source)?;
        self.execute(&script, variables).await
    }

    #[tracing::instrument(level = "debug", skip_all, fields(statements = script.len()))]
    pub async fn execute(&self, script: &Script, variables: IndexMap<String, Value>) -> Result<Scope> {
        let mut scope = Scope::with_variables(variables);
        self.execute_in(script, &mut scope).await?;
        Ok(scope)
    }

    /// Executes against a caller-owned scope, which keeps whatever the
    /// script bound before a failure. Dropping the future part way through
    /// leaves the root-frame bindings made so far and no loop frames.
    pub async fn execute_in(&self, script: &Script, scope: &mut Scope) -> Result<()> {
        self.execute_block(&script.statements, scope).await
    }

    pub async fn evaluate(&self, expr: &Expr, scope: &mut Scope) -> Result<Value> {
        self.eval(expr, scope).await
    }

    fn execute_block<'a>(
        &'a self,
        statements: &'a [Stmt],
        scope: &'a mut Scope,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for stmt in statements {
                self.execute_statement(stmt, scope).await?;
            }
            Ok(())
        })
    }

    async fn execute_statement(&self, stmt: &Stmt, scope: &mut Scope) -> Result<()> {
        tracing::trace!(
            line = stmt.position.line,
            column = stmt.position.column,
            "statement"
        );
        match &stmt.kind {
            StmtKind::Let { name, value } => {
                let value = self.eval(value, scope).await?;
                scope.set(name.clone(), value);
            }
            StmtKind::Call { tool, args } => {
                self.invoke_tool(tool, args, scope, stmt.position).await?;
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => match self.eval(condition, scope).await? {
                Value::Bool(true) => self.execute_block(then_branch, scope).await?,
                Value::Bool(false) => {
                    if let Some(branch) = else_branch {
                        self.execute_block(branch, scope).await?;
                    }
                }
                other => {
                    return Err(NuwaError::InvalidCondition {
                        found: other.type_name(),
                        position: Some(condition.position),
                    });
                }
            },
            StmtKind::For {
                binding,
                iterable,
                body,
            } => {
                let items = match self.eval(iterable, scope).await? {
                    Value::List(items) => items,
                    other => {
                        return Err(NuwaError::InvalidIterable {
                            found: other.type_name(),
                            position: Some(iterable.position),
                        });
                    }
                };
                for item in items {
                    let mut frame = LoopFrame::enter(scope);
                    frame.scope().set(binding.clone(), item);
                    self.execute_block(body, frame.scope()).await?;
                }
            }
            StmtKind::Expr(expr) => {
                self.eval(expr, scope).await?;
            }
        }
        Ok(())
    }

    fn eval<'a>(&'a self, expr: &'a Expr, scope: &'a mut Scope) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            let position = expr.position;
            match &expr.kind {
                ExprKind::Literal(value) => Ok(value.clone()),
                ExprKind::Variable(name) => {
                    scope
                        .get(name)
                        .cloned()
                        .ok_or_else(|| NuwaError::UndefinedVariable {
                            name: name.clone(),
                            position: Some(position),
                        })
                }
                ExprKind::Binary { op, left, right } => {
                    // Both sides always run, AND/OR included.
                    let left_value = self.eval(left, scope).await?;
                    let right_value = self.eval(right, scope).await?;
                    binary(*op, left_value, right_value, position)
                }
                ExprKind::Unary { op, operand } => {
                    let value = self.eval(operand, scope).await?;
                    unary(*op, value, position)
                }
                ExprKind::FunctionCall { name, args } => {
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval(arg, scope).await?);
                    }
                    let builtin = stdlib::lookup(name).ok_or_else(|| {
                        NuwaError::runtime(format!("Unknown function '{name}'"), Some(position))
                    })?;
                    builtin
                        .call(&values, self.output.as_ref())
                        .map_err(|err| err.or_position(position))
                }
                ExprKind::ToolCall { tool, args } => {
                    self.invoke_tool(tool, args, scope, position).await
                }
                ExprKind::ListLiteral(elements) => {
                    let mut values = Vec::with_capacity(elements.len());
                    for element in elements {
                        values.push(self.eval(element, scope).await?);
                    }
                    Ok(Value::List(values))
                }
                ExprKind::ObjectLiteral(properties) => {
                    let mut map = IndexMap::with_capacity(properties.len());
                    for (key, value_expr) in properties {
                        let value = self.eval(value_expr, scope).await?;
                        map.insert(key.clone(), value);
                    }
                    Ok(Value::Object(map))
                }
                ExprKind::Index { object, index } => {
                    let Value::List(items) = self.eval(object, scope).await? else {
                        return Err(NuwaError::type_error(
                            "Cannot access index on non-list value",
                            position,
                        ));
                    };
                    let index_value = self.eval(index, scope).await?;
                    index_list(items, &index_value, position)
                }
                ExprKind::Member { object, property } => {
                    let Value::Object(mut map) = self.eval(object, scope).await? else {
                        return Err(NuwaError::member_access(
                            format!("Cannot access property '{property}' on non-object value"),
                            position,
                        ));
                    };
                    map.swap_remove(property.as_str()).ok_or_else(|| {
                        NuwaError::member_access(
                            format!("Property '{property}' does not exist"),
                            position,
                        )
                    })
                }
            }
        })
    }

    /// Shared path of the `CALL` statement and the `CALL` expression.
    async fn invoke_tool(
        &self,
        name: &str,
        args: &IndexMap<String, Expr>,
        scope: &mut Scope,
        position: Position,
    ) -> Result<Value> {
        let tool = self
            .tools
            .lookup(name)
            .ok_or_else(|| NuwaError::ToolNotFound {
                tool: name.to_string(),
                position: Some(position),
            })?;

        let mut evaluated = IndexMap::with_capacity(args.len());
        for (arg, expr) in args {
            let value = self.eval(expr, scope).await?;
            evaluated.insert(arg.clone(), value);
        }

        tracing::debug!(tool = name, args = evaluated.len(), "invoking tool");
        match tool.execute(evaluated).await {
            Ok(value) => Ok(value),
            Err(ToolError::InvalidArguments(message)) => {
                tracing::debug!(tool = name, %message, "tool rejected arguments");
                Err(NuwaError::ToolArgument {
                    tool: name.to_string(),
                    message,
                    position: Some(position),
                })
            }
            Err(ToolError::Failed(message)) => {
                tracing::debug!(tool = name, %message, "tool failed");
                Err(NuwaError::ToolExecution {
                    tool: name.to_string(),
                    message,
                    position: Some(position),
                })
            }
        }
    }
}

fn binary(op: BinaryOp, left: Value, right: Value, position: Position) -> Result<Value> {
    use BinaryOp::*;
    match op {
        Equal => Ok(Value::Bool(left == right)),
        NotEqual => Ok(Value::Bool(left != right)),
        And | Or => match (&left, &right) {
            (Value::Bool(a), Value::Bool(b)) => {
                Ok(Value::Bool(if op == And { *a && *b } else { *a || *b }))
            }
            _ => Err(operand_error(op, "boolean", &left, &right, position)),
        },
        Less | LessEqual | Greater | GreaterEqual => {
            let (a, b) = numbers(op, &left, &right, position)?;
            Ok(Value::Bool(match op {
                Less => a < b,
                LessEqual => a <= b,
                Greater => a > b,
                _ => a >= b,
            }))
        }
        Add | Sub | Mul | Div | Mod => {
            let (a, b) = numbers(op, &left, &right, position)?;
            if matches!(op, Div | Mod) && b == 0.0 {
                return Err(NuwaError::DivisionByZero {
                    position: Some(position),
                });
            }
            Ok(Value::Number(match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => a % b,
            }))
        }
    }
}

fn numbers(op: BinaryOp, left: &Value, right: &Value, position: Position) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(operand_error(op, "number", left, right, position)),
    }
}

fn operand_error(
    op: BinaryOp,
    expected: &str,
    left: &Value,
    right: &Value,
    position: Position,
) -> NuwaError {
    NuwaError::type_error(
        format!(
            "Operator '{}' requires {expected} operands, found {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ),
        position,
    )
}

fn unary(op: UnaryOp, value: Value, position: Position) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Plus, Value::Number(n)) => Ok(Value::Number(n)),
        (UnaryOp::Not, other) => Err(NuwaError::type_error(
            format!("Operator 'NOT' requires a boolean operand, found {}", other.type_name()),
            position,
        )),
        (op, other) => Err(NuwaError::type_error(
            format!(
                "Unary '{}' requires a number operand, found {}",
                op.symbol(),
                other.type_name()
            ),
            position,
        )),
    }
}

fn index_list(items: Vec<Value>, index: &Value, position: Position) -> Result<Value> {
    let n = match index {
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => *n,
        _ => {
            return Err(NuwaError::type_error(
                "List index must be an integer",
                position,
            ));
        }
    };
    if n < 0.0 || n >= items.len() as f64 {
        return Err(NuwaError::IndexOutOfBounds {
            index: n as i64,
            length: items.len(),
            position: Some(position),
        });
    }
    Ok(items.into_iter().nth(n as usize).unwrap_or(Value::Null))
}
