use std::fmt;

use thiserror::Error;

/// 1-based line/column of a character in the script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

struct Located(Option<Position>);

impl fmt::Display for Located {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(position) => write!(f, " (at {position})"),
            None => Ok(()),
        }
    }
}

fn located(position: &Option<Position>) -> Located {
    Located(*position)
}

/// Every failure a NuwaScript run can end with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NuwaError {
    #[error("{message} (at {position})")]
    Lexer { message: String, position: Position },

    #[error("{message}, found {found} (at {position})")]
    Parser {
        message: String,
        found: String,
        position: Position,
    },

    #[error("Undefined variable '{name}'{}", located(.position))]
    UndefinedVariable {
        name: String,
        position: Option<Position>,
    },

    #[error("{message}{}", located(.position))]
    Type {
        message: String,
        position: Option<Position>,
    },

    #[error("{message}{}", located(.position))]
    MemberAccess {
        message: String,
        position: Option<Position>,
    },

    #[error("Index {index} out of bounds for list of length {length}{}", located(.position))]
    IndexOutOfBounds {
        index: i64,
        length: usize,
        position: Option<Position>,
    },

    #[error("Division by zero{}", located(.position))]
    DivisionByZero { position: Option<Position> },

    #[error("IF condition must evaluate to a boolean, found {found}{}", located(.position))]
    InvalidCondition {
        found: &'static str,
        position: Option<Position>,
    },

    #[error("FOR loop expects a list to iterate over, found {found}{}", located(.position))]
    InvalidIterable {
        found: &'static str,
        position: Option<Position>,
    },

    #[error("Tool '{tool}' not found{}", located(.position))]
    ToolNotFound {
        tool: String,
        position: Option<Position>,
    },

    #[error("Invalid arguments for tool '{tool}': {message}{}", located(.position))]
    ToolArgument {
        tool: String,
        message: String,
        position: Option<Position>,
    },

    #[error("Tool '{tool}' failed: {message}{}", located(.position))]
    ToolExecution {
        tool: String,
        message: String,
        position: Option<Position>,
    },

    #[error("{message}{}", located(.position))]
    Runtime {
        message: String,
        position: Option<Position>,
    },
}

pub type Result<T> = std::result::Result<T, NuwaError>;

impl NuwaError {
    pub fn type_error(message: impl Into<String>, position: Position) -> Self {
        Self::Type {
            message: message.into(),
            position: Some(position),
        }
    }

    pub fn runtime(message: impl Into<String>, position: Option<Position>) -> Self {
        Self::Runtime {
            message: message.into(),
            position,
        }
    }

    pub fn member_access(message: impl Into<String>, position: Position) -> Self {
        Self::MemberAccess {
            message: message.into(),
            position: Some(position),
        }
    }

    /// Taxonomy name shown to hosts, e.g. `TypeError`.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Lexer { .. } => "LexerError",
            Self::Parser { .. } => "ParserError",
            Self::UndefinedVariable { .. } => "UndefinedVariableError",
            Self::Type { .. } => "TypeError",
            Self::MemberAccess { .. } => "MemberAccessError",
            Self::IndexOutOfBounds { .. } => "IndexOutOfBoundsError",
            Self::DivisionByZero { .. } => "DivisionByZeroError",
            Self::InvalidCondition { .. } => "InvalidConditionError",
            Self::InvalidIterable { .. } => "InvalidIterableError",
            Self::ToolNotFound { .. } => "ToolNotFoundError",
            Self::ToolArgument { .. } => "ToolArgumentError",
            Self::ToolExecution { .. } => "ToolExecutionError",
            Self::Runtime { .. } => "RuntimeError",
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            Self::Lexer { position, .. } | Self::Parser { position, .. } => Some(*position),
            Self::UndefinedVariable { position, .. }
            | Self::Type { position, .. }
            | Self::MemberAccess { position, .. }
            | Self::IndexOutOfBounds { position, .. }
            | Self::DivisionByZero { position }
            | Self::InvalidCondition { position, .. }
            | Self::InvalidIterable { position, .. }
            | Self::ToolNotFound { position, .. }
            | Self::ToolArgument { position, .. }
            | Self::ToolExecution { position, .. }
            | Self::Runtime { position, .. } => *position,
        }
    }

    /// Attaches `at` to a runtime error that was raised without a position.
    pub fn or_position(mut self, at: Position) -> Self {
        match &mut self {
            Self::Lexer { .. } | Self::Parser { .. } => {}
            Self::UndefinedVariable { position, .. }
            | Self::Type { position, .. }
            | Self::MemberAccess { position, .. }
            | Self::IndexOutOfBounds { position, .. }
            | Self::DivisionByZero { position }
            | Self::InvalidCondition { position, .. }
            | Self::InvalidIterable { position, .. }
            | Self::ToolNotFound { position, .. }
            | Self::ToolArgument { position, .. }
            | Self::ToolExecution { position, .. }
            | Self::Runtime { position, .. } => {
                position.get_or_insert(at);
            }
        }
        self
    }

    pub fn is_tool_error(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound { .. } | Self::ToolArgument { .. } | Self::ToolExecution { .. }
        )
    }

    pub fn is_syntax_error(&self) -> bool {
        matches!(self, Self::Lexer { .. } | Self::Parser { .. })
    }
}

/// Human-facing report that points at the script line an error came from.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: &'static str,
    pub message: String,
    pub position: Option<Position>,
    pub source_line: Option<String>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(error: &NuwaError, source: &str) -> Self {
        let position = error.position();
        let source_line = position.and_then(|pos| {
            source
                .lines()
                .nth(pos.line.saturating_sub(1) as usize)
                .map(str::to_string)
        });
        let mut diagnostic = Self {
            kind: error.kind_name(),
            message: error.to_string(),
            position,
            source_line,
            notes: Vec::new(),
        };
        if error.is_tool_error() {
            diagnostic = diagnostic.with_note("raised by the tool layer, not by the script itself");
        }
        diagnostic
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let (Some(position), Some(line)) = (self.position, &self.source_line) {
            let gutter = position.line.to_string();
            let pad = " ".repeat(gutter.len());
            let caret_offset: String = line
                .chars()
                .take(position.column.saturating_sub(1) as usize)
                .map(|ch| if ch == '\t' { '\t' } else { ' ' })
                .collect();
            writeln!(f)?;
            writeln!(f, "{pad} --> {position}")?;
            writeln!(f, "{pad} |")?;
            writeln!(f, "{gutter} | {line}")?;
            write!(f, "{pad} | {caret_offset}^")?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}
