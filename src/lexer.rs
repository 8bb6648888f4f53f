use std::fmt;

use crate::diagnostics::{NuwaError, Position, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Let,
    Call,
    If,
    Then,
    Else,
    For,
    In,
    Do,
    End,
    And,
    Or,
    Not,
    True,
    False,
    Null,
    Now,
    Print,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Let => "LET",
            Keyword::Call => "CALL",
            Keyword::If => "IF",
            Keyword::Then => "THEN",
            Keyword::Else => "ELSE",
            Keyword::For => "FOR",
            Keyword::In => "IN",
            Keyword::Do => "DO",
            Keyword::End => "END",
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Not => "NOT",
            Keyword::True => "TRUE",
            Keyword::False => "FALSE",
            Keyword::Null => "NULL",
            Keyword::Now => "NOW",
            Keyword::Print => "PRINT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Keyword(Keyword),
    Assign,
    EqualEqual,
    BangEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Colon,
    Comma,
    Dot,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Keyword(keyword) => keyword.as_str(),
            TokenKind::Assign => "'='",
            TokenKind::EqualEqual => "'=='",
            TokenKind::BangEqual => "'!='",
            TokenKind::Greater => "'>'",
            TokenKind::GreaterEqual => "'>='",
            TokenKind::Less => "'<'",
            TokenKind::LessEqual => "'<='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Colon => "':'",
            TokenKind::Comma => "','",
            TokenKind::Dot => "'.'",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// A lexed token. For string literals `lexeme` holds the unescaped contents.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub position: Position,
}

impl Token {
    /// How the token is named in parser errors.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::String => format!("string \"{}\"", self.lexeme),
            _ => format!("'{}'", self.lexeme),
        }
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).tokenize()
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>,
    current: usize,
    peeked: Option<(usize, char)>,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices(),
            current: 0,
            peeked: None,
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = if let Some((idx, ch)) = self.peeked.take() {
            Some((idx, ch))
        } else {
            self.chars.next()
        };
        if let Some((idx, ch)) = next {
            self.current = idx + ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            Some((idx, ch))
        } else {
            None
        }
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    /// Character after the peeked one.
    fn peek_second(&mut self) -> Option<char> {
        self.peek();
        self.chars.clone().next().map(|(_, ch)| ch)
    }

    fn match_next(&mut self, expected: char) -> bool {
        match self.peek() {
            Some((_, ch)) if ch == expected => {
                self.bump();
                true
            }
            _ => false,
        }
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some((_, ch)) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else if ch == '/' && self.peek_second() == Some('/') {
                while let Some((_, ch)) = self.peek() {
                    if ch == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn identifier_or_keyword(&mut self, start: usize, position: Position) -> Token {
        while let Some((_, ch)) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let lexeme = self.source[start..self.current].to_string();
        let kind = keyword_for(&lexeme)
            .map(TokenKind::Keyword)
            .unwrap_or(TokenKind::Identifier);
        Token {
            kind,
            lexeme,
            position,
        }
    }

    fn number_literal(&mut self, start: usize, position: Position) -> Token {
        while let Some((_, '0'..='9')) = self.peek() {
            self.bump();
        }
        if let Some((_, '.')) = self.peek() {
            if matches!(self.peek_second(), Some('0'..='9')) {
                self.bump();
                while let Some((_, '0'..='9')) = self.peek() {
                    self.bump();
                }
            }
        }
        Token {
            kind: TokenKind::Number,
            lexeme: self.source[start..self.current].to_string(),
            position,
        }
    }

    fn string_literal(&mut self, quote: char, position: Position) -> Result<Token> {
        let mut value = String::new();
        while let Some((_, ch)) = self.bump() {
            match ch {
                c if c == quote => {
                    return Ok(Token {
                        kind: TokenKind::String,
                        lexeme: value,
                        position,
                    });
                }
                '\\' => {
                    let escape_at = self.here();
                    let Some((_, esc)) = self.bump() else {
                        break;
                    };
                    match esc {
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        '0' => value.push('\0'),
                        '"' => value.push('"'),
                        '\'' => value.push('\''),
                        '\\' => value.push('\\'),
                        '/' => value.push('/'),
                        'u' => value.push(self.unicode_escape(escape_at)?),
                        other => {
                            return Err(NuwaError::Lexer {
                                message: format!("Invalid escape sequence '\\{other}'"),
                                position: escape_at,
                            });
                        }
                    }
                }
                _ => value.push(ch),
            }
        }
        Err(NuwaError::Lexer {
            message: "Unterminated string literal".to_string(),
            position,
        })
    }

    fn unicode_escape(&mut self, escape_at: Position) -> Result<char> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .peek()
                .and_then(|(_, ch)| ch.to_digit(16))
                .ok_or_else(|| NuwaError::Lexer {
                    message: "Expected four hex digits after '\\u'".to_string(),
                    position: escape_at,
                })?;
            self.bump();
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| NuwaError::Lexer {
            message: format!("Invalid unicode escape '\\u{code:04x}'"),
            position: escape_at,
        })
    }

    fn simple_token(&self, start: usize, kind: TokenKind, position: Position) -> Token {
        Token {
            kind,
            lexeme: self.source[start..self.current].to_string(),
            position,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let position = self.here();
            let (start, ch) = match self.bump() {
                Some(pair) => pair,
                None => {
                    tokens.push(Token {
                        kind: TokenKind::Eof,
                        lexeme: String::new(),
                        position,
                    });
                    break;
                }
            };

            let token = match ch {
                'a'..='z' | 'A'..='Z' | '_' => self.identifier_or_keyword(start, position),
                '0'..='9' => self.number_literal(start, position),
                '"' | '\'' => self.string_literal(ch, position)?,
                '(' => self.simple_token(start, TokenKind::LParen, position),
                ')' => self.simple_token(start, TokenKind::RParen, position),
                '{' => self.simple_token(start, TokenKind::LBrace, position),
                '}' => self.simple_token(start, TokenKind::RBrace, position),
                '[' => self.simple_token(start, TokenKind::LBracket, position),
                ']' => self.simple_token(start, TokenKind::RBracket, position),
                ',' => self.simple_token(start, TokenKind::Comma, position),
                '.' => self.simple_token(start, TokenKind::Dot, position),
                ':' => self.simple_token(start, TokenKind::Colon, position),
                '+' => self.simple_token(start, TokenKind::Plus, position),
                '-' => self.simple_token(start, TokenKind::Minus, position),
                '*' => self.simple_token(start, TokenKind::Star, position),
                '/' => self.simple_token(start, TokenKind::Slash, position),
                '%' => self.simple_token(start, TokenKind::Percent, position),
                '=' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::EqualEqual, position)
                    } else {
                        self.simple_token(start, TokenKind::Assign, position)
                    }
                }
                '!' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::BangEqual, position)
                    } else {
                        return Err(NuwaError::Lexer {
                            message: "Unexpected character '!' (use NOT for negation)".to_string(),
                            position,
                        });
                    }
                }
                '<' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::LessEqual, position)
                    } else {
                        self.simple_token(start, TokenKind::Less, position)
                    }
                }
                '>' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::GreaterEqual, position)
                    } else {
                        self.simple_token(start, TokenKind::Greater, position)
                    }
                }
                other => {
                    return Err(NuwaError::Lexer {
                        message: format!("Unexpected character '{other}'"),
                        position,
                    });
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn keyword_for(ident: &str) -> Option<Keyword> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "LET" => Kw::Let,
        "CALL" => Kw::Call,
        "IF" => Kw::If,
        "THEN" => Kw::Then,
        "ELSE" => Kw::Else,
        "FOR" => Kw::For,
        "IN" => Kw::In,
        "DO" => Kw::Do,
        "END" => Kw::End,
        "AND" => Kw::And,
        "OR" => Kw::Or,
        "NOT" => Kw::Not,
        "TRUE" => Kw::True,
        "FALSE" => Kw::False,
        "NULL" => Kw::Null,
        "NOW" => Kw::Now,
        "PRINT" => Kw::Print,
        _ => return None,
    };
    Some(keyword)
}
