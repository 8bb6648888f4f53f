use nuwa_script::{
    ast::{ExprKind, Stmt, StmtKind},
    lexer::{Keyword, TokenKind},
    parser::{parse, parse_expression, parse_tokens, MAX_NESTING},
    tokenize, Diagnostic, NuwaError, Position, Value,
};
use pretty_assertions::assert_eq;

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
        .expect("source should tokenize")
        .into_iter()
        .map(|token| token.kind)
        .collect()
}

fn printed(source: &str) -> String {
    parse_expression(source)
        .expect("expression should parse")
        .to_string()
}

fn parse_error(source: &str) -> (String, String, Position) {
    match parse(source) {
        Ok(script) => panic!("expected parse error, got:\n{script}"),
        Err(NuwaError::Parser {
            message,
            found,
            position,
        }) => (message, found, position),
        Err(other) => panic!("expected ParserError, found {other}"),
    }
}

#[test]
fn tokens_carry_line_and_column() {
    let tokens = tokenize("LET x = \"hi\"\n  y // trailing\n").expect("tokenize");
    let summary: Vec<(TokenKind, &str, u32, u32)> = tokens
        .iter()
        .map(|tok| {
            (
                tok.kind,
                tok.lexeme.as_str(),
                tok.position.line,
                tok.position.column,
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (TokenKind::Keyword(Keyword::Let), "LET", 1, 1),
            (TokenKind::Identifier, "x", 1, 5),
            (TokenKind::Assign, "=", 1, 7),
            (TokenKind::String, "hi", 1, 9),
            (TokenKind::Identifier, "y", 2, 3),
            (TokenKind::Eof, "", 3, 1),
        ]
    );
}

#[test]
fn recognizes_operators_and_punctuation() {
    assert_eq!(
        kinds("= == != > >= < <= + - * / % { } [ ] ( ) : , ."),
        vec![
            TokenKind::Assign,
            TokenKind::EqualEqual,
            TokenKind::BangEqual,
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::Percent,
            TokenKind::LBrace,
            TokenKind::RBrace,
            TokenKind::LBracket,
            TokenKind::RBracket,
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::Colon,
            TokenKind::Comma,
            TokenKind::Dot,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn keywords_are_uppercase_only() {
    assert_eq!(
        kinds("IF if NOW now_ish"),
        vec![
            TokenKind::Keyword(Keyword::If),
            TokenKind::Identifier,
            TokenKind::Keyword(Keyword::Now),
            TokenKind::Identifier,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn numbers_and_member_dots() {
    let tokens = tokenize("3.25 7.x").expect("tokenize");
    let lexemes: Vec<&str> = tokens.iter().map(|tok| tok.lexeme.as_str()).collect();
    assert_eq!(lexemes, vec!["3.25", "7", ".", "x", ""]);
}

#[test]
fn string_escapes_are_decoded() {
    let tokens = tokenize(r#"'it\'s' "a\n\t\"b\"\\ \u00e9""#).expect("tokenize");
    assert_eq!(tokens[0].lexeme, "it's");
    assert_eq!(tokens[1].lexeme, "a\n\t\"b\"\\ é");
}

#[test]
fn lexer_errors_carry_positions() {
    assert_eq!(
        tokenize("LET s = \"abc").unwrap_err(),
        NuwaError::Lexer {
            message: "Unterminated string literal".to_string(),
            position: Position::new(1, 9),
        }
    );

    let err = tokenize("LET a = 1\nLET b = #").unwrap_err();
    assert_eq!(err.position(), Some(Position::new(2, 9)));
    assert!(err.to_string().contains("Unexpected character '#'"));

    let err = tokenize("\"bad \\q\"").unwrap_err();
    assert!(err.to_string().contains("Invalid escape sequence"));

    let err = tokenize("!TRUE").unwrap_err();
    assert_eq!(err.kind_name(), "LexerError");
}

#[test]
fn precedence_climbs_from_or_to_unary() {
    assert_eq!(printed("1 + 2 * 3"), "(1 + (2 * 3))");
    assert_eq!(printed("1 - 2 - 3"), "((1 - 2) - 3)");
    assert_eq!(
        printed("a == b OR c < d AND e"),
        "((a == b) OR ((c < d) AND e))"
    );
    assert_eq!(printed("NOT a AND b"), "((NOT a) AND b)");
    assert_eq!(printed("- - 1"), "(-(-1))");
    assert_eq!(printed("-a.b"), "(-a.b)");
    assert_eq!(printed("(1 + 2) % 3"), "((1 + 2) % 3)");
}

#[test]
fn postfix_chains_nest_left_to_right() {
    let expr = parse_expression("a.b[0].c").expect("parse");
    assert_eq!(expr.to_string(), "a.b[0].c");
    let ExprKind::Member { object, property } = &expr.kind else {
        panic!("expected member access, found {expr}");
    };
    assert_eq!(property, "c");
    assert!(matches!(object.kind, ExprKind::Index { .. }));
    assert_eq!(expr.position, Position::new(1, 7));
}

#[test]
fn primary_forms() {
    assert_eq!(printed("[1, 2,]"), "[1, 2]");
    assert_eq!(printed("{a: 1, \"b c\": TRUE}"), "{\"a\": 1, \"b c\": TRUE}");
    assert_eq!(printed("NOW()"), "NOW()");
    assert_eq!(printed("FORMAT(\"x\", {})"), "FORMAT(\"x\", {})");
    assert_eq!(
        printed("CALL search { query: q, limit: 5 }"),
        "(CALL search { query: q, limit: 5 })"
    );
    assert_eq!(printed("CALL ping {}"), "(CALL ping {})");
    assert_eq!(printed("NULL"), "NULL");
}

#[test]
fn statements_dispatch_on_leading_token() {
    let script = parse(
        r#"
        LET a = 1
        CALL log { message: "hi" }
        IF a > 0 THEN PRINT(a) ELSE PRINT(0) END
        FOR item IN [1, 2] DO END
        PRINT("done")
        "#,
    )
    .expect("script should parse");
    assert_eq!(script.len(), 5);
    assert!(matches!(script.statements[0].kind, StmtKind::Let { .. }));
    assert!(matches!(script.statements[1].kind, StmtKind::Call { .. }));
    assert!(matches!(
        script.statements[2].kind,
        StmtKind::If {
            else_branch: Some(_),
            ..
        }
    ));
    assert!(matches!(script.statements[3].kind, StmtKind::For { .. }));
    assert!(matches!(script.statements[4].kind, StmtKind::Expr(_)));
    assert_eq!(script.statements[1].position, Position::new(3, 9));
}

#[test]
fn duplicate_tool_arguments_keep_the_last_value() {
    let script = parse("CALL t { a: 1, b: 2, a: 3 }").expect("parse");
    let StmtKind::Call { tool, args } = &script.statements[0].kind else {
        panic!("expected CALL statement");
    };
    assert_eq!(tool, "t");
    assert_eq!(args.keys().cloned().collect::<Vec<_>>(), vec!["a", "b"]);
    assert!(matches!(
        &args["a"].kind,
        ExprKind::Literal(Value::Number(n)) if *n == 3.0
    ));
}

#[test]
fn parser_errors_name_the_offending_token() {
    assert_eq!(
        parse_error("LET = 5"),
        (
            "Expected variable name after LET".to_string(),
            "'='".to_string(),
            Position::new(1, 5),
        )
    );

    let (message, found, _) = parse_error("IF TRUE THEN LET a = 1");
    assert_eq!(message, "Expected ELSE or END to close IF");
    assert_eq!(found, "end of input");

    let (message, _, position) = parse_error("FOR x [1] DO END");
    assert_eq!(message, "Expected IN");
    assert_eq!(position, Position::new(1, 7));

    let (message, _, _) = parse_error("CALL tool (a: 1)");
    assert_eq!(message, "Expected '{' to start tool arguments");

    let (message, found, _) = parse_error("LET a = {1: 2}");
    assert_eq!(message, "Expected property name (identifier or string)");
    assert_eq!(found, "'1'");
}

#[test]
fn expression_statement_errors_are_not_masked() {
    let (message, found, position) = parse_error("LET a = 1\n)");
    assert_eq!(message, "Expected an expression");
    assert_eq!(found, "')'");
    assert_eq!(position, Position::new(2, 1));

    let err = parse_expression("1 2").unwrap_err();
    assert!(err.to_string().contains("Expected end of expression"));
}

#[test]
fn deep_nesting_is_a_parser_error() {
    let depth = 100_000;
    let cases = [
        format!("LET a = {}1{}", "(".repeat(depth), ")".repeat(depth)),
        format!("LET a = {}1", "-".repeat(depth)),
        format!("LET a = 1{}", " + 1".repeat(10_000)),
        format!("LET a = x{}", ".y".repeat(10_000)),
        format!("LET a = {}1{}", "[".repeat(depth), "]".repeat(depth)),
        format!("{}PRINT(1){}", "IF TRUE THEN ".repeat(1_000), " END".repeat(1_000)),
    ];
    for source in &cases {
        let (message, _, _) = parse_error(source);
        assert!(message.contains("nested too deeply"), "{message}");
    }

    let err = parse_expression(&"NOT ".repeat(depth)).unwrap_err();
    assert!(err.is_syntax_error());
}

#[test]
fn moderate_nesting_still_parses() {
    let depth = MAX_NESTING / 2;
    let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(printed(&source), "1");

    let sum = format!("1{}", " + 1".repeat(depth));
    assert!(parse_expression(&sum).is_ok());

    let blocks = format!("{}PRINT(1){}", "IF TRUE THEN ".repeat(20), " END".repeat(20));
    assert_eq!(parse(&blocks).expect("nested blocks should parse").len(), 1);
}

#[test]
fn syntax_errors_are_told_apart_from_runtime_errors() {
    assert!(tokenize("LET a = #").unwrap_err().is_syntax_error());
    assert!(parse("LET = 1").unwrap_err().is_syntax_error());
    assert!(!NuwaError::type_error("boom", Position::new(1, 1)).is_syntax_error());
}

#[test]
fn printer_keeps_statement_boundaries() {
    let mut script = parse("LET b = 1 LET a = b NOT TRUE").expect("parse");
    for source in ["[1, 2][0]", "-b"] {
        let expr = parse_expression(source).expect("parse");
        script.statements.push(Stmt {
            position: expr.position,
            kind: StmtKind::Expr(expr),
        });
    }
    let text = script.to_string();
    assert_eq!(text, "LET b = 1\nLET a = (b)\n(NOT TRUE)\n([1, 2][0])\n(-b)\n");

    let reparsed = parse(&text).expect("printed script should parse");
    assert_eq!(reparsed.len(), 5);
    assert_eq!(reparsed.to_string(), text);
}

#[test]
fn parse_tokens_appends_missing_eof() {
    let mut tokens = tokenize("LET a = 1").expect("tokenize");
    tokens.pop();
    let script = parse_tokens(tokens).expect("parse");
    assert_eq!(script.len(), 1);
}

#[test]
fn diagnostic_points_at_source() {
    let source = "LET a = 1\nLET b = a + \"x\"";
    let err = NuwaError::type_error("boom", Position::new(2, 11));
    let report = Diagnostic::new(&err, source).to_string();
    let expected = [
        "TypeError: boom (at line 2, column 11)".to_string(),
        "  --> line 2, column 11".to_string(),
        "  |".to_string(),
        "2 | LET b = a + \"x\"".to_string(),
        format!("  | {}^", " ".repeat(10)),
    ]
    .join("\n");
    assert_eq!(report, expected);
}
