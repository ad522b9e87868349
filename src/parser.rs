use crate::ast::{BinaryOp, Expr, Literal};
use crate::lex::{Error as LexerError, Lexer, Token, TokenType};

impl TryFrom<&Token> for BinaryOp {
    type Error = Error;
    fn try_from(value: &Token) -> Result<Self, Self::Error> {
        match value.ty {
            TokenType::Plus => Ok(BinaryOp::Add),
            TokenType::Minus => Ok(BinaryOp::Sub),
            TokenType::Asterisk => Ok(BinaryOp::Mul),
            TokenType::ForwardSlash => Ok(BinaryOp::Div),
            TokenType::Percent => Ok(BinaryOp::Mod),
            TokenType::Equals => Ok(BinaryOp::Eq),
            TokenType::NotEquals => Ok(BinaryOp::Ne),
            TokenType::LT => Ok(BinaryOp::Lt),
            TokenType::LTE => Ok(BinaryOp::Le),
            TokenType::GT => Ok(BinaryOp::Gt),
            TokenType::GTE => Ok(BinaryOp::Ge),
            TokenType::Ampersand => Ok(BinaryOp::Concat),
            TokenType::And => Ok(BinaryOp::And),
            TokenType::Or => Ok(BinaryOp::Or),
            _ => Err(Error::UnexpectedToken(value.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Returned when the input is empty (or just whitespace)
    #[error("Empty input")]
    NoExpression,
    #[error("Lexical error: {0}")]
    Lexical(#[from] LexerError),
    #[error("Missing closing parenthesis")]
    MissingCloseParen,
    #[error("Unexpected token {:?} at {}", .0.ty, .0.start())]
    UnexpectedToken(Token),
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Formula is nested more than {0} levels deep")]
    TooDeep(usize),
}

/// Nesting allowed by [parse]. Deeper input is rejected before the
///  recursion can exhaust the stack.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Parses formula text into an expression tree.
pub fn parse(input: &str) -> Result<Expr, Error> {
    parse_with_max_depth(input, DEFAULT_MAX_DEPTH)
}

/// Parses formula text, failing with [Error::TooDeep] once parentheses,
///  calls or operators nest more than `max_depth` levels.
pub fn parse_with_max_depth(input: &str, max_depth: usize) -> Result<Expr, Error> {
    let mut lexer = Lexer::new(input.as_bytes());
    if lexer.peek_token()?.is_none() {
        return Err(Error::NoExpression);
    }

    let mut depth = Depth { current: 0, max: max_depth };
    let root = parse_binary_op(&mut lexer, &mut depth, 0)?;

    // Make sure we've completely parsed the input
    match lexer.next_token()? {
        Some(tok) => Err(Error::UnexpectedToken(tok)),
        None => Ok(root),
    }
}

/// Recursion guard shared by the parse functions.
struct Depth {
    current: usize,
    max: usize,
}

fn parse_binary_op(lexer: &mut Lexer<'_>, depth: &mut Depth, min_binding_power: u8) -> Result<Expr, Error> {
    if depth.current >= depth.max {
        return Err(Error::TooDeep(depth.max));
    }
    depth.current += 1;
    let expr = parse_nested(lexer, depth, min_binding_power);
    depth.current -= 1;
    expr
}

fn parse_nested(lexer: &mut Lexer<'_>, depth: &mut Depth, min_binding_power: u8) -> Result<Expr, Error> {
    let lhs = lexer.next_token()?.ok_or(Error::UnexpectedEof)?;
    let mut lhs = match lhs.ty {
        // Open paren: parse the internal expression and expect a closing paren
        TokenType::ParenLeft => {
            let inner = parse_binary_op(lexer, depth, 0)?;
            if !lexer.consume(TokenType::ParenRight)? {
                return Err(Error::MissingCloseParen);
            }
            inner
        }

        // Prefix '-', '+' or '!'
        TokenType::Minus | TokenType::Plus | TokenType::Bang => {
            let Some(((), pow)) = prefix_binding(lhs.ty) else {
                return Err(Error::UnexpectedToken(lhs));
            };
            let operand = parse_binary_op(lexer, depth, pow)?;
            apply_prefix(lhs.ty, operand)
        }

        // TRUE() and FALSE() are also spelled as functions
        TokenType::True | TokenType::False
            if matches!(
                lexer.peek_token()?,
                Some(Token {
                    ty: TokenType::ParenLeft,
                    ..
                })
            ) =>
        {
            parse_fn_call(lexer, depth, &lhs)?
        }

        TokenType::Number
        | TokenType::StringSingleQuote
        | TokenType::StringDoubleQuote
        | TokenType::True
        | TokenType::False
        | TokenType::Null => parse_literal(lexer, &lhs),

        TokenType::CurlyIdentifier => Expr::Identifier(text(lexer.contents(&lhs))),

        // Either a column reference or a function call
        TokenType::Identifier => {
            if let Some(Token {
                ty: TokenType::ParenLeft,
                ..
            }) = lexer.peek_token()?
            {
                parse_fn_call(lexer, depth, &lhs)?
            } else {
                Expr::Identifier(text(lexer.contents(&lhs)))
            }
        }
        _ => return Err(Error::UnexpectedToken(lhs)),
    };

    // now that we have our left side, expect a series of operators or EOF.
    //  Each operator nests the tree one level deeper on the left.
    let mut chained = 0;
    loop {
        let Some(op_tok) = lexer.peek_token()? else {
            break;
        };

        let Some((l_pow, r_pow)) = infix_binding(op_tok.ty) else {
            break;
        };

        if l_pow < min_binding_power {
            break;
        }

        let op = BinaryOp::try_from(&op_tok)?;

        // Consume the operator token
        _ = lexer.next_token()?;

        let rhs = parse_binary_op(lexer, depth, r_pow)?;
        lhs = Expr::binary(op, lhs, rhs);
        chained += 1;
        if depth.current + chained > depth.max {
            return Err(Error::TooDeep(depth.max));
        }
    }

    Ok(lhs)
}

/// Negative number literals stay literals; any other negation becomes
///  `0 - x` and logical NOT becomes a `NOT` call, so the tree keeps its four
///  node kinds.
fn apply_prefix(ty: TokenType, operand: Expr) -> Expr {
    match (ty, operand) {
        (TokenType::Minus, Expr::Literal(Literal::Number(n))) => {
            let negated = match n.strip_prefix('-') {
                Some(positive) => positive.to_string(),
                None => format!("-{n}"),
            };
            Expr::Literal(Literal::Number(negated))
        }
        (TokenType::Minus, operand) => Expr::binary(BinaryOp::Sub, Expr::number(0), operand),
        (TokenType::Bang, operand) => Expr::call("NOT", vec![operand]),
        (_, operand) => operand,
    }
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Resolves backslash escapes inside a quoted string body.
fn unescape(body: &[u8]) -> String {
    let raw = text(body);
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn parse_literal(lexer: &Lexer<'_>, token: &Token) -> Expr {
    match token.ty {
        TokenType::True => Expr::Literal(Literal::Bool(true)),
        TokenType::False => Expr::Literal(Literal::Bool(false)),
        TokenType::Null => Expr::Literal(Literal::Null),
        TokenType::Number => Expr::Literal(Literal::Number(text(lexer.contents(token)))),
        _ => Expr::Literal(Literal::String(unescape(lexer.contents(token)))),
    }
}

fn parse_fn_call(lexer: &mut Lexer<'_>, depth: &mut Depth, name_token: &Token) -> Result<Expr, Error> {
    // We've already popped the function name [name_token], so expect a ParenLeft
    if !lexer.consume(TokenType::ParenLeft)? {
        return Err(Error::UnexpectedEof);
    }

    // Zero or more arguments
    let mut args = Vec::new();
    loop {
        // Peek to see if we're getting a right paren to end the list
        let t = lexer.peek_token()?.ok_or(Error::UnexpectedEof)?;
        if t.ty == TokenType::ParenRight {
            _ = lexer.next_token();
            break;
        }

        // If this isn't the first argument, expect a comma
        if !args.is_empty() && !lexer.consume(TokenType::Comma)? {
            return Err(Error::UnexpectedToken(t));
        }

        // For the actual argument we'll leave the token(s) in the lexer and
        //  let parse_binary_op do the work. This is why we only peeked above.
        args.push(parse_binary_op(lexer, depth, 0)?);
    }

    Ok(Expr::Call {
        callee: text(lexer.contents(name_token)),
        args,
    })
}

// NOTE prefix_binding and infix_binding specify the "binding power" of the
//  various prefix and infix operators. Binding power is a more intuitive
//  version of "precedence": higher binding power means the operator binds
//  more tightly. So multiplication has a higher binding power than addition.
fn prefix_binding(ty: TokenType) -> Option<((), u8)> {
    match ty {
        TokenType::Plus | TokenType::Minus => Some(((), 90)),
        TokenType::Bang => Some(((), 30)),
        _ => None,
    }
}

// NOTE for infix bindings we specify a left and right side of the operator,
//  this slight asymmetry prevents us from getting stuck on ties and makes
//  every operator left associative.
fn infix_binding(ty: TokenType) -> Option<(u8, u8)> {
    match ty {
        TokenType::Asterisk | TokenType::ForwardSlash | TokenType::Percent => Some((60, 61)),
        TokenType::Plus | TokenType::Minus => Some((50, 51)),
        TokenType::Ampersand => Some((45, 46)),
        TokenType::Equals
        | TokenType::NotEquals
        | TokenType::LT
        | TokenType::LTE
        | TokenType::GT
        | TokenType::GTE => Some((40, 41)),
        TokenType::And => Some((20, 21)),
        TokenType::Or => Some((10, 11)),
        _ => None,
    }
}
