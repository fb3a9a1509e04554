use logos::{self, Logos};
use num_bigint::BigUint;
use thiserror::Error;

//===========================================================================//

/// The maximum number of tokens in a single expression.
pub const MAX_TOKENS: usize = 1024;

/// An error encountered while tokenizing or evaluating an expression.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ExprError {
    /// No token rule matches the input at the given byte offset.
    #[error("no match at position {position}")]
    BadToken {
        /// The byte offset of the first unmatched character.
        position: usize,
    },
    /// The expression has more than [`MAX_TOKENS`] tokens.
    #[error("expression too long")]
    TooLong,
    /// The tokens don't form a valid expression.
    #[error("bad expression")]
    BadExpression,
    /// The parentheses in the expression don't balance.
    #[error("unbalanced parentheses")]
    UnbalancedParens,
    /// The expression names a register that doesn't exist.
    #[error("unknown register ${0}")]
    UnknownRegister(String),
    /// The expression divides by zero.
    #[error("division by zero")]
    DivideByZero,
    /// The expression dereferences an address that can't be read.
    #[error("cannot read memory at 0x{0:08x}")]
    BadAddress(u32),
}

//===========================================================================//

/// The machine state that an expression can refer to.
pub trait ExprEnv {
    /// Returns the value of the named register (without the leading `$`),
    /// or `None` if there is no such register.
    fn register(&self, name: &str) -> Option<u32>;

    /// Reads the 32-bit word at the given address, or returns `None` if it
    /// can't be read.
    fn read_word(&self, addr: u32) -> Option<u32>;
}

//===========================================================================//

fn truncate(value: BigUint) -> u32 {
    value.iter_u32_digits().next().unwrap_or(0)
}

fn decimal_callback(lexer: &mut logos::Lexer<RawToken>) -> Option<u32> {
    BigUint::parse_bytes(lexer.slice().as_bytes(), 10).map(truncate)
}

fn hex_callback(lexer: &mut logos::Lexer<RawToken>) -> Option<u32> {
    BigUint::parse_bytes(&lexer.slice().as_bytes()[2..], 16).map(truncate)
}

#[derive(Debug, Eq, Logos, PartialEq)]
#[logos(skip r"[ \t]+")]
enum RawToken {
    #[token("+")]
    Plus,
    #[token("==")]
    Eq,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("!=")]
    Neq,
    #[token("&&")]
    And,
    #[regex(r"\$[a-zA-Z0-9]+")]
    Reg,
    #[regex(r"0x[0-9a-fA-F]+", hex_callback)]
    HexNum(u32),
    #[regex(r"[0-9]+", decimal_callback)]
    Num(u32),
}

//===========================================================================//

/// The kind of a single lexical token in an expression.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TokenKind {
    /// A decimal literal, truncated to 32 bits.
    Num(u32),
    /// A `0x`-prefixed hexadecimal literal, truncated to 32 bits.
    HexNum(u32),
    /// A `$`-prefixed register name.
    Reg,
    /// A "`+`" symbol.
    Plus,
    /// A "`-`" symbol.
    Minus,
    /// A "`*`" symbol used for multiplication.
    Star,
    /// A "`*`" symbol used for dereferencing.
    Deref,
    /// A "`/`" symbol.
    Slash,
    /// A "`==`" symbol.
    Eq,
    /// A "`!=`" symbol.
    Neq,
    /// A "`&&`" symbol.
    And,
    /// A "`(`" symbol.
    ParenOpen,
    /// A "`)`" symbol.
    ParenClose,
}

impl TokenKind {
    /// Returns true if a `*` following this token is a multiplication
    /// rather than a dereference.
    fn ends_operand(self) -> bool {
        matches!(
            self,
            TokenKind::Num(_)
                | TokenKind::HexNum(_)
                | TokenKind::Reg
                | TokenKind::ParenClose
        )
    }

    fn precedence(self) -> Option<u8> {
        match self {
            TokenKind::And => Some(1),
            TokenKind::Eq | TokenKind::Neq => Some(2),
            TokenKind::Plus | TokenKind::Minus => Some(3),
            TokenKind::Star | TokenKind::Slash => Some(4),
            TokenKind::Deref => Some(5),
            _ => None,
        }
    }
}

/// A single lexical token in an expression.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The source text of the token.
    pub text: String,
}

/// Splits an expression into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut lexer = RawToken::lexer(input);
    let mut tokens = Vec::<Token>::new();
    while let Some(result) = lexer.next() {
        let Ok(raw) = result else {
            return Err(ExprError::BadToken { position: lexer.span().start });
        };
        if tokens.len() >= MAX_TOKENS {
            return Err(ExprError::TooLong);
        }
        let kind = match raw {
            RawToken::Plus => TokenKind::Plus,
            RawToken::Eq => TokenKind::Eq,
            RawToken::Minus => TokenKind::Minus,
            RawToken::Star => match tokens.last() {
                Some(prev) if prev.kind.ends_operand() => TokenKind::Star,
                _ => TokenKind::Deref,
            },
            RawToken::Slash => TokenKind::Slash,
            RawToken::ParenOpen => TokenKind::ParenOpen,
            RawToken::ParenClose => TokenKind::ParenClose,
            RawToken::Neq => TokenKind::Neq,
            RawToken::And => TokenKind::And,
            RawToken::Reg => TokenKind::Reg,
            RawToken::HexNum(value) => TokenKind::HexNum(value),
            RawToken::Num(value) => TokenKind::Num(value),
        };
        tokens.push(Token { kind, text: lexer.slice().to_string() });
    }
    Ok(tokens)
}

//===========================================================================//

/// Evaluates an expression against the given machine state.
pub fn evaluate(input: &str, env: &dyn ExprEnv) -> Result<u32, ExprError> {
    let tokens = tokenize(input)?;
    eval(&tokens, env)
}

fn eval(tokens: &[Token], env: &dyn ExprEnv) -> Result<u32, ExprError> {
    match tokens {
        [] => Err(ExprError::BadExpression),
        [token] => eval_operand(token, env),
        _ if is_parenthesized(tokens)? => {
            eval(&tokens[1..tokens.len() - 1], env)
        }
        _ => {
            let op = main_operator(tokens)?;
            let kind = tokens[op].kind;
            if kind == TokenKind::Deref {
                if op != 0 {
                    return Err(ExprError::BadExpression);
                }
                let addr = eval(&tokens[1..], env)?;
                return env.read_word(addr).ok_or(ExprError::BadAddress(addr));
            }
            // Both sides are always evaluated; `&&` does not short-circuit.
            let lhs = eval(&tokens[..op], env);
            let rhs = eval(&tokens[op + 1..], env);
            let (lhs, rhs) = (lhs?, rhs?);
            match kind {
                TokenKind::Plus => Ok(lhs.wrapping_add(rhs)),
                TokenKind::Minus => Ok(lhs.wrapping_sub(rhs)),
                TokenKind::Star => Ok(lhs.wrapping_mul(rhs)),
                TokenKind::Slash => {
                    lhs.checked_div(rhs).ok_or(ExprError::DivideByZero)
                }
                TokenKind::Eq => Ok(u32::from(lhs == rhs)),
                TokenKind::Neq => Ok(u32::from(lhs != rhs)),
                TokenKind::And => Ok(u32::from(lhs != 0 && rhs != 0)),
                _ => Err(ExprError::BadExpression),
            }
        }
    }
}

fn eval_operand(token: &Token, env: &dyn ExprEnv) -> Result<u32, ExprError> {
    match token.kind {
        TokenKind::Num(value) | TokenKind::HexNum(value) => Ok(value),
        TokenKind::Reg => {
            let name = &token.text[1..];
            env.register(name)
                .ok_or_else(|| ExprError::UnknownRegister(name.to_string()))
        }
        _ => Err(ExprError::BadExpression),
    }
}

/// Returns true if the whole token range is wrapped in one matching pair of
/// parentheses.
fn is_parenthesized(tokens: &[Token]) -> Result<bool, ExprError> {
    let mut wrapped = tokens.first().map(|token| token.kind)
        == Some(TokenKind::ParenOpen)
        && tokens.last().map(|token| token.kind)
            == Some(TokenKind::ParenClose);
    let mut depth: usize = 0;
    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::ParenOpen => depth += 1,
            TokenKind::ParenClose => {
                depth =
                    depth.checked_sub(1).ok_or(ExprError::UnbalancedParens)?;
                if depth == 0 && index + 1 < tokens.len() {
                    wrapped = false;
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ExprError::UnbalancedParens);
    }
    Ok(wrapped)
}

/// Returns the index of the lowest-precedence operator outside of any
/// parentheses.  Among operators of equal precedence, the leftmost wins.
fn main_operator(tokens: &[Token]) -> Result<usize, ExprError> {
    let mut depth: usize = 0;
    let mut best: Option<(usize, u8)> = None;
    for (index, token) in tokens.iter().enumerate().rev() {
        match token.kind {
            TokenKind::ParenClose => depth += 1,
            TokenKind::ParenOpen => {
                depth =
                    depth.checked_sub(1).ok_or(ExprError::UnbalancedParens)?;
            }
            kind if depth == 0 => {
                if let Some(prec) = kind.precedence() {
                    if best.is_none_or(|(_, best_prec)| prec <= best_prec) {
                        best = Some((index, prec));
                    }
                }
            }
            _ => {}
        }
    }
    best.map(|(index, _)| index).ok_or(ExprError::BadExpression)
}

//===========================================================================//


//===========================================================================//
