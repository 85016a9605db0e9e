// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Turns the text a user types ("z**3 - 1", "cmath.sin(z)**2") into an
//! iteration rule.
//!
//! There are two gates.  The first, `verify`, is a plain scan of every
//! name mentioned in the text against a short allowlist; anything not
//! on the list is refused outright, and the caller must not render.
//! The second is the parser itself, which only understands arithmetic,
//! the two variables, a handful of constants and one-argument
//! functions.  A formula that gets past the first gate but trips over
//! the second is not an error: it quietly becomes the classic
//! Mandelbrot rule, `z**2 + c`.
//!
//! Whatever the user writes, the pixel's coordinate `c` is added after
//! evaluation, so "z**2" draws the Mandelbrot set.

use failure::Fail;
use log::warn;
use num::Complex;
use std::f64::consts;
use std::fmt;
use std::str::FromStr;

use crate::errors::{Error, Result};

/// How deeply a formula may nest before it is treated as malformed.
/// Brackets, calls, signs, powers and each chained operator all add a
/// level.
pub const MAX_DEPTH: usize = 200;

/// The text of the rule every fallback lands on.
pub const DEFAULT_FORMULA: &str = "z**2";

const NAMES: [&str; 15] = [
    "z", "c", "abs", "sin", "cos", "tan", "exp", "log", "sqrt", "pi", "e", "phase", "floor",
    "ceil", "trunc",
];
const CMATH: [&str; 9] = ["sin", "cos", "tan", "exp", "log", "sqrt", "pi", "e", "phase"];
const MATH: [&str; 3] = ["floor", "ceil", "trunc"];

/// Maps a name as written to the name the parser knows it by, if it is
/// allowed at all.  Case doesn't matter; `cmath.` and `math.` prefixes
/// are accepted on the functions that historically lived there.
fn canonical(token: &str) -> Option<&'static str> {
    let lower = token.to_ascii_lowercase();
    let bare = match lower.find('.') {
        None => lower.as_str(),
        Some(dot) => {
            let (module, name) = (&lower[..dot], &lower[dot + 1..]);
            let known = match module {
                "cmath" => CMATH.contains(&name),
                "math" => MATH.contains(&name),
                _ => false,
            };
            if !known {
                return None;
            }
            name
        }
    };
    NAMES.iter().find(|name| **name == bare).copied()
}

/// Length in bytes of the decimal literal at the head of `s`, not
/// counting an imaginary suffix.
fn literal_len(s: &str) -> usize {
    let b = s.as_bytes();
    let mut i = 0;
    while i < b.len() && (b[i].is_ascii_digit() || b[i] == b'.') {
        i += 1;
    }
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        if j < b.len() && b[j].is_ascii_digit() {
            while j < b.len() && b[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    i
}

fn starts_literal(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(d) if d.is_ascii_digit() => true,
        Some('.') => chars.next().map_or(false, |d| d.is_ascii_digit()),
        _ => false,
    }
}

fn is_imaginary_suffix(s: &str) -> bool {
    s.starts_with('j') || s.starts_with('J')
}

/// Length of the name at the head of `s`: letters, digits, underscores
/// and dots.
fn name_len(s: &str) -> usize {
    s.find(|ch: char| !(ch.is_alphanumeric() || ch == '_' || ch == '.'))
        .unwrap_or_else(|| s.len())
}

/// Every name-like run in `source`.  Numeric literals, including
/// exponents and imaginary literals like `3j`, are skipped so they are
/// never mistaken for names.
fn names(source: &str) -> Vec<&str> {
    let mut found = vec![];
    let mut rest = source;
    while let Some(ch) = rest.chars().next() {
        if starts_literal(rest) {
            let mut len = literal_len(rest);
            if is_imaginary_suffix(&rest[len..]) {
                len += 1;
            }
            rest = &rest[len..];
        } else if ch.is_alphabetic() || ch == '_' {
            let len = name_len(rest);
            found.push(&rest[..len]);
            rest = &rest[len..];
        } else {
            rest = &rest[ch.len_utf8()..];
        }
    }
    found
}

/// The safety verdict.  Succeeds when every name in `source` is on the
/// allowlist; otherwise reports the first offender.  An empty formula
/// passes.
pub fn verify(source: &str) -> Result<()> {
    match names(source).into_iter().find(|name| canonical(name).is_none()) {
        Some(name) => Err(Error::DisallowedToken(name.to_string())),
        None => Ok(()),
    }
}

/// Why a formula failed to parse.
#[derive(Debug, Clone, PartialEq, Fail)]
pub enum SyntaxError {
    /// A character with no meaning in a formula.
    #[fail(display = "unexpected character '{}'", _0)]
    UnexpectedChar(char),
    /// Digits that don't make a number, like `1.2.3`.
    #[fail(display = "malformed number '{}'", _0)]
    BadNumber(String),
    /// A name the parser doesn't know.
    #[fail(display = "unknown name '{}'", _0)]
    UnknownName(String),
    /// A function name used without its argument.
    #[fail(display = "'{}' must be called with one argument", _0)]
    ExpectedCall(String),
    /// A token out of place.
    #[fail(display = "unexpected {}", _0)]
    UnexpectedToken(String),
    /// The text stopped in the middle of an expression.
    #[fail(display = "unexpected end of formula")]
    UnexpectedEnd,
    /// Nesting went past the limit.
    #[fail(display = "formula nests more than {} levels deep", _0)]
    TooDeep(usize),
}

/// Evaluation failures.  These never stop a render; the escape-time
/// loop swallows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Fail)]
pub enum DomainError {
    /// Division by an exact zero.
    #[fail(display = "division by zero")]
    DivisionByZero,
    /// `log(0)`.
    #[fail(display = "logarithm of zero")]
    LogOfZero,
    /// Zero raised to a negative or non-real power.
    #[fail(display = "zero raised to a negative or complex power")]
    ZeroPower,
    /// The result came out as NaN.
    #[fail(display = "result is not a number")]
    NotANumber,
}

type Eval = std::result::Result<Complex<f64>, DomainError>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Real(f64),
    Imaginary(f64),
    Name(&'static str),
    Plus,
    Minus,
    Star,
    Slash,
    Power,
    LParen,
    RParen,
    End,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Real(v) => write!(f, "number {}", v),
            Token::Imaginary(v) => write!(f, "number {}j", v),
            Token::Name(n) => write!(f, "name '{}'", n),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Power => write!(f, "'**'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::End => write!(f, "end of formula"),
        }
    }
}

struct Lexer<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Lexer<'a> {
    fn new(s: &'a str) -> Self {
        Lexer { s, i: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.s[self.i..]
    }

    fn next_token(&mut self) -> std::result::Result<Token, SyntaxError> {
        let skipped = self.rest().len() - self.rest().trim_start().len();
        self.i += skipped;
        let rest = self.rest();
        let ch = match rest.chars().next() {
            None => return Ok(Token::End),
            Some(ch) => ch,
        };

        if starts_literal(rest) {
            let len = literal_len(rest);
            let text = &rest[..len];
            let value = f64::from_str(text).map_err(|_| SyntaxError::BadNumber(text.to_string()))?;
            self.i += len;
            if is_imaginary_suffix(self.rest()) {
                self.i += 1;
                return Ok(Token::Imaginary(value));
            }
            return Ok(Token::Real(value));
        }

        if ch.is_alphabetic() || ch == '_' {
            let len = name_len(rest);
            let text = &rest[..len];
            self.i += len;
            return canonical(text)
                .map(Token::Name)
                .ok_or_else(|| SyntaxError::UnknownName(text.to_string()));
        }

        self.i += ch.len_utf8();
        Ok(match ch {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '/' => Token::Slash,
            '^' => Token::Power,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '*' if self.rest().starts_with('*') => {
                self.i += 1;
                Token::Power
            }
            '*' => Token::Star,
            other => return Err(SyntaxError::UnexpectedChar(other)),
        })
    }
}

/// Binary operators, in the order the parser binds them loosest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `**`, or `^`
    Pow,
}

/// The one-argument functions a formula may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// Modulus, as a real number.
    Abs,
    /// Complex sine.
    Sin,
    /// Complex cosine.
    Cos,
    /// Complex tangent.
    Tan,
    /// Complex exponential.
    Exp,
    /// Principal natural logarithm.
    Log,
    /// Principal square root.
    Sqrt,
    /// Argument, as a real number.
    Phase,
    /// Floor of each component.
    Floor,
    /// Ceiling of each component.
    Ceil,
    /// Each component truncated toward zero.
    Trunc,
}

impl Function {
    fn from_name(name: &str) -> Option<Function> {
        Some(match name {
            "abs" => Function::Abs,
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "exp" => Function::Exp,
            "log" => Function::Log,
            "sqrt" => Function::Sqrt,
            "phase" => Function::Phase,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "trunc" => Function::Trunc,
            _ => return None,
        })
    }

    fn apply(self, z: Complex<f64>) -> Eval {
        Ok(match self {
            Function::Abs => Complex::new(z.norm(), 0.0),
            Function::Sin => z.sin(),
            Function::Cos => z.cos(),
            Function::Tan => z.tan(),
            Function::Exp => z.exp(),
            Function::Log if is_zero(z) => return Err(DomainError::LogOfZero),
            Function::Log => z.ln(),
            Function::Sqrt => z.sqrt(),
            Function::Phase => Complex::new(z.arg(), 0.0),
            Function::Floor => Complex::new(z.re.floor(), z.im.floor()),
            Function::Ceil => Complex::new(z.re.ceil(), z.im.ceil()),
            Function::Trunc => Complex::new(z.re.trunc(), z.im.trunc()),
        })
    }
}

fn is_zero(z: Complex<f64>) -> bool {
    z.re == 0.0 && z.im == 0.0
}

const ONE: Complex<f64> = Complex { re: 1.0, im: 0.0 };
const ZERO: Complex<f64> = Complex { re: 0.0, im: 0.0 };

/// Integral powers by repeated squaring.
fn powi(base: Complex<f64>, n: i32) -> Eval {
    let mut result = ONE;
    let mut square = base;
    let mut bits = n.unsigned_abs();
    while bits > 0 {
        if bits & 1 == 1 {
            result = result * square;
        }
        square = square * square;
        bits >>= 1;
    }
    if n >= 0 {
        Ok(result)
    } else if is_zero(result) {
        Err(DomainError::DivisionByZero)
    } else {
        Ok(ONE / result)
    }
}

fn power(base: Complex<f64>, exponent: Complex<f64>) -> Eval {
    if is_zero(exponent) {
        return Ok(ONE);
    }
    if is_zero(base) {
        if exponent.im != 0.0 || exponent.re < 0.0 {
            return Err(DomainError::ZeroPower);
        }
        return Ok(ZERO);
    }
    if exponent.im == 0.0 && exponent.re == exponent.re.floor() && exponent.re.abs() <= 100.0 {
        return powi(base, exponent.re as i32);
    }
    Ok(base.powc(exponent))
}

impl Op {
    fn apply(self, lhs: Complex<f64>, rhs: Complex<f64>) -> Eval {
        Ok(match self {
            Op::Add => lhs + rhs,
            Op::Sub => lhs - rhs,
            Op::Mul => lhs * rhs,
            Op::Div if is_zero(rhs) => return Err(DomainError::DivisionByZero),
            Op::Div => lhs / rhs,
            Op::Pow => return power(lhs, rhs),
        })
    }
}

/// A parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal, `pi`, or `e`.
    Const(Complex<f64>),
    /// The current iterate.
    Z,
    /// The pixel's coordinate on the plane.
    C,
    /// Unary minus.
    Neg(Box<Expr>),
    /// A binary operation.
    Binary(Op, Box<Expr>, Box<Expr>),
    /// A function call.
    Call(Function, Box<Expr>),
}

impl Expr {
    /// Evaluate at the given iterate and plane coordinate.
    pub fn eval(&self, z: Complex<f64>, c: Complex<f64>) -> Eval {
        match self {
            Expr::Const(k) => Ok(*k),
            Expr::Z => Ok(z),
            Expr::C => Ok(c),
            Expr::Neg(e) => Ok(-e.eval(z, c)?),
            Expr::Binary(op, lhs, rhs) => op.apply(lhs.eval(z, c)?, rhs.eval(z, c)?),
            Expr::Call(f, arg) => f.apply(arg.eval(z, c)?),
        }
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    cur: Token,
    depth: usize,
}

type Parsed = std::result::Result<Expr, SyntaxError>;

impl<'a> Parser<'a> {
    fn new(s: &'a str) -> std::result::Result<Self, SyntaxError> {
        let mut lexer = Lexer::new(s);
        let cur = lexer.next_token()?;
        Ok(Parser {
            lexer,
            cur,
            depth: 0,
        })
    }

    fn bump(&mut self) -> std::result::Result<(), SyntaxError> {
        self.cur = self.lexer.next_token()?;
        Ok(())
    }

    // An error stops the whole parse, so levels are only given back on
    // the way out of a successful branch.
    fn descend(&mut self) -> std::result::Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(SyntaxError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn unexpected(&self) -> SyntaxError {
        match self.cur {
            Token::End => SyntaxError::UnexpectedEnd,
            ref other => SyntaxError::UnexpectedToken(other.to_string()),
        }
    }

    fn expect(&mut self, want: Token) -> std::result::Result<(), SyntaxError> {
        if self.cur != want {
            return Err(self.unexpected());
        }
        self.bump()
    }

    fn primary(&mut self) -> Parsed {
        let expr = match self.cur {
            Token::Real(v) => Expr::Const(Complex::new(v, 0.0)),
            Token::Imaginary(v) => Expr::Const(Complex::new(0.0, v)),
            Token::Name("z") => Expr::Z,
            Token::Name("c") => Expr::C,
            Token::Name("pi") => Expr::Const(Complex::new(consts::PI, 0.0)),
            Token::Name("e") => Expr::Const(Complex::new(consts::E, 0.0)),
            Token::Name(name) => {
                let f = Function::from_name(name)
                    .ok_or_else(|| SyntaxError::UnknownName(name.to_string()))?;
                self.bump()?;
                if self.cur != Token::LParen {
                    return Err(SyntaxError::ExpectedCall(name.to_string()));
                }
                self.descend()?;
                self.bump()?;
                let arg = self.expr()?;
                self.expect(Token::RParen)?;
                self.depth -= 1;
                return Ok(Expr::Call(f, Box::new(arg)));
            }
            Token::LParen => {
                self.descend()?;
                self.bump()?;
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                self.depth -= 1;
                return Ok(inner);
            }
            _ => return Err(self.unexpected()),
        };
        self.bump()?;
        Ok(expr)
    }

    // Right-associative, and binds tighter than a unary minus on its
    // left but not on its right: -z**2 is -(z**2), z**-1 is z**(-1).
    fn power(&mut self) -> Parsed {
        let base = self.primary()?;
        if self.cur != Token::Power {
            return Ok(base);
        }
        self.descend()?;
        self.bump()?;
        let exponent = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Binary(Op::Pow, Box::new(base), Box::new(exponent)))
    }

    fn unary(&mut self) -> Parsed {
        match self.cur {
            Token::Minus => {
                self.descend()?;
                self.bump()?;
                let operand = self.unary()?;
                self.depth -= 1;
                Ok(Expr::Neg(Box::new(operand)))
            }
            Token::Plus => {
                self.descend()?;
                self.bump()?;
                let operand = self.unary()?;
                self.depth -= 1;
                Ok(operand)
            }
            _ => self.power(),
        }
    }

    // Chains build left-leaning trees, one level per operator.
    fn term(&mut self) -> Parsed {
        let mut left = self.unary()?;
        let mut chained = 0;
        loop {
            let op = match self.cur {
                Token::Star => Op::Mul,
                Token::Slash => Op::Div,
                _ => break,
            };
            self.descend()?;
            chained += 1;
            self.bump()?;
            left = Expr::Binary(op, Box::new(left), Box::new(self.unary()?));
        }
        self.depth -= chained;
        Ok(left)
    }

    fn expr(&mut self) -> Parsed {
        let mut left = self.term()?;
        let mut chained = 0;
        loop {
            let op = match self.cur {
                Token::Plus => Op::Add,
                Token::Minus => Op::Sub,
                _ => break,
            };
            self.descend()?;
            chained += 1;
            self.bump()?;
            left = Expr::Binary(op, Box::new(left), Box::new(self.term()?));
        }
        self.depth -= chained;
        Ok(left)
    }
}

/// Strict parse, for callers who want to know what went wrong.  Does
/// not apply the allowlist; names the grammar doesn't know are syntax
/// errors here.
pub fn parse(source: &str) -> Parsed {
    let mut parser = Parser::new(source)?;
    let expr = parser.expr()?;
    match parser.cur {
        Token::End => Ok(expr),
        _ => Err(parser.unexpected()),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Rule {
    Default,
    Expression(Expr),
}

/// A compiled iteration rule: `z ↦ expr(z, c) + c`.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    rule: Rule,
}

impl Formula {
    /// Check `source` against the allowlist and parse it.  A disallowed
    /// name is an error; a parse failure is not, and yields the default
    /// rule instead.
    pub fn compile(source: &str) -> Result<Formula> {
        verify(source)?;
        let rule = match parse(source) {
            Ok(expr) => Rule::Expression(expr),
            Err(err) => {
                warn!(
                    "Formula '{}' does not parse ({}); falling back to {} + c",
                    source, err, DEFAULT_FORMULA
                );
                Rule::Default
            }
        };
        Ok(Formula {
            source: source.to_string(),
            rule,
        })
    }

    /// The text this was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True if the text didn't parse and the default rule stands in.
    pub fn is_fallback(&self) -> bool {
        self.rule == Rule::Default
    }

    /// One step of the iteration.
    pub fn apply(&self, z: Complex<f64>, c: Complex<f64>) -> Eval {
        let next = match &self.rule {
            Rule::Default => z * z + c,
            Rule::Expression(expr) => expr.eval(z, c)? + c,
        };
        if next.re.is_nan() || next.im.is_nan() {
            return Err(DomainError::NotANumber);
        }
        Ok(next)
    }
}

impl Default for Formula {
    fn default() -> Self {
        Formula {
            source: DEFAULT_FORMULA.to_string(),
            rule: Rule::Expression(Expr::Binary(
                Op::Pow,
                Box::new(Expr::Z),
                Box::new(Expr::Const(Complex::new(2.0, 0.0))),
            )),
        }
    }
}

impl FromStr for Formula {
    type Err = Error;

    fn from_str(s: &str) -> Result<Formula> {
        Formula::compile(s)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
