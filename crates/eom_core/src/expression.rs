//! Compiles the user's forcing expression, a formula in `t`, into bytecode for a
//! small stack machine.
//!
//! Supported syntax: numbers (optionally with an `e`/`E` exponent), `t`, the constants
//! `pi` and `e`, binary `+ - * / ^` (`^` binds tightest and is right-associative), unary
//! minus, parentheses, and the functions `sin cos tan exp ln log sqrt abs` (`log` is
//! the natural logarithm).

use crate::traits::{ForcingTerm, Scalar};
use std::cell::RefCell;
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("Expression is empty")]
    Empty,
    #[error("Unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("Invalid number literal \"{0}\"")]
    InvalidNumber(String),
    #[error("Expected ')'")]
    UnclosedParen,
    #[error("Unexpected token {0}")]
    UnexpectedToken(String),
    #[error("Unexpected end of expression")]
    UnexpectedEnd,
    #[error("Unknown variable \"{0}\" (only t is available)")]
    UnknownVariable(String),
    #[error("Unknown function \"{0}\"")]
    UnknownFunction(String),
}

/// OpCodes for the stack machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant onto the stack.
    LoadConst(f64),
    /// Pushes the current time.
    LoadTime,
    /// Pops (b, a), pushes a + b.
    Add,
    /// Pops (b, a), pushes a - b.
    Sub,
    /// Pops (b, a), pushes a * b.
    Mul,
    /// Pops (b, a), pushes a / b.
    Div,
    /// Pops (b, a), pushes a ^ b.
    Pow,
    Neg,
    Call(Function),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
    Abs,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Function::Sin),
            "cos" => Some(Function::Cos),
            "tan" => Some(Function::Tan),
            "exp" => Some(Function::Exp),
            "ln" | "log" => Some(Function::Ln),
            "sqrt" => Some(Function::Sqrt),
            "abs" => Some(Function::Abs),
            _ => None,
        }
    }

    fn apply<T: Scalar>(self, a: T) -> T {
        match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Exp => a.exp(),
            Function::Ln => a.ln(),
            Function::Sqrt => a.sqrt(),
            Function::Abs => a.abs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

/// Stateless stack machine. The caller owns the stack buffer so repeated evaluation
/// does not allocate.
pub struct VM;

impl VM {
    /// Runs `bytecode` at time `t`. Returns `None` if the program does not leave exactly
    /// one value on the stack.
    pub fn execute<T: Scalar>(bytecode: &Bytecode, t: T, stack: &mut Vec<T>) -> Option<T> {
        stack.clear();

        for op in &bytecode.ops {
            match *op {
                OpCode::LoadConst(val) => stack.push(T::from_f64(val)?),
                OpCode::LoadTime => stack.push(t),
                OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Pow => {
                    let b = stack.pop()?;
                    let a = stack.pop()?;
                    stack.push(match *op {
                        OpCode::Add => a + b,
                        OpCode::Sub => a - b,
                        OpCode::Mul => a * b,
                        OpCode::Div => a / b,
                        _ => a.powf(b),
                    });
                }
                OpCode::Neg => {
                    let a = stack.pop()?;
                    stack.push(-a);
                }
                OpCode::Call(func) => {
                    let a = stack.pop()?;
                    stack.push(func.apply(a));
                }
            }
        }

        match stack.len() {
            1 => stack.pop(),
            _ => None,
        }
    }
}

// --- AST & Parser ---

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Neg(Box<Expr>),
    Call(String, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Resolves names and emits bytecode.
pub struct Compiler;

impl Compiler {
    pub fn compile(expr: &Expr) -> Result<Bytecode, ExpressionError> {
        let mut ops = Vec::new();
        Self::compile_recursive(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn compile_recursive(expr: &Expr, ops: &mut Vec<OpCode>) -> Result<(), ExpressionError> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => match name.as_str() {
                "t" => ops.push(OpCode::LoadTime),
                "pi" => ops.push(OpCode::LoadConst(std::f64::consts::PI)),
                "e" => ops.push(OpCode::LoadConst(std::f64::consts::E)),
                _ => return Err(ExpressionError::UnknownVariable(name.clone())),
            },
            Expr::Binary(left, op, right) => {
                Self::compile_recursive(left, ops)?;
                Self::compile_recursive(right, ops)?;
                ops.push(match op {
                    BinaryOp::Add => OpCode::Add,
                    BinaryOp::Sub => OpCode::Sub,
                    BinaryOp::Mul => OpCode::Mul,
                    BinaryOp::Div => OpCode::Div,
                    BinaryOp::Pow => OpCode::Pow,
                });
            }
            Expr::Neg(operand) => {
                Self::compile_recursive(operand, ops)?;
                ops.push(OpCode::Neg);
            }
            Expr::Call(name, arg) => {
                let func = Function::lookup(name)
                    .ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
                Self::compile_recursive(arg, ops)?;
                ops.push(OpCode::Call(func));
            }
        }
        Ok(())
    }
}

/// Parses a string expression into an AST.
pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_sum()?;
    match parser.consume() {
        None => Ok(expr),
        Some(token) => Err(ExpressionError::UnexpectedToken(format!("{token:?}"))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut num_str = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    num_str.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            if let Some(exponent) = scan_exponent(&chars) {
                for _ in 0..exponent.chars().count() {
                    chars.next();
                }
                num_str.push_str(&exponent);
            }
            let value = num_str
                .parse()
                .map_err(|_| ExpressionError::InvalidNumber(num_str.clone()))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() {
            let mut ident = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            tokens.push(match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => return Err(ExpressionError::UnexpectedChar(other)),
            });
            chars.next();
        }
    }
    Ok(tokens)
}

/// Looks ahead for an exponent suffix (`e3`, `E-4`, `e+2`) without consuming it. An `e`
/// that is not followed by digits is left for the identifier rules.
fn scan_exponent(chars: &Peekable<Chars<'_>>) -> Option<String> {
    let mut ahead = chars.clone();
    let mut exponent = String::new();
    match ahead.next() {
        Some(c @ ('e' | 'E')) => exponent.push(c),
        _ => return None,
    }
    if let Some(&sign @ ('+' | '-')) = ahead.peek() {
        exponent.push(sign);
        ahead.next();
    }
    let digits_start = exponent.len();
    while let Some(&d) = ahead.peek() {
        if !d.is_ascii_digit() {
            break;
        }
        exponent.push(d);
        ahead.next();
    }
    (exponent.len() > digits_start).then_some(exponent)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_sum(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.consume();
            let right = self.parse_product()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_product(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // -t^2 is -(t^2)
    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let operand = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(operand)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(
                Box::new(base),
                BinaryOp::Pow,
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.consume();
                    let arg = self.parse_sum()?;
                    self.expect_rparen()?;
                    Ok(Expr::Call(name, Box::new(arg)))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_sum()?;
                self.expect_rparen()?;
                Ok(expr)
            }
            Some(token) => Err(ExpressionError::UnexpectedToken(format!("{token:?}"))),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), ExpressionError> {
        match self.consume() {
            Some(Token::RParen) => Ok(()),
            _ => Err(ExpressionError::UnclosedParen),
        }
    }
}

// --- ExpressionForcing ---

/// A compiled forcing term `f(t)`.
///
/// Holds its VM stack behind a `RefCell` so evaluation does not allocate; this makes the
/// value `!Sync`.
#[derive(Debug, Clone)]
pub struct ExpressionForcing {
    source: String,
    bytecode: Bytecode,
    stack: RefCell<Vec<f64>>,
}

impl ExpressionForcing {
    pub fn compile(source: &str) -> Result<Self, ExpressionError> {
        let expr = parse(source)?;
        let bytecode = Compiler::compile(&expr)?;
        Ok(Self {
            source: source.to_string(),
            bytecode,
            stack: RefCell::new(Vec::with_capacity(16)),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }
}

impl ForcingTerm for ExpressionForcing {
    fn evaluate(&self, t: f64) -> Option<f64> {
        let mut stack = self.stack.borrow_mut();
        VM::execute(&self.bytecode, t, &mut stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str, t: f64) -> f64 {
        ExpressionForcing::compile(source)
            .expect("expression should compile")
            .evaluate(t)
            .expect("expression should evaluate")
    }

    #[test]
    fn evaluates_constants_and_time() {
        assert_eq!(eval("0", 3.0), 0.0);
        assert_eq!(eval("t", 3.0), 3.0);
        assert_eq!(eval("2 * t + 1", 3.0), 7.0);
        assert!((eval("pi", 0.0) - std::f64::consts::PI).abs() < 1e-15);
    }

    #[test]
    fn respects_precedence_and_associativity() {
        assert_eq!(eval("1 + 2 * 3", 0.0), 7.0);
        assert_eq!(eval("(1 + 2) * 3", 0.0), 9.0);
        assert_eq!(eval("8 / 4 / 2", 0.0), 1.0);
        assert_eq!(eval("10 - 3 - 2", 0.0), 5.0);
        assert_eq!(eval("2 ^ 3 ^ 2", 0.0), 512.0);
        assert_eq!(eval("-t ^ 2", 3.0), -9.0);
        assert_eq!(eval("2 ^ -1", 0.0), 0.5);
        assert_eq!(eval("--t", 2.0), 2.0);
    }

    #[test]
    fn reads_scientific_notation() {
        assert_eq!(eval("1e-3", 0.0), 1e-3);
        assert_eq!(eval("2.5E2 * t", 2.0), 500.0);
        assert_eq!(eval("1e+2", 0.0), 100.0);
        // a bare e after a number is still the constant, not an exponent
        assert!(matches!(
            parse("2e").unwrap_err(),
            ExpressionError::UnexpectedToken(_)
        ));
        assert!((eval("2 * e", 0.0) - 2.0 * std::f64::consts::E).abs() < 1e-15);
    }

    #[test]
    fn calls_functions() {
        assert!((eval("sin(t)", std::f64::consts::FRAC_PI_2) - 1.0).abs() < 1e-15);
        assert!((eval("cos(2 * pi * t)", 1.0) - 1.0).abs() < 1e-12);
        assert_eq!(eval("sqrt(abs(t))", -16.0), 4.0);
        assert!((eval("ln(exp(t))", 1.5) - 1.5).abs() < 1e-12);
        assert!((eval("log(e)", 0.0) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn numeric_failures_are_values_not_undefined() {
        let forcing = ExpressionForcing::compile("1 / t").expect("compiles");
        assert_eq!(forcing.evaluate(0.0), Some(f64::INFINITY));
        let forcing = ExpressionForcing::compile("sqrt(t)").expect("compiles");
        assert!(forcing.evaluate(-1.0).is_some_and(f64::is_nan));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse("").unwrap_err(), ExpressionError::Empty);
        assert_eq!(parse("   ").unwrap_err(), ExpressionError::Empty);
        assert_eq!(parse("1 +").unwrap_err(), ExpressionError::UnexpectedEnd);
        assert_eq!(parse("(1 + 2").unwrap_err(), ExpressionError::UnclosedParen);
        assert_eq!(parse("sin(t").unwrap_err(), ExpressionError::UnclosedParen);
        assert_eq!(parse("2 $ 3").unwrap_err(), ExpressionError::UnexpectedChar('$'));
        assert_eq!(
            parse("1.2.3").unwrap_err(),
            ExpressionError::InvalidNumber("1.2.3".to_string())
        );
        assert!(matches!(
            parse("1 2").unwrap_err(),
            ExpressionError::UnexpectedToken(_)
        ));
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(
            ExpressionForcing::compile("x + 1").unwrap_err(),
            ExpressionError::UnknownVariable("x".to_string())
        );
        assert_eq!(
            ExpressionForcing::compile("sinh(t)").unwrap_err(),
            ExpressionError::UnknownFunction("sinh".to_string())
        );
    }

    #[test]
    fn vm_reports_malformed_program_as_undefined() {
        let mut stack = Vec::new();
        let underflow = Bytecode {
            ops: vec![OpCode::LoadTime, OpCode::Add],
        };
        assert_eq!(VM::execute(&underflow, 1.0_f64, &mut stack), None);

        let leftover = Bytecode {
            ops: vec![OpCode::LoadTime, OpCode::LoadTime],
        };
        assert_eq!(VM::execute(&leftover, 1.0_f64, &mut stack), None);

        assert_eq!(VM::execute(&Bytecode::default(), 1.0_f64, &mut stack), None);
    }

    #[test]
    fn vm_runs_over_other_scalars() {
        let bytecode = Compiler::compile(&parse("t * 0.5").expect("parses")).expect("compiles");
        let mut stack = Vec::new();
        assert_eq!(VM::execute(&bytecode, 3.0_f32, &mut stack), Some(1.5_f32));
    }

    #[test]
    fn keeps_source_text() {
        let forcing = ExpressionForcing::compile("3 * sin(t)").expect("compiles");
        assert_eq!(forcing.source(), "3 * sin(t)");
        assert_eq!(forcing.bytecode().ops.len(), 4);
    }
}
