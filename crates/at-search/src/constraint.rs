//! Sandboxed evaluator for parameter feasibility constraints.
//!
//! A constraint is a boolean expression over axis names, for example
//! `T1 <= T2 and T1 * U1 < 256`. Both Python-style (`and`, `or`, `not`) and
//! C-style (`&&`, `||`, `!`) logical operators are accepted. The only inputs
//! to evaluation are the expression and the parameter binding.

use at_types::{ParamValue, ParameterBinding, TuneError, TuneResult};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

const OPERATORS: [&str; 20] = [
    "**", "//", "<=", ">=", "==", "!=", "&&", "||", "<", ">", "+", "-", "*", "/", "%", "!",
    "(", ")", ",", "=",
];

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let ch = chars[pos];
        if ch.is_whitespace() {
            pos += 1;
        } else if ch.is_ascii_digit() || (ch == '.' && chars.get(pos + 1).is_some_and(|c| c.is_ascii_digit())) {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '.') {
                // exponent sign, e.g. 1e-3
                if (chars[pos] == 'e' || chars[pos] == 'E')
                    && matches!(chars.get(pos + 1), Some('-') | Some('+'))
                {
                    pos += 1;
                }
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            if let Ok(v) = text.parse::<i64>() {
                tokens.push(Token::Int(v));
            } else if let Ok(v) = text.parse::<f64>() {
                tokens.push(Token::Float(v));
            } else {
                return Err(format!("invalid number literal '{text}' at offset {start}"));
            }
        } else if ch.is_alphabetic() || ch == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            tokens.push(Token::Ident(chars[start..pos].iter().collect()));
        } else if ch == '"' || ch == '\'' {
            let start = pos;
            pos += 1;
            let mut text = String::new();
            while pos < chars.len() && chars[pos] != ch {
                text.push(chars[pos]);
                pos += 1;
            }
            if pos >= chars.len() {
                return Err(format!("unterminated string literal at offset {start}"));
            }
            pos += 1;
            tokens.push(Token::Str(text));
        } else {
            let rest: String = chars[pos..chars.len().min(pos + 2)].iter().collect();
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .ok_or_else(|| format!("unexpected character '{ch}' at offset {pos}"))?;
            pos += op.len();
            tokens.push(match *op {
                "(" => Token::LParen,
                ")" => Token::RParen,
                "," => Token::Comma,
                "=" => return Err(format!("assignment is not allowed at offset {}", pos - 1)),
                other => Token::Op(other),
            });
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(ParamValue),
    Var(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Chained comparison: `a < b <= c` is `a < b and b <= c`.
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    Call(String, Vec<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_op(&mut self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Ident(name)) if name == keyword => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn parse(mut self) -> Result<Expr, String> {
        let expr = self.or_expr()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(format!("unexpected token {token:?} after expression")),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, String> {
        let mut lhs = self.and_expr()?;
        while self.eat_keyword("or") || self.eat_op(&["||"]).is_some() {
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, String> {
        let mut lhs = self.not_expr()?;
        while self.eat_keyword("and") || self.eat_op(&["&&"]).is_some() {
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, String> {
        if self.eat_keyword("not") || self.eat_op(&["!"]).is_some() {
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, String> {
        let first = self.additive()?;
        let mut chain = Vec::new();
        while let Some(op) = self.eat_op(&["<", "<=", ">", ">=", "==", "!="]) {
            let op = match op {
                "<" => CmpOp::Lt,
                "<=" => CmpOp::Le,
                ">" => CmpOp::Gt,
                ">=" => CmpOp::Ge,
                "==" => CmpOp::Eq,
                _ => CmpOp::Ne,
            };
            chain.push((op, self.additive()?));
        }
        if chain.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), chain))
        }
    }

    fn additive(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let op = if op == "+" { BinOp::Add } else { BinOp::Sub };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.term()?));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.eat_op(&["*", "/", "//", "%"]) {
            let op = match op {
                "*" => BinOp::Mul,
                "/" => BinOp::Div,
                "//" => BinOp::FloorDiv,
                _ => BinOp::Mod,
            };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.unary()?));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, String> {
        match self.eat_op(&["-", "+"]) {
            Some("-") => Ok(Expr::Neg(Box::new(self.unary()?))),
            Some(_) => self.unary(),
            None => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, String> {
        let base = self.primary()?;
        if self.eat_op(&["**"]).is_some() {
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Int(v)) => Ok(Expr::Literal(ParamValue::Int(v))),
            Some(Token::Float(v)) => Ok(Expr::Literal(ParamValue::Float(v))),
            Some(Token::Str(v)) => Ok(Expr::Literal(ParamValue::Str(v))),
            Some(Token::LParen) => {
                let expr = self.or_expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(expr),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "True" | "true" => Ok(Expr::Literal(ParamValue::Bool(true))),
                "False" | "false" => Ok(Expr::Literal(ParamValue::Bool(false))),
                "and" | "or" | "not" => Err(format!("unexpected keyword '{name}'")),
                _ if self.peek() == Some(&Token::LParen) => {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if self.peek() != Some(&Token::RParen) {
                        loop {
                            args.push(self.or_expr()?);
                            if self.peek() == Some(&Token::Comma) {
                                self.pos += 1;
                            } else {
                                break;
                            }
                        }
                    }
                    match self.next() {
                        Some(Token::RParen) => Ok(Expr::Call(name, args)),
                        _ => Err(format!("missing closing parenthesis in call to {name}")),
                    }
                }
                _ => Ok(Expr::Var(name)),
            },
            Some(token) => Err(format!("unexpected token {token:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    let r = a.checked_rem(b)?;
    Some(if r != 0 && ((r < 0) != (b < 0)) { q - 1 } else { q })
}

fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    Some(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r })
}

fn int_operand(value: &ParamValue) -> Option<i64> {
    match value {
        ParamValue::Int(v) => Some(*v),
        ParamValue::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn arithmetic(op: BinOp, lhs: &ParamValue, rhs: &ParamValue) -> Result<ParamValue, String> {
    if let (ParamValue::Str(a), ParamValue::Str(b), BinOp::Add) = (lhs, rhs, op) {
        return Ok(ParamValue::Str(format!("{a}{b}")));
    }
    let overflow = || format!("integer overflow in {lhs} {op:?} {rhs}");
    let by_zero = || "division by zero".to_string();

    if let (Some(a), Some(b)) = (int_operand(lhs), int_operand(rhs)) {
        let result = match op {
            BinOp::Add => a.checked_add(b).ok_or_else(overflow)?,
            BinOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
            BinOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
            BinOp::Div => {
                if b == 0 {
                    return Err(by_zero());
                }
                return Ok(ParamValue::Float(a as f64 / b as f64));
            }
            BinOp::FloorDiv => {
                if b == 0 {
                    return Err(by_zero());
                }
                floor_div(a, b).ok_or_else(overflow)?
            }
            BinOp::Mod => {
                if b == 0 {
                    return Err(by_zero());
                }
                floor_mod(a, b).ok_or_else(overflow)?
            }
            BinOp::Pow => {
                if a == 0 && b < 0 {
                    return Err(by_zero());
                }
                if b < 0 {
                    return Ok(ParamValue::Float((a as f64).powf(b as f64)));
                }
                let exp = u32::try_from(b).map_err(|_| overflow())?;
                a.checked_pow(exp).ok_or_else(overflow)?
            }
        };
        return Ok(ParamValue::Int(result));
    }

    let (a, b) = match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(format!(
                "unsupported operand types for {op:?}: {} and {}",
                lhs.type_name(),
                rhs.type_name()
            ))
        }
    };
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Pow if a == 0.0 && b < 0.0 => return Err(by_zero()),
        BinOp::Pow => a.powf(b),
        BinOp::Div | BinOp::FloorDiv | BinOp::Mod if b == 0.0 => return Err(by_zero()),
        BinOp::Div => a / b,
        BinOp::FloorDiv => (a / b).floor(),
        BinOp::Mod => a - b * (a / b).floor(),
    };
    Ok(ParamValue::Float(result))
}

fn compare(op: CmpOp, lhs: &ParamValue, rhs: &ParamValue) -> Result<bool, String> {
    let ordering = match (lhs, rhs) {
        (ParamValue::Str(a), ParamValue::Str(b)) => Some(a.cmp(b)),
        (ParamValue::Str(_), _) | (_, ParamValue::Str(_)) => None,
        _ => match (int_operand(lhs), int_operand(rhs)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => lhs
                .as_f64()
                .zip(rhs.as_f64())
                .and_then(|(a, b)| a.partial_cmp(&b)),
        },
    };

    match (op, ordering) {
        (CmpOp::Eq, ordering) => Ok(ordering == Some(Ordering::Equal)),
        (CmpOp::Ne, ordering) => Ok(ordering != Some(Ordering::Equal)),
        (_, None) => Err(format!(
            "cannot order {} and {}",
            lhs.type_name(),
            rhs.type_name()
        )),
        (CmpOp::Lt, Some(o)) => Ok(o == Ordering::Less),
        (CmpOp::Le, Some(o)) => Ok(o != Ordering::Greater),
        (CmpOp::Gt, Some(o)) => Ok(o == Ordering::Greater),
        (CmpOp::Ge, Some(o)) => Ok(o != Ordering::Less),
    }
}

fn call(name: &str, args: Vec<ParamValue>) -> Result<ParamValue, String> {
    match name {
        "abs" => match args.as_slice() {
            [ParamValue::Int(v)] => v
                .checked_abs()
                .map(ParamValue::Int)
                .ok_or_else(|| "integer overflow in abs".to_string()),
            [v] => v
                .as_f64()
                .map(|f| ParamValue::Float(f.abs()))
                .ok_or_else(|| format!("abs() of {}", v.type_name())),
            _ => Err(format!("abs() takes 1 argument, {} given", args.len())),
        },
        "min" | "max" => {
            let mut iter = args.into_iter();
            let mut best = iter
                .next()
                .ok_or_else(|| format!("{name}() requires at least one argument"))?;
            for arg in iter {
                let replace = if name == "min" {
                    compare(CmpOp::Lt, &arg, &best)?
                } else {
                    compare(CmpOp::Gt, &arg, &best)?
                };
                if replace {
                    best = arg;
                }
            }
            Ok(best)
        }
        _ => Err(format!("unknown function '{name}'")),
    }
}

fn eval(expr: &Expr, binding: &ParameterBinding) -> Result<ParamValue, String> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Var(name) => binding
            .get(name)
            .cloned()
            .ok_or_else(|| format!("name '{name}' is not defined")),
        Expr::Neg(inner) => match eval(inner, binding)? {
            ParamValue::Float(v) => Ok(ParamValue::Float(-v)),
            other => int_operand(&other)
                .and_then(i64::checked_neg)
                .map(ParamValue::Int)
                .ok_or_else(|| format!("bad operand type for unary -: {}", other.type_name())),
        },
        Expr::Not(inner) => Ok(ParamValue::Bool(!eval(inner, binding)?.is_truthy())),
        Expr::And(lhs, rhs) => {
            if !eval(lhs, binding)?.is_truthy() {
                return Ok(ParamValue::Bool(false));
            }
            Ok(ParamValue::Bool(eval(rhs, binding)?.is_truthy()))
        }
        Expr::Or(lhs, rhs) => {
            if eval(lhs, binding)?.is_truthy() {
                return Ok(ParamValue::Bool(true));
            }
            Ok(ParamValue::Bool(eval(rhs, binding)?.is_truthy()))
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = eval(lhs, binding)?;
            let rhs = eval(rhs, binding)?;
            arithmetic(*op, &lhs, &rhs)
        }
        Expr::Compare(first, chain) => {
            let mut lhs = eval(first, binding)?;
            for (op, next) in chain {
                let rhs = eval(next, binding)?;
                if !compare(*op, &lhs, &rhs)? {
                    return Ok(ParamValue::Bool(false));
                }
                lhs = rhs;
            }
            Ok(ParamValue::Bool(true))
        }
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|arg| eval(arg, binding))
                .collect::<Result<Vec<_>, _>>()?;
            call(name, args)
        }
    }
}

/// A parsed feasibility predicate over a parameter binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    source: String,
    expr: Expr,
}

impl Constraint {
    /// Parse an expression; a malformed expression is a fatal
    /// `ConstraintEvaluation` error naming the expression.
    pub fn parse(source: &str) -> TuneResult<Self> {
        let tokens = tokenize(source).map_err(|e| TuneError::constraint(source, e))?;
        let expr = Parser { tokens, pos: 0 }
            .parse()
            .map_err(|e| TuneError::constraint(source, e))?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// The constraint that admits every coordinate.
    pub fn always() -> Self {
        Self {
            source: "True".to_string(),
            expr: Expr::Literal(ParamValue::Bool(true)),
        }
    }

    /// `None` or a blank expression admit every coordinate.
    pub fn from_optional(source: Option<&str>) -> TuneResult<Self> {
        match source.map(str::trim) {
            None | Some("") => Ok(Self::always()),
            Some(source) => Self::parse(source),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a binding. Runtime failures (undefined names, type
    /// errors, division by zero) are fatal for the whole run.
    pub fn is_satisfied(&self, binding: &ParameterBinding) -> TuneResult<bool> {
        eval(&self.expr, binding)
            .map(|value| value.is_truthy())
            .map_err(|e| TuneError::constraint(&self.source, e))
    }
}
