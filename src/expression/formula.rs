//! Substituted formula: whitelist guard, expression tree and recursive descent

use crate::error::{BamError, Result};

/// Deepest parenthesis / negation nesting accepted by the parser
const MAX_NESTING: usize = 128;

/// Whether `formula` only uses characters of `[0-3=!()&| ^]`
pub fn is_whitelisted(formula: &str) -> bool {
    !formula.is_empty()
        && formula
            .chars()
            .all(|c| matches!(c, '0'..='3' | '=' | '!' | '(' | ')' | '&' | '|' | ' ' | '^'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Xor,
    Or,
}

/// Expression tree of a boolean rule.
///
/// Operator chains are flat: `a && b && c` is one `Binary` node with three
/// operands, so a long rule never nests deeper than its parentheses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(i64),
    Not(Box<Expr>),
    /// `first op1 x1 op2 x2 ...`, folded left to right
    Compare {
        first: Box<Expr>,
        rest: Vec<(CompareOp, Expr)>,
    },
    Binary { op: BinaryOp, operands: Vec<Expr> },
}

impl Expr {
    /// Integer value; comparisons and logical operators yield 0 or 1, `^` is integer xor.
    pub fn eval(&self) -> i64 {
        match self {
            Expr::Literal(value) => *value,
            Expr::Not(inner) => i64::from(inner.eval() == 0),
            Expr::Compare { first, rest } => rest.iter().fold(first.eval(), |lhs, (op, rhs)| {
                let equal = lhs == rhs.eval();
                i64::from(match op {
                    CompareOp::Eq => equal,
                    CompareOp::Ne => !equal,
                })
            }),
            Expr::Binary { op, operands } => match op {
                BinaryOp::And => i64::from(operands.iter().all(|operand| operand.eval() != 0)),
                BinaryOp::Or => i64::from(operands.iter().any(|operand| operand.eval() != 0)),
                BinaryOp::Xor => operands.iter().fold(0, |acc, operand| acc ^ operand.eval()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    Int(i64),
    Open,
    Close,
    Bang,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Caret,
}

fn invalid(formula: &str) -> BamError {
    BamError::InvalidExpression(format!("Invalid expression: {}", formula.trim()))
}

fn lex(formula: &str) -> Result<Vec<Lexeme>> {
    let chars: Vec<char> = formula.chars().collect();
    let mut lexemes = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let (lexeme, width) = match (c, next) {
            (' ', _) => {
                i += 1;
                continue;
            }
            ('0'..='9', _) => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let value = digits.parse::<i64>().map_err(|_| invalid(formula))?;
                lexemes.push(Lexeme::Int(value));
                continue;
            }
            ('(', _) => (Lexeme::Open, 1),
            (')', _) => (Lexeme::Close, 1),
            ('!', Some('=')) => (Lexeme::NotEq, 2),
            ('!', _) => (Lexeme::Bang, 1),
            ('=', Some('=')) => (Lexeme::EqEq, 2),
            ('&', Some('&')) => (Lexeme::AndAnd, 2),
            ('|', Some('|')) => (Lexeme::OrOr, 2),
            ('^', _) => (Lexeme::Caret, 1),
            _ => return Err(invalid(formula)),
        };
        lexemes.push(lexeme);
        i += width;
    }
    Ok(lexemes)
}

struct Parser<'a> {
    lexemes: &'a [Lexeme],
    pos: usize,
    depth: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Lexeme> {
        self.lexemes.get(self.pos).copied()
    }

    fn eat(&mut self, lexeme: Lexeme) -> bool {
        if self.peek() == Some(lexeme) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<Expr> {
        self.chain(BinaryOp::Or, Lexeme::OrOr, Self::xor)
    }

    fn xor(&mut self) -> Result<Expr> {
        self.chain(BinaryOp::Xor, Lexeme::Caret, Self::and)
    }

    fn and(&mut self) -> Result<Expr> {
        self.chain(BinaryOp::And, Lexeme::AndAnd, Self::comparison)
    }

    /// `operand (separator operand)*` as a single flat node
    fn chain(
        &mut self,
        op: BinaryOp,
        separator: Lexeme,
        operand: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let first = operand(self)?;
        if self.peek() != Some(separator) {
            return Ok(first);
        }
        let mut operands = vec![first];
        while self.eat(separator) {
            operands.push(operand(self)?);
        }
        Ok(Expr::Binary { op, operands })
    }

    fn comparison(&mut self) -> Result<Expr> {
        let first = self.unary()?;
        let mut rest = Vec::new();
        loop {
            let op = match self.peek() {
                Some(Lexeme::EqEq) => CompareOp::Eq,
                Some(Lexeme::NotEq) => CompareOp::Ne,
                _ => break,
            };
            self.pos += 1;
            rest.push((op, self.unary()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(Lexeme::Bang) {
            let inner = self.nested(Self::unary)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Lexeme::Int(value)) => {
                self.pos += 1;
                Ok(Expr::Literal(value))
            }
            Some(Lexeme::Open) => {
                self.pos += 1;
                let inner = self.nested(Self::or)?;
                if !self.eat(Lexeme::Close) {
                    return Err(invalid(self.source));
                }
                Ok(inner)
            }
            _ => Err(invalid(self.source)),
        }
    }

    fn nested(&mut self, rule: fn(&mut Self) -> Result<Expr>) -> Result<Expr> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(invalid(self.source));
        }
        let expr = rule(self);
        self.depth -= 1;
        expr
    }
}

/// Parse a fully substituted formula.
///
/// Precedence, tightest first: parentheses; `!`, `==`, `!=`; `&&`; `^`; `||`.
pub fn parse(formula: &str) -> Result<Expr> {
    if !is_whitelisted(formula) {
        return Err(invalid(formula));
    }
    let lexemes = lex(formula)?;
    let mut parser = Parser {
        lexemes: &lexemes,
        pos: 0,
        depth: 0,
        source: formula,
    };
    let expr = parser.or()?;
    if parser.pos != lexemes.len() {
        return Err(invalid(formula));
    }
    Ok(expr)
}
