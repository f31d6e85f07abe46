use std::fmt;
use std::str::FromStr;

use crate::error::{Error, ErrorKind, Result};

/// How a preset value is computed from the counts of its native events.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Derivation {
    /// Exactly one native event, taken as is.
    NotDerived,
    /// Sum of all natives.
    Add,
    /// First native minus all the others.
    Sub,
    /// Reverse polish expression over the natives.
    Postfix(Postfix),
}

impl Derivation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotDerived => "NOT_DERIVED",
            Self::Add => "DERIVED_ADD",
            Self::Sub => "DERIVED_SUB",
            Self::Postfix(_) => "DERIVED_POSTFIX",
        }
    }

    pub fn postfix(&self) -> Option<&Postfix> {
        match self {
            Self::Postfix(it) => Some(it),
            _ => None,
        }
    }

    pub(crate) fn check(&self, natives: usize) -> Result<()> {
        let ok = match self {
            Self::NotDerived => natives == 1,
            Self::Add | Self::Sub => natives >= 2,
            Self::Postfix(expr) => natives >= 1 && expr.max_operand() < natives,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("{} cannot combine {} native events", self.as_str(), natives),
            ))
        }
    }

    /// Combines native counts, given in the order of the preset definition.
    pub fn evaluate(&self, natives: &[i64]) -> i64 {
        match self {
            Self::NotDerived => natives.first().copied().unwrap_or(0),
            Self::Add => natives.iter().fold(0i64, |acc, it| acc.wrapping_add(*it)),
            Self::Sub => match natives.split_first() {
                Some((first, rest)) => rest.iter().fold(*first, |acc, it| acc.wrapping_sub(*it)),
                None => 0,
            },
            Self::Postfix(expr) => expr.evaluate(natives),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
enum Token {
    Native(usize),
    Literal(i64),
    Add,
    Sub,
    Mul,
    Div,
}

/// Postfix expression such as `N0|N1|2|*|+|`.
///
/// Operands are `N<i>` (the i-th native of the definition) or integer literals,
/// operators are `+`, `-`, `*` and `/`; tokens are separated by `|`. Division
/// by zero evaluates to zero.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Postfix {
    tokens: Vec<Token>,
}

impl Postfix {
    fn max_operand(&self) -> usize {
        self.tokens
            .iter()
            .filter_map(|token| match token {
                Token::Native(i) => Some(*i),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    pub fn evaluate(&self, natives: &[i64]) -> i64 {
        let mut stack: Vec<i64> = Vec::with_capacity(self.tokens.len());
        for token in &self.tokens {
            let val = match *token {
                Token::Native(i) => natives.get(i).copied().unwrap_or(0),
                Token::Literal(v) => v,
                op => {
                    // Parsing guarantees two operands for every operator.
                    let rhs = stack.pop().unwrap_or(0);
                    let lhs = stack.pop().unwrap_or(0);
                    match op {
                        Token::Add => lhs.wrapping_add(rhs),
                        Token::Sub => lhs.wrapping_sub(rhs),
                        Token::Mul => lhs.wrapping_mul(rhs),
                        Token::Div => lhs.checked_div(rhs).unwrap_or(0),
                        _ => unreachable!(),
                    }
                }
            };
            stack.push(val);
        }
        stack.pop().unwrap_or(0)
    }
}

impl FromStr for Postfix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |what: &str| {
            Error::new(
                ErrorKind::InvalidArgument,
                format!("invalid postfix expression {:?}: {}", s, what),
            )
        };

        let mut tokens = vec![];
        let mut depth = 0usize;
        for raw in s.split('|').filter(|token| !token.is_empty()) {
            let token = match raw {
                "+" => Token::Add,
                "-" => Token::Sub,
                "*" => Token::Mul,
                "/" => Token::Div,
                _ => match raw.strip_prefix('N') {
                    Some(index) => Token::Native(index.parse().map_err(|_| invalid(raw))?),
                    None => Token::Literal(raw.parse().map_err(|_| invalid(raw))?),
                },
            };
            depth = match token {
                Token::Native(_) | Token::Literal(_) => depth + 1,
                _ if depth < 2 => return Err(invalid("operator without two operands")),
                _ => depth - 1,
            };
            tokens.push(token);
        }

        if depth != 1 {
            return Err(invalid("expression does not reduce to one value"));
        }
        Ok(Self { tokens })
    }
}

impl fmt::Display for Postfix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            match token {
                Token::Native(i) => write!(f, "N{}|", i)?,
                Token::Literal(v) => write!(f, "{}|", v)?,
                Token::Add => f.write_str("+|")?,
                Token::Sub => f.write_str("-|")?,
                Token::Mul => f.write_str("*|")?,
                Token::Div => f.write_str("/|")?,
            }
        }
        Ok(())
    }
}
