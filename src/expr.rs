//! A small, sandboxed expression language for `Check`, `Calculate` and friends.
//!
//! Expressions are parsed once into an [`Expr`] tree and cached by source text
//! in [`crate::Context::compile_code`]. Evaluation only reads variables through
//! a [`Scope`]; nothing in the language can write to the blackboard.
//!
//! ```raw
//! expr       = ternary
//! ternary    = or [ "?" expr ":" expr ]
//! or         = and ( "||" and )*
//! and        = equality ( "&&" equality )*
//! equality   = comparison ( ( "==" | "!=" ) comparison )*
//! comparison = additive ( ( "<=" | ">=" | "<" | ">" ) additive )*
//! additive   = term ( ( "+" | "-" ) term )*
//! term       = unary ( ( "*" | "/" | "%" ) unary )*
//! unary      = ( "!" | "-" ) unary | postfix
//! postfix    = primary ( "." identifier | "[" expr "]" )*
//! primary    = number | string | "true" | "false" | "null" | identifier
//!            | "(" expr ")" | "[" [ expr ( "," expr )* ] "]"
//! ```

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, one_of},
    combinator::{all_consuming, map, opt, recognize, value},
    multi::{fold_many0, many0, separated_list0},
    sequence::{delimited, pair, preceded, tuple},
    Finish, IResult,
};
use std::collections::HashMap;

use crate::{error::ExprError, Symbol, Value};

/// Read access to variables during evaluation.
pub trait Scope {
    fn get(&self, key: Symbol) -> Option<&Value>;
}

impl Scope for HashMap<Symbol, Value> {
    fn get(&self, key: Symbol) -> Option<&Value> {
        HashMap::get(self, &key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(Symbol),
    Array(Vec<Expr>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parse a whole expression, rejecting trailing garbage.
    pub fn parse(code: &str) -> Result<Self, ExprError> {
        all_consuming(ws(expr))(code)
            .finish()
            .map(|(_, expr)| expr)
            .map_err(|e| ExprError::Parse {
                code: code.to_owned(),
                offset: code.len() - e.input.len(),
            })
    }

    /// Variables referenced anywhere in the expression.
    pub fn vars(&self) -> Vec<Symbol> {
        let mut ret = vec![];
        self.collect_vars(&mut ret);
        ret
    }

    fn collect_vars(&self, out: &mut Vec<Symbol>) {
        match self {
            Self::Literal(_) => (),
            Self::Var(name) => {
                if !out.contains(name) {
                    out.push(*name);
                }
            }
            Self::Array(items) => items.iter().for_each(|item| item.collect_vars(out)),
            Self::Member(obj, _) => obj.collect_vars(out),
            Self::Unary(_, operand) => operand.collect_vars(out),
            Self::Index(lhs, rhs) | Self::Binary(_, lhs, rhs) => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
            Self::Conditional(cond, then, otherwise) => {
                cond.collect_vars(out);
                then.collect_vars(out);
                otherwise.collect_vars(out);
            }
        }
    }

    pub fn evaluate(&self, scope: &dyn Scope) -> Result<Value, ExprError> {
        Ok(match self {
            Self::Literal(v) => v.clone(),
            Self::Var(name) => scope.get(*name).cloned().unwrap_or(Value::Null),
            Self::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| item.evaluate(scope))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Member(obj, field) => match obj.evaluate(scope)? {
                Value::Null => return Err(ExprError::NullAccess(field.clone())),
                Value::Object(o) => o.get(field).cloned().unwrap_or(Value::Null),
                Value::Array(a) if field == "length" => Value::from(a.len()),
                Value::String(s) if field == "length" => Value::from(s.chars().count()),
                _ => Value::Null,
            },
            Self::Index(obj, index) => {
                let index = index.evaluate(scope)?;
                match obj.evaluate(scope)? {
                    Value::Null => return Err(ExprError::NullAccess(index.to_string())),
                    Value::Array(a) => index
                        .as_i64()
                        .filter(|i| *i >= 0)
                        .and_then(|i| a.get(i as usize).cloned())
                        .unwrap_or(Value::Null),
                    Value::Object(o) => o.get(&index.to_string()).cloned().unwrap_or(Value::Null),
                    _ => Value::Null,
                }
            }
            Self::Unary(UnaryOp::Not, operand) => Value::Bool(!operand.evaluate(scope)?.is_truthy()),
            Self::Unary(UnaryOp::Neg, operand) => match operand.evaluate(scope)? {
                Value::Number(n) => Value::Number(-n),
                v => {
                    return Err(ExprError::Type {
                        op: "-",
                        lhs: v.type_name(),
                        rhs: None,
                    })
                }
            },
            Self::Binary(BinaryOp::And, lhs, rhs) => {
                let lhs = lhs.evaluate(scope)?;
                if lhs.is_truthy() {
                    rhs.evaluate(scope)?
                } else {
                    lhs
                }
            }
            Self::Binary(BinaryOp::Or, lhs, rhs) => {
                let lhs = lhs.evaluate(scope)?;
                if lhs.is_truthy() {
                    lhs
                } else {
                    rhs.evaluate(scope)?
                }
            }
            Self::Binary(op, lhs, rhs) => binary(*op, lhs.evaluate(scope)?, rhs.evaluate(scope)?)?,
            Self::Conditional(cond, then, otherwise) => {
                if cond.evaluate(scope)?.is_truthy() {
                    then.evaluate(scope)?
                } else {
                    otherwise.evaluate(scope)?
                }
            }
        })
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, ExprError> {
    use BinaryOp::*;
    Ok(match (op, &lhs, &rhs) {
        (Eq, _, _) => Value::Bool(lhs == rhs),
        (Ne, _, _) => Value::Bool(lhs != rhs),
        (Add, Value::String(_), _) | (Add, _, Value::String(_)) => {
            Value::String(format!("{}{}", lhs, rhs))
        }
        (Add | Sub | Mul | Div | Rem, Value::Number(l), Value::Number(r)) => {
            Value::Number(match op {
                Add => l + r,
                Sub => l - r,
                Mul => l * r,
                Div => l / r,
                _ => l % r,
            })
        }
        (Lt | Le | Gt | Ge, Value::Number(l), Value::Number(r)) => Value::Bool(match op {
            Lt => l < r,
            Le => l <= r,
            Gt => l > r,
            _ => l >= r,
        }),
        (Lt | Le | Gt | Ge, Value::String(l), Value::String(r)) => Value::Bool(match op {
            Lt => l < r,
            Le => l <= r,
            Gt => l > r,
            _ => l >= r,
        }),
        _ => {
            return Err(ExprError::Type {
                op: op.symbol(),
                lhs: lhs.type_name(),
                rhs: Some(rhs.type_name()),
            })
        }
    })
}

fn ws<'a, O>(
    f: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, f, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"), tag("$"))),
        many0(alt((alphanumeric1, tag("_"), tag("$")))),
    ))(input)
}

fn number(i: &str) -> IResult<&str, Expr> {
    let (i, digits) = recognize(tuple((
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(i)?;
    let n = digits.parse::<f64>().map_err(|_| {
        nom::Err::Failure(nom::error::Error::new(i, nom::error::ErrorKind::Float))
    })?;
    Ok((i, Expr::Literal(Value::Number(n))))
}

fn str_literal(i: &str) -> IResult<&str, Expr> {
    fn body<'a>(quote: char) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
        let stop = if quote == '"' { "\"\\" } else { "'\\" };
        move |i| {
            let (i, parts) = many0(alt((
                map(is_not(stop), str::to_owned),
                map(
                    preceded(
                        char('\\'),
                        alt((
                            value("\n", char('n')),
                            value("\t", char('t')),
                            value("\\", char('\\')),
                            value("\"", char('"')),
                            value("'", char('\'')),
                        )),
                    ),
                    str::to_owned,
                ),
            )))(i)?;
            Ok((i, parts.concat()))
        }
    }

    let (i, s) = alt((
        delimited(char('"'), body('"'), char('"')),
        delimited(char('\''), body('\''), char('\'')),
    ))(i)?;
    Ok((i, Expr::Literal(Value::String(s))))
}

fn word(i: &str) -> IResult<&str, Expr> {
    let (i, name) = identifier(i)?;
    Ok((
        i,
        match name {
            "true" => Expr::Literal(Value::Bool(true)),
            "false" => Expr::Literal(Value::Bool(false)),
            "null" | "undefined" => Expr::Literal(Value::Null),
            _ => Expr::Var(name.into()),
        },
    ))
}

fn array_literal(i: &str) -> IResult<&str, Expr> {
    let (i, items) = delimited(
        ws(char('[')),
        separated_list0(ws(char(',')), expr),
        ws(char(']')),
    )(i)?;
    Ok((i, Expr::Array(items)))
}

fn primary(i: &str) -> IResult<&str, Expr> {
    ws(alt((
        number,
        str_literal,
        word,
        array_literal,
        delimited(ws(char('(')), expr, ws(char(')'))),
    )))(i)
}

enum Postfix {
    Member(String),
    Index(Expr),
}

fn postfix(i: &str) -> IResult<&str, Expr> {
    let (i, init) = primary(i)?;
    fold_many0(
        alt((
            map(preceded(ws(char('.')), identifier), |name| {
                Postfix::Member(name.to_owned())
            }),
            map(delimited(ws(char('[')), expr, ws(char(']'))), Postfix::Index),
        )),
        move || init.clone(),
        |acc, op| match op {
            Postfix::Member(name) => Expr::Member(Box::new(acc), name),
            Postfix::Index(index) => Expr::Index(Box::new(acc), Box::new(index)),
        },
    )(i)
}

fn unary(i: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('!')), unary), |e| {
            Expr::Unary(UnaryOp::Not, Box::new(e))
        }),
        map(preceded(ws(char('-')), unary), |e| {
            Expr::Unary(UnaryOp::Neg, Box::new(e))
        }),
        postfix,
    ))(i)
}

/// Left-associative chain of `operand (op operand)*`.
fn chain<'a>(
    operand: fn(&'a str) -> IResult<&'a str, Expr>,
    op: impl FnMut(&'a str) -> IResult<&'a str, BinaryOp>,
) -> impl FnMut(&'a str) -> IResult<&'a str, Expr> {
    let mut rest = pair(ws(op), operand);
    move |i| {
        let (mut i, mut acc) = operand(i)?;
        loop {
            match rest(i) {
                Ok((next, (op, rhs))) => {
                    acc = Expr::Binary(op, Box::new(acc), Box::new(rhs));
                    i = next;
                }
                Err(nom::Err::Error(_)) => return Ok((i, acc)),
                Err(e) => return Err(e),
            }
        }
    }
}

fn term(i: &str) -> IResult<&str, Expr> {
    chain(
        unary,
        alt((
            value(BinaryOp::Mul, char('*')),
            value(BinaryOp::Div, char('/')),
            value(BinaryOp::Rem, char('%')),
        )),
    )(i)
}

fn additive(i: &str) -> IResult<&str, Expr> {
    chain(
        term,
        alt((
            value(BinaryOp::Add, char('+')),
            value(BinaryOp::Sub, char('-')),
        )),
    )(i)
}

fn comparison(i: &str) -> IResult<&str, Expr> {
    chain(
        additive,
        alt((
            value(BinaryOp::Le, tag("<=")),
            value(BinaryOp::Ge, tag(">=")),
            value(BinaryOp::Lt, char('<')),
            value(BinaryOp::Gt, char('>')),
        )),
    )(i)
}

fn equality(i: &str) -> IResult<&str, Expr> {
    chain(
        comparison,
        alt((
            value(BinaryOp::Eq, alt((tag("==="), tag("==")))),
            value(BinaryOp::Ne, alt((tag("!=="), tag("!=")))),
        )),
    )(i)
}

fn and(i: &str) -> IResult<&str, Expr> {
    chain(equality, value(BinaryOp::And, tag("&&")))(i)
}

fn or(i: &str) -> IResult<&str, Expr> {
    chain(and, value(BinaryOp::Or, tag("||")))(i)
}

fn expr(i: &str) -> IResult<&str, Expr> {
    let (i, cond) = or(i)?;
    let (i, branches) = opt(pair(
        preceded(ws(char('?')), expr),
        preceded(ws(char(':')), expr),
    ))(i)?;
    Ok((
        i,
        match branches {
            Some((then, otherwise)) => {
                Expr::Conditional(Box::new(cond), Box::new(then), Box::new(otherwise))
            }
            None => cond,
        },
    ))
}
