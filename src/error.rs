use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ExprError {
    /// The source text could not be parsed; `offset` is the byte position of the failure.
    Parse { code: String, offset: usize },
    /// Member or index access on a null value.
    NullAccess(String),
    /// Operator applied to operands of the wrong types.
    Type {
        op: &'static str,
        lhs: &'static str,
        rhs: Option<&'static str>,
    },
}

impl Display for ExprError {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        match self {
            Self::Parse { code, offset } => {
                write!(fmt, "Syntax error at {} in expression {:?}", offset, code)
            }
            Self::NullAccess(field) => write!(fmt, "Cannot read {:?} of null", field),
            Self::Type {
                op,
                lhs,
                rhs: Some(rhs),
            } => write!(fmt, "Operator {} is not defined for {} and {}", op, lhs, rhs),
            Self::Type { op, lhs, rhs: None } => {
                write!(fmt, "Operator {} is not defined for {}", op, lhs)
            }
        }
    }
}

impl std::error::Error for ExprError {}

/// Structural problems found by `Process::init` while compiling a tree.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum InitError {
    TooFewChildren { expected: usize, found: usize },
    TooManyChildren { expected: usize, found: usize },
    MissingArg(String),
    ArgType { arg: String, expected: &'static str },
    MissingInput(String),
    MissingOutput(String),
    Expr { arg: String, error: ExprError },
    Custom(String),
}

impl Display for InitError {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        match self {
            Self::TooFewChildren { expected, found } => write!(
                fmt,
                "Needs at least {} children, but has {}",
                expected, found
            ),
            Self::TooManyChildren { expected, found } => write!(
                fmt,
                "Accepts at most {} children, but has {}",
                expected, found
            ),
            Self::MissingArg(arg) => write!(fmt, "Missing required argument {:?}", arg),
            Self::ArgType { arg, expected } => {
                write!(fmt, "Argument {:?} should be of type {}", arg, expected)
            }
            Self::MissingInput(slot) => write!(fmt, "Input slot {:?} is not wired", slot),
            Self::MissingOutput(slot) => write!(fmt, "Output slot {:?} is not wired", slot),
            Self::Expr { arg, error } => write!(fmt, "Argument {:?}: {}", arg, error),
            Self::Custom(msg) => fmt.write_str(msg),
        }
    }
}

impl std::error::Error for InitError {}

#[derive(Debug)]
#[non_exhaustive]
pub enum LoadError {
    Yaml(serde_yaml::Error),
    MissingTree(String),
    MissingNode(String),
    InfiniteRecursion { node: String },
    Init {
        error: InitError,
        node: String,
        id: u32,
    },
    UnknownArg { node: String, arg: String },
    SlotUnmatch { node: String, slot: String },
}

impl Display for LoadError {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        match self {
            Self::Yaml(e) => e.fmt(fmt),
            Self::MissingTree(name) => write!(fmt, "The tree {:?} does not exist", name),
            Self::MissingNode(node) => {
                write!(fmt, "Node type or subtree name not found {:?}", node)
            }
            Self::InfiniteRecursion { node } => {
                write!(fmt, "Subtree {:?} includes itself", node)
            }
            Self::Init { error, node, id } => write!(fmt, "{} (node {} #{})", error, node, id),
            Self::UnknownArg { node, arg } => {
                write!(fmt, "Node {} does not declare argument {:?}", node, arg)
            }
            Self::SlotUnmatch { node, slot } => {
                write!(fmt, "Node {} does not declare slot {:?}", node, slot)
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Yaml(e) => Some(e),
            Self::Init { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for LoadError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err)
    }
}

/// Failures raised while ticking. The runner turns every one of them into a
/// `Failure` of the whole tree.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RunError {
    Expr {
        node: String,
        id: u32,
        error: ExprError,
    },
    Assertion {
        id: u32,
        message: String,
    },
    /// A node was resumed without a continuation it could understand.
    BadResume { node: String, id: u32 },
    Custom(String),
}

impl Display for RunError {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        match self {
            Self::Expr { node, id, error } => write!(fmt, "{} #{}: {}", node, id, error),
            Self::Assertion { id, message } => {
                write!(fmt, "Assertion failed at #{}: {}", id, message)
            }
            Self::BadResume { node, id } => {
                write!(fmt, "{} #{} was resumed with an unexpected state", node, id)
            }
            Self::Custom(msg) => fmt.write_str(msg),
        }
    }
}

impl std::error::Error for RunError {}

pub type RunResult = Result<crate::Status, RunError>;
