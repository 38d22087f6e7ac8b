use serde::Serialize;

use crate::{Status, Value};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum NodeType {
    Composite,
    Decorator,
    Condition,
    Action,
}

impl NodeType {
    /// Inclusive bounds on the number of children, `None` meaning unbounded.
    pub fn child_bounds(self) -> (usize, Option<usize>) {
        match self {
            Self::Composite => (1, None),
            Self::Decorator => (1, Some(1)),
            Self::Condition | Self::Action => (0, Some(0)),
        }
    }
}

/// A declared input or output slot, written as `"name"`, `"name?"` (optional)
/// or `"name..."` (variadic, also optional).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct SlotDef {
    pub name: &'static str,
    pub optional: bool,
    pub variadic: bool,
}

impl SlotDef {
    pub fn parse(text: &'static str) -> Self {
        if let Some(name) = text.strip_suffix("...") {
            Self {
                name,
                optional: true,
                variadic: true,
            }
        } else if let Some(name) = text.strip_suffix('?') {
            Self {
                name,
                optional: true,
                variadic: false,
            }
        } else {
            Self {
                name: text,
                optional: false,
                variadic: false,
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum ArgType {
    Bool,
    Int,
    Float,
    String,
    /// Source text of an expression, compiled when the tree is loaded.
    Expr,
    /// Any value.
    Json,
    /// One of `"success"`, `"failure"` or `"running"`.
    Status,
}

impl ArgType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Expr => "expr",
            Self::Json => "json",
            Self::Status => "status",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Bool => value.as_bool().is_some(),
            Self::Int => value.as_i64().is_some(),
            Self::Float => value.as_f64().is_some(),
            Self::String | Self::Expr => value.as_str().is_some(),
            Self::Json => true,
            Self::Status => value.as_str().and_then(Status::from_name).is_some(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct ArgDef {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: ArgType,
    pub desc: &'static str,
    pub optional: bool,
}

impl ArgDef {
    pub fn new(name: &'static str, ty: ArgType, desc: &'static str) -> Self {
        Self {
            name,
            ty,
            desc,
            optional: false,
        }
    }

    pub fn optional(name: &'static str, ty: ArgType, desc: &'static str) -> Self {
        Self {
            name,
            ty,
            desc,
            optional: true,
        }
    }
}

/// Static description of a node type, for tooling and load-time validation.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct NodeDef {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: NodeType,
    pub desc: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub doc: &'static str,
    pub input: Vec<SlotDef>,
    pub output: Vec<SlotDef>,
    pub args: Vec<ArgDef>,
}

impl NodeDef {
    pub fn new(name: &'static str, ty: NodeType, desc: &'static str) -> Self {
        Self {
            name,
            ty,
            desc,
            doc: "",
            input: vec![],
            output: vec![],
            args: vec![],
        }
    }

    pub fn doc(mut self, doc: &'static str) -> Self {
        self.doc = doc;
        self
    }

    pub fn input(mut self, slots: &[&'static str]) -> Self {
        self.input = slots.iter().map(|s| SlotDef::parse(*s)).collect();
        self
    }

    pub fn output(mut self, slots: &[&'static str]) -> Self {
        self.output = slots.iter().map(|s| SlotDef::parse(*s)).collect();
        self
    }

    pub fn arg(mut self, arg: ArgDef) -> Self {
        self.args.push(arg);
        self
    }

    pub fn find_arg(&self, name: &str) -> Option<&ArgDef> {
        self.args.iter().find(|arg| arg.name == name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_slot_parse() {
        assert_eq!(
            SlotDef::parse("target?"),
            SlotDef {
                name: "target",
                optional: true,
                variadic: false
            }
        );
        assert!(SlotDef::parse("vars...").variadic);
        assert!(!SlotDef::parse("count").optional);
    }

    #[test]
    fn test_arg_type() {
        assert!(ArgType::Int.accepts(&Value::from(3)));
        assert!(!ArgType::Int.accepts(&Value::from(3.5)));
        assert!(ArgType::Status.accepts(&Value::from("running")));
        assert!(!ArgType::Status.accepts(&Value::from("done")));
    }
}
