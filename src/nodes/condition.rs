use crate::{
    ArgDef, ArgType, Node, NodeDef, NodeType, Process, RunResult, Status, TreeEnv, Value,
};

fn status_of(pass: bool) -> Status {
    if pass {
        Status::Success
    } else {
        Status::Failure
    }
}

/// Succeeds when the expression evaluates to a truthy value.
pub struct CheckProcess;

impl Process for CheckProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new("Check", NodeType::Condition, "Tests an expression")
            .arg(ArgDef::new("value", ArgType::Expr, "Expression to test"))
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        Ok(status_of(node.evaluate(env, "value")?.is_truthy()))
    }
}

pub struct IsNullProcess;

impl Process for IsNullProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "IsNull",
            NodeType::Condition,
            "Succeeds if the variable is unset or null",
        )
        .input(&["value"])
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        Ok(status_of(env.input(node, 0).map_or(true, Value::is_null)))
    }
}

pub struct NotNullProcess;

impl Process for NotNullProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "NotNull",
            NodeType::Condition,
            "Succeeds if the variable holds a value",
        )
        .input(&["value"])
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        Ok(status_of(env.input(node, 0).map_or(false, |v| !v.is_null())))
    }
}

/// Compares the status of the node that completed last, typically the
/// previous sibling, against the `status` argument.
pub struct IsStatusProcess;

impl Process for IsStatusProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "IsStatus",
            NodeType::Condition,
            "Tests the status of the previously completed node",
        )
        .arg(ArgDef::new(
            "status",
            ArgType::Status,
            "One of success, failure or running",
        ))
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let expected = node.arg_str("status").and_then(Status::from_name);
        Ok(status_of(expected == Some(env.last_status())))
    }
}
