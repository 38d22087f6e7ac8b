use tracing::{debug, error, info, trace, warn};

use crate::{
    ArgDef, ArgType, Node, NodeDef, NodeType, Process, RunResult, Status, TreeEnv, Value,
};

/// Evaluates an expression into the output variable.
pub struct CalculateProcess;

impl Process for CalculateProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "Calculate",
            NodeType::Action,
            "Stores the result of an expression",
        )
        .output(&["value"])
        .arg(ArgDef::new("value", ArgType::Expr, "Expression to evaluate"))
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let value = node.evaluate(env, "value")?;
        env.set_output(node, 0, value);
        Ok(Status::Success)
    }
}

/// Stores a literal value.
pub struct LetProcess;

impl Process for LetProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new("Let", NodeType::Action, "Stores a constant")
            .output(&["value"])
            .arg(ArgDef::optional("value", ArgType::Json, "Value to store"))
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let value = node.arg("value").cloned().unwrap_or_default();
        env.set_output(node, 0, value);
        Ok(Status::Success)
    }
}

/// Appends the input value to the array in the output variable, creating
/// the array if the variable is unset. Fails if it holds something else.
pub struct PushProcess;

impl Process for PushProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "Push",
            NodeType::Action,
            "Appends a value to an array variable",
        )
        .input(&["value"])
        .output(&["array"])
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let value = env.input(node, 0).cloned().unwrap_or_default();
        let mut array = match env.output_value(node, 0) {
            None | Some(Value::Null) => vec![],
            Some(Value::Array(array)) => array.clone(),
            Some(_) => return Ok(Status::Failure),
        };
        array.push(value);
        env.set_output(node, 0, Value::Array(array));
        Ok(Status::Success)
    }
}

/// Removes variables, and with `temp` set, every temporary variable.
pub struct ClearProcess;

impl Process for ClearProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new("Clear", NodeType::Action, "Removes variables")
            .doc("Temporary variables are those whose names start with `__`.")
            .output(&["vars..."])
            .arg(ArgDef::optional(
                "temp",
                ArgType::Bool,
                "Also remove all temporary variables",
            ))
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        for key in node.outputs().iter().flatten() {
            env.remove(*key);
        }
        if node.arg_bool("temp").unwrap_or(false) {
            env.clear_temp_vars();
        }
        Ok(Status::Success)
    }
}

/// Writes a message and the input values to the `tracing` subscriber.
pub struct LogProcess;

impl Process for LogProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new("Log", NodeType::Action, "Logs a message")
            .input(&["values..."])
            .arg(ArgDef::new("message", ArgType::String, "Message"))
            .arg(ArgDef::optional(
                "level",
                ArgType::String,
                "trace, debug, info, warn or error; info by default",
            ))
    }

    fn init(&self, node: &Node, ctx: &crate::Context) -> Result<(), crate::InitError> {
        crate::validate(&self.descriptor(), node, ctx)?;
        match node.arg_str("level") {
            None | Some("trace" | "debug" | "info" | "warn" | "error") => Ok(()),
            Some(_) => Err(crate::InitError::ArgType {
                arg: "level".to_owned(),
                expected: "log level",
            }),
        }
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let mut message = node.arg_str("message").unwrap_or_default().to_owned();
        for i in 0..node.inputs().len() {
            message.push(' ');
            match env.input(node, i) {
                Some(value) => message += &value.to_string(),
                None => message += "null",
            }
        }
        let id = node.id();
        match node.arg_str("level").unwrap_or("info") {
            "trace" => trace!(id, "{}", message),
            "debug" => debug!(id, "{}", message),
            "warn" => warn!(id, "{}", message),
            "error" => error!(id, "{}", message),
            _ => info!(id, "{}", message),
        }
        Ok(Status::Success)
    }
}

/// Reads the context clock.
pub struct NowProcess;

impl Process for NowProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new("Now", NodeType::Action, "Stores the current time")
            .output(&["time"])
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let now = env.context().time();
        env.set_output(node, 0, now);
        Ok(Status::Success)
    }
}

/// Stays running until `time` has passed on the context clock.
pub struct WaitProcess;

impl Process for WaitProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new("Wait", NodeType::Action, "Waits for a while")
            .doc("The input variable, when wired, overrides the `time` argument.")
            .input(&["time?"])
            .arg(ArgDef::optional("time", ArgType::Float, "Duration"))
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let now = env.context().time();
        let deadline = match node.resume_as::<f64>(env)? {
            Some(deadline) => deadline,
            None => {
                let time = env
                    .input(node, 0)
                    .and_then(Value::as_f64)
                    .or_else(|| node.arg_f64("time"))
                    .unwrap_or(0.);
                now + time
            }
        };
        if deadline <= now {
            Ok(Status::Success)
        } else {
            Ok(node.suspend(env, deadline))
        }
    }
}
