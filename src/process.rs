use crate::{
    error::{InitError, RunResult},
    Context, Node, NodeDef, TreeEnv, Value,
};

/// The behavior of one node type.
///
/// A process is stateless with respect to any particular node or actor:
/// one instance serves every node of its type. Anything a node needs to keep
/// between ticks is stored in the [`TreeEnv`], either as a variable or as a
/// continuation payload through [`Node::suspend`].
pub trait Process {
    fn descriptor(&self) -> NodeDef;

    /// Validate a freshly compiled node. Called once per node at load time.
    fn init(&self, node: &Node, ctx: &Context) -> Result<(), InitError> {
        validate(&self.descriptor(), node, ctx)
    }

    /// Tick `node`. A node returning [`crate::Status::Running`] should have
    /// stored whatever it needs with [`Node::suspend`] before returning.
    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult;
}

/// Check a node against its declaration: child count, required and typed
/// args, wired slots. Expression args are compiled into the context cache.
pub fn validate(def: &NodeDef, node: &Node, ctx: &Context) -> Result<(), InitError> {
    let (min, max) = def.ty.child_bounds();
    let found = node.children().len();
    if found < min {
        return Err(InitError::TooFewChildren {
            expected: min,
            found,
        });
    }
    if let Some(max) = max {
        if max < found {
            return Err(InitError::TooManyChildren {
                expected: max,
                found,
            });
        }
    }

    for arg in &def.args {
        let value = match node.arg(arg.name) {
            None | Some(Value::Null) if arg.optional => continue,
            None | Some(Value::Null) => return Err(InitError::MissingArg(arg.name.to_owned())),
            Some(value) => value,
        };
        if !arg.ty.accepts(value) {
            return Err(InitError::ArgType {
                arg: arg.name.to_owned(),
                expected: arg.ty.name(),
            });
        }
        if let (crate::ArgType::Expr, Some(code)) = (arg.ty, value.as_str()) {
            ctx.compile_code(code).map_err(|error| InitError::Expr {
                arg: arg.name.to_owned(),
                error,
            })?;
        }
    }

    for (i, slot) in def.input.iter().enumerate() {
        if !slot.optional && node.input(i).is_none() {
            return Err(InitError::MissingInput(slot.name.to_owned()));
        }
    }
    for (i, slot) in def.output.iter().enumerate() {
        if !slot.optional && node.output(i).is_none() {
            return Err(InitError::MissingOutput(slot.name.to_owned()));
        }
    }
    Ok(())
}
