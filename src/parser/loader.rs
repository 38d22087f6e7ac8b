use std::rc::Rc;

use super::source::{parse_source, NodeData, TreeSource};
use crate::{error::LoadError, Context, Node, NodeDef, Symbol, Tree};

/// Compile the tree called `name` from a parsed source.
///
/// Every node name must either be registered in the context's registry or be
/// the name of another tree in `tree_source`, which is then inlined as a
/// subtree. Each node is validated by its process' [`crate::Process::init`].
///
/// `strict` additionally rejects arguments and slots that the node type does
/// not declare. It catches typos in a source file early, but requires every
/// custom process to describe itself fully in its [`NodeDef`].
pub fn load(
    tree_source: &TreeSource,
    ctx: &Context,
    name: &str,
    strict: bool,
) -> Result<Tree, LoadError> {
    let main = tree_source
        .find(name)
        .ok_or_else(|| LoadError::MissingTree(name.to_owned()))?;

    let top = TreeStack {
        name: &main.name,
        parent: None,
    };

    let mut loader = Loader {
        ctx,
        tree_source,
        strict,
        next_id: 1,
    };
    let root = loader.load_recurse(&main.root, &top)?;

    Ok(Tree {
        name: main.name.clone(),
        desc: main.desc.clone(),
        root,
    })
}

/// Parse YAML or JSON text and compile the tree called `name` from it.
pub fn load_str(text: &str, ctx: &Context, name: &str, strict: bool) -> Result<Tree, LoadError> {
    load(&parse_source(text)?, ctx, name, strict)
}

/// A mechanism to detect infinite recursion. It is a linked list in call stack.
/// You can traverse the link back to enumerate the subtree names being inlined
/// and check if a subtree name to be inserted is already there.
///
/// Subtrees are expanded eagerly at load time, so a tree that includes itself
/// would never finish loading. We make it an error instead.
struct TreeStack<'a, 'src> {
    name: &'src str,
    parent: Option<&'a TreeStack<'a, 'src>>,
}

impl<'a, 'src> TreeStack<'a, 'src> {
    fn find(&self, name: &str) -> bool {
        if self.name == name {
            true
        } else if let Some(parent) = self.parent {
            parent.find(name)
        } else {
            false
        }
    }
}

struct Loader<'a> {
    ctx: &'a Context,
    tree_source: &'a TreeSource,
    strict: bool,
    next_id: u32,
}

impl<'a> Loader<'a> {
    fn load_recurse(
        &mut self,
        data: &'a NodeData,
        parent_stack: &TreeStack<'_, 'a>,
    ) -> Result<Rc<Node>, LoadError> {
        let Some(process) = self.ctx.process(&data.name).cloned() else {
            let tree = self
                .tree_source
                .find(&data.name)
                .ok_or_else(|| LoadError::MissingNode(data.name.clone()))?;

            // Prevent infinite recursion
            if parent_stack.find(&data.name) {
                return Err(LoadError::InfiniteRecursion {
                    node: data.name.clone(),
                });
            }
            let tree_stack = TreeStack {
                name: &tree.name,
                parent: Some(parent_stack),
            };
            return self.load_recurse(&tree.root, &tree_stack);
        };

        let id = self.next_id;
        self.next_id += 1;

        let children = data
            .children
            .iter()
            .filter(|child| !child.disabled)
            .map(|child| self.load_recurse(child, parent_stack))
            .collect::<Result<Vec<_>, _>>()?;

        let node = Node {
            id,
            name: data.name.clone(),
            desc: data.desc.clone(),
            process: process.clone(),
            args: data.args.clone(),
            input: wire(&data.input),
            output: wire(&data.output),
            children,
        };

        if self.strict {
            check_declared(&process.descriptor(), data)?;
        }
        process
            .init(&node, self.ctx)
            .map_err(|error| LoadError::Init {
                error,
                node: data.name.clone(),
                id,
            })?;

        Ok(Rc::new(node))
    }
}

fn wire(vars: &[String]) -> Vec<Option<Symbol>> {
    vars.iter()
        .map(|var| (!var.is_empty()).then(|| Symbol::from(var)))
        .collect()
}

/// Reject arguments and slots the node type does not declare.
fn check_declared(def: &NodeDef, data: &NodeData) -> Result<(), LoadError> {
    if let Some(arg) = data.args.keys().find(|key| def.find_arg(key).is_none()) {
        return Err(LoadError::UnknownArg {
            node: data.name.clone(),
            arg: arg.clone(),
        });
    }
    for (slots, vars) in [(&def.input, &data.input), (&def.output, &data.output)] {
        let variadic = slots.last().map_or(false, |slot| slot.variadic);
        if !variadic && slots.len() < vars.len() {
            return Err(LoadError::SlotUnmatch {
                node: data.name.clone(),
                slot: vars[slots.len()].clone(),
            });
        }
    }
    Ok(())
}
