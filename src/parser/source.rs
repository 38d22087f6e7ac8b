//! Serializable form of trees, as produced by an editor.
//!
//! A source is either a single tree or a list of trees; the latter lets
//! one tree use another as a subtree by naming it in place of a node type.
//!
//! ```yaml
//! - name: main
//!   root:
//!     name: Sequence
//!     children:
//!     - name: patrol
//! - name: patrol
//!   root:
//!     name: Wait
//!     args: { time: 1 }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{error::LoadError, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeData {
    /// Ignored by the loader, which numbers nodes itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, Value>,
    /// Variable names wired to the input slots, `""` for unwired.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeData>,
    /// Disabled nodes are left out of the compiled tree.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

impl NodeData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn input(mut self, vars: &[&str]) -> Self {
        self.input = vars.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn output(mut self, vars: &[&str]) -> Self {
        self.output = vars.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn child(mut self, child: NodeData) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeData {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
    pub root: NodeData,
}

impl TreeData {
    pub fn new(name: impl Into<String>, root: NodeData) -> Self {
        Self {
            name: name.into(),
            desc: String::new(),
            root,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SourceRepr {
    Many(Vec<TreeData>),
    Single(TreeData),
}

/// All the trees of one source file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "SourceRepr", into = "Vec<TreeData>")]
pub struct TreeSource {
    pub trees: Vec<TreeData>,
}

impl From<SourceRepr> for TreeSource {
    fn from(repr: SourceRepr) -> Self {
        match repr {
            SourceRepr::Many(trees) => Self { trees },
            SourceRepr::Single(tree) => Self { trees: vec![tree] },
        }
    }
}

impl From<TreeSource> for Vec<TreeData> {
    fn from(source: TreeSource) -> Self {
        source.trees
    }
}

impl From<Vec<TreeData>> for TreeSource {
    fn from(trees: Vec<TreeData>) -> Self {
        Self { trees }
    }
}

impl TreeSource {
    pub fn find(&self, name: &str) -> Option<&TreeData> {
        self.trees.iter().find(|tree| tree.name == name)
    }
}

/// Parse a YAML or JSON tree source.
pub fn parse_source(text: &str) -> Result<TreeSource, LoadError> {
    Ok(serde_yaml::from_str(text)?)
}
