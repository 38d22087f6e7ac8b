mod loader;
mod source;

pub use self::{
    loader::{load, load_str},
    source::{parse_source, NodeData, TreeData, TreeSource},
};
