use id_arena::Id;

use crate::scene_graph::mesh::MeshId;
use crate::scene_graph::transform::Transform;

pub type NodeId = Id<Node>;

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub mesh_id: Option<MeshId>,
    pub child_ids: Vec<NodeId>,
}

impl Node {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
