pub mod mesh;
pub mod model;
pub mod node;
pub mod scene;
pub mod transform;

pub use mesh::{Material, Mesh, MeshId, MeshPrimitive, Vertex};
pub use model::{Model, ModelId};
pub use scene::Scene;
