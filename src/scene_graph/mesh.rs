use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};
use id_arena::Id;
use itertools::Itertools;

use crate::math::bounds::Aabb;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coords: Vec2,
}

/// RGBA8 pixels for a base colour texture.
#[derive(Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl std::fmt::Debug for TextureData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureData")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub base_color: Vec4,
    pub base_color_texture: Option<TextureData>,
    pub wireframe: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::from("Default material"),
            base_color: Vec4::ONE,
            base_color_texture: None,
            wireframe: false,
        }
    }
}

/// One drawable surface: geometry plus the material it is shaded with.
#[derive(Debug, Clone)]
pub struct MeshPrimitive {
    pub index: usize,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: Material,
}

impl MeshPrimitive {
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|vertex| vertex.position))
    }

    /// Unique triangle edges as a line list, used for wireframe drawing.
    pub fn edge_indices(&self) -> Vec<u32> {
        self.indices
            .chunks_exact(3)
            .flat_map(|triangle| {
                [
                    (triangle[0], triangle[1]),
                    (triangle[1], triangle[2]),
                    (triangle[2], triangle[0]),
                ]
            })
            .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
            .unique()
            .flat_map(|(a, b)| [a, b])
            .collect()
    }
}

pub type MeshId = Id<Mesh>;

#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub primitives: Vec<MeshPrimitive>,
}

impl Mesh {
    pub fn bounds(&self) -> Aabb {
        self.primitives
            .iter()
            .fold(Aabb::EMPTY, |aabb, primitive| aabb.union(&primitive.bounds()))
    }
}

/// Smooth per-vertex normals accumulated from face normals.
pub fn generate_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }

        let face_normal = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face_normal;
        normals[b] += face_normal;
        normals[c] += face_normal;
    }

    normals
        .into_iter()
        .map(|normal| normal.try_normalize().unwrap_or(Vec3::Y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> MeshPrimitive {
        let positions = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let indices = vec![0, 1, 2, 0, 2, 3];
        let normals = generate_normals(&positions, &indices);

        MeshPrimitive {
            index: 0,
            vertices: positions
                .iter()
                .zip(normals)
                .map(|(position, normal)| Vertex {
                    position: *position,
                    normal,
                    tex_coords: Vec2::ZERO,
                })
                .collect(),
            indices,
            material: Material::default(),
        }
    }

    #[test]
    fn edges_shared_by_two_triangles_are_emitted_once() {
        let edges = quad().edge_indices();
        // 4 outer edges plus the diagonal
        assert_eq!(edges.len(), 5 * 2);
        assert_eq!(&edges[..2], &[0, 1]);
    }

    #[test]
    fn generated_normals_face_the_winding_direction() {
        let primitive = quad();
        for vertex in &primitive.vertices {
            assert!((vertex.normal - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn degenerate_vertices_get_a_fallback_normal() {
        let normals = generate_normals(&[Vec3::ZERO, Vec3::ZERO, Vec3::ZERO], &[0, 1, 2]);
        assert_eq!(normals, vec![Vec3::Y; 3]);
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let bounds = quad().bounds();
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, Vec3::new(1.0, 1.0, 0.0));
    }
}
