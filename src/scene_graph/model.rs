use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use id_arena::Arena;
use itertools::izip;

use crate::math::bounds::Aabb;
use crate::scene_graph::mesh::{
    generate_normals, Material, Mesh, MeshId, MeshPrimitive, TextureData, Vertex,
};
use crate::scene_graph::node::{Node, NodeId};
use crate::scene_graph::transform::Transform;

pub type Buffers<'a> = &'a [gltf::buffer::Data];
pub type Images<'a> = &'a [gltf::image::Data];

/// Identifies a model instance across the scene and the renderer's GPU caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(u64);

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

impl ModelId {
    fn next() -> Self {
        Self(NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A loaded asset: a node hierarchy under a single root transform.
pub struct Model {
    id: ModelId,
    pub name: String,
    pub transform: Transform,
    rotation_y: f32,
    nodes: Arena<Node>,
    meshes: Arena<Mesh>,
    root_ids: Vec<NodeId>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ModelId::next(),
            name: name.into(),
            transform: Transform::default(),
            rotation_y: 0.0,
            nodes: Arena::new(),
            meshes: Arena::new(),
            root_ids: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Model> {
        let (document, buffers, images) = gltf::import(path)
            .with_context(|| format!("Failed to import glTF file {}", path.display()))?;

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Model::from_gltf(name, &document, &buffers, &images)
    }

    pub fn from_gltf(
        name: impl Into<String>,
        document: &gltf::Document,
        buffers: Buffers,
        images: Images,
    ) -> anyhow::Result<Model> {
        let mut model = Model::new(name);

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .context("No scenes in gltf")?;

        let mut gltf_mesh_to_mesh = HashMap::new();

        for node in scene.nodes() {
            model.spawn_gltf_node(&node, None, buffers, images, &mut gltf_mesh_to_mesh);
        }

        if model.meshes.len() == 0 {
            log::warn!("Model {} contains no triangle meshes", model.name);
        }

        Ok(model)
    }

    fn spawn_gltf_node(
        &mut self,
        node: &gltf::Node,
        parent: Option<NodeId>,
        buffers: Buffers,
        images: Images,
        gltf_mesh_to_mesh: &mut HashMap<usize, MeshId>,
    ) -> NodeId {
        let node_name = node.name().unwrap_or("Unnamed").to_string();
        let (translation, rotation, scale) = node.transform().decomposed();

        let mut object = Node::named(node_name.clone());
        object.transform = Transform::new(
            translation.into(),
            Quat::from_array(rotation),
            scale.into(),
        );

        if let Some(mesh) = node.mesh() {
            let mesh_index = mesh.index();

            let mesh_id = match gltf_mesh_to_mesh.get(&mesh_index).copied() {
                Some(mesh_id) => Some(mesh_id),
                None => {
                    let mesh_name = mesh
                        .name()
                        .map(String::from)
                        .unwrap_or_else(|| format!("{} (Mesh)", node_name));

                    let mesh = mesh_from_gltf(mesh_name, &mesh, buffers, images);

                    if mesh.primitives.is_empty() {
                        None
                    } else {
                        let mesh_id = self.add_mesh(mesh);
                        gltf_mesh_to_mesh.insert(mesh_index, mesh_id);
                        Some(mesh_id)
                    }
                }
            };

            object.mesh_id = mesh_id;
        }

        let node_id = self.add_node(object, parent);

        for child in node.children() {
            self.spawn_gltf_node(&child, Some(node_id), buffers, images, gltf_mesh_to_mesh);
        }

        node_id
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.alloc(mesh)
    }

    /// Adds a node, either as a root or as the last child of `parent`.
    pub fn add_node(&mut self, node: Node, parent: Option<NodeId>) -> NodeId {
        let node_id = self.nodes.alloc(node);

        match parent.and_then(|parent_id| self.nodes.get_mut(parent_id)) {
            Some(parent) => parent.child_ids.push(node_id),
            None => self.root_ids.push(node_id),
        }

        node_id
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id)
    }

    pub fn meshes(&self) -> impl Iterator<Item = (MeshId, &Mesh)> {
        self.meshes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Visits every node depth-first, parents before children.
    pub fn traverse(&self, mut visit: impl FnMut(NodeId, &Node)) {
        let mut stack: Vec<NodeId> = self.root_ids.iter().rev().copied().collect();

        while let Some(node_id) = stack.pop() {
            if let Some(node) = self.nodes.get(node_id) {
                visit(node_id, node);
                stack.extend(node.child_ids.iter().rev().copied());
            }
        }
    }

    /// Flips the wireframe flag of every mesh reachable from the roots.
    /// A mesh referenced by several nodes is flipped once.
    pub fn toggle_wireframe(&mut self) {
        let mut mesh_ids = Vec::new();
        self.traverse(|_, node| {
            if let Some(mesh_id) = node.mesh_id {
                if !mesh_ids.contains(&mesh_id) {
                    mesh_ids.push(mesh_id);
                }
            }
        });

        for mesh_id in mesh_ids {
            if let Some(mesh) = self.meshes.get_mut(mesh_id) {
                for primitive in &mut mesh.primitives {
                    primitive.material.wireframe = !primitive.material.wireframe;
                }
            }
        }
    }

    pub fn rotation_y(&self) -> f32 {
        self.rotation_y
    }

    pub fn rotate_y(&mut self, angle: f32) {
        self.rotation_y += angle;
        self.transform
            .set_rotation(Quat::from_rotation_y(self.rotation_y));
    }

    /// Recomputes node matrices relative to the model root.
    pub fn update_world_transforms(&self) {
        for &root_id in &self.root_ids {
            self.update_node_transform_recursive(root_id, Mat4::IDENTITY, false);
        }
    }

    fn update_node_transform_recursive(
        &self,
        node_id: NodeId,
        parent_matrix: Mat4,
        parent_changed: bool,
    ) {
        let Some(node) = self.nodes.get(node_id) else {
            return;
        };

        let changed = parent_changed || node.transform.is_world_dirty();
        if changed {
            let local_matrix = *node.transform.get_local_matrix();
            node.transform.set_world_matrix(parent_matrix * local_matrix);
        }

        let world_matrix = *node.transform.get_world_matrix();
        for &child_id in &node.child_ids {
            self.update_node_transform_recursive(child_id, world_matrix, changed);
        }
    }

    /// World matrix of every mesh node, root transform included.
    pub fn mesh_instances(&self) -> Vec<(MeshId, Mat4)> {
        self.update_world_transforms();
        let root_matrix = *self.transform.get_local_matrix();

        let mut instances = Vec::new();
        self.traverse(|_, node| {
            if let Some(mesh_id) = node.mesh_id {
                instances.push((mesh_id, root_matrix * *node.transform.get_world_matrix()));
            }
        });

        instances
    }

    pub fn world_bounds(&self) -> Aabb {
        self.mesh_instances()
            .into_iter()
            .filter_map(|(mesh_id, matrix)| {
                self.meshes
                    .get(mesh_id)
                    .map(|mesh| mesh.bounds().transformed(&matrix))
            })
            .fold(Aabb::EMPTY, |bounds, mesh_bounds| bounds.union(&mesh_bounds))
    }

    /// Scales the model uniformly, then moves it so the centre of its bounds
    /// sits at the origin, dropped by `1 / drop_divisor` of its height.
    pub fn fit_to_origin(&mut self, scale: f32, drop_divisor: f32) {
        self.transform.set_translation(Vec3::ZERO);
        self.transform.set_uniform_scale(scale);

        let bounds = self.world_bounds();
        let center = bounds.center();
        let size = bounds.size();

        self.transform.set_translation(Vec3::new(
            -center.x,
            -center.y - size.y / drop_divisor,
            -center.z,
        ));
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("meshes", &self.meshes.len())
            .finish()
    }
}

fn mesh_from_gltf(name: String, mesh: &gltf::Mesh, buffers: Buffers, images: Images) -> Mesh {
    let mut primitives = Vec::new();

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!(
                "Skipping primitive {} of {}: unsupported mode {:?}",
                primitive.index(),
                name,
                primitive.mode()
            );
            continue;
        }

        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data[..]));

        let Some(position_reader) = reader.read_positions() else {
            log::warn!(
                "Skipping primitive {} of {}: no positions",
                primitive.index(),
                name
            );
            continue;
        };
        let positions = position_reader.map(Vec3::from).collect::<Vec<_>>();

        let indices = match reader.read_indices() {
            Some(index_reader) => index_reader.into_u32().collect::<Vec<u32>>(),
            None => (0..positions.len() as u32).collect(),
        };

        let normals = match reader.read_normals() {
            Some(normal_reader) => normal_reader.map(Vec3::from).collect::<Vec<_>>(),
            None => {
                log::debug!("Generating normals for {} primitive {}", name, primitive.index());
                generate_normals(&positions, &indices)
            }
        };

        let tex_coords = match reader.read_tex_coords(0) {
            Some(tex_coords_reader) => tex_coords_reader
                .into_f32()
                .map(Vec2::from)
                .collect::<Vec<_>>(),
            None => vec![Vec2::ZERO; positions.len()],
        };

        let vertices = izip!(positions, normals, tex_coords)
            .map(|(position, normal, tex_coords)| Vertex {
                position,
                normal,
                tex_coords,
            })
            .collect::<Vec<Vertex>>();

        primitives.push(MeshPrimitive {
            index: primitive.index(),
            vertices,
            indices,
            material: material_from_gltf(&primitive.material(), images),
        });
    }

    Mesh { name, primitives }
}

fn material_from_gltf(material: &gltf::Material, images: Images) -> Material {
    let pbr = material.pbr_metallic_roughness();

    let base_color_texture = pbr.base_color_texture().and_then(|texture_info| {
        let image_index = texture_info.texture().source().index();
        let image = images.get(image_index)?;
        let converted = convert_image_data_to_rgba(image);

        if converted.is_none() {
            log::warn!(
                "Unsupported base colour texture format {:?} in material {}",
                image.format,
                material.name().unwrap_or("Unnamed material")
            );
        }

        converted
    });

    Material {
        name: material.name().unwrap_or("Unnamed material").to_string(),
        base_color: Vec4::from(pbr.base_color_factor()),
        base_color_texture,
        wireframe: false,
    }
}

fn convert_image_data_to_rgba(data: &gltf::image::Data) -> Option<TextureData> {
    use gltf::image::Format;

    let pixels = match data.format {
        Format::R8G8B8A8 => data.pixels.clone(),
        Format::R8G8B8 => data
            .pixels
            .chunks_exact(3)
            .flat_map(|pixel| [pixel[0], pixel[1], pixel[2], 255])
            .collect(),
        Format::R8G8 => data
            .pixels
            .chunks_exact(2)
            .flat_map(|pixel| [pixel[0], pixel[0], pixel[0], pixel[1]])
            .collect(),
        Format::R8 => data
            .pixels
            .iter()
            .flat_map(|&luma| [luma, luma, luma, 255])
            .collect(),
        _ => return None,
    };

    Some(TextureData {
        width: data.width,
        height: data.height,
        pixels,
    })
}
