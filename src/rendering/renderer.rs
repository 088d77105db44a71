use std::sync::Arc;

use anyhow::Context;
use imgui::TextureId;
use wgpu::CommandEncoderDescriptor;
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    config::RenderConfig,
    rendering::{
        imgui_renderer::{create_imgui_renderer, ImguiRendererState},
        material::MaterialLayout,
        passes::model_pass::{ModelPass, ModelPassTargets},
        render_common::RenderCommon,
        render_model::{Instance, InstanceBuffer, RenderModel},
        scene_uniform::{SceneUniform, SceneUniformState},
        shader_loader::{PipelineCacheBuilder, ShaderLoader},
        texture::DepthTexture,
    },
    scene_graph::{MeshId, Model},
    viewer::{Presentation, Viewer},
};

struct FallbackTexture {
    revision: u64,
    texture: Option<(TextureId, [f32; 2])>,
}

struct Draw {
    mesh_id: MeshId,
    primitive: usize,
    instance: u32,
    wireframe: bool,
}

pub struct Renderer {
    pub window: Arc<Window>,
    pub size: PhysicalSize<u32>,

    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: RenderConfig,

    common: Arc<RenderCommon>,
    depth_texture: DepthTexture,
    materials: MaterialLayout,
    render_model: Option<RenderModel>,
    instances: InstanceBuffer,

    shader_loader: ShaderLoader,
    model_pass: ModelPass,

    imgui_renderer: ImguiRendererState,
    fallback: Option<FallbackTexture>,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        viewer: &Viewer,
        imgui: &mut imgui::Context,
        config: RenderConfig,
    ) -> anyhow::Result<Renderer> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable graphics adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to create device")?;

        let scene_uniform = SceneUniform::new(
            &device,
            SceneUniformState::new(&viewer.camera, &viewer.scene.lights),
        );

        let common = Arc::new(RenderCommon::new(
            &device,
            &adapter,
            &surface,
            size,
            scene_uniform,
        )?);

        let depth_texture = DepthTexture::new(&device, size, "Depth Texture");
        let materials = MaterialLayout::new(&device, &queue, config.wireframe_tint);

        let mut cache_builder = PipelineCacheBuilder::new();
        let model_pass = ModelPass::create(&device, common.clone(), &materials, &mut cache_builder)?;
        let shader_loader = ShaderLoader::new(device.clone(), cache_builder)?;

        let imgui_renderer = create_imgui_renderer(&device, &queue, common.surface_format(), imgui);
        let instances = InstanceBuffer::new(&device);

        Ok(Self {
            window,
            size,
            surface,
            device,
            queue,
            config,
            common,
            depth_texture,
            materials,
            render_model: None,
            instances,
            shader_loader,
            model_pass,
            imgui_renderer,
            fallback: None,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        let Ok(mut config) = self.common.output_surface_config.write() else {
            log::error!("Surface configuration lock poisoned");
            return;
        };

        self.size = new_size;
        config.width = new_size.width;
        config.height = new_size.height;
        self.depth_texture.resize(&self.device, new_size);
        self.surface.configure(&self.device, &config);
    }

    /// Keeps the GPU copy of the fallback image in step with the viewer.
    pub fn sync_fallback_image(&mut self, viewer: &Viewer) {
        let Some(fallback_image) = viewer.fallback_image() else {
            return;
        };

        if self
            .fallback
            .as_ref()
            .is_some_and(|fallback| fallback.revision == fallback_image.revision)
        {
            return;
        }

        if let Some((id, _)) = self.fallback.take().and_then(|fallback| fallback.texture) {
            self.imgui_renderer.release_image(id);
        }

        let texture = fallback_image.image.as_ref().map(|image| {
            let id = self.imgui_renderer.upload_image(
                &self.device,
                &self.queue,
                &fallback_image.path,
                image,
            );
            (id, [image.width() as f32, image.height() as f32])
        });

        self.fallback = Some(FallbackTexture {
            revision: fallback_image.revision,
            texture,
        });
    }

    pub fn fallback_texture(&self) -> Option<(TextureId, [f32; 2])> {
        self.fallback.as_ref().and_then(|fallback| fallback.texture)
    }

    fn sync_render_model(&mut self, model: Option<&Model>) {
        match model {
            Some(model)
                if self
                    .render_model
                    .as_ref()
                    .is_some_and(|render_model| render_model.model_id == model.id()) => {}
            Some(model) => {
                log::info!("Uploading model {}", model.name);
                self.render_model = Some(RenderModel::from_model(
                    &self.device,
                    &self.queue,
                    &self.materials,
                    model,
                ));
            }
            None => self.render_model = None,
        }
    }

    fn gather_draws(&mut self, model: &Model) -> Vec<Draw> {
        let mesh_instances = model.mesh_instances();

        let instances: Vec<Instance> = mesh_instances
            .iter()
            .map(|&(_, matrix)| Instance { model: matrix })
            .collect();
        self.instances.write(&self.device, &self.queue, &instances);

        let mut draws = Vec::new();
        for (instance, (mesh_id, _)) in mesh_instances.into_iter().enumerate() {
            let Some(mesh) = model.mesh(mesh_id) else {
                continue;
            };

            for (primitive, mesh_primitive) in mesh.primitives.iter().enumerate() {
                draws.push(Draw {
                    mesh_id,
                    primitive,
                    instance: instance as u32,
                    wireframe: mesh_primitive.material.wireframe,
                });
            }
        }

        draws
    }

    pub fn render(
        &mut self,
        viewer: &Viewer,
        imgui: &mut imgui::Context,
    ) -> Result<(), wgpu::SurfaceError> {
        self.shader_loader.load_pending_shaders();

        self.common.scene_uniform.update(
            &self.queue,
            SceneUniformState::new(&viewer.camera, &viewer.scene.lights),
        );

        let model = viewer.scene.model();
        self.sync_render_model(model);

        let draws = match (viewer.presentation(), model) {
            (Presentation::Model3D, Some(model)) => self.gather_draws(model),
            _ => Vec::new(),
        };

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let pipeline_cache = &self.shader_loader.cache;
        let solid_pipeline = pipeline_cache.get(self.model_pass.solid_pipeline_id);
        let wireframe_pipeline = pipeline_cache.get(self.model_pass.wireframe_pipeline_id);
        let render_model = self.render_model.as_ref();
        let instances = &self.instances;

        self.model_pass.render(
            &ModelPassTargets {
                color: view.clone(),
                depth: self.depth_texture.view().clone(),
                clear_color: self.config.clear_color,
            },
            &mut encoder,
            |render_pass| {
                let Some(render_model) = render_model else {
                    return;
                };

                instances.bind(render_pass);

                for draw in &draws {
                    let Some(primitive) = render_model.primitives(draw.mesh_id).get(draw.primitive)
                    else {
                        continue;
                    };

                    let pipeline = if draw.wireframe {
                        wireframe_pipeline
                    } else {
                        solid_pipeline
                    };
                    let Some(pipeline) = pipeline else {
                        continue;
                    };

                    render_pass.set_pipeline(pipeline);
                    render_pass.set_bind_group(1, &primitive.material_bind_group, &[]);
                    render_pass.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));

                    let instance_range = draw.instance..draw.instance + 1;
                    if draw.wireframe {
                        if primitive.num_edge_indices == 0 {
                            continue;
                        }
                        render_pass.set_index_buffer(
                            primitive.edge_buffer.slice(..),
                            wgpu::IndexFormat::Uint32,
                        );
                        render_pass.draw_indexed(0..primitive.num_edge_indices, 0, instance_range);
                    } else {
                        if primitive.num_indices == 0 {
                            continue;
                        }
                        render_pass.set_index_buffer(
                            primitive.index_buffer.slice(..),
                            wgpu::IndexFormat::Uint32,
                        );
                        render_pass.draw_indexed(0..primitive.num_indices, 0, instance_range);
                    }
                }
            },
        );

        self.imgui_renderer
            .render(&view, imgui, &self.device, &self.queue, &mut encoder);

        self.queue.submit([encoder.finish()]);
        output.present();

        Ok(())
    }
}
