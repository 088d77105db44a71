use std::sync::Arc;

use wgpu::{
    DepthBiasState, Device, MultisampleState, PipelineCompilationOptions, RenderPass,
    RenderPassDescriptor, ShaderSource, StencilState,
};

use crate::rendering::{
    material::MaterialLayout,
    render_common::RenderCommon,
    render_model::{Instance, RENDER_MODEL_VBL},
    shader_loader::{PipelineCacheBuilder, PipelineId, ShaderDefinition},
    texture::DepthTexture,
};

/// Draws the attached model. Each primitive picks the solid or the
/// wireframe pipeline from its material.
pub struct ModelPass {
    pub solid_pipeline_id: PipelineId,
    pub wireframe_pipeline_id: PipelineId,
    common: Arc<RenderCommon>,
}

pub struct ModelPassTargets {
    pub color: wgpu::TextureView,
    pub depth: wgpu::TextureView,
    pub clear_color: wgpu::Color,
}

const MODEL_SHADER: ShaderDefinition = ShaderDefinition {
    name: "Model Shader",
    path: "model.wgsl",
};

#[derive(Clone, Copy)]
enum Topology {
    Solid,
    Wireframe,
}

fn add_model_pipeline(
    device: &Device,
    common: &Arc<RenderCommon>,
    materials: &MaterialLayout,
    cache_builder: &mut PipelineCacheBuilder,
    topology: Topology,
) -> PipelineId {
    let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Model Pipeline Layout"),
        bind_group_layouts: &[
            &common.scene_uniform.bind_group_layout,
            &materials.bind_group_layout,
        ],
        push_constant_ranges: &[],
    });

    let format = common.surface_format();

    let (label, fragment_entry, primitive) = match topology {
        Topology::Solid => (
            "Model solid pipeline",
            "fs_main",
            wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
        ),
        Topology::Wireframe => (
            "Model wireframe pipeline",
            "fs_wireframe",
            wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
        ),
    };

    cache_builder.add_shader(
        MODEL_SHADER,
        Box::new(
            move |device: &Device, shader_def: &ShaderDefinition, source: &str| {
                let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(shader_def.name),
                    source: ShaderSource::Wgsl(source.into()),
                });

                let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(label),
                    layout: Some(&render_pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: Some("vs_main"),
                        buffers: &[RENDER_MODEL_VBL, Instance::descriptor()],
                        compilation_options: PipelineCompilationOptions::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &shader,
                        entry_point: Some(fragment_entry),
                        targets: &[Some(wgpu::ColorTargetState {
                            format,
                            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: PipelineCompilationOptions::default(),
                    }),
                    primitive,
                    depth_stencil: Some(wgpu::DepthStencilState {
                        format: DepthTexture::DEPTH_FORMAT,
                        depth_write_enabled: true,
                        depth_compare: wgpu::CompareFunction::Less,
                        stencil: StencilState::default(),
                        bias: DepthBiasState::default(),
                    }),
                    multisample: MultisampleState::default(),
                    multiview: None,
                    cache: None,
                });

                Ok(pipeline)
            },
        ),
    )
}

impl ModelPass {
    pub fn create(
        device: &Device,
        common: Arc<RenderCommon>,
        materials: &MaterialLayout,
        cache_builder: &mut PipelineCacheBuilder,
    ) -> anyhow::Result<Self> {
        let solid_pipeline_id =
            add_model_pipeline(device, &common, materials, cache_builder, Topology::Solid);
        let wireframe_pipeline_id =
            add_model_pipeline(device, &common, materials, cache_builder, Topology::Wireframe);

        Ok(Self {
            solid_pipeline_id,
            wireframe_pipeline_id,
            common,
        })
    }

    /// Clears the targets, binds the scene uniform, then lets `render_callback`
    /// record the draws.
    pub fn render<F>(
        &self,
        targets: &ModelPassTargets,
        encoder: &mut wgpu::CommandEncoder,
        render_callback: F,
    ) where
        F: FnOnce(&mut RenderPass),
    {
        let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Model Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &targets.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(targets.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &targets.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_bind_group(0, &self.common.scene_uniform.bind_group, &[]);

        render_callback(&mut render_pass);
    }
}
