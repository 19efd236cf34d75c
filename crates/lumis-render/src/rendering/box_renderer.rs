//! 2D 方块的提交例程：纯色 instanced 方块和带纹理的方块
//!
//! boids / invaders 这类 2D 场景的全部绘制都走这里。

use ash::vk;
use glam::{Mat4, Vec2, Vec4};

use crate::binding::SetBindingList;
use crate::containers::texture_container::TextureId;
use crate::error::RenderError;
use crate::pipelines::shader_catalog::ShaderId;
use crate::pipelines::state::{PipelineStateDesc, VertexLayoutId};
use crate::rendering::{RenderContext, TextureIndices, push_texture_indices};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct SolidUbo {
    mvp: Mat4,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct BoxInstance {
    position: Vec4,
    color: Vec4,
}

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// 一次 instanced draw 画 count 个同尺寸的纯色方块
///
/// use_same_color 时所有实例使用 colors[0]
pub fn draw_solid_boxes(
    ctx: &RenderContext,
    x_positions: &[f32],
    y_positions: &[f32],
    colors: &[Vec4],
    size: Vec2,
    use_same_color: bool,
) -> Result<(), RenderError> {
    let count = x_positions.len();
    assert_eq!(count, y_positions.len());

    let mut desc = PipelineStateDesc::graphics(ShaderId::Solid, ctx.layouts.standard.handle, ctx.render_pass, ctx.subpass);
    desc.vertex_layout(VertexLayoutId::Pos3)
        .cull(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE)
        .depth(false, false);
    let pipeline = ctx.pipelines.borrow_mut().get_or_create_pipeline(&desc)?;

    let mut ubo = ctx.heap.alloc_uniform::<SolidUbo>()?;
    *ubo = SolidUbo {
        mvp: ctx.screen_ortho(),
    };

    let mut instances = ctx.heap.alloc_storage::<BoxInstance>(count)?;
    for i in 0..count {
        instances[i] = BoxInstance {
            position: Vec4::new(x_positions[i], y_positions[i], 0.0, 0.0),
            color: if use_same_color { colors[0] } else { colors[i] },
        };
    }

    let mut vertices = ctx.heap.alloc_buffer::<[f32; 3]>(4)?;
    vertices.copy_from_slice(&[
        [0.0, 0.0, 0.0],
        [size.x, 0.0, 0.0],
        [size.x, size.y, 0.0],
        [0.0, size.y, 0.0],
    ]);

    let mut indices = ctx.heap.alloc_buffer::<u32>(QUAD_INDICES.len())?;
    indices.copy_from_slice(&QUAD_INDICES);

    SetBindingList::new()
        .dynamic(0, ubo.set, ubo.offset, Some(ubo.generation))
        .dynamic(1, instances.set, instances.offset, Some(instances.generation))
        .bind(ctx.cmd, vk::PipelineBindPoint::GRAPHICS, &ctx.layouts.standard, ctx.heap);

    ctx.cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
    ctx.cmd.cmd_bind_vertex_buffer(0, vertices.buffer, vertices.offset);
    ctx.cmd.cmd_bind_index_buffer(indices.buffer, indices.offset, vk::IndexType::UINT32);
    ctx.cmd.cmd_draw_indexed(QUAD_INDICES.len() as u32, count as u32, 0);

    Ok(())
}

/// position = (x, y, width, height)，纹理通过 bindless 索引选择
pub fn draw_textured_box(ctx: &RenderContext, position: Vec4, texture: TextureId) -> Result<(), RenderError> {
    draw_box_with_shader(ctx, ShaderId::TextureBox, position, texture, None)
}

/// 可视化 depth 纹理，near/far 用于线性化
pub fn draw_depth_box(
    ctx: &RenderContext,
    position: Vec4,
    texture: TextureId,
    near_far: Vec2,
) -> Result<(), RenderError> {
    draw_box_with_shader(ctx, ShaderId::DepthBox, position, texture, Some(near_far))
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct TexturedUbo {
    mvp: Mat4,
    near_far: Vec4,
}

fn draw_box_with_shader(
    ctx: &RenderContext,
    shader: ShaderId,
    position: Vec4,
    texture: TextureId,
    near_far: Option<Vec2>,
) -> Result<(), RenderError> {
    let mut desc = PipelineStateDesc::graphics(shader, ctx.layouts.standard.handle, ctx.render_pass, ctx.subpass);
    desc.vertex_layout(VertexLayoutId::Pos2Uv2)
        .cull(vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE)
        .depth(false, false);
    let pipeline = ctx.pipelines.borrow_mut().get_or_create_pipeline(&desc)?;

    let mut ubo = ctx.heap.alloc_uniform::<TexturedUbo>()?;
    *ubo = TexturedUbo {
        mvp: ctx.screen_ortho(),
        near_far: near_far.map_or(Vec4::ZERO, |nf| Vec4::new(nf.x, nf.y, 0.0, 0.0)),
    };

    push_texture_indices(
        ctx,
        pipeline.layout,
        &TextureIndices {
            index_0: ctx.textures.texture_index(texture),
            ..Default::default()
        },
    );

    // (pos.xy, uv.xy)
    let mut vertices = ctx.heap.alloc_buffer::<[f32; 4]>(4)?;
    vertices.copy_from_slice(&[
        [position.x, position.y, 0.0, 0.0],
        [position.x + position.z, position.y, 1.0, 0.0],
        [position.x + position.z, position.y + position.w, 1.0, 1.0],
        [position.x, position.y + position.w, 0.0, 1.0],
    ]);

    let mut indices = ctx.heap.alloc_buffer::<u32>(QUAD_INDICES.len())?;
    indices.copy_from_slice(&QUAD_INDICES);

    SetBindingList::new()
        .dynamic(0, ubo.set, ubo.offset, Some(ubo.generation))
        // shader 不读 storage set，占位绑定满足 layout 的 dynamic offset 数量
        .dynamic(1, ctx.heap.storage_set(), 0, None)
        .fixed(2, ctx.textures.descriptor_set_2d())
        .bind(ctx.cmd, vk::PipelineBindPoint::GRAPHICS, &ctx.layouts.standard, ctx.heap);

    ctx.cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
    ctx.cmd.cmd_bind_vertex_buffer(0, vertices.buffer, vertices.offset);
    ctx.cmd.cmd_bind_index_buffer(indices.buffer, indices.offset, vk::IndexType::UINT32);
    ctx.cmd.cmd_draw_indexed(QUAD_INDICES.len() as u32, 1, 0);

    Ok(())
}
