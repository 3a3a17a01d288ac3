/// Scene content of the shadow-mapping demo
///
/// One unit cube mesh (24 vertices, position + normal) drawn three times
/// with different model matrices, a directional light orbiting the scene and
/// the push-constant blocks both passes consume.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Side of the square shadow map
pub const SHADOW_MAP_SIZE: u32 = 2048;

/// Interleaved vertex: position (slot 0) then normal (slot 1)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// 24 bytes, shared by both pipelines
pub const VERTEX_STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;
pub const NORMAL_OFFSET: u32 = 12;

/// Index count of one cube
pub const CUBE_INDEX_COUNT: u32 = 36;

/// Unit cube centered on the origin, one quad per face with outward normals
pub fn cube_mesh() -> (Vec<Vertex>, Vec<u16>) {
    // (normal, tangent u, tangent v) with u x v == normal, so quads wind CCW
    let faces: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(CUBE_INDEX_COUNT as usize);
    for (normal, u, v) in faces {
        let base = vertices.len() as u16;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = (normal + u * su + v * sv) * 0.5;
            vertices.push(Vertex {
                position: position.to_array(),
                normal: normal.to_array(),
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

/// Cube instance
#[derive(Debug, Clone, Copy)]
pub struct SceneObject {
    pub model: Mat4,
    pub color: Vec3,
}

impl SceneObject {
    fn new(translation: Vec3, scale: Vec3, color: Vec3) -> Self {
        Self {
            model: Mat4::from_translation(translation) * Mat4::from_scale(scale),
            color,
        }
    }
}

/// Ground slab and two cubes standing on it
pub fn scene_objects() -> Vec<SceneObject> {
    vec![
        SceneObject::new(Vec3::new(0.0, -1.0, 0.0), Vec3::new(10.0, 0.1, 10.0), Vec3::new(0.6, 0.6, 0.6)),
        SceneObject::new(Vec3::new(0.0, 0.5, 0.0), Vec3::splat(0.5), Vec3::new(0.8, 0.3, 0.2)),
        SceneObject::new(Vec3::new(1.5, 1.0, 1.0), Vec3::new(0.3, 1.0, 0.3), Vec3::new(0.2, 0.5, 0.8)),
    ]
}

// ===== CAMERA & LIGHT =====

pub const CAMERA_POSITION: Vec3 = Vec3::new(0.0, 4.0, 8.0);

/// Light position orbiting the scene at `time` seconds
pub fn light_position(time: f32) -> Vec3 {
    let angle = time * 0.5;
    Vec3::new(angle.sin() * 6.0, 8.0, angle.cos() * 6.0)
}

/// Orthographic light view-projection covering the scene
pub fn light_view_proj(light_position: Vec3) -> Mat4 {
    let view = Mat4::look_at_rh(light_position, Vec3::ZERO, Vec3::Y);
    let projection = Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, 1.0, 25.0);
    projection * view
}

/// Perspective camera looking at the origin
pub fn camera_view_proj(aspect: f32) -> Mat4 {
    let view = Mat4::look_at_rh(CAMERA_POSITION, Vec3::ZERO, Vec3::Y);
    let projection = Mat4::perspective_rh(60f32.to_radians(), aspect, 0.1, 100.0);
    projection * view
}

// ===== PUSH CONSTANTS =====

/// Shadow pass block
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadowPush {
    pub light_mvp: [f32; 16],
}

/// Main pass block (matches `MainPush` in shadow_mapping.slang)
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MainPush {
    pub view_proj: [f32; 16],
    pub model: [f32; 16],
    pub light_view_proj: [f32; 16],
    pub camera_pos: [f32; 4],
    pub light_dir: [f32; 4],
    pub color: [f32; 4],
    pub shadow_map_id: u32,
}

impl ShadowPush {
    pub fn new(light_view_proj: Mat4, model: Mat4) -> Self {
        Self {
            light_mvp: (light_view_proj * model).to_cols_array(),
        }
    }
}

impl MainPush {
    pub fn new(
        view_proj: Mat4,
        light_view_proj: Mat4,
        light_position: Vec3,
        object: &SceneObject,
        shadow_map_id: u32,
    ) -> Self {
        // From the light towards the scene
        let light_dir = (-light_position).normalize();
        Self {
            view_proj: view_proj.to_cols_array(),
            model: object.model.to_cols_array(),
            light_view_proj: light_view_proj.to_cols_array(),
            camera_pos: CAMERA_POSITION.extend(0.0).to_array(),
            light_dir: light_dir.extend(0.0).to_array(),
            color: object.color.extend(1.0).to_array(),
            shadow_map_id,
        }
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
