/// CPU reference of the shadow-mapping evaluation
///
/// Mirrors what the demo's fragment shader computes, so the maths can be
/// checked without a GPU: projection into light clip space, 3x3
/// percentage-closer filtering against a depth map, and the Blinn-Phong
/// combination that attenuates direct light by the shadow factor.

use glam::{Mat4, Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

use crate::error::{ResourceError, Result};

/// Depth offset subtracted from the receiver before comparison
pub const SHADOW_BIAS: f32 = 0.0005;

/// Square depth image in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowMap {
    size: u32,
    depths: Vec<f32>,
}

impl ShadowMap {
    /// Map of `size` x `size` texels cleared to `clear_depth`
    pub fn new(size: u32, clear_depth: f32) -> Result<Self> {
        if size == 0 {
            return Err(ResourceError::InvalidDescription("shadow map size must be non-zero".to_string()).into());
        }
        Ok(Self {
            size,
            depths: vec![clear_depth; (size as usize) * (size as usize)],
        })
    }

    /// Map from row-major depths
    pub fn from_depths(size: u32, depths: Vec<f32>) -> Result<Self> {
        if size == 0 || depths.len() != (size as usize) * (size as usize) {
            return Err(ResourceError::InvalidDescription(format!(
                "shadow map of size {} needs {} depths, got {}",
                size,
                size as usize * size as usize,
                depths.len()
            ))
            .into());
        }
        Ok(Self { size, depths })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn texel_size(&self) -> f32 {
        1.0 / self.size as f32
    }

    pub fn set(&mut self, x: u32, y: u32, depth: f32) {
        if x < self.size && y < self.size {
            self.depths[(y * self.size + x) as usize] = depth;
        }
    }

    pub fn depth(&self, x: u32, y: u32) -> f32 {
        let x = x.min(self.size - 1);
        let y = y.min(self.size - 1);
        self.depths[(y * self.size + x) as usize]
    }

    /// Nearest-texel fetch with clamp-to-edge addressing
    pub fn sample(&self, uv: Vec2) -> f32 {
        let max = (self.size - 1) as f32;
        let x = (uv.x * self.size as f32).floor().clamp(0.0, max) as u32;
        let y = (uv.y * self.size as f32).floor().clamp(0.0, max) as u32;
        self.depth(x, y)
    }
}

/// Position in light clip space
pub fn project_shadow_coord(light_view_proj: &Mat4, world_pos: Vec3) -> Vec4 {
    *light_view_proj * world_pos.extend(1.0)
}

/// Fraction of PCF taps in shadow, in [0, 1]
///
/// Receivers beyond the far plane or outside the map are lit (0).
pub fn shadow_factor(map: &ShadowMap, shadow_coord: Vec4) -> f32 {
    let projected = shadow_coord.xyz() / shadow_coord.w;
    if !projected.is_finite() {
        return 0.0;
    }
    let mut uv = projected.xy() * 0.5 + Vec2::splat(0.5);
    uv.y = 1.0 - uv.y;
    let current_depth = projected.z;

    if current_depth > 1.0 || uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 {
        return 0.0;
    }

    let texel = map.texel_size();
    let mut shadow = 0.0;
    for x in -1..=1 {
        for y in -1..=1 {
            let pcf_depth = map.sample(uv + Vec2::new(x as f32, y as f32) * texel);
            if current_depth - SHADOW_BIAS > pcf_depth {
                shadow += 1.0;
            }
        }
    }
    shadow / 9.0
}

/// Blinn-Phong color with direct light attenuated by `shadow`
///
/// `light_dir` points from the light towards the scene.
pub fn shade(
    normal: Vec3,
    light_dir: Vec3,
    view_dir: Vec3,
    color: Vec3,
    shadow: f32,
) -> Vec3 {
    let n = normal.normalize();
    let l = (-light_dir).normalize();
    let v = view_dir.normalize();
    let h = (l + v).normalize();

    let ambient = 0.15 * color;
    let diffuse = n.dot(l).max(0.0) * color;
    let specular = 0.5 * n.dot(h).max(0.0).powf(64.0) * Vec3::ONE;
    ambient + (1.0 - shadow) * (diffuse + specular)
}

#[cfg(test)]
#[path = "shadow_tests.rs"]
mod tests;
