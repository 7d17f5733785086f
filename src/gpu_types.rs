//! GPU-compatible data types for shader rendering.

use bytemuck::{Pod, Zeroable};

/// A surface mesh vertex, ready for GPU upload.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SurfaceVertex {
    /// Logical position: x, y in [-0.5, 0.5], z the normalised sample
    pub position: [f32; 3],
    /// Unit normal used for directional lighting
    pub normal: [f32; 3],
    /// RGBA color from the gradient
    pub color: [f32; 4],
}

impl SurfaceVertex {
    pub fn new(position: [f32; 3], color: [f32; 4]) -> Self {
        Self {
            position,
            normal: [0.0; 3],
            color,
        }
    }
}

/// An axis or gridline endpoint.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl LineVertex {
    pub fn new(position: [f32; 3], color: [f32; 4]) -> Self {
        Self { position, color }
    }
}

/// A corner of the unit quad every label texture is drawn on.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LabelVertex {
    pub position: [f32; 3],
    /// Texture coordinate, v pointing down the bitmap
    pub uv: [f32; 2],
}

/// The label quad, spanning -0.5..0.5 in its own plane at z = 0.5.
pub const LABEL_QUAD: [LabelVertex; 4] = [
    LabelVertex {
        position: [-0.5, -0.5, 0.5],
        uv: [0.0, 1.0],
    },
    LabelVertex {
        position: [0.5, -0.5, 0.5],
        uv: [1.0, 1.0],
    },
    LabelVertex {
        position: [0.5, 0.5, 0.5],
        uv: [1.0, 0.0],
    },
    LabelVertex {
        position: [-0.5, 0.5, 0.5],
        uv: [0.0, 0.0],
    },
];

pub const LABEL_QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Per-frame camera and lighting uniforms shared by the surface and axes.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub projection: [[f32; 4]; 4],
    pub model_view: [[f32; 4]; 4],
    /// Inverse-transpose of the model-view 3x3, padded to 4x4
    pub normal_matrix: [[f32; 4]; 4],
    /// Ambient light colour (rgb, w unused)
    pub ambient: [f32; 4],
    /// Directional light colour (rgb, w unused)
    pub directional: [f32; 4],
    /// Direction the light shines from, eye space (xyz, w unused)
    pub light_direction: [f32; 4],
}

/// Per-label transform.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LabelUniforms {
    pub model_view_projection: [[f32; 4]; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<SceneUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<LabelUniforms>(), 64);
        assert_eq!(std::mem::size_of::<SurfaceVertex>(), 40);
        assert_eq!(std::mem::size_of::<LineVertex>(), 28);
        assert_eq!(std::mem::size_of::<LabelVertex>(), 20);
    }

    #[test]
    fn test_label_quad_flips_v() {
        // bitmap row 0 is the top of the text, which sits on the quad's upper edge
        let top_left = LABEL_QUAD[3];
        assert_eq!(top_left.position[1], 0.5);
        assert_eq!(top_left.uv, [0.0, 0.0]);
    }
}
