//! Per-object GPU parameter block
//!
//! One fixed-size record per object id, laid out for a std430 storage buffer
//! and indexed by object id in the shaders.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Mat4Ext;
use crate::scene::{ObjectKind, ObjectRecord};

/// Flag bit: the object samples its bound texture
pub const FLAG_TEXTURED: u32 = 1 << 0;

/// Per-object parameter block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectParams {
    /// Model matrix, column-major
    pub model: [[f32; 4]; 4],
    /// Inverse-transpose of the model's upper 3x3, vec4-padded columns
    pub normal: [[f32; 4]; 3],
    /// Tint for meshes and sprites, colour * intensity and range for lights
    pub color: [f32; 4],
    /// Kind code, flag bits, node count, unused
    pub flags: [u32; 4],
}

impl ObjectParams {
    /// Size of one block in bytes
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Build the block for a record's current state
    pub fn from_record(record: &ObjectRecord) -> Self {
        let matrix = record.world_matrix();
        let kind = record.kind();

        let (color, textured, node_count) = match kind {
            ObjectKind::Mesh(mesh) => {
                let color = mesh
                    .material
                    .as_ref()
                    .map_or([1.0; 4], |m| m.state().data.base_color_factor);
                (color, mesh.texturing_enabled(), mesh.node_count() as u32)
            }
            ObjectKind::Sprite(sprite) => ([1.0; 4], sprite.texture.is_some(), 0),
            ObjectKind::PointLight(light) => {
                let rgb = light.color * light.intensity;
                ([rgb.x, rgb.y, rgb.z, light.range], false, 0)
            }
            ObjectKind::Camera(_) | ObjectKind::Empty => ([0.0; 4], false, 0),
        };

        Self {
            model: matrix.to_cols_array(),
            normal: matrix.normal_matrix(),
            color,
            flags: [
                kind.code(),
                if textured { FLAG_TEXTURED } else { 0 },
                node_count,
                0,
            ],
        }
    }

    /// Raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
