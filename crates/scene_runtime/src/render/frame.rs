//! Frame preparation
//!
//! Turns one object record into draw commands against the current replica:
//! pick the texture each fragment should sample, get (or rebuild) its binding
//! and hand the draw to the backend.

use std::sync::Arc;

use crate::assets::{MaterialAsset, MeshPart, TextureAsset, TextureSlot};
use crate::scene::hierarchy::fragment_world;
use crate::scene::{ObjectId, ObjectKind, ObjectRecord};

use super::backend::{BindingDesc, DrawCommand, RenderBackend, TextureBindingRef};
use super::binding_cache::{BindingCache, BindingOwner};
use super::RenderError;

/// Index count of a sprite quad
pub const SPRITE_INDEX_COUNT: u32 = 6;

/// What one frame preparation did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Replica the frame was recorded against
    pub replica: usize,
    /// Parameter blocks written by the dirty pass
    pub objects_written: usize,
    /// Whether the dirty pass flushed
    pub flushed: bool,
    /// Meshes whose node globals were recomputed
    pub hierarchies_refreshed: usize,
    /// Draws recorded
    pub draws: usize,
    /// Whether the binding cache was reset for a recreated surface
    pub bindings_reset: bool,
}

/// Texture a fragment should sample
///
/// The material's base colour texture wins when present; otherwise the mesh
/// part's own texture; otherwise the object's fallback.
pub fn select_texture(
    material: Option<&MaterialAsset>,
    part_texture: Option<&Arc<TextureAsset>>,
    fallback: Option<&Arc<TextureAsset>>,
) -> Option<Arc<TextureAsset>> {
    material
        .and_then(|m| m.texture(TextureSlot::BaseColor))
        .or_else(|| part_texture.cloned())
        .or_else(|| fallback.cloned())
}

/// Placement of a record's parameter block
#[derive(Debug, Clone, Copy)]
pub struct ParamLayout {
    /// Byte offset within a replica
    pub offset: u64,
    /// Block size
    pub size: u64,
}

/// Record every draw of one object
///
/// Mesh node globals must already be refreshed. Returns the number of draws.
pub fn record_object_draws<B: RenderBackend + ?Sized>(
    id: ObjectId,
    record: &ObjectRecord,
    layout: ParamLayout,
    cache: &mut BindingCache,
    backend: &mut B,
) -> Result<usize, RenderError> {
    let replica = backend.current_frame();
    let desc = |texture: Option<Arc<TextureAsset>>| BindingDesc {
        replica,
        object: id,
        param_offset: layout.offset,
        param_size: layout.size,
        texture: texture.map(|t| TextureBindingRef {
            id: t.id(),
            gpu_handle: t.gpu_handle(),
        }),
    };

    match record.kind() {
        ObjectKind::Mesh(component) => {
            let Some(mesh) = &component.mesh else {
                return Ok(0);
            };
            let material = component.material.as_deref();
            let object_matrix = record.world_matrix();
            let fallback = mesh
                .texture
                .as_ref()
                .or_else(|| mesh.parts.iter().find_map(|p| p.texture.as_ref()));

            if !mesh.is_multi_part() {
                let part: Option<&MeshPart> = mesh.parts.first();
                let texture = select_texture(material, part.and_then(|p| p.texture.as_ref()), fallback);
                let binding =
                    cache.get_binding(backend.binding_pool(), BindingOwner::Object(id), &desc(texture))?;
                let node = part.map_or(0, |p| p.node);
                backend.record_draw(&DrawCommand {
                    object: id,
                    part: None,
                    replica,
                    binding,
                    world: fragment_world(object_matrix, &component.node_global(node)),
                    first_index: part.map_or(0, |p| p.first_index),
                    index_count: part.map_or(mesh.index_count, |p| p.index_count),
                });
                return Ok(1);
            }

            for (index, part) in mesh.parts.iter().enumerate() {
                let texture = select_texture(material, part.texture.as_ref(), fallback);
                let binding = cache.get_binding(
                    backend.binding_pool(),
                    BindingOwner::SubMesh(id, index),
                    &desc(texture),
                )?;
                backend.record_draw(&DrawCommand {
                    object: id,
                    part: Some(index),
                    replica,
                    binding,
                    world: fragment_world(object_matrix, &component.node_global(part.node)),
                    first_index: part.first_index,
                    index_count: part.index_count,
                });
            }
            Ok(mesh.parts.len())
        }
        ObjectKind::Sprite(sprite) => {
            let binding = cache.get_binding(
                backend.binding_pool(),
                BindingOwner::Object(id),
                &desc(sprite.texture.clone()),
            )?;
            backend.record_draw(&DrawCommand {
                object: id,
                part: None,
                replica,
                binding,
                world: *record.world_matrix(),
                first_index: 0,
                index_count: SPRITE_INDEX_COUNT,
            });
            Ok(1)
        }
        ObjectKind::PointLight(_) | ObjectKind::Camera(_) | ObjectKind::Empty => Ok(0),
    }
}
