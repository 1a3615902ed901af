//! Decoded PXBI model

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::bones::{JointRecord, Skeleton};
use super::material::Material;
use super::mesh::Mesh;
use super::texture::Texture;
use super::PxbiContainer;
use crate::dds::GtfCodec;
use crate::traits::{HumanReadable, ParseOptions, ParseResult};

/// The cleaned-up view of a container
///
/// Pointers and counts are gone; what remains is meshes, materials,
/// textures with both payloads, and the assembled skeleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PxbiModel {
    pub file_type: String,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub skeleton: Skeleton,
    pub joints: Vec<JointRecord>,
}

impl PxbiModel {
    /// Post-process a decoded container
    pub fn from_container(container: PxbiContainer, options: &ParseOptions) -> ParseResult<Self> {
        let textures = container
            .texture_infos
            .into_iter()
            .zip(container.texture_blobs)
            .enumerate()
            .map(|(index, (info, raw))| {
                Texture::from_blob(info, raw).map_err(|e| e.with_context(format!("texture {index}")))
            })
            .collect::<ParseResult<Vec<_>>>()?;

        let skeleton = Skeleton::build(container.bones, &container.joints, &options.root_bone_name)?;

        let model = Self {
            file_type: container.header.file_type,
            meshes: container.meshes.into_iter().map(Mesh::from).collect(),
            materials: container.materials.into_iter().map(Material::from).collect(),
            textures,
            skeleton,
            joints: container.joints,
        };
        debug!(
            meshes = model.meshes.len(),
            materials = model.materials.len(),
            textures = model.textures.len(),
            bones = model.skeleton.bone_count(),
            "Built model"
        );
        Ok(model)
    }

    /// Get total vertex count across all meshes
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }

    /// Get total triangle count across all meshes
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.triangles.len()).sum()
    }

    /// Look a texture up by its declared name
    pub fn texture_by_name(&self, name: &str) -> Option<&Texture> {
        self.textures.iter().find(|t| t.name == name)
    }

    /// Check if model has skinning data
    pub fn is_skinned(&self) -> bool {
        self.skeleton.bone_count() > 0 && self.meshes.iter().any(Mesh::is_skinned)
    }
}

impl HumanReadable for PxbiModel {
    fn to_readable_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "PXBI model ({})", self.file_type);
        let _ = writeln!(
            out,
            "  {} meshes, {} vertices, {} triangles",
            self.meshes.len(),
            self.vertex_count(),
            self.triangle_count()
        );

        for mesh in &self.meshes {
            let _ = writeln!(
                out,
                "    {} (material {}): {} vertices, {} triangles",
                mesh.name,
                mesh.material_index,
                mesh.vertices.len(),
                mesh.triangles.len()
            );
        }

        let _ = writeln!(out, "  {} materials", self.materials.len());
        for material in &self.materials {
            let roles: Vec<String> = material
                .roles
                .iter()
                .map(|(role, index)| format!("{role}={index}"))
                .collect();
            let _ = writeln!(out, "    {} [{}]", material.name, roles.join(", "));
        }

        let _ = writeln!(out, "  {} textures", self.textures.len());
        for texture in &self.textures {
            let codec = GtfCodec::lookup(texture.gtf.codec).map_or("unknown", |c| c.label());
            let _ = writeln!(
                out,
                "    {} ({}x{} {}, {} bytes)",
                texture.name,
                texture.gtf.width,
                texture.gtf.height,
                codec,
                texture.raw.len()
            );
        }

        let _ = writeln!(
            out,
            "  {} bones, {} joints",
            self.skeleton.bone_count(),
            self.joints.len()
        );
        for &root in &self.skeleton.root_bones {
            write_bone_tree(&mut out, &self.skeleton, root, 2);
        }

        out
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            "file_type": self.file_type,
            "meshes": self.meshes.iter().map(|m| json!({
                "name": m.name,
                "material_index": m.material_index,
                "vertex_count": m.vertices.len(),
                "triangle_count": m.triangles.len(),
                "skinned": m.is_skinned(),
            })).collect::<Vec<_>>(),
            "materials": self.materials.iter().map(|m| json!({
                "name": m.name,
                "textures": m.roles,
            })).collect::<Vec<_>>(),
            "textures": self.textures.iter().map(|t| json!({
                "name": t.name,
                "file_name": t.file_name,
                "width": t.gtf.width,
                "height": t.gtf.height,
                "depth": t.gtf.depth,
                "codec": t.gtf.codec,
                "size": t.raw.len(),
            })).collect::<Vec<_>>(),
            "bones": self.skeleton.bones.iter().map(|b| json!({
                "name": b.name,
                "joint_id": b.joint_id,
                "parent": b.parent_index,
                "children": b.children,
            })).collect::<Vec<_>>(),
            "joints": self.joints.iter().map(|j| json!({
                "name": j.name,
                "parent_joint": j.parent_joint(),
            })).collect::<Vec<_>>(),
        })
    }
}

fn write_bone_tree(out: &mut String, skeleton: &Skeleton, index: usize, depth: usize) {
    let Some(bone) = skeleton.bones.get(index) else {
        return;
    };
    if depth > skeleton.bones.len() + 2 {
        return;
    }
    let _ = writeln!(out, "{}{}", "  ".repeat(depth), bone.name);
    for &child in &bone.children {
        write_bone_tree(out, skeleton, child, depth + 1);
    }
}
