// pxbi-parsers/src/pxbi/mod.rs
//! PXBI model container decoder
//!
//! A PXBI file holds a skinned model: meshes, materials, a skeleton and the
//! GTF textures they use. Everything is big-endian and addressed through
//! pointers relative to a base displacement of 64 bytes. The decoder walks
//! the file once, front to back, and checks that every declared pointer
//! matches the cursor position at the moment its region is reached.
//!
//! # Format Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PXBI File Structure                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Header (140 bytes): counts, pointers, format constants     │
//! │  Mesh pointer list ─► mesh records + vertex/index payloads  │
//! │  Material pointer list ─► material records + assignments    │
//! │  Bone block: bone table (72-byte records), joint table      │
//! │  Texture pre-block, texture pointer list + texture records  │
//! │  String table (null-terminated ASCII)                       │
//! │  Trailing pointer list                                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Texture header (absolute offset): size/offset pairs        │
//! │  GTF blobs                                                  │
//! │  End-of-file marker                                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod bones;
mod header;
mod material;
mod mesh;
mod model;
mod texture;

pub use bones::{
    invert_matrix, multiply_matrices, Bone, BoneBlockHeader, BoneRecord, JointRecord, Matrix4, Skeleton,
    IDENTITY_MATRIX,
};
pub use header::ContainerHeader;
pub use material::{Material, MaterialRecord, TextureAssignment, TextureRole};
pub use mesh::{Mesh, MeshRecord, Vertex, FLOATS_PER_VERTEX, VERTEX_STRIDE};
pub use model::PxbiModel;
pub use texture::{Texture, TextureInfo, TexturePreBlock, TextureSpan};

use std::io::{Read, Seek};

use byteorder::BigEndian;
use tracing::{debug, trace};

use crate::cursor::ByteCursor;
use crate::traits::{
    Decodable, ParseError, ParseOptions, ParsePhase, ParseProgress, ParseResult, Parser, ProgressCallback,
};

/// Displacement added to every relative pointer in the file
pub const BASE_OFFSET: u64 = 64;

/// Everything read from a container, before any post-processing
#[derive(Debug, Clone)]
pub struct PxbiContainer {
    pub header: ContainerHeader,
    pub meshes: Vec<MeshRecord>,
    pub materials: Vec<MaterialRecord>,
    pub bone_block: BoneBlockHeader,
    pub bones: Vec<BoneRecord>,
    pub joint_list_name_pointer: u32,
    pub joints: Vec<JointRecord>,
    pub texture_pre_block: TexturePreBlock,
    pub texture_pointers: Vec<u32>,
    pub texture_infos: Vec<TextureInfo>,
    pub pointer_list: Vec<u32>,
    /// Texture count repeated at the start of the texture header block
    pub declared_texture_count: u32,
    pub texture_spans: Vec<TextureSpan>,
    pub texture_blobs: Vec<Vec<u8>>,
}

/// PXBI container parser
pub struct PxbiParser;

impl PxbiParser {
    /// Create a new PXBI parser
    pub fn new() -> Self {
        Self
    }

    /// Decode the container without building the model
    pub fn decode_container<R: Read + Seek>(
        &self,
        reader: R,
        options: &ParseOptions,
        progress: Option<&ProgressCallback>,
    ) -> ParseResult<PxbiContainer> {
        let mut cursor = ByteCursor::new(reader)?;
        let total = cursor.len();
        let report = |phase: ParsePhase, at: u64, item: Option<String>, done: u64, count: Option<u64>| {
            if let Some(cb) = progress {
                cb(ParseProgress {
                    phase,
                    bytes_processed: at,
                    total_bytes: Some(total),
                    current_item: item,
                    items_processed: done,
                    total_items: count,
                });
            }
        };

        report(ParsePhase::ReadingHeader, 0, None, 0, None);
        let header = ContainerHeader::decode(&mut cursor).map_err(|e| e.with_context("container header"))?;
        debug!(
            file_type = %header.file_type,
            meshes = header.mesh_count,
            materials = header.material_count,
            textures = header.texture_count,
            "Read container header"
        );

        if options.strict_validation {
            let expected = total.saturating_sub(BASE_OFFSET);
            if u64::from(header.contents_size) != expected {
                return Err(ParseError::ConstantMismatch {
                    field: "contents_size",
                    expected,
                    actual: u64::from(header.contents_size),
                });
            }
        }

        let record_total = u64::from(header.mesh_count) + u64::from(header.material_count);

        // Meshes
        cursor.assert_position("mesh pointer list", ContainerHeader::absolute(header.mesh_pointers_pointer))?;
        let mesh_pointers = cursor.read_u32_array::<BigEndian>(header.mesh_count as usize)?;
        let mut meshes = Vec::with_capacity(mesh_pointers.len());
        for (index, pointer) in mesh_pointers.iter().enumerate() {
            let mesh: MeshRecord =
                decode_at(&mut cursor, "mesh", *pointer).map_err(|e| e.with_context(format!("mesh {index}")))?;
            trace!(index, name = %mesh.name, vertices = mesh.vertex_count, "Decoded mesh");
            report(
                ParsePhase::ParsingRecords,
                cursor.tell(),
                Some(mesh.name.clone()),
                index as u64 + 1,
                Some(record_total),
            );
            meshes.push(mesh);
        }
        cursor.align_to(4)?;

        // Materials
        cursor.assert_position(
            "material pointer list",
            ContainerHeader::absolute(header.material_pointers_pointer),
        )?;
        let material_pointers = cursor.read_u32_array::<BigEndian>(header.material_count as usize)?;
        let mut materials = Vec::with_capacity(material_pointers.len());
        for (index, pointer) in material_pointers.iter().enumerate() {
            let material: MaterialRecord = decode_at(&mut cursor, "material", *pointer)
                .map_err(|e| e.with_context(format!("material {index}")))?;
            trace!(index, name = %material.name, "Decoded material");
            report(
                ParsePhase::ParsingRecords,
                cursor.tell(),
                Some(material.name.clone()),
                meshes.len() as u64 + index as u64 + 1,
                Some(record_total),
            );
            materials.push(material);
        }

        // Bones and joints
        cursor.skip_to("bone block", ContainerHeader::absolute(header.bone_block_pointer))?;
        let bone_block = BoneBlockHeader::decode(&mut cursor)?;
        let mut bones = Vec::new();
        if bone_block.bone_table_pointer != 0 {
            cursor.assert_position("bone table", bone_block.bone_table_offset())?;
            for index in 0..bone_block.bone_count {
                let bone = BoneRecord::decode(&mut cursor).map_err(|e| e.with_context(format!("bone {index}")))?;
                bones.push(bone);
            }
        }
        let joint_list_name_pointer = cursor.read_u32::<BigEndian>()?;
        let mut joints = Vec::new();
        for index in 0..bone_block.joint_count {
            let joint = JointRecord::decode(&mut cursor).map_err(|e| e.with_context(format!("joint {index}")))?;
            joints.push(joint);
        }
        debug!(bones = bones.len(), joints = joints.len(), "Read bone block");

        // Texture tables
        cursor.assert_position(
            "texture pre-block",
            ContainerHeader::absolute(header.texture_block_pointer),
        )?;
        let texture_pre_block = TexturePreBlock::decode(&mut cursor)?;

        cursor.assert_position(
            "texture pointer list",
            ContainerHeader::absolute(header.texture_pointers_pointer),
        )?;
        let texture_pointers = cursor.read_u32_array::<BigEndian>(header.texture_count as usize)?;
        let mut texture_infos = Vec::with_capacity(texture_pointers.len());
        for index in 0..header.texture_count {
            let info = TextureInfo::decode(&mut cursor).map_err(|e| e.with_context(format!("texture {index}")))?;
            texture_infos.push(info);
        }

        // String table and trailing pointer list
        cursor.assert_position("string table", ContainerHeader::absolute(header.strings_pointer))?;
        cursor.skip_to("pointer list", ContainerHeader::absolute(header.pointer_list_pointer))?;
        let pointer_list = cursor.read_u32_array::<BigEndian>(header.pointer_list_len()?)?;

        // Texture blobs, addressed from the absolute texture header
        let textures_base = u64::from(header.textures_pointer);
        cursor.skip_to("texture header", textures_base)?;
        let declared_texture_count = cursor.read_u32::<BigEndian>()?;
        if declared_texture_count != header.texture_count {
            debug!(
                declared = declared_texture_count,
                header = header.texture_count,
                "Texture header count differs from container header"
            );
        }
        let mut texture_spans = Vec::with_capacity(texture_pointers.len());
        for _ in 0..header.texture_count {
            texture_spans.push(TextureSpan {
                size: cursor.read_u32::<BigEndian>()?,
                offset: cursor.read_u32::<BigEndian>()?,
            });
        }

        let mut texture_blobs = Vec::with_capacity(texture_spans.len());
        for (index, span) in texture_spans.iter().enumerate() {
            cursor
                .assert_position("texture blob", u64::from(span.offset) + textures_base)
                .map_err(|e| e.with_context(format!("texture blob {index}")))?;
            texture_blobs.push(cursor.read_bytes(span.size as usize)?);
        }

        report(ParsePhase::Validating, cursor.tell(), None, record_total, Some(record_total));
        cursor.assert_position("end of file", header.end_of_file_offset())?;
        cursor.expect_end()?;

        Ok(PxbiContainer {
            header,
            meshes,
            materials,
            bone_block,
            bones,
            joint_list_name_pointer,
            joints,
            texture_pre_block,
            texture_pointers,
            texture_infos,
            pointer_list,
            declared_texture_count,
            texture_spans,
            texture_blobs,
        })
    }
}

/// Validate a pointer checkpoint and decode the record behind it
fn decode_at<T: Decodable, R: Read + Seek>(
    cursor: &mut ByteCursor<R>,
    region: &'static str,
    pointer: u32,
) -> ParseResult<T> {
    cursor.assert_position(region, ContainerHeader::absolute(pointer))?;
    T::decode(cursor)
}

impl Default for PxbiParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for PxbiParser {
    type Output = PxbiModel;

    fn extensions(&self) -> &[&str] {
        &["bin"]
    }

    fn name(&self) -> &str {
        "PXBI Model Parser"
    }

    fn parse_with_options<R: Read + Seek>(
        &self,
        reader: R,
        options: &ParseOptions,
        progress: Option<ProgressCallback>,
    ) -> ParseResult<Self::Output> {
        let container = self.decode_container(reader, options, progress.as_ref())?;

        if let Some(ref cb) = progress {
            cb(ParseProgress {
                phase: ParsePhase::LinkingReferences,
                bytes_processed: 0,
                total_bytes: None,
                current_item: None,
                items_processed: 0,
                total_items: Some(container.texture_blobs.len() as u64),
            });
        }

        let model = PxbiModel::from_container(container, options)?;

        if let Some(ref cb) = progress {
            cb(ParseProgress {
                phase: ParsePhase::Complete,
                bytes_processed: 0,
                total_bytes: None,
                current_item: None,
                items_processed: model.meshes.len() as u64,
                total_items: Some(model.meshes.len() as u64),
            });
        }

        Ok(model)
    }
}
