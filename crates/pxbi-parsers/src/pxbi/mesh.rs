//! Mesh records and vertex layout

use std::io::{Read, Seek};

use byteorder::BigEndian;
use serde::{Deserialize, Serialize};

use super::header::ContainerHeader;
use crate::cursor::ByteCursor;
use crate::traits::{Decodable, ParseError, ParseResult};

/// Bytes per vertex in the only supported layout
pub const VERTEX_STRIDE: u32 = 88;

/// Floats per vertex (`VERTEX_STRIDE / 4`)
pub const FLOATS_PER_VERTEX: usize = 22;

/// A mesh as stored in the container
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRecord {
    pub name: String,
    pub unknown_bytecount_1: u32,
    pub material_index: u32,
    pub unknown_bytecount_2: u32,
    pub stride: u32,
    pub vertex_count: u32,
    pub vertices_pointer: u32,
    pub triangle_count: u32,
    pub triangles_pointer: u32,
    /// `vertex_count * stride / 4` floats
    pub vertex_data: Vec<f32>,
    /// `triangle_count * 3` indices
    pub index_data: Vec<u16>,
}

impl Decodable for MeshRecord {
    fn decode<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> ParseResult<Self> {
        let name_pointer = cursor.read_u32::<BigEndian>()?;
        let unknown_bytecount_1 = cursor.read_u32::<BigEndian>()?;
        let material_index = cursor.read_u32::<BigEndian>()?;
        let unknown_bytecount_2 = cursor.read_u32::<BigEndian>()?;
        let stride = cursor.read_u32::<BigEndian>()?;
        let vertex_count = cursor.read_u32::<BigEndian>()?;
        let vertices_pointer = cursor.read_u32::<BigEndian>()?;
        let triangle_count = cursor.read_u32::<BigEndian>()?;
        let triangles_pointer = cursor.read_u32::<BigEndian>()?;

        if stride != VERTEX_STRIDE {
            return Err(ParseError::UnsupportedVertexLayout { stride });
        }

        let vertex_data = cursor.read_f32_array::<BigEndian>((vertex_count as usize).saturating_mul(FLOATS_PER_VERTEX))?;
        let index_data = cursor.read_u16_array::<BigEndian>((triangle_count as usize).saturating_mul(3))?;
        cursor.align_to(4)?;

        let name = cursor.read_cstring_at(ContainerHeader::absolute(name_pointer))?;

        Ok(Self {
            name,
            unknown_bytecount_1,
            material_index,
            unknown_bytecount_2,
            stride,
            vertex_count,
            vertices_pointer,
            triangle_count,
            triangles_pointer,
            vertex_data,
            index_data,
        })
    }
}

/// One skinned vertex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
    pub binormal: [f32; 3],
    pub weights: [f32; 4],
    /// Joint indices, stored as floats in the file
    pub bone_indices: [f32; 4],
}

impl Vertex {
    /// Split one 22-float group into its attributes
    pub fn from_floats(f: &[f32; FLOATS_PER_VERTEX]) -> Self {
        Self {
            position: [f[0], f[1], f[2]],
            normal: [f[3], f[4], f[5]],
            uv: [f[6], f[7]],
            tangent: [f[8], f[9], f[10]],
            binormal: [f[11], f[12], f[13]],
            weights: [f[14], f[15], f[16], f[17]],
            bone_indices: [f[18], f[19], f[20], f[21]],
        }
    }
}

/// A decoded mesh with grouped vertices and triangles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub name: String,
    pub material_index: u32,
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<[u16; 3]>,
}

impl Mesh {
    /// Whether any vertex carries a non-zero skin weight
    pub fn is_skinned(&self) -> bool {
        self.vertices.iter().any(|v| v.weights.iter().any(|&w| w != 0.0))
    }

    /// Axis-aligned bounds of the vertex positions
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = self.vertices.first()?.position;
        Some(self.vertices.iter().fold((first, first), |(mut min, mut max), v| {
            for axis in 0..3 {
                min[axis] = min[axis].min(v.position[axis]);
                max[axis] = max[axis].max(v.position[axis]);
            }
            (min, max)
        }))
    }
}

impl From<MeshRecord> for Mesh {
    fn from(record: MeshRecord) -> Self {
        let vertices = record
            .vertex_data
            .chunks_exact(FLOATS_PER_VERTEX)
            .filter_map(|chunk| <&[f32; FLOATS_PER_VERTEX]>::try_from(chunk).ok())
            .map(Vertex::from_floats)
            .collect();
        let triangles = record
            .index_data
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect();

        Self {
            name: record.name,
            material_index: record.material_index,
            vertices,
            triangles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn mesh_bytes(stride: u32, vertex_count: u32, triangle_count: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        let header = [0u32, 0, 7, 0, stride, vertex_count, 0, triangle_count, 0];
        for word in header {
            bytes.extend_from_slice(&word.to_be_bytes());
        }
        for i in 0..vertex_count as usize * FLOATS_PER_VERTEX {
            bytes.extend_from_slice(&(i as f32).to_be_bytes());
        }
        for i in 0..triangle_count as u16 * 3 {
            bytes.extend_from_slice(&i.to_be_bytes());
        }
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        bytes
    }

    /// Prefix 64 bytes so relative name pointer 0 lands on a string
    fn with_name(record: Vec<u8>, name: &str) -> (Vec<u8>, u64) {
        let mut bytes = vec![0u8; 64];
        bytes.extend_from_slice(name.as_bytes());
        bytes.push(0);
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        let start = bytes.len() as u64;
        bytes.extend(record);
        (bytes, start)
    }

    #[test]
    fn test_decode_mesh() {
        let (bytes, start) = with_name(mesh_bytes(88, 2, 1), "body");
        let mut cursor = ByteCursor::new(Cursor::new(bytes)).unwrap();
        cursor.seek(start).unwrap();

        let record = MeshRecord::decode(&mut cursor).unwrap();
        assert_eq!(record.name, "body");
        assert_eq!(record.material_index, 7);
        assert_eq!(record.vertex_data.len(), 44);
        assert_eq!(record.index_data.len(), 3);
        // 6 bytes of indices padded to 8
        assert_eq!(cursor.tell(), start + 36 + 176 + 8);

        let mesh = Mesh::from(record);
        assert_eq!(mesh.vertices.len(), 2);
        assert_eq!(mesh.vertices[1].position, [22.0, 23.0, 24.0]);
        assert_eq!(mesh.vertices[1].uv, [28.0, 29.0]);
        assert_eq!(mesh.vertices[1].bone_indices, [40.0, 41.0, 42.0, 43.0]);
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_unsupported_stride() {
        let (bytes, start) = with_name(mesh_bytes(64, 1, 0), "x");
        let mut cursor = ByteCursor::new(Cursor::new(bytes)).unwrap();
        cursor.seek(start).unwrap();
        assert!(matches!(
            MeshRecord::decode(&mut cursor),
            Err(ParseError::UnsupportedVertexLayout { stride: 64 })
        ));
    }

    #[test]
    fn test_mesh_bounds() {
        let mut floats = [0.0f32; FLOATS_PER_VERTEX];
        floats[0..3].copy_from_slice(&[-1.0, 2.0, 0.5]);
        let a = Vertex::from_floats(&floats);
        floats[0..3].copy_from_slice(&[3.0, -4.0, 0.0]);
        let b = Vertex::from_floats(&floats);
        let mesh = Mesh { name: "m".into(), material_index: 0, vertices: vec![a, b], triangles: vec![] };

        assert_eq!(mesh.bounds(), Some(([-1.0, -4.0, 0.0], [3.0, 2.0, 0.5])));
        assert!(!mesh.is_skinned());
    }
}
