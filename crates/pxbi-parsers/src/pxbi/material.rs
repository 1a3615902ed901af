//! Material records and texture assignments

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Seek};

use byteorder::BigEndian;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::header::ContainerHeader;
use crate::cursor::ByteCursor;
use crate::traits::{Decodable, ParseError, ParseResult};

/// Slot a texture fills in a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureRole {
    Diffuse,
    Bumpmap,
    Specular,
    Reflective,
}

impl TextureRole {
    /// Map a role code from the file
    pub fn from_code(code: u32) -> ParseResult<Self> {
        match code {
            0 => Ok(Self::Diffuse),
            1 => Ok(Self::Bumpmap),
            4 => Ok(Self::Specular),
            5 => Ok(Self::Reflective),
            _ => Err(ParseError::UnknownTextureRole { code }),
        }
    }

    /// The code stored in the file
    pub fn code(self) -> u32 {
        match self {
            Self::Diffuse => 0,
            Self::Bumpmap => 1,
            Self::Specular => 4,
            Self::Reflective => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Diffuse => "diffuse",
            Self::Bumpmap => "bumpmap",
            Self::Specular => "specular",
            Self::Reflective => "reflective",
        }
    }
}

impl fmt::Display for TextureRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 16-byte record binding a texture to a material slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureAssignment {
    pub role: TextureRole,
    pub texture_index: u32,
}

impl Decodable for TextureAssignment {
    fn decode<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> ParseResult<Self> {
        cursor.read_zero_u32::<BigEndian>("assignment padding 0x00")?;
        cursor.read_zero_u32::<BigEndian>("assignment padding 0x04")?;
        let role = TextureRole::from_code(cursor.read_u32::<BigEndian>()?)?;
        let texture_index = cursor.read_u32::<BigEndian>()?;
        Ok(Self { role, texture_index })
    }
}

/// A material as stored in the container
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialRecord {
    pub name: String,
    pub unknown_0x04: u32,
    pub unknown_0x08: u32,
    pub unknown_floats_1: [f32; 8],
    pub texture_count: u32,
    pub assignments_pointer: u32,
    pub unknown_floats_2: [f32; 43],
    pub assignments: Vec<TextureAssignment>,
}

impl MaterialRecord {
    /// Size of the fixed part of the record
    pub const SIZE: u64 = 228;
}

impl Decodable for MaterialRecord {
    fn decode<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> ParseResult<Self> {
        let name_pointer = cursor.read_u32::<BigEndian>()?;
        let unknown_0x04 = cursor.read_u32::<BigEndian>()?;
        let unknown_0x08 = cursor.read_u32::<BigEndian>()?;
        cursor.read_zero_u32::<BigEndian>("material padding 0x0C")?;
        let unknown_floats_1 = cursor.read_f32_fixed::<BigEndian, 8>()?;
        let texture_count = cursor.read_u32::<BigEndian>()?;
        let assignments_pointer = cursor.read_u32::<BigEndian>()?;
        let unknown_floats_2 = cursor.read_f32_fixed::<BigEndian, 43>()?;

        let mut assignments = Vec::new();
        if assignments_pointer != 0 {
            cursor.assert_position(
                "texture assignment pointers",
                ContainerHeader::absolute(assignments_pointer),
            )?;
            let pointers = cursor.read_u32_array::<BigEndian>(texture_count as usize)?;

            assignments.reserve(pointers.len());
            for (index, pointer) in pointers.into_iter().enumerate() {
                cursor.assert_position("texture assignment", ContainerHeader::absolute(pointer))?;
                let assignment = TextureAssignment::decode(cursor)
                    .map_err(|e| e.with_context(format!("texture assignment {index}")))?;
                assignments.push(assignment);
            }
        } else if texture_count != 0 {
            warn!(texture_count, "Material declares textures but has no assignment table");
        }

        let name = cursor.read_cstring_at(ContainerHeader::absolute(name_pointer))?;

        Ok(Self {
            name,
            unknown_0x04,
            unknown_0x08,
            unknown_floats_1,
            texture_count,
            assignments_pointer,
            unknown_floats_2,
            assignments,
        })
    }
}

/// A decoded material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// Assignments in file order
    pub assignments: Vec<TextureAssignment>,
    /// Role to texture index; a later assignment for the same role wins
    pub roles: BTreeMap<TextureRole, u32>,
}

impl Material {
    /// Texture index bound to a role
    pub fn texture_for(&self, role: TextureRole) -> Option<u32> {
        self.roles.get(&role).copied()
    }
}

impl From<MaterialRecord> for Material {
    fn from(record: MaterialRecord) -> Self {
        let roles = record
            .assignments
            .iter()
            .map(|a| (a.role, a.texture_index))
            .collect();

        Self {
            name: record.name,
            assignments: record.assignments,
            roles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    /// Layout: 64 bytes base, name string, material at 72, assignments after
    fn material_bytes(role_codes: &[u32]) -> Vec<u8> {
        let mut bytes = vec![0u8; 64];
        bytes.extend_from_slice(b"skin\0\0\0\0");
        assert_eq!(bytes.len(), 72);

        let count = role_codes.len() as u32;
        let pointers_at = 72 + MaterialRecord::SIZE as u32;
        let assignment_pointer = if count == 0 { 0 } else { pointers_at - 64 };

        bytes.extend(words(&[0, 1, 2, 0]));
        bytes.extend(words(&[0; 8]));
        bytes.extend(words(&[count, assignment_pointer]));
        bytes.extend(words(&[0; 43]));

        let first_record = pointers_at + 4 * count;
        let pointers: Vec<u32> = (0..count).map(|i| first_record + 16 * i - 64).collect();
        bytes.extend(words(&pointers));
        for (i, &code) in role_codes.iter().enumerate() {
            bytes.extend(words(&[0, 0, code, i as u32 + 10]));
        }
        bytes
    }

    fn decode(bytes: Vec<u8>) -> ParseResult<MaterialRecord> {
        let mut cursor = ByteCursor::new(Cursor::new(bytes))?;
        cursor.seek(72)?;
        MaterialRecord::decode(&mut cursor)
    }

    #[test]
    fn test_role_codes() {
        assert_eq!(TextureRole::from_code(0).unwrap(), TextureRole::Diffuse);
        assert_eq!(TextureRole::from_code(5).unwrap(), TextureRole::Reflective);
        assert_eq!(TextureRole::Specular.code(), 4);
        assert!(matches!(
            TextureRole::from_code(2),
            Err(ParseError::UnknownTextureRole { code: 2 })
        ));
    }

    #[test]
    fn test_decode_material_without_assignments() {
        let record = decode(material_bytes(&[])).unwrap();
        assert_eq!(record.name, "skin");
        assert_eq!(record.unknown_0x08, 2);
        assert!(record.assignments.is_empty());

        let material = Material::from(record);
        assert!(material.roles.is_empty());
    }

    #[test]
    fn test_decode_material_with_assignments() {
        let record = decode(material_bytes(&[0, 1, 0])).unwrap();
        assert_eq!(record.assignments.len(), 3);
        assert_eq!(record.assignments[1].role, TextureRole::Bumpmap);

        let material = Material::from(record);
        // Second diffuse assignment replaces the first
        assert_eq!(material.texture_for(TextureRole::Diffuse), Some(12));
        assert_eq!(material.texture_for(TextureRole::Bumpmap), Some(11));
        assert_eq!(material.texture_for(TextureRole::Specular), None);
    }

    #[test]
    fn test_unknown_role_fails() {
        let err = decode(material_bytes(&[3])).unwrap_err();
        assert!(matches!(err.root_cause(), ParseError::UnknownTextureRole { code: 3 }));
    }

    #[test]
    fn test_assignment_padding_checked() {
        let mut bytes = material_bytes(&[0]);
        let record_start = 72 + MaterialRecord::SIZE as usize + 4;
        bytes[record_start + 7] = 1;
        let err = decode(bytes).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            ParseError::ConstantMismatch { field: "assignment padding 0x04", .. }
        ));
    }

    #[test]
    fn test_material_padding_checked() {
        let mut bytes = material_bytes(&[]);
        bytes[72 + 15] = 9;
        assert!(matches!(
            decode(bytes),
            Err(ParseError::ConstantMismatch { field: "material padding 0x0C", actual: 9, .. })
        ));
    }
}
