//! Container header (the first 140 bytes of a PXBI file)

use std::io::{Read, Seek};

use byteorder::BigEndian;
use serde::{Deserialize, Serialize};

use super::BASE_OFFSET;
use crate::cursor::ByteCursor;
use crate::traits::{Decodable, ParseError, ParseResult};

/// Decoded container header
///
/// Pointers are stored as found in the file. Unless noted otherwise they are
/// relative to [`BASE_OFFSET`]; use [`ContainerHeader::absolute`] to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHeader {
    pub file_type: String,
    pub contents_size: u32,
    pub unknown_0x08: u32,
    pub next_file_type: String,
    pub strings_pointer: u32,
    pub names_pointer: u32,
    pub unknown_bytecount: u32,
    pub pointer_list_pointer: u32,
    pub pointer_list_size: u32,
    /// Absolute offset of the texture header block
    pub textures_pointer: u32,
    /// Relative to `textures_pointer`
    pub end_of_file_pointer: u32,
    pub texture_block_pointer: u32,
    pub texture_count: u32,
    pub texture_pointers_pointer: u32,
    pub unknown_pointer: u32,
    pub material_count: u32,
    pub material_pointers_pointer: u32,
    pub bone_block_pointer: u32,
    pub mesh_count: u32,
    pub mesh_pointers_pointer: u32,
}

impl ContainerHeader {
    /// Size of the header on disk
    pub const SIZE: u64 = 140;

    /// Resolve a base-relative pointer
    pub fn absolute(pointer: u32) -> u64 {
        u64::from(pointer) + BASE_OFFSET
    }

    /// Absolute offset of the end-of-file marker
    pub fn end_of_file_offset(&self) -> u64 {
        u64::from(self.end_of_file_pointer) + u64::from(self.textures_pointer)
    }

    /// Number of words in the trailing pointer list
    ///
    /// The declared size counts the base displacement, so it must be at
    /// least 64 and leave a whole number of words.
    pub fn pointer_list_len(&self) -> ParseResult<usize> {
        let size = u64::from(self.pointer_list_size);
        if size < BASE_OFFSET || (size - BASE_OFFSET) % 4 != 0 {
            return Err(ParseError::FieldOutOfRange {
                field: "pointer_list_size",
                value: size,
            });
        }
        Ok(((size - BASE_OFFSET) / 4) as usize)
    }
}

impl Decodable for ContainerHeader {
    fn decode<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> ParseResult<Self> {
        let file_type = cursor.read_ascii(4)?;
        let contents_size = cursor.read_u32::<BigEndian>()?;
        let unknown_0x08 = cursor.read_u32::<BigEndian>()?;
        let next_file_type = cursor.read_ascii(4)?;
        cursor.read_const_u32::<BigEndian>("base_offset", BASE_OFFSET as u32)?;
        let strings_pointer = cursor.read_u32::<BigEndian>()?;
        let names_pointer = cursor.read_u32::<BigEndian>()?;
        let unknown_bytecount = cursor.read_u32::<BigEndian>()?;
        let pointer_list_pointer = cursor.read_u32::<BigEndian>()?;
        let pointer_list_size = cursor.read_u32::<BigEndian>()?;
        let textures_pointer = cursor.read_u32::<BigEndian>()?;
        let end_of_file_pointer = cursor.read_u32::<BigEndian>()?;

        for _ in 0..4 {
            cursor.read_zero_u32::<BigEndian>("header padding 0x30")?;
        }
        cursor.read_const_u32::<BigEndian>("tag_count", 3)?;
        cursor.read_const_u32::<BigEndian>("block_size_52", 52)?;
        cursor.read_zero_u32::<BigEndian>("header padding 0x48")?;

        let texture_block_pointer = cursor.read_u32::<BigEndian>()?;
        let texture_count = cursor.read_u32::<BigEndian>()?;
        let texture_pointers_pointer = cursor.read_u32::<BigEndian>()?;
        let unknown_pointer = cursor.read_u32::<BigEndian>()?;

        for _ in 0..6 {
            cursor.read_zero_u32::<BigEndian>("header padding 0x5C")?;
        }
        cursor.read_const_u32::<BigEndian>("block_size_68", 68)?;

        let material_count = cursor.read_u32::<BigEndian>()?;
        let material_pointers_pointer = cursor.read_u32::<BigEndian>()?;
        let bone_block_pointer = cursor.read_u32::<BigEndian>()?;
        let mesh_count = cursor.read_u32::<BigEndian>()?;
        let mesh_pointers_pointer = cursor.read_u32::<BigEndian>()?;

        Ok(Self {
            file_type,
            contents_size,
            unknown_0x08,
            next_file_type,
            strings_pointer,
            names_pointer,
            unknown_bytecount,
            pointer_list_pointer,
            pointer_list_size,
            textures_pointer,
            end_of_file_pointer,
            texture_block_pointer,
            texture_count,
            texture_pointers_pointer,
            unknown_pointer,
            material_count,
            material_pointers_pointer,
            bone_block_pointer,
            mesh_count,
            mesh_pointers_pointer,
        })
    }
}
