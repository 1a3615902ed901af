//! Texture tables and extracted texture payloads

use std::io::{Read, Seek};

use byteorder::BigEndian;
use serde::{Deserialize, Serialize};

use super::header::ContainerHeader;
use crate::cursor::ByteCursor;
use crate::dds::{convert_gtf_to_dds, GtfInfo};
use crate::traits::{Decodable, ParseResult};

/// Block preceding the texture pointer table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexturePreBlock {
    pub unknown_flag: u32,
    pub extra_block_pointer: u32,
    /// Opaque 64 bytes, present when `extra_block_pointer` is non-zero
    pub extra_block: Option<Vec<u8>>,
}

impl TexturePreBlock {
    pub const EXTRA_BLOCK_SIZE: usize = 64;
}

impl Decodable for TexturePreBlock {
    fn decode<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> ParseResult<Self> {
        let unknown_flag = cursor.read_u32::<BigEndian>()?;
        let extra_block_pointer = cursor.read_u32::<BigEndian>()?;

        let extra_block = if extra_block_pointer == 0 {
            None
        } else {
            cursor.assert_position(
                "texture extra block",
                ContainerHeader::absolute(extra_block_pointer),
            )?;
            Some(cursor.read_bytes(Self::EXTRA_BLOCK_SIZE)?)
        };

        Ok(Self {
            unknown_flag,
            extra_block_pointer,
            extra_block,
        })
    }
}

/// 16-byte texture record from the texture pointer table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureInfo {
    pub file_name: String,
    pub name: String,
    pub size: u32,
    pub offset: u32,
}

impl Decodable for TextureInfo {
    fn decode<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> ParseResult<Self> {
        let file_name_pointer = cursor.read_u32::<BigEndian>()?;
        let name_pointer = cursor.read_u32::<BigEndian>()?;
        let size = cursor.read_u32::<BigEndian>()?;
        let offset = cursor.read_u32::<BigEndian>()?;

        Ok(Self {
            file_name: cursor.read_cstring_at(ContainerHeader::absolute(file_name_pointer))?,
            name: cursor.read_cstring_at(ContainerHeader::absolute(name_pointer))?,
            size,
            offset,
        })
    }
}

/// Size and offset of one blob, relative to the texture header block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureSpan {
    pub size: u32,
    pub offset: u32,
}

/// A texture extracted from the container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    pub file_name: String,
    pub name: String,
    pub gtf: GtfInfo,
    /// GTF header and pixel data as stored
    #[serde(skip)]
    pub raw: Vec<u8>,
    /// Synthesized DDS header followed by the same pixel data
    #[serde(skip)]
    pub dds: Vec<u8>,
}

impl Texture {
    /// Pair a texture record with its blob and synthesize the DDS image
    pub fn from_blob(info: TextureInfo, raw: Vec<u8>) -> ParseResult<Self> {
        let gtf = GtfInfo::parse(&raw)?;
        let dds = convert_gtf_to_dds(&raw)?;
        Ok(Self {
            file_name: info.file_name,
            name: info.name,
            gtf,
            raw,
            dds,
        })
    }

    /// Declared name with a leading `./` or `.\` removed
    pub fn relative_name(&self) -> &str {
        self.name
            .strip_prefix("./")
            .or_else(|| self.name.strip_prefix(".\\"))
            .unwrap_or(&self.name)
    }
}
