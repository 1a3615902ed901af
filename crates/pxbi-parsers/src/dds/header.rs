//! DDS header structures

use std::io::Write;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use super::format::{GtfCodec, GtfInfo};
use super::{DDS_HEADER_SIZE, DDS_MAGIC};
use crate::traits::{ParseError, ParseResult};

/// DDS header flags
pub mod flags {
    pub const CAPS: u32 = 0x1;
    pub const HEIGHT: u32 = 0x2;
    pub const WIDTH: u32 = 0x4;
    pub const PIXEL_FORMAT: u32 = 0x1000;
}

/// Caps flags
pub mod caps {
    pub const TEXTURE: u32 = 0x1000;
}

/// DDS pixel format flags
pub mod pf_flags {
    pub const ALPHAPIXELS: u32 = 0x1;
    pub const FOURCC: u32 = 0x4;
    pub const RGB: u32 = 0x40;
}

/// Mip-map count written into every synthesized header
pub const SYNTHESIZED_MIPMAP_COUNT: u32 = 4;

/// DDS header (124 bytes following the magic)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdsHeader {
    pub size: u32,
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    pub mipmap_count: u32,
    pub reserved1: [u32; 11],
    pub pixel_format: PixelFormat,
    pub caps: u32,
    pub caps2: u32,
    pub caps3: u32,
    pub caps4: u32,
    pub reserved2: u32,
}

impl DdsHeader {
    /// Build the header for an embedded GTF texture
    ///
    /// The declared linear size is `height * width` regardless of codec,
    /// and the mip-map count is fixed.
    pub fn from_gtf(info: &GtfInfo, codec: &GtfCodec) -> Self {
        let width = u32::from(info.width);
        let height = u32::from(info.height);

        Self {
            size: 124,
            flags: flags::CAPS | flags::HEIGHT | flags::WIDTH | flags::PIXEL_FORMAT,
            height,
            width,
            pitch_or_linear_size: height * width,
            depth: u32::from(info.depth),
            mipmap_count: SYNTHESIZED_MIPMAP_COUNT,
            reserved1: [0; 11],
            pixel_format: PixelFormat {
                size: 32,
                flags: codec.pixel_format_flags,
                fourcc: codec.fourcc,
                rgb_bit_count: 32,
                r_bit_mask: 0x00FF_0000,
                g_bit_mask: 0x0000_FF00,
                b_bit_mask: 0x0000_00FF,
                a_bit_mask: 0xFF00_0000,
            },
            caps: caps::TEXTURE,
            caps2: 0,
            caps3: 0,
            caps4: 0,
            reserved2: 0,
        }
    }

    /// Write the magic and the 124-byte header, little-endian
    pub fn write<W: Write>(&self, writer: &mut W) -> ParseResult<()> {
        writer.write_u32::<LittleEndian>(DDS_MAGIC)?;
        writer.write_u32::<LittleEndian>(self.size)?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_u32::<LittleEndian>(self.height)?;
        writer.write_u32::<LittleEndian>(self.width)?;
        writer.write_u32::<LittleEndian>(self.pitch_or_linear_size)?;
        writer.write_u32::<LittleEndian>(self.depth)?;
        writer.write_u32::<LittleEndian>(self.mipmap_count)?;
        for reserved in self.reserved1 {
            writer.write_u32::<LittleEndian>(reserved)?;
        }
        self.pixel_format.write(writer)?;
        writer.write_u32::<LittleEndian>(self.caps)?;
        writer.write_u32::<LittleEndian>(self.caps2)?;
        writer.write_u32::<LittleEndian>(self.caps3)?;
        writer.write_u32::<LittleEndian>(self.caps4)?;
        writer.write_u32::<LittleEndian>(self.reserved2)?;
        Ok(())
    }

    /// Parse a header (including the magic) from the start of a DDS payload
    pub fn parse(data: &[u8]) -> ParseResult<Self> {
        if data.len() < DDS_HEADER_SIZE {
            return Err(ParseError::UnexpectedEndOfStream {
                offset: 0,
                requested: DDS_HEADER_SIZE as u64,
                available: data.len() as u64,
            });
        }

        let magic = LittleEndian::read_u32(&data[0..4]);
        if magic != DDS_MAGIC {
            return Err(ParseError::ConstantMismatch {
                field: "dds_magic",
                expected: u64::from(DDS_MAGIC),
                actual: u64::from(magic),
            });
        }

        let header_data = &data[4..DDS_HEADER_SIZE];
        let word = |offset: usize| LittleEndian::read_u32(&header_data[offset..offset + 4]);

        let mut reserved1 = [0u32; 11];
        LittleEndian::read_u32_into(&header_data[28..72], &mut reserved1);

        Ok(Self {
            size: word(0),
            flags: word(4),
            height: word(8),
            width: word(12),
            pitch_or_linear_size: word(16),
            depth: word(20),
            mipmap_count: word(24),
            reserved1,
            // Pixel format (32 bytes starting at offset 72)
            pixel_format: PixelFormat::parse(&header_data[72..104]),
            caps: word(104),
            caps2: word(108),
            caps3: word(112),
            caps4: word(116),
            reserved2: word(120),
        })
    }
}

/// DDS pixel format (32 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFormat {
    pub size: u32,
    pub flags: u32,
    pub fourcc: [u8; 4],
    pub rgb_bit_count: u32,
    pub r_bit_mask: u32,
    pub g_bit_mask: u32,
    pub b_bit_mask: u32,
    pub a_bit_mask: u32,
}

impl PixelFormat {
    /// Parse pixel format from a 32-byte slice
    fn parse(data: &[u8]) -> Self {
        let word = |offset: usize| LittleEndian::read_u32(&data[offset..offset + 4]);
        Self {
            size: word(0),
            flags: word(4),
            fourcc: [data[8], data[9], data[10], data[11]],
            rgb_bit_count: word(12),
            r_bit_mask: word(16),
            g_bit_mask: word(20),
            b_bit_mask: word(24),
            a_bit_mask: word(28),
        }
    }

    fn write<W: Write>(&self, writer: &mut W) -> ParseResult<()> {
        writer.write_u32::<LittleEndian>(self.size)?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_all(&self.fourcc)?;
        writer.write_u32::<LittleEndian>(self.rgb_bit_count)?;
        writer.write_u32::<LittleEndian>(self.r_bit_mask)?;
        writer.write_u32::<LittleEndian>(self.g_bit_mask)?;
        writer.write_u32::<LittleEndian>(self.b_bit_mask)?;
        writer.write_u32::<LittleEndian>(self.a_bit_mask)?;
        Ok(())
    }

    /// Get FourCC as string
    pub fn fourcc_string(&self) -> String {
        String::from_utf8_lossy(&self.fourcc).to_string()
    }
}
