//! GTF texture header fields and codec tables

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use super::header::pf_flags;
use super::GTF_HEADER_SIZE;
use crate::traits::{ParseError, ParseResult};

/// Codec byte to DDS FourCC
const FOURCC_TABLE: [(u8, [u8; 4]); 4] = [
    (133, [0, 0, 0, 0]),
    (134, *b"DXT1"),
    (136, *b"DXT5"),
    (166, *b"DXT1"),
];

/// Codec byte to DDS pixel-format flags
const PIXEL_FORMAT_FLAG_TABLE: [(u8, u32); 4] = [
    (133, pf_flags::RGB | pf_flags::ALPHAPIXELS),
    (134, pf_flags::FOURCC),
    (136, pf_flags::FOURCC),
    (166, pf_flags::FOURCC),
];

const CODEC_OFFSET: usize = 24;
const WIDTH_OFFSET: usize = 32;
const HEIGHT_OFFSET: usize = 34;
const DEPTH_OFFSET: usize = 36;

/// The GTF header fields needed to describe the texture as DDS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GtfInfo {
    pub codec: u8,
    pub width: u16,
    pub height: u16,
    pub depth: u16,
}

impl GtfInfo {
    /// Read the header fields from a raw GTF payload
    pub fn parse(raw: &[u8]) -> ParseResult<Self> {
        if raw.len() < GTF_HEADER_SIZE {
            return Err(ParseError::UnexpectedEndOfStream {
                offset: 0,
                requested: GTF_HEADER_SIZE as u64,
                available: raw.len() as u64,
            });
        }

        Ok(Self {
            codec: raw[CODEC_OFFSET],
            width: BigEndian::read_u16(&raw[WIDTH_OFFSET..WIDTH_OFFSET + 2]),
            height: BigEndian::read_u16(&raw[HEIGHT_OFFSET..HEIGHT_OFFSET + 2]),
            depth: BigEndian::read_u16(&raw[DEPTH_OFFSET..DEPTH_OFFSET + 2]),
        })
    }
}

/// DDS pixel-format values selected by a GTF codec byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GtfCodec {
    pub code: u8,
    pub fourcc: [u8; 4],
    pub pixel_format_flags: u32,
}

impl GtfCodec {
    /// Look a codec byte up in both tables
    pub fn lookup(code: u8) -> ParseResult<Self> {
        let fourcc = FOURCC_TABLE
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, fourcc)| *fourcc);
        let flags = PIXEL_FORMAT_FLAG_TABLE
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, flags)| *flags);

        match (fourcc, flags) {
            (Some(fourcc), Some(pixel_format_flags)) => Ok(Self {
                code,
                fourcc,
                pixel_format_flags,
            }),
            _ => Err(ParseError::UnknownTextureCodec { code }),
        }
    }

    /// Short human-readable name of the pixel encoding
    pub fn label(&self) -> &'static str {
        match &self.fourcc {
            b"DXT1" => "DXT1",
            b"DXT5" => "DXT5",
            _ => "A8R8G8B8",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_lookup() {
        let dxt1 = GtfCodec::lookup(166).unwrap();
        assert_eq!(&dxt1.fourcc, b"DXT1");
        assert_eq!(dxt1.pixel_format_flags, 0x04);

        let argb = GtfCodec::lookup(133).unwrap();
        assert_eq!(argb.fourcc, [0; 4]);
        assert_eq!(argb.pixel_format_flags, 0x41);
        assert_eq!(argb.label(), "A8R8G8B8");

        assert_eq!(GtfCodec::lookup(136).unwrap().label(), "DXT5");
    }

    #[test]
    fn test_unknown_codec() {
        assert!(matches!(
            GtfCodec::lookup(0x87),
            Err(ParseError::UnknownTextureCodec { code: 0x87 })
        ));
    }

    #[test]
    fn test_gtf_info_parse() {
        let mut raw = vec![0u8; 128];
        raw[24] = 136;
        raw[32..34].copy_from_slice(&512u16.to_be_bytes());
        raw[34..36].copy_from_slice(&64u16.to_be_bytes());
        raw[36..38].copy_from_slice(&1u16.to_be_bytes());

        let info = GtfInfo::parse(&raw).unwrap();
        assert_eq!(info, GtfInfo { codec: 136, width: 512, height: 64, depth: 1 });
    }

    #[test]
    fn test_gtf_info_too_short() {
        assert!(matches!(
            GtfInfo::parse(&[0u8; 40]),
            Err(ParseError::UnexpectedEndOfStream { requested: 128, available: 40, .. })
        ));
    }
}
