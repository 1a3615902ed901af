//! GTF to DDS header synthesis
//!
//! Textures embedded in a PXBI container are stored as GTF blobs: a 128-byte
//! big-endian header followed by the pixel payload. Standard tools expect
//! DDS, whose header is also 128 bytes (magic plus 124-byte structure) but
//! little-endian. Conversion rewrites only the header; pixel bytes from
//! offset 128 onward are copied unchanged.

mod format;
mod header;

pub use format::{GtfCodec, GtfInfo};
pub use header::{caps, flags, pf_flags, DdsHeader, PixelFormat, SYNTHESIZED_MIPMAP_COUNT};

use crate::traits::ParseResult;

/// DDS file magic number "DDS "
pub const DDS_MAGIC: u32 = 0x2053_4444;

/// Size of the DDS magic plus header
pub const DDS_HEADER_SIZE: usize = 128;

/// Size of the GTF header preceding the pixel payload
pub const GTF_HEADER_SIZE: usize = 128;

/// Convert a raw GTF blob into a DDS file image
///
/// Same input always yields the same bytes.
pub fn convert_gtf_to_dds(raw: &[u8]) -> ParseResult<Vec<u8>> {
    let info = GtfInfo::parse(raw)?;
    let codec = GtfCodec::lookup(info.codec)?;
    let header = DdsHeader::from_gtf(&info, &codec);

    let payload = &raw[GTF_HEADER_SIZE..];
    let mut output = Vec::with_capacity(DDS_HEADER_SIZE + payload.len());
    header.write(&mut output)?;
    output.extend_from_slice(payload);

    Ok(output)
}
