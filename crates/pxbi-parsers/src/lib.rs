//! pxbi-parsers
//!
//! Decoder for PXBI model containers and the GTF textures embedded in them.
//!
//! # Supported Formats
//!
//! | Format | Extension | Description |
//! |--------|-----------|-------------|
//! | PXBI   | `.bin`    | Skinned model container (meshes, materials, skeleton, textures) |
//! | GTF    | embedded  | Texture blobs, re-emitted with a synthesized DDS header |
//!
//! # Example
//!
//! ```rust,ignore
//! use pxbi_parsers::{PxbiParser, Parser};
//!
//! let parser = PxbiParser::new();
//! let model = parser.parse_file("character.bin".as_ref())?;
//!
//! println!("Found {} meshes", model.meshes.len());
//! ```

pub mod cursor;
pub mod dds;
pub mod logging;
pub mod pxbi;
pub mod traits;

// Re-export main types
pub use traits::{
    Decodable, HumanReadable, ParseError, ParseOptions, ParsePhase, ParseProgress, ParseResult, Parser,
    ProgressCallback,
};

pub use cursor::ByteCursor;
pub use dds::{convert_gtf_to_dds, DdsHeader, GtfCodec, GtfInfo};
pub use pxbi::{
    Bone, Material, Mesh, PxbiContainer, PxbiModel, PxbiParser, Skeleton, Texture, TextureAssignment, TextureRole,
    Vertex,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
