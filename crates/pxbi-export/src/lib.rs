//! pxbi-export
//!
//! Writers for data decoded from PXBI containers:
//! - GTF and DDS texture files
//! - JSON model summaries

pub mod json;
pub mod textures;

pub use json::{JsonError, JsonExportOptions, JsonExporter, JsonResult};
pub use textures::{TextureDumpOptions, TextureDumpReport, TextureDumper, TextureError, TextureResult};
