//! Texture dumping
//!
//! Writes the GTF payloads embedded in a container, and their DDS
//! counterparts, to disk under the names the container declares.

mod dumper;

pub use dumper::{sanitize_texture_name, TextureDumpOptions, TextureDumpReport, TextureDumper};

use std::path::PathBuf;

use thiserror::Error;

/// Texture export errors
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Texture name '{name}' escapes the output directory")]
    UnsafePath { name: String },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type TextureResult<T> = Result<T, TextureError>;
