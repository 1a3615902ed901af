// pxbi-parsers/src/traits.rs
//! Core traits and shared types for the decoders in this crate.
//!
//! This module establishes:
//! - The error taxonomy every decoder reports through
//! - The `Parser` entry point (readers, files, memory-mapped files)
//! - The `Decodable` capability implemented by fixed-layout records
//! - Progress reporting and human-readable output

use std::io::{Read, Seek};
use std::path::Path;

use thiserror::Error;

use crate::cursor::ByteCursor;

/// Errors that can occur while decoding a container
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected end of stream at offset {offset}: requested {requested} bytes, {available} available")]
    UnexpectedEndOfStream {
        offset: u64,
        requested: u64,
        available: u64,
    },

    #[error("Misaligned pointer for {region}: expected offset {expected}, cursor at {actual}")]
    MisalignedPointer {
        region: &'static str,
        expected: u64,
        actual: u64,
    },

    #[error("Constant mismatch in {field}: expected {expected}, found {actual}")]
    ConstantMismatch {
        field: &'static str,
        expected: u64,
        actual: u64,
    },

    #[error("Value {value} out of range for {field}")]
    FieldOutOfRange { field: &'static str, value: u64 },

    #[error("Invalid ASCII string at offset {offset}")]
    InvalidString { offset: u64 },

    #[error("Unsupported vertex layout: stride {stride} bytes (expected 88)")]
    UnsupportedVertexLayout { stride: u32 },

    #[error("Unknown texture role code {code}")]
    UnknownTextureRole { code: u32 },

    #[error("Unknown texture codec 0x{code:02X}")]
    UnknownTextureCodec { code: u8 },

    #[error("Bone '{bone}' has a singular transform matrix")]
    SingularBoneMatrix { bone: String },

    #[error("Trailing data: {remaining} bytes after end-of-file marker at offset {offset}")]
    TrailingData { offset: u64, remaining: u64 },

    #[error("Skeleton cycle detected at bone '{bone}'")]
    SkeletonCycleDetected { bone: String },

    #[error("Nested error in {context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Wrap this error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ParseError::Nested {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers
    pub fn root_cause(&self) -> &ParseError {
        let mut current = self;
        while let ParseError::Nested { source, .. } = current {
            current = source;
        }
        current
    }
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// A fixed-layout record that reads itself from a cursor
///
/// Implementors read their fields in file order and validate any
/// format constants as they go.
pub trait Decodable: Sized {
    /// Decode one record starting at the cursor's current position
    fn decode<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> ParseResult<Self>;
}

/// Progress callback for long-running parse operations
pub type ProgressCallback = Box<dyn Fn(ParseProgress) + Send + Sync>;

/// Progress information during parsing
#[derive(Debug, Clone)]
pub struct ParseProgress {
    /// Current phase of parsing
    pub phase: ParsePhase,
    /// Bytes processed so far
    pub bytes_processed: u64,
    /// Total bytes to process (if known)
    pub total_bytes: Option<u64>,
    /// Current item being processed (e.g., a mesh name)
    pub current_item: Option<String>,
    /// Number of items processed
    pub items_processed: u64,
    /// Total items to process (if known)
    pub total_items: Option<u64>,
}

impl ParseProgress {
    /// Calculate percentage complete (0.0 - 1.0)
    pub fn percentage(&self) -> Option<f32> {
        self.total_bytes.map(|total| {
            if total == 0 {
                1.0
            } else {
                self.bytes_processed as f32 / total as f32
            }
        })
    }
}

/// Phases of the parsing process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePhase {
    /// Reading the container header
    ReadingHeader,
    /// Decoding meshes, materials, bones and texture tables
    ParsingRecords,
    /// Building the skeleton and texture payloads
    LinkingReferences,
    /// End-of-file validation
    Validating,
    /// Parsing complete
    Complete,
}

/// Configuration options for parsing
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Check that the declared contents size matches the stream length
    pub strict_validation: bool,
    /// Name given to bone 0 in the decoded model
    pub root_bone_name: String,
    /// Whether to use memory mapping for large files
    pub use_memory_mapping: bool,
    /// Minimum file size to enable memory mapping
    pub memory_mapping_threshold: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict_validation: true,
            root_bone_name: "root".to_string(),
            use_memory_mapping: true,
            memory_mapping_threshold: 10 * 1024 * 1024, // 10 MB
        }
    }
}

/// Core trait for file format parsers
pub trait Parser: Send + Sync {
    /// The parsed output type
    type Output: Send + Sync;

    /// Returns the file extensions this parser handles (e.g., ["bin"])
    fn extensions(&self) -> &[&str];

    /// Returns a human-readable name for this parser
    fn name(&self) -> &str;

    /// Parse from a reader with default options
    fn parse<R: Read + Seek>(&self, reader: R) -> ParseResult<Self::Output> {
        self.parse_with_options(reader, &ParseOptions::default(), None)
    }

    /// Parse from a reader with custom options and optional progress callback
    fn parse_with_options<R: Read + Seek>(
        &self,
        reader: R,
        options: &ParseOptions,
        progress: Option<ProgressCallback>,
    ) -> ParseResult<Self::Output>;

    /// Parse from a file path
    fn parse_file(&self, path: &Path) -> ParseResult<Self::Output> {
        self.parse_file_with_options(path, &ParseOptions::default(), None)
    }

    /// Parse from a file path with options
    fn parse_file_with_options(
        &self,
        path: &Path,
        options: &ParseOptions,
        progress: Option<ProgressCallback>,
    ) -> ParseResult<Self::Output> {
        let file = std::fs::File::open(path)?;

        if options.use_memory_mapping {
            let metadata = file.metadata()?;
            if metadata.len() >= options.memory_mapping_threshold {
                return self.parse_memory_mapped(path, options, progress);
            }
        }

        let reader = std::io::BufReader::new(file);
        self.parse_with_options(reader, options, progress)
    }

    /// Parse using memory-mapped I/O (for large files)
    fn parse_memory_mapped(
        &self,
        path: &Path,
        options: &ParseOptions,
        progress: Option<ProgressCallback>,
    ) -> ParseResult<Self::Output> {
        let file = std::fs::File::open(path)?;
        // SAFETY: the mapping is only sound while no other process truncates
        // or rewrites the file; a shrinking file faults with SIGBUS on access.
        #[allow(unsafe_code)]
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        self.parse_with_options(std::io::Cursor::new(&mmap[..]), options, progress)
    }

    /// Check if this parser can handle the given file, by extension
    fn can_parse(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| {
            let ext_str = ext.to_string_lossy().to_lowercase();
            self.extensions().iter().any(|e| e.to_lowercase() == ext_str)
        })
    }
}

/// Trait for converting parsed data to human-readable formats
pub trait HumanReadable {
    /// Convert to a human-readable string representation
    fn to_readable_string(&self) -> String;

    /// Convert to formatted JSON
    fn to_json(&self) -> serde_json::Value;

    /// Convert to formatted YAML (falls back to the readable string)
    fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.to_json()).unwrap_or_else(|_| self.to_readable_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_percentage() {
        let progress = ParseProgress {
            phase: ParsePhase::ParsingRecords,
            bytes_processed: 50,
            total_bytes: Some(100),
            current_item: None,
            items_processed: 0,
            total_items: None,
        };

        assert_eq!(progress.percentage(), Some(0.5));
    }

    #[test]
    fn test_parse_error_context() {
        let error = ParseError::MisalignedPointer {
            region: "mesh pointer list",
            expected: 140,
            actual: 144,
        };

        let contextualized = error.with_context("mesh 0").with_context("container");

        match &contextualized {
            ParseError::Nested { context, .. } => assert_eq!(context, "container"),
            _ => panic!("Expected Nested error"),
        }
        assert!(matches!(
            contextualized.root_cause(),
            ParseError::MisalignedPointer { expected: 140, actual: 144, .. }
        ));
    }

    #[test]
    fn test_default_options() {
        let options = ParseOptions::default();
        assert!(options.strict_validation);
        assert_eq!(options.root_bone_name, "root");
    }
}
