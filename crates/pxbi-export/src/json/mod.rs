//! JSON summary export for decoded models

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use pxbi_parsers::{HumanReadable, PxbiModel};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// JSON export errors
#[derive(Error, Debug)]
pub enum JsonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type JsonResult<T> = Result<T, JsonError>;

/// JSON export options
#[derive(Debug, Clone)]
pub struct JsonExportOptions {
    /// Use pretty-print formatting
    pub pretty: bool,

    /// Include metadata (decoder version, counts)
    pub include_metadata: bool,
}

impl Default for JsonExportOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            include_metadata: true,
        }
    }
}

/// JSON data exporter
pub struct JsonExporter {
    options: JsonExportOptions,
}

impl JsonExporter {
    /// Create new exporter with default options
    pub fn new() -> Self {
        Self {
            options: JsonExportOptions::default(),
        }
    }

    /// Create exporter with custom options
    pub fn with_options(options: JsonExportOptions) -> Self {
        Self { options }
    }

    /// Build the summary document for a model
    pub fn model_summary(&self, model: &PxbiModel) -> serde_json::Value {
        let summary = model.to_json();
        if !self.options.include_metadata {
            return summary;
        }

        json!({
            "metadata": {
                "decoder_version": pxbi_parsers::VERSION,
                "file_type": model.file_type,
                "mesh_count": model.meshes.len(),
                "material_count": model.materials.len(),
                "texture_count": model.textures.len(),
                "bone_count": model.skeleton.bone_count(),
                "vertex_count": model.vertex_count(),
                "triangle_count": model.triangle_count(),
            },
            "model": summary,
        })
    }

    /// Export a model summary to a JSON file
    pub fn export_model(&self, model: &PxbiModel, output_path: impl AsRef<Path>) -> JsonResult<()> {
        let output_path = output_path.as_ref();
        self.write_json(&self.model_summary(model), output_path)?;
        debug!(path = %output_path.display(), "Wrote model summary");
        Ok(())
    }

    /// Write JSON to file
    fn write_json(&self, value: &serde_json::Value, output_path: &Path) -> JsonResult<()> {
        let file = File::create(output_path)?;
        let writer = BufWriter::new(file);

        if self.options.pretty {
            serde_json::to_writer_pretty(writer, value)?;
        } else {
            serde_json::to_writer(writer, value)?;
        }

        Ok(())
    }
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pxbi_parsers::pxbi::{BoneRecord, Skeleton, IDENTITY_MATRIX};
    use tempfile::TempDir;

    fn model() -> PxbiModel {
        let bones = vec![
            BoneRecord {
                name: String::new(),
                joint_id: 0,
                transform: IDENTITY_MATRIX,
            },
            BoneRecord {
                name: "spine".to_string(),
                joint_id: 1,
                transform: IDENTITY_MATRIX,
            },
        ];

        PxbiModel {
            file_type: "MODL".to_string(),
            meshes: Vec::new(),
            materials: Vec::new(),
            textures: Vec::new(),
            skeleton: Skeleton::build(bones, &[], "root").unwrap(),
            joints: Vec::new(),
        }
    }

    #[test]
    fn test_summary_with_metadata() {
        let value = JsonExporter::new().model_summary(&model());
        assert_eq!(value["metadata"]["bone_count"], 2);
        assert_eq!(value["metadata"]["file_type"], "MODL");
        assert_eq!(value["model"]["bones"][0]["name"], "root");
    }

    #[test]
    fn test_summary_without_metadata() {
        let exporter = JsonExporter::with_options(JsonExportOptions {
            include_metadata: false,
            ..Default::default()
        });
        let value = exporter.model_summary(&model());
        assert!(value.get("metadata").is_none());
        assert_eq!(value["bones"][1]["name"], "spine");
    }

    #[test]
    fn test_export_model_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");

        let exporter = JsonExporter::with_options(JsonExportOptions {
            pretty: false,
            ..Default::default()
        });
        exporter.export_model(&model(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["metadata"]["mesh_count"], 0);
        assert_eq!(value["model"]["bones"][1]["parent"], serde_json::Value::Null);
    }
}
