//! Texture file writer

use std::fs;
use std::path::{Path, PathBuf};

use pxbi_parsers::{PxbiModel, Texture};
use tracing::{debug, info};

use crate::textures::{TextureError, TextureResult};

/// Texture dump options
#[derive(Debug, Clone)]
pub struct TextureDumpOptions {
    /// Write the raw GTF payload next to the DDS file
    pub write_gtf: bool,

    /// Write the DDS conversion
    pub write_dds: bool,

    /// Replace files that already exist; otherwise they are skipped
    pub overwrite: bool,
}

impl Default for TextureDumpOptions {
    fn default() -> Self {
        Self {
            write_gtf: true,
            write_dds: true,
            overwrite: false,
        }
    }
}

/// What a dump produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureDumpReport {
    pub files_written: usize,
    pub files_skipped: usize,
    pub bytes_written: u64,
}

/// Writes texture payloads to an output directory
pub struct TextureDumper {
    options: TextureDumpOptions,
}

impl TextureDumper {
    /// Create new dumper with default options
    pub fn new() -> Self {
        Self {
            options: TextureDumpOptions::default(),
        }
    }

    /// Create dumper with custom options
    pub fn with_options(options: TextureDumpOptions) -> Self {
        Self { options }
    }

    /// Dump every texture of a model
    ///
    /// A GTF payload goes to `<out>/<name without extension>.gtf` and the DDS
    /// conversion to `<out>/<name>`.
    pub fn dump(&self, model: &PxbiModel, out_dir: impl AsRef<Path>) -> TextureResult<TextureDumpReport> {
        let out_dir = out_dir.as_ref();
        fs::create_dir_all(out_dir)?;

        let mut report = TextureDumpReport::default();
        for texture in &model.textures {
            self.dump_texture(texture, out_dir, &mut report)?;
        }

        info!(
            output = %out_dir.display(),
            written = report.files_written,
            skipped = report.files_skipped,
            "Dumped textures"
        );
        Ok(report)
    }

    /// Dump a single texture
    pub fn dump_texture(
        &self,
        texture: &Texture,
        out_dir: &Path,
        report: &mut TextureDumpReport,
    ) -> TextureResult<()> {
        let relative = sanitize_texture_name(texture.relative_name())?;
        let dds_path = out_dir.join(&relative);

        if self.options.write_gtf {
            self.write_file(&dds_path.with_extension("gtf"), &texture.raw, report)?;
        }
        if self.options.write_dds {
            self.write_file(&dds_path, &texture.dds, report)?;
        }
        Ok(())
    }

    fn write_file(&self, path: &Path, data: &[u8], report: &mut TextureDumpReport) -> TextureResult<()> {
        if !self.options.overwrite && path.exists() {
            debug!(path = %path.display(), "Skipping existing file");
            report.files_skipped += 1;
            return Ok(());
        }

        let write = |path: &Path| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, data)
        };
        write(path).map_err(|source| TextureError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), bytes = data.len(), "Wrote texture file");
        report.files_written += 1;
        report.bytes_written += data.len() as u64;
        Ok(())
    }
}

impl Default for TextureDumper {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a texture name into a path relative to the output directory
///
/// Backslashes are treated as separators; anything that would land outside
/// the output directory is rejected.
pub fn sanitize_texture_name(name: &str) -> TextureResult<PathBuf> {
    let unsafe_path = || TextureError::UnsafePath {
        name: name.to_string(),
    };

    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(unsafe_path());
    }

    let mut path = PathBuf::new();
    for part in normalized.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(unsafe_path()),
            // Drive letters and alternate data streams
            part if part.contains(':') => return Err(unsafe_path()),
            part => path.push(part),
        }
    }

    if path.as_os_str().is_empty() {
        return Err(unsafe_path());
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pxbi_parsers::pxbi::TextureInfo;
    use tempfile::TempDir;

    fn texture(name: &str, codec: u8) -> Texture {
        let mut raw = vec![0u8; 128];
        raw[24] = codec;
        raw[32..34].copy_from_slice(&8u16.to_be_bytes());
        raw[34..36].copy_from_slice(&4u16.to_be_bytes());
        raw.extend_from_slice(&[0x5A; 16]);

        let info = TextureInfo {
            file_name: "unused.gtf".to_string(),
            name: name.to_string(),
            size: raw.len() as u32,
            offset: 0,
        };
        Texture::from_blob(info, raw).unwrap()
    }

    #[test]
    fn test_sanitize_normalizes_separators() {
        assert_eq!(
            sanitize_texture_name("textures/skin.dds").unwrap(),
            PathBuf::from("textures").join("skin.dds")
        );
        assert_eq!(
            sanitize_texture_name("textures\\eyes.dds").unwrap(),
            PathBuf::from("textures").join("eyes.dds")
        );
        assert_eq!(sanitize_texture_name("plain.dds").unwrap(), PathBuf::from("plain.dds"));
    }

    #[test]
    fn test_sanitize_rejects_escapes() {
        for name in ["../evil.dds", "a/../../evil.dds", "/etc/passwd", "\\\\server\\share", "C:\\x.dds", ""] {
            assert!(
                matches!(sanitize_texture_name(name), Err(TextureError::UnsafePath { .. })),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_dump_texture_writes_both_files() {
        let dir = TempDir::new().unwrap();
        let tex = texture("./tex/skin.dds", 166);
        let mut report = TextureDumpReport::default();

        TextureDumper::new()
            .dump_texture(&tex, dir.path(), &mut report)
            .unwrap();

        let gtf = fs::read(dir.path().join("tex").join("skin.gtf")).unwrap();
        let dds = fs::read(dir.path().join("tex").join("skin.dds")).unwrap();
        assert_eq!(gtf, tex.raw);
        assert_eq!(dds, tex.dds);
        assert_eq!(&dds[..4], b"DDS ");
        assert_eq!(report.files_written, 2);
        assert_eq!(report.bytes_written, (gtf.len() + dds.len()) as u64);
    }

    #[test]
    fn test_dump_texture_strips_backslash_prefix() {
        let dir = TempDir::new().unwrap();
        let tex = texture(".\\tex\\eyes.dds", 136);
        let mut report = TextureDumpReport::default();

        TextureDumper::new()
            .dump_texture(&tex, dir.path(), &mut report)
            .unwrap();

        assert_eq!(fs::read(dir.path().join("tex").join("eyes.dds")).unwrap(), tex.dds);
        assert!(dir.path().join("tex").join("eyes.gtf").exists());
        assert_eq!(report.files_written, 2);
    }

    #[test]
    fn test_dump_respects_format_switches() {
        let dir = TempDir::new().unwrap();
        let tex = texture("only.dds", 134);
        let dumper = TextureDumper::with_options(TextureDumpOptions {
            write_gtf: false,
            ..Default::default()
        });
        let mut report = TextureDumpReport::default();

        dumper.dump_texture(&tex, dir.path(), &mut report).unwrap();

        assert!(dir.path().join("only.dds").exists());
        assert!(!dir.path().join("only.gtf").exists());
        assert_eq!(report.files_written, 1);
    }

    #[test]
    fn test_existing_files_are_skipped_without_overwrite() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("skin.dds");
        fs::write(&target, b"keep").unwrap();

        let tex = texture("skin.dds", 136);
        let mut report = TextureDumpReport::default();
        TextureDumper::new()
            .dump_texture(&tex, dir.path(), &mut report)
            .unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"keep");
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.files_written, 1);

        let overwrite = TextureDumper::with_options(TextureDumpOptions {
            overwrite: true,
            ..Default::default()
        });
        let mut report = TextureDumpReport::default();
        overwrite.dump_texture(&tex, dir.path(), &mut report).unwrap();
        assert_eq!(fs::read(&target).unwrap(), tex.dds);
        assert_eq!(report.files_written, 2);
    }

    #[test]
    fn test_unsafe_name_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let tex = texture("../escape.dds", 166);
        let mut report = TextureDumpReport::default();

        let err = TextureDumper::new()
            .dump_texture(&tex, dir.path(), &mut report)
            .unwrap_err();

        assert!(matches!(err, TextureError::UnsafePath { ref name } if name == "../escape.dds"));
        assert_eq!(report, TextureDumpReport::default());
    }
}
