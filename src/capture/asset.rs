use std::path::Path;

use tracing::info;

use crate::error::{PipelineError, PipelineResult};

/// Canonical uncompressed container the remote service requires.
pub const CANONICAL_MIME: &str = "audio/wav";

/// A finished audio recording or uploaded file, moved by value between the
/// capture, transcode, and upload stages.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    bytes: Vec<u8>,
    mime_type: String,
    file_name: String,
}

impl AudioAsset {
    /// Build an asset, normalizing the file name extension to match the
    /// mime type's canonical extension.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        let file_name = with_extension_for_mime(&file_name.into(), &mime_type);
        Self {
            bytes,
            mime_type,
            file_name,
        }
    }

    /// Read an asset from disk, guessing the mime type from the extension.
    pub fn from_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let mime = mime_for_path(path)?;
        let bytes = std::fs::read(path)
            .map_err(|e| PipelineError::CorruptAudio(format!("{}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        info!(
            "Loaded audio file: {} ({} bytes, {})",
            path.display(),
            bytes.len(),
            mime
        );

        Ok(Self::new(bytes, mime, file_name))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_canonical(&self) -> bool {
        self.mime_type == CANONICAL_MIME
    }
}

/// Canonical file extension for a mime type. The codec suffix
/// (";codecs=...") does not affect the container extension.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let container = mime_type.split(';').next().unwrap_or(mime_type);
    match container {
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/webm" => "webm",
        "audio/ogg" => "ogg",
        "audio/mp4" => "m4a",
        "audio/mpeg" => "mp3",
        "audio/flac" => "flac",
        _ => "bin",
    }
}

fn mime_for_path(path: &Path) -> PipelineResult<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let mime = match ext.as_str() {
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        "ogg" | "oga" => "audio/ogg",
        "m4a" | "mp4" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        other => {
            return Err(PipelineError::UnsupportedFormat(format!(
                "unrecognized audio file extension: .{other}"
            )))
        }
    };
    Ok(mime.to_string())
}

fn with_extension_for_mime(file_name: &str, mime_type: &str) -> String {
    let ext = extension_for_mime(mime_type);
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.{ext}"),
        _ => format!("{file_name}.{ext}"),
    }
}
