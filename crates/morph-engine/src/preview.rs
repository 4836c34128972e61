use std::io::{self, Write};
use std::path::Path;

use morph_contracts::SourceImage;
use tempfile::NamedTempFile;

/// Temporary on-disk copy of the selected photo for the presentation layer.
/// The file is deleted when the handle is dropped.
#[derive(Debug)]
pub struct PreviewHandle {
    file: NamedTempFile,
}

impl PreviewHandle {
    pub fn create(source: &SourceImage) -> io::Result<Self> {
        let suffix = format!(".{}", extension_for_mime(source.mime_type()));
        let mut file = tempfile::Builder::new()
            .prefix("morph-preview-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(source.bytes())?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        _ => "img",
    }
}
