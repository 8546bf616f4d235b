//! Turning `--attach` arguments into request attachments.

use std::fs;
use std::io;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::api::{Attachment, AttachmentKind};

const PASSTHROUGH_SCHEMES: &[&str] = &["http://", "https://", "data:"];

fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}

fn kind_for_mime(mime: &str) -> AttachmentKind {
    if mime.starts_with("image/") {
        AttachmentKind::Image
    } else {
        AttachmentKind::File
    }
}

fn extension_of(path: &str) -> &str {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Builds an attachment from a URL, data URI or local file path. Local files
/// are read and inlined as a base64 data URI.
pub fn load_attachment(source: &str) -> io::Result<Attachment> {
    if PASSTHROUGH_SCHEMES
        .iter()
        .any(|scheme| source.starts_with(scheme))
    {
        let kind = match source.strip_prefix("data:") {
            Some(rest) => kind_for_mime(rest.split([';', ',']).next().unwrap_or_default()),
            None => {
                let path = source.split(['?', '#']).next().unwrap_or_default();
                kind_for_mime(mime_for_extension(extension_of(path)))
            }
        };
        return Ok(Attachment {
            kind,
            url: source.to_string(),
            name: None,
        });
    }

    let path = Path::new(source);
    let bytes = fs::read(path)?;
    let mime = mime_for_extension(extension_of(source));
    Ok(Attachment {
        kind: kind_for_mime(mime),
        url: data_uri(mime, &bytes),
        name: path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn local_files_become_data_uris() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("pixel.PNG");
        fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();
        let notes = dir.path().join("notes.txt");
        fs::write(&notes, "hello").unwrap();

        let image = load_attachment(image.to_str().unwrap()).unwrap();
        assert_eq!(image.kind, AttachmentKind::Image);
        assert_eq!(image.url, "data:image/png;base64,iVBORw==");
        assert_eq!(image.name.as_deref(), Some("pixel.PNG"));

        let notes = load_attachment(notes.to_str().unwrap()).unwrap();
        assert_eq!(notes.kind, AttachmentKind::File);
        assert_eq!(notes.url, "data:text/plain;base64,aGVsbG8=");
    }

    #[test]
    fn urls_pass_through() {
        let remote = load_attachment("https://cdn.example/cat.jpg?size=large").unwrap();
        assert_eq!(remote.kind, AttachmentKind::Image);
        assert_eq!(remote.url, "https://cdn.example/cat.jpg?size=large");

        let doc = load_attachment("data:application/pdf;base64,JVBER").unwrap();
        assert_eq!(doc.kind, AttachmentKind::File);

        let inline = load_attachment("data:image/webp;base64,UklG").unwrap();
        assert_eq!(inline.kind, AttachmentKind::Image);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.png");
        assert!(load_attachment(missing.to_str().unwrap()).is_err());
    }
}
