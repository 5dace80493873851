/// The uploaded meal photo: opaque bytes plus the MIME type the capture
/// layer declared for them. Consumed once per analysis request.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: String) -> Self {
        Self { bytes, mime_type }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    // `infer` misses HEIC/HEIF; sniff the ftyp brand ourselves.
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

fn normalize_image_mime(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" => "image/jpeg".to_string(),
        _ => lowered,
    }
}

pub fn model_supports_mime(mime_type: &str) -> bool {
    matches!(
        mime_type,
        "image/png" | "image/jpeg" | "image/webp" | "image/heic" | "image/heif"
    )
}

/// Pick the MIME type the model request will carry: the declared type if
/// usable, otherwise whatever the bytes sniff to. None means the payload
/// cannot be sent as an image at all.
pub fn resolve_image_mime(payload: &ImagePayload) -> Option<String> {
    let mut candidates = Vec::new();
    if !payload.mime_type.trim().is_empty() {
        candidates.push(payload.mime_type.clone());
    }
    if let Some(detected) = detect_mime_type(&payload.bytes) {
        candidates.push(detected);
    }

    for candidate in candidates {
        let normalized = normalize_image_mime(&candidate);
        if model_supports_mime(&normalized) {
            return Some(normalized);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
    ];

    #[test]
    fn sniffs_png_from_magic_bytes() {
        assert_eq!(detect_mime_type(PNG_MAGIC).as_deref(), Some("image/png"));
    }

    #[test]
    fn resolves_declared_jpg_alias_to_jpeg() {
        let payload = ImagePayload::new(vec![0xFF, 0xD8, 0xFF], "image/jpg".to_string());
        assert_eq!(resolve_image_mime(&payload).as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn falls_back_to_sniffed_type_when_declared_type_is_unusable() {
        let payload = ImagePayload::new(PNG_MAGIC.to_vec(), "application/octet-stream".to_string());
        assert_eq!(resolve_image_mime(&payload).as_deref(), Some("image/png"));
    }

    #[test]
    fn rejects_payloads_with_no_usable_image_type() {
        let payload = ImagePayload::new(b"plain text".to_vec(), "text/plain".to_string());
        assert_eq!(resolve_image_mime(&payload), None);
    }
}
