//! File naming helpers
//!
//! Extension inference, base names and the deterministic names used for
//! exported page images and archives.

/// Fallback base name when a file name has nothing left after stripping
pub const DEFAULT_BASE_NAME: &str = "documento";

/// Fallback for sanitized download names
pub const DEFAULT_SANITIZED_NAME: &str = "arquivo";

/// Suffix of the page-image bundle
pub const ARCHIVE_SUFFIX: &str = "-imagens.zip";

/// Normalize a content type: drop parameters, trim and lower-case.
///
/// Returns `None` for an empty value.
pub fn normalize_mime(raw: &str) -> Option<String> {
    let essence = raw.split(';').next().unwrap_or("").trim();
    if essence.is_empty() {
        None
    } else {
        Some(essence.to_ascii_lowercase())
    }
}

/// Append an extension inferred from the content type when the name has none.
///
/// A name that already contains a `.` is returned unchanged.
pub fn ensure_extension(file_name: &str, mime_type: &str) -> String {
    if file_name.contains('.') {
        return file_name.to_string();
    }
    let extension = if mime_type.contains("pdf") {
        "pdf"
    } else if mime_type.contains("png") {
        "png"
    } else if mime_type.contains("jpg") || mime_type.contains("jpeg") {
        "jpg"
    } else {
        "bin"
    };
    format!("{}.{}", file_name, extension)
}

/// Strip the last extension from a file name.
pub fn base_name(file_name: &str) -> &str {
    let stem = match file_name.rfind('.') {
        Some(dot) if dot + 1 < file_name.len() && !file_name[dot + 1..].contains('/') => {
            &file_name[..dot]
        }
        _ => file_name,
    };
    if stem.is_empty() {
        DEFAULT_BASE_NAME
    } else {
        stem
    }
}

/// Archive entry name for a 1-based page number: `<base>-p01.png`
pub fn page_entry_name(base: &str, page_number: usize) -> String {
    format!("{}-p{:02}.png", base, page_number)
}

/// File name of the page-image bundle: `<base>-imagens.zip`
pub fn archive_name(base: &str) -> String {
    format!("{}{}", base, ARCHIVE_SUFFIX)
}

/// ASCII-safe slug of a name, for headers and file systems.
pub fn sanitize_file_name(value: &str, fallback: &str) -> String {
    let slug = slug::slugify(value);
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_extension_infers_from_mime() {
        assert_eq!(ensure_extension("receipt", "application/pdf"), "receipt.pdf");
        assert_eq!(ensure_extension("photo", "image/png"), "photo.png");
        assert_eq!(ensure_extension("photo", "image/jpeg"), "photo.jpg");
        assert_eq!(ensure_extension("data", "text/csv"), "data.bin");
    }

    #[test]
    fn test_ensure_extension_keeps_existing() {
        assert_eq!(ensure_extension("receipt.pdf", "application/pdf"), "receipt.pdf");
        assert_eq!(ensure_extension("report.v2", "application/pdf"), "report.v2");
    }

    #[test]
    fn test_normalize_mime() {
        assert_eq!(
            normalize_mime(" Application/PDF; charset=binary").as_deref(),
            Some("application/pdf")
        );
        assert_eq!(normalize_mime("  "), None);
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("recibo.pdf"), "recibo");
        assert_eq!(base_name("relatorio.final.pdf"), "relatorio.final");
        assert_eq!(base_name("sem-extensao"), "sem-extensao");
        assert_eq!(base_name(".pdf"), DEFAULT_BASE_NAME);
        assert_eq!(base_name("trailing."), "trailing.");
    }

    #[test]
    fn test_page_and_archive_names() {
        assert_eq!(page_entry_name("recibo", 1), "recibo-p01.png");
        assert_eq!(page_entry_name("recibo", 12), "recibo-p12.png");
        assert_eq!(page_entry_name("recibo", 100), "recibo-p100.png");
        assert_eq!(archive_name("recibo"), "recibo-imagens.zip");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(
            sanitize_file_name("Recibo Inscrição João", DEFAULT_SANITIZED_NAME),
            "recibo-inscricao-joao"
        );
        assert_eq!(sanitize_file_name("***", DEFAULT_SANITIZED_NAME), "arquivo");
    }
}
