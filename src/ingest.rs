//! Request input handling: file kind detection, byte decoding, and the
//! file-versus-text precedence rule.

use tracing::{debug, warn};

use crate::error::InputError;

/// Filename used when an upload arrives without one.
pub const DEFAULT_UPLOAD_NAME: &str = "upload";

/// Supported upload kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Pdf,
}

impl FileKind {
    /// Resolve the kind from a filename's extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self, InputError> {
        let ext = file_extension(filename);
        match ext.as_str() {
            ".txt" => Ok(Self::Text),
            ".pdf" => Ok(Self::Pdf),
            _ => Err(InputError::UnsupportedExtension(ext)),
        }
    }
}

/// Lowercase extension including the dot, or an empty string when the name
/// has no dot.
pub fn file_extension(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) => format!(".{}", ext.to_lowercase()),
        None => String::new(),
    }
}

/// A file part from the request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: Option<String>, bytes: Vec<u8>) -> Self {
        let filename = filename
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
        Self { filename, bytes }
    }
}

/// One source of email content.
#[derive(Debug, Clone)]
pub enum RawInput {
    File(UploadedFile),
    Text(String),
}

impl RawInput {
    /// Decode this input to text. Files with a disallowed extension are
    /// rejected; decoding itself never fails.
    pub fn into_text(self) -> Result<String, InputError> {
        match self {
            Self::File(file) => {
                let kind = FileKind::from_filename(&file.filename)?;
                Ok(bytes_to_text(&file.bytes, kind))
            }
            Self::Text(text) => Ok(text),
        }
    }
}

/// Convert uploaded bytes into text.
///
/// Plain text is decoded as UTF-8, falling back to Windows-1252 when the
/// bytes are not valid UTF-8. PDF extraction failures produce an empty string.
pub fn bytes_to_text(bytes: &[u8], kind: FileKind) -> String {
    match kind {
        FileKind::Text => decode_text(bytes),
        FileKind::Pdf => extract_pdf_text(bytes),
    }
}

fn decode_text(bytes: &[u8]) -> String {
    let (content, _, had_errors) = encoding_rs::UTF_8.decode(bytes);
    if !had_errors {
        return content.into_owned();
    }
    debug!("Upload is not valid UTF-8, decoding as Windows-1252");
    let (content, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    content.into_owned()
}

fn extract_pdf_text(bytes: &[u8]) -> String {
    // pdf-extract panics on some malformed documents.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(error = %e, "PDF text extraction failed");
            String::new()
        }
        Err(_) => {
            warn!("PDF text extraction panicked");
            String::new()
        }
    }
}

/// Content chosen for classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub text: String,
    /// Set whenever a file part was uploaded, even if its text was not used.
    pub filename: Option<String>,
}

/// Pick the content to classify from an optional file and optional text.
///
/// File text wins when it is non-blank; otherwise the text field is used.
/// An empty text field counts as absent.
pub fn resolve_content(
    file: Option<UploadedFile>,
    text: Option<String>,
) -> Result<ResolvedContent, InputError> {
    let text = text.filter(|t| !t.is_empty());
    if file.is_none() && text.is_none() {
        return Err(InputError::MissingInput);
    }

    let mut filename = None;
    let mut content = String::new();

    if let Some(file) = file {
        filename = Some(file.filename.clone());
        content = RawInput::File(file).into_text()?;
    }

    if content.trim().is_empty()
        && let Some(text) = text
    {
        content = RawInput::Text(text).into_text()?;
    }

    if content.trim().is_empty() {
        return Err(InputError::EmptyContent);
    }

    Ok(ResolvedContent {
        text: content,
        filename,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, bytes: &[u8]) -> Option<UploadedFile> {
        Some(UploadedFile::new(Some(name.to_string()), bytes.to_vec()))
    }

    /// Single-page PDF drawing `text` in Helvetica, with a valid xref table.
    fn one_page_pdf(text: &str) -> Vec<u8> {
        let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
                .to_string(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
            format!("<< /Length {} >>\nstream\n{content}\nendstream", content.len()),
        ];

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
        }

        let xref_at = pdf.len();
        let size = objects.len() + 1;
        pdf.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
        for offset in offsets {
            pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        pdf.extend_from_slice(
            format!("trailer\n<< /Size {size} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n")
                .as_bytes(),
        );
        pdf
    }

    #[test]
    fn extension_lowercased_with_dot() {
        assert_eq!(file_extension("Report.DOCX"), ".docx");
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert_eq!(file_extension("README"), "");
    }

    #[test]
    fn kind_from_filename() {
        assert_eq!(FileKind::from_filename("a.txt"), Ok(FileKind::Text));
        assert_eq!(FileKind::from_filename("B.PDF"), Ok(FileKind::Pdf));
        assert_eq!(
            FileKind::from_filename("report.docx"),
            Err(InputError::UnsupportedExtension(".docx".into()))
        );
        assert_eq!(
            FileKind::from_filename("noext"),
            Err(InputError::UnsupportedExtension(String::new()))
        );
    }

    #[test]
    fn upload_without_name_defaults() {
        let upload = UploadedFile::new(None, vec![]);
        assert_eq!(upload.filename, "upload");
        let upload = UploadedFile::new(Some(String::new()), vec![]);
        assert_eq!(upload.filename, "upload");
    }

    #[test]
    fn decodes_utf8() {
        let text = bytes_to_text("Olá, tudo bem?".as_bytes(), FileKind::Text);
        assert_eq!(text, "Olá, tudo bem?");
    }

    #[test]
    fn falls_back_to_windows_1252() {
        // "Olá" in Latin-1 / Windows-1252
        let text = bytes_to_text(&[0x4f, 0x6c, 0xe1], FileKind::Text);
        assert_eq!(text, "Olá");
    }

    #[test]
    fn pdf_text_is_extracted() {
        let text = bytes_to_text(&one_page_pdf("Status do chamado 123"), FileKind::Pdf);
        assert!(text.contains("chamado"), "extracted: {text:?}");
        assert!(text.contains("123"), "extracted: {text:?}");
    }

    #[test]
    fn pdf_text_takes_precedence_over_text_field() {
        let resolved = resolve_content(
            file("chamado.PDF", &one_page_pdf("Prazo do contrato")),
            Some("typed".into()),
        )
        .unwrap();
        assert!(resolved.text.contains("contrato"));
        assert!(!resolved.text.contains("typed"));
        assert_eq!(resolved.filename.as_deref(), Some("chamado.PDF"));
    }

    #[test]
    fn garbage_pdf_yields_empty_string() {
        assert_eq!(bytes_to_text(b"definitely not a pdf", FileKind::Pdf), "");
        assert_eq!(bytes_to_text(b"", FileKind::Pdf), "");
    }

    #[test]
    fn missing_both_inputs() {
        assert_eq!(resolve_content(None, None), Err(InputError::MissingInput));
        assert_eq!(
            resolve_content(None, Some(String::new())),
            Err(InputError::MissingInput)
        );
    }

    #[test]
    fn text_only() {
        let resolved = resolve_content(None, Some("hello".into())).unwrap();
        assert_eq!(resolved.text, "hello");
        assert_eq!(resolved.filename, None);
    }

    #[test]
    fn file_takes_precedence_over_text() {
        let resolved =
            resolve_content(file("mail.txt", b"from file"), Some("from field".into())).unwrap();
        assert_eq!(resolved.text, "from file");
        assert_eq!(resolved.filename.as_deref(), Some("mail.txt"));
    }

    #[test]
    fn empty_file_falls_back_to_text_and_keeps_filename() {
        let resolved = resolve_content(file("scan.pdf", b"not a pdf"), Some("typed".into())).unwrap();
        assert_eq!(resolved.text, "typed");
        assert_eq!(resolved.filename.as_deref(), Some("scan.pdf"));
    }

    #[test]
    fn unsupported_extension_rejected_even_with_text() {
        assert_eq!(
            resolve_content(file("report.docx", b"x"), Some("text".into())),
            Err(InputError::UnsupportedExtension(".docx".into()))
        );
    }

    #[test]
    fn blank_content_is_empty_error() {
        assert_eq!(
            resolve_content(file("blank.txt", b"  \n "), None),
            Err(InputError::EmptyContent)
        );
        assert_eq!(
            resolve_content(None, Some("   ".into())),
            Err(InputError::EmptyContent)
        );
    }
}
