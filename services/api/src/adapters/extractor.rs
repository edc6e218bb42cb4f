//! services/api/src/adapters/extractor.rs
//!
//! This module contains the text extractor used by the ingestion pipeline.
//! It implements the `TextExtractionService` port from the `core` crate.
//!
//! - Plain text is read verbatim.
//! - PDF goes through the external `pdftotext` utility (poppler-utils).
//! - DOCX is unpacked in-process and its `word/document.xml` runs are collected.

use async_trait::async_trait;
use insight_core::domain::DocumentFormat;
use insight_core::ports::{PortError, PortResult, TextExtractionService};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Extracts text from files already written to local storage.
#[derive(Clone, Debug)]
pub struct LocalTextExtractor {
    pdftotext_path: PathBuf,
    timeout: Duration,
}

impl LocalTextExtractor {
    /// Creates a new `LocalTextExtractor`.
    pub fn new(pdftotext_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            pdftotext_path: pdftotext_path.into(),
            timeout,
        }
    }

    async fn extract_plain_text(path: &Path) -> PortResult<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to read {}: {}", path.display(), e)))?;
        String::from_utf8(bytes)
            .map_err(|e| PortError::Unexpected(format!("Text file is not valid UTF-8: {}", e)))
    }

    async fn extract_pdf(&self, path: &Path) -> PortResult<String> {
        let run = Command::new(&self.pdftotext_path)
            .arg(path)
            .arg("-")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                PortError::Unexpected(format!(
                    "pdftotext timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
            .map_err(|e| {
                PortError::Unexpected(format!(
                    "Failed to run {}: {}",
                    self.pdftotext_path.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PortError::Unexpected(format!(
                "pdftotext exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn extract_docx(path: &Path) -> PortResult<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to read {}: {}", path.display(), e)))?;

        tokio::task::spawn_blocking(move || docx_to_text(&bytes))
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
    }
}

//=========================================================================================
// `TextExtractionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextExtractionService for LocalTextExtractor {
    async fn extract(&self, path: &Path, format: DocumentFormat) -> PortResult<String> {
        info!("Extracting {:?} text from {}", format, path.display());
        let text = match format {
            DocumentFormat::PlainText => Self::extract_plain_text(path).await?,
            DocumentFormat::Pdf => self.extract_pdf(path).await?,
            DocumentFormat::Docx => Self::extract_docx(path).await?,
        };
        reject_nul(text)
    }
}

/// Postgres `TEXT` cannot store U+0000.
fn reject_nul(text: String) -> PortResult<String> {
    match text.find('\0') {
        Some(offset) => Err(PortError::Unexpected(format!(
            "Extracted text contains a NUL character at byte {}",
            offset
        ))),
        None => Ok(text),
    }
}

//=========================================================================================
// DOCX Helpers
//=========================================================================================

/// Reads the main document part of an OOXML package and flattens it to text.
fn docx_to_text(data: &[u8]) -> PortResult<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data))
        .map_err(|e| PortError::Unexpected(format!("Not a valid DOCX archive: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| PortError::Unexpected(format!("DOCX is missing word/document.xml: {}", e)))?
        .read_to_string(&mut xml)
        .map_err(|e| PortError::Unexpected(format!("Failed to read word/document.xml: {}", e)))?;

    document_xml_to_text(&xml)
}

/// One line per `w:p`; `w:tab` and `w:br` become tab and newline.
fn document_xml_to_text(xml: &str) -> PortResult<String> {
    let mut reader = Reader::from_str(xml);

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"t" => in_text = true,
                b"tab" => current.push('\t'),
                b"br" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"p" => paragraphs.push(String::new()),
                b"tab" => current.push('\t'),
                b"br" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|e| PortError::Unexpected(format!("Malformed DOCX text: {}", e)))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" if in_paragraph => {
                    in_paragraph = false;
                    paragraphs.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PortError::Unexpected(format!(
                    "Malformed word/document.xml at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}
