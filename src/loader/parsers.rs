use quick_xml::events::Event;
use std::io::{Cursor, Read, Write};

/// Maximum decompressed bytes read from `word/document.xml` (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

pub(super) fn parse_txt(bytes: &[u8]) -> Result<String, String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|e| format!("text is not valid UTF-8: {}", e))
}

/// pdf-extract reads from a path, so the upload is spooled to a temporary file
/// that is removed when this function returns.
pub(super) fn parse_pdf(bytes: &[u8]) -> Result<String, String> {
    let mut file = tempfile::Builder::new()
        .prefix("freestream-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| format!("could not create temporary file: {}", e))?;
    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|e| format!("could not write temporary file: {}", e))?;

    let path = file.path().to_path_buf();
    // pdf-extract panics on some malformed inputs instead of returning an error.
    let result = std::panic::catch_unwind(move || pdf_extract::extract_text(&path));

    match result {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(format!("PDF extraction failed: {}", e)),
        Err(_) => Err("PDF extraction failed: malformed document".to_string()),
    }
}

pub(super) fn parse_docx(bytes: &[u8]) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| format!("not a Word (OOXML) archive: {}", e))?;

    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| "word/document.xml not found".to_string())?;

    let xml = read_bounded(entry, MAX_XML_ENTRY_BYTES)?;
    extract_wordprocessing_text(&xml)
}

/// Read at most `limit` bytes; one byte more means the entry is too large.
fn read_bounded(reader: impl Read, limit: u64) -> Result<Vec<u8>, String> {
    let mut xml = Vec::new();
    reader
        .take(limit + 1)
        .read_to_end(&mut xml)
        .map_err(|e| format!("could not read word/document.xml: {}", e))?;
    if xml.len() as u64 > limit {
        return Err("word/document.xml exceeds size limit".to_string());
    }
    Ok(xml)
}

/// Collect `w:t` runs; paragraphs and breaks become newlines, tabs stay tabs.
fn extract_wordprocessing_text(xml: &[u8]) -> Result<String, String> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| format!("invalid XML text: {}", e))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("invalid document XML: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim_end().to_string())
}
