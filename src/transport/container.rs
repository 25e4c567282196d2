//! ZIP containers for submissions and receipts.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::CpeError;

fn zip_err(e: zip::result::ZipError) -> CpeError {
    CpeError::Artifact(format!("ZIP error: {e}"))
}

/// Deflate-pack a single XML file into an in-memory ZIP, the shape the
/// `sendBill` operation expects.
pub fn pack_xml(file_name: &str, xml: &[u8]) -> Result<Vec<u8>, CpeError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(file_name, options).map_err(zip_err)?;
    writer.write_all(xml)?;
    let cursor = writer.finish().map_err(zip_err)?;
    Ok(cursor.into_inner())
}

/// Extract the receipt XML from an authority response.
///
/// Accepts either a ZIP container (the first `.xml` entry wins) or a bare
/// XML document; relay responses deliver the receipt both ways.
pub fn unpack_receipt(bytes: &[u8]) -> Result<Vec<u8>, CpeError> {
    if !bytes.starts_with(b"PK") {
        return Ok(bytes.to_vec());
    }
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_err)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(zip_err)?;
        if entry.name().to_ascii_lowercase().ends_with(".xml") {
            let mut out = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut out)?;
            return Ok(out);
        }
    }
    Err(CpeError::Artifact(
        "receipt container holds no XML entry".into(),
    ))
}
