//! Durable storage for signed documents and receipts.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{CpeError, DocumentName};
use crate::transport::unpack_receipt;

/// Filesystem layout for transmission artifacts.
///
/// Signed documents land at `{dir}/{name}.xml` and receipts at
/// `{dir}/R-{name}.xml`. Every path is derived from the document name
/// alone, so recovery can reconstruct it without a lookup table.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    xml_dir: PathBuf,
    receipt_dir: PathBuf,
}

impl ArtifactStore {
    /// Store keeping both kinds of artifact under one directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            xml_dir: root.clone(),
            receipt_dir: root,
        }
    }

    /// Store with signed documents and receipts in separate directories.
    pub fn with_dirs(xml_dir: impl Into<PathBuf>, receipt_dir: impl Into<PathBuf>) -> Self {
        Self {
            xml_dir: xml_dir.into(),
            receipt_dir: receipt_dir.into(),
        }
    }

    pub fn xml_path(&self, name: &DocumentName) -> PathBuf {
        self.xml_dir.join(name.xml_name())
    }

    pub fn receipt_path(&self, name: &DocumentName) -> PathBuf {
        self.receipt_dir.join(name.receipt_name())
    }

    /// Persist the signed document.
    pub fn store_signed(&self, name: &DocumentName, xml: &[u8]) -> Result<PathBuf, CpeError> {
        let path = self.xml_path(name);
        write_file(&path, xml)?;
        Ok(path)
    }

    /// Persist a receipt. Receipts arrive either as bare XML or zipped
    /// (the direct service answers with a zip); both end up stored as XML
    /// so readers never deal with two formats.
    pub fn store_receipt(&self, name: &DocumentName, receipt: &[u8]) -> Result<PathBuf, CpeError> {
        let xml = unpack_receipt(receipt)?;
        let path = self.receipt_path(name);
        write_file(&path, &xml)?;
        Ok(path)
    }

    pub fn load_signed(&self, name: &DocumentName) -> Result<Vec<u8>, CpeError> {
        read_file(&self.xml_path(name))
    }

    pub fn load_receipt(&self, name: &DocumentName) -> Result<Vec<u8>, CpeError> {
        read_file(&self.receipt_path(name))
    }

    pub fn has_signed(&self, name: &DocumentName) -> bool {
        self.xml_path(name).is_file()
    }

    pub fn has_receipt(&self, name: &DocumentName) -> bool {
        self.receipt_path(name).is_file()
    }

    /// Whether both artifacts are on disk.
    pub fn is_complete(&self, name: &DocumentName) -> bool {
        self.has_signed(name) && self.has_receipt(name)
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CpeError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>, CpeError> {
    fs::read(path).map_err(|e| CpeError::Artifact(format!("{}: {e}", path.display())))
}
