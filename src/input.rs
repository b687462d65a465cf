//! # Input Module
//!
//! Checks the telemetry path and derives everything located from it: the
//! block identifier, the structure file directory, and the site name.
//!
//! Expected layout:
//!
//! ```text
//! /mnt/data_log/<site>/
//! ├── structure_b302.xml
//! └── 171105/
//!     └── 20171105_b302.csv
//! ```

use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, ScanError};
use crate::structure;

/// A validated telemetry input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub file_name: String,
    pub block: String,
    /// Directory holding `structure_<block>.xml`: one level above the input
    pub structure_dir: PathBuf,
}

impl InputFile {
    /// Validate an input path
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The file does not exist
    /// - It does not have a `.csv` extension
    /// - Its name carries no block identifier
    pub fn resolve<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScanError::InputNotFound(path.to_path_buf()));
        }
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            return Err(ScanError::NotCsv(path.to_path_buf()));
        }

        let path = path.canonicalize()?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ScanError::NotCsv(path.clone()))?
            .to_string();
        let block = structure::block_id(&file_name)?.to_string();

        let log_dir = path.parent().unwrap_or_else(|| Path::new("/"));
        let structure_dir = log_dir.parent().unwrap_or(log_dir).to_path_buf();

        info!("Working on file {} from {}", file_name, log_dir.display());
        info!("Found block {}, all right, continuing", block);

        Ok(Self {
            path,
            file_name,
            block,
            structure_dir,
        })
    }

    /// Full path to the companion structure description
    pub fn structure_path(&self) -> PathBuf {
        self.structure_dir
            .join(structure::structure_file_name(&self.block))
    }

    /// Site name: the directory holding the structure file
    pub fn site(&self) -> String {
        self.structure_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}
