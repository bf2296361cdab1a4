// ==============================================================================
// validator.rs - Input File Validation
// ==============================================================================
// Description: Pre-ingestion checks for genome and corpus files (size,
//              extension allowlist, gzip magic number, content digest)
// Author: Matt Barham
// Created: 2026-10-17
// Modified: 2026-10-17
// Version: 1.0.0
// Security: Allowlist-only file types, magic number verification
// ==============================================================================

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::MAX_FILE_SIZE;
use crate::error::{GenomeError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Accepted extensions; compound forms listed before their suffixes
const ALLOWED_EXTENSIONS: &[&str] = &["txt.gz", "tsv.gz", "csv.gz", "txt", "tsv", "csv"];

/// Facts about a file that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedFile {
    /// Matched allowlist entry (e.g., "txt", "txt.gz")
    pub extension: String,
    pub size: u64,
    pub hash_sha256: String,
}

pub struct FileValidator {
    max_file_size: u64,
}

impl FileValidator {
    pub fn new() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
        }
    }

    pub fn with_max_size(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn validate(&self, file_path: &Path) -> Result<ValidatedFile> {
        let label = file_path.display().to_string();
        let file_name = file_path
            .file_name()
            .ok_or_else(|| GenomeError::malformed(label.clone(), "path has no file name"))?
            .to_string_lossy()
            .to_string();

        info!("Validating file: {}", file_name);

        // 1. Size check
        let metadata = std::fs::metadata(file_path)
            .map_err(|e| GenomeError::malformed(label.clone(), e))?;
        if !metadata.is_file() {
            return Err(GenomeError::malformed(label, "not a regular file"));
        }
        if metadata.len() > self.max_file_size {
            return Err(GenomeError::malformed(
                label,
                format!(
                    "file too large: {} bytes (max: {} bytes)",
                    metadata.len(),
                    self.max_file_size
                ),
            ));
        }
        debug!("Size check passed: {} bytes", metadata.len());

        // 2. Filename sanitization
        let safe_name = sanitize_filename(&file_name)
            .ok_or_else(|| GenomeError::malformed(label.clone(), "invalid file name"))?;
        debug!("Sanitized filename: {}", safe_name);

        // 3. Extension check (allowlist)
        let extension = extension_of(&safe_name).ok_or_else(|| {
            GenomeError::malformed(
                label.clone(),
                format!("unsupported file type (allowed: {})", ALLOWED_EXTENSIONS.join(", ")),
            )
        })?;
        debug!("Extension check passed: {}", extension);

        // 4. Magic number verification
        if extension.ends_with(".gz") {
            let magic = read_magic_number(file_path).map_err(|e| GenomeError::malformed(label.clone(), e))?;
            if magic != GZIP_MAGIC {
                return Err(GenomeError::malformed(
                    label,
                    format!("magic number mismatch for .{} file", extension),
                ));
            }
            debug!("Magic number check passed");
        }

        // 5. Content digest
        let hash_sha256 = compute_sha256(file_path).map_err(|e| GenomeError::malformed(label, e))?;
        debug!("SHA-256: {}", hash_sha256);

        Ok(ValidatedFile {
            extension,
            size: metadata.len(),
            hash_sha256,
        })
    }
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn sanitize_filename(name: &str) -> Option<String> {
    let safe: String = name
        .replace(['/', '\\', '\0'], "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .take(255)
        .collect();

    (!safe.is_empty()).then_some(safe)
}

fn extension_of(filename: &str) -> Option<String> {
    let lower = filename.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .iter()
        .find(|ext| {
            lower
                .strip_suffix(*ext)
                .is_some_and(|stem| stem.len() > 1 && stem.ends_with('.'))
        })
        .map(|ext| ext.to_string())
}

fn read_magic_number(path: &Path) -> std::io::Result<[u8; 2]> {
    let mut buffer = [0u8; 2];
    File::open(path)?.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Hex SHA-256 of a file's bytes
pub fn compute_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
