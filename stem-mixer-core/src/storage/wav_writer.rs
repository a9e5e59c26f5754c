use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::MixerError;
use crate::processing::wav_format::{self, WavSpec};

/// Streaming WAV file writer.
///
/// The header is written with a zero data size on `open` and patched on
/// `close`, once the real length is known.
///
/// ```text
/// [44-byte WAV header]
/// [interleaved little-endian 16-bit PCM...]
/// ```
pub struct WavFileWriter {
    file_path: PathBuf,
    file: Option<File>,
    total_bytes_written: u64,
    is_open: bool,
}

impl WavFileWriter {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            file: None,
            total_bytes_written: 0,
            is_open: false,
        }
    }

    /// Create the file and write the placeholder header.
    pub fn open(&mut self, spec: &WavSpec) -> Result<(), MixerError> {
        if self.is_open {
            return Ok(());
        }

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| MixerError::Storage(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(&self.file_path)
            .map_err(|e| MixerError::Storage(format!("failed to create file: {}", e)))?;
        self.file = Some(file);
        self.total_bytes_written = 0;

        let header = wav_format::encode_header(spec, 0);
        self.write_raw(&header)?;
        self.is_open = true;
        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), MixerError> {
        if !self.is_open {
            return Err(MixerError::Storage("file is not open for writing".into()));
        }
        self.write_raw(data)
    }

    /// Patch the header sizes and return the SHA-256 of the finished file.
    pub fn close(&mut self) -> Result<String, MixerError> {
        if !self.is_open {
            return Err(MixerError::Storage("file is not open".into()));
        }

        let data_size = self.total_bytes_written - wav_format::WAV_HEADER_SIZE as u64;
        if data_size > (u32::MAX - 36) as u64 {
            return Err(MixerError::Storage(format!("data size {} exceeds the WAV limit", data_size)));
        }
        let data_size = data_size as u32;

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| MixerError::Storage("file is not open".into()))?;

        file.seek(SeekFrom::Start(4))
            .map_err(|e| MixerError::Storage(e.to_string()))?;
        file.write_all(&(36 + data_size).to_le_bytes())
            .map_err(|e| MixerError::Storage(e.to_string()))?;

        file.seek(SeekFrom::Start(40))
            .map_err(|e| MixerError::Storage(e.to_string()))?;
        file.write_all(&data_size.to_le_bytes())
            .map_err(|e| MixerError::Storage(e.to_string()))?;

        file.flush().map_err(|e| MixerError::Storage(e.to_string()))?;
        self.file = None;
        self.is_open = false;

        sha256_file(&self.file_path)
    }

    /// Total bytes written so far (including the header).
    pub fn bytes_written(&self) -> u64 {
        self.total_bytes_written
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), MixerError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| MixerError::Storage("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| MixerError::Storage(format!("write failed: {}", e)))?;
        self.total_bytes_written += data.len() as u64;
        Ok(())
    }
}

/// SHA-256 of `data` as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex_encode(&Sha256::digest(data))
}

fn sha256_file(path: &Path) -> Result<String, MixerError> {
    let data = fs::read(path)
        .map_err(|e| MixerError::Storage(format!("failed to read file for checksum: {}", e)))?;
    Ok(sha256_hex(&data))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
