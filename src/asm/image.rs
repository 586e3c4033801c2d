//! Hex ROM image format for 4004 programs.
//!
//! A simple text format:
//! - Bytes written as two hex digits, separated by whitespace
//! - `@ADDR` (hex) sets the load address; later `@` lines may only move forward
//! - Text after `;` is a comment
//! - Blank lines are ignored

use crate::cpu::ADDRESS_SPACE;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

/// Number of bytes per line written by [`save_hex`].
const BYTES_PER_LINE: usize = 16;

/// A contiguous block of program bytes and the address it loads at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RomImage {
    /// Load address of the first byte.
    pub origin: u16,
    /// Program bytes.
    pub bytes: Vec<u8>,
}

impl RomImage {
    pub fn new(origin: u16, bytes: Vec<u8>) -> Self {
        Self { origin, bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Check that the image fits in the 12-bit address space.
    pub fn validate(&self) -> Result<(), ImageError> {
        let end = usize::from(self.origin) + self.bytes.len();
        if end > ADDRESS_SPACE {
            return Err(ImageError::TooLarge { origin: self.origin, size: self.bytes.len() });
        }
        Ok(())
    }
}

/// Parse hex image text.
pub fn parse_hex(text: &str) -> Result<RomImage, ImageError> {
    let mut image = RomImage::default();
    let mut origin_set = false;

    for (line_num, line) in text.lines().enumerate() {
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };

        for token in line.split_whitespace() {
            if let Some(addr) = token.strip_prefix('@') {
                let addr = u16::from_str_radix(addr, 16).map_err(|_| ImageError::ParseError {
                    line: line_num + 1,
                    message: format!("invalid address '{}'", token),
                })?;
                if !origin_set && image.bytes.is_empty() {
                    image.origin = addr;
                    origin_set = true;
                    continue;
                }

                let current = usize::from(image.origin) + image.bytes.len();
                if usize::from(addr) < current {
                    return Err(ImageError::ParseError {
                        line: line_num + 1,
                        message: format!("address 0x{:03X} is behind 0x{:03X}", addr, current),
                    });
                }
                image.bytes.resize(usize::from(addr) - usize::from(image.origin), 0);
                continue;
            }

            if token.len() > 2 {
                return Err(ImageError::ParseError {
                    line: line_num + 1,
                    message: format!("expected a byte, found '{}'", token),
                });
            }
            let byte = u8::from_str_radix(token, 16).map_err(|_| ImageError::ParseError {
                line: line_num + 1,
                message: format!("invalid byte '{}'", token),
            })?;
            image.bytes.push(byte);
        }
    }

    image.validate()?;
    Ok(image)
}

/// Render an image in the hex text format.
pub fn to_hex_string(image: &RomImage) -> String {
    let mut out = String::new();
    out.push_str("; 4004 ROM image\n");
    out.push_str(&format!("; {} bytes\n\n", image.len()));
    out.push_str(&format!("@{:03X}\n", image.origin));

    for chunk in image.bytes.chunks(BYTES_PER_LINE) {
        let line: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }

    out
}

/// Load a hex image from disk.
pub fn load_hex<P: AsRef<Path>>(path: P) -> Result<RomImage, ImageError> {
    let file = std::fs::File::open(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    let reader = BufReader::new(file);

    let mut text = String::new();
    for line in reader.lines() {
        let line = line.map_err(|e| ImageError::IoError(e.to_string()))?;
        text.push_str(&line);
        text.push('\n');
    }

    parse_hex(&text)
}

/// Save an image in the hex text format.
pub fn save_hex<P: AsRef<Path>>(path: P, image: &RomImage) -> Result<(), ImageError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;

    file.write_all(to_hex_string(image).as_bytes())
        .map_err(|e| ImageError::IoError(e.to_string()))
}

/// Load a raw binary ROM dump at `origin`.
pub fn load_binary<P: AsRef<Path>>(path: P, origin: u16) -> Result<RomImage, ImageError> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;

    let image = RomImage::new(origin, bytes);
    image.validate()?;
    Ok(image)
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("image of {size} bytes at 0x{origin:03X} does not fit in 4096 bytes")]
    TooLarge { origin: u16, size: usize },
}
