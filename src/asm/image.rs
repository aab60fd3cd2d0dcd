//! Program image files.
//!
//! Two formats are understood, chosen by file extension:
//! - `.json`: `{ "words": [ ... ] }`, optionally with a `"source"` listing
//! - anything else: plain text, one word per line in decimal or `0x` hex;
//!   `;` starts a comment and blank lines are ignored

use serde::{Serialize, Deserialize};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// A program ready to be loaded into memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    /// Memory contents starting at address 0.
    pub words: Vec<i32>,
    /// Disassembly or source lines (for display only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<String>,
}

impl ProgramImage {
    pub fn new(words: Vec<i32>) -> Self {
        Self {
            words,
            source: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Parse the plain-text format.
    pub fn parse_text(text: &str) -> Result<Self, ImageError> {
        let mut image = Self::default();

        for (line_num, line) in text.lines().enumerate() {
            let content = match line.find(';') {
                Some(idx) => &line[..idx],
                None => line,
            }
            .trim();

            if content.is_empty() {
                continue;
            }

            let word = parse_word(content).ok_or_else(|| ImageError::ParseError {
                line: line_num + 1,
                message: format!("invalid word '{}'", content),
            })?;
            image.words.push(word);
            image.source.push(line.trim().to_string());
        }

        Ok(image)
    }

    /// Render the plain-text format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("; Program image\n");
        out.push_str(&format!("; {} words\n\n", self.words.len()));
        for (i, word) in self.words.iter().enumerate() {
            let listing = super::disasm::disassemble_word(*word);
            out.push_str(&format!("0x{:08X} ; {:04} {}\n", *word as u32, i, listing));
        }
        out
    }
}

fn parse_word(text: &str) -> Option<i32> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok().map(|u| u as i32);
    }
    text.parse::<i32>().ok()
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Load an image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ImageError::IoError(e.to_string()))?;

    if is_json(path) {
        Ok(serde_json::from_str(&text)?)
    } else {
        ProgramImage::parse_text(&text)
    }
}

/// Save an image to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &ProgramImage) -> Result<(), ImageError> {
    let path = path.as_ref();
    let contents = if is_json(path) {
        serde_json::to_string_pretty(image)?
    } else {
        image.to_text()
    };

    let mut file = std::fs::File::create(path).map_err(|e| ImageError::IoError(e.to_string()))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    Ok(())
}

/// Errors that can occur reading or writing images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
