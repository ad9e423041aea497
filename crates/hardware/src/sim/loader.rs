//! Instruction image loading.
//!
//! This module turns program files into the word sequence copied to the head of the
//! shared buffer. It reads:
//! 1. **Raw binaries:** Little-endian 32-bit words, as produced by `objcopy -O binary`.
//! 2. **Hex word lists:** One or more hex words per line, including C array initializers
//!    such as `uint32_t program[] = { 0x00000013, 0x00000093 };`.
//! 3. **ELF executables:** `PT_LOAD` segments placed at their offsets from the lowest
//!    load address, gaps and `.bss` zero-filled.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use object::{Object, ObjectSegment};
use serde::Serialize;
use tracing::debug;

use crate::common::WORD_BYTES;
use crate::common::constants::MAX_ELF_SPAN_BYTES;
use crate::common::error::ImageError;

/// ELF identification bytes.
const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// On-disk format of an instruction image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    /// Raw little-endian words.
    Binary,
    /// Whitespace or comma separated hex words.
    Hex,
    /// ELF executable.
    Elf,
}

impl ImageFormat {
    /// Guesses the format from file contents, then from the extension.
    ///
    /// ELF files are recognized by their magic; `.hex`, `.txt`, `.mem` and `.h` files are
    /// hex word lists; anything else is a raw binary.
    pub fn detect(path: &Path, bytes: &[u8]) -> Self {
        if bytes.starts_with(ELF_MAGIC) {
            return Self::Elf;
        }
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("hex" | "txt" | "mem" | "h") => Self::Hex,
            _ => Self::Binary,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => write!(f, "binary"),
            Self::Hex => write!(f, "hex"),
            Self::Elf => write!(f, "elf"),
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bin" | "binary" | "raw" => Ok(Self::Binary),
            "hex" | "text" => Ok(Self::Hex),
            "elf" => Ok(Self::Elf),
            other => Err(format!("unknown image format '{other}' (expected binary, hex or elf)")),
        }
    }
}

/// An ordered sequence of 32-bit instruction words.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct InstructionImage {
    words: Vec<u32>,
    /// Link address of the first word (ELF only, zero otherwise).
    origin: u64,
    /// Entry point recorded in the file, if any.
    entry: Option<u64>,
}

impl InstructionImage {
    /// Wraps an in-memory word sequence.
    pub fn from_words(words: impl Into<Vec<u32>>) -> Self {
        Self {
            words: words.into(),
            origin: 0,
            entry: None,
        }
    }

    /// Decodes a raw little-endian byte stream.
    ///
    /// # Errors
    ///
    /// `ImageError::Misaligned` if the length is not a multiple of four.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.len() % WORD_BYTES != 0 {
            return Err(ImageError::Misaligned { len: bytes.len() });
        }
        Ok(Self::from_words(words_from_le(bytes)))
    }

    /// Parses a hex word list.
    ///
    /// Tokens are separated by whitespace, commas, braces or semicolons. A `0x` prefix and
    /// C integer suffixes (`u`, `l`) are accepted. `//` and `#` start a comment, and
    /// anything up to an `=` on the same line is ignored so array declarations parse.
    ///
    /// # Errors
    ///
    /// `ImageError::BadHexWord` naming the 1-based line of the first bad token.
    pub fn from_hex_text(text: &str) -> Result<Self, ImageError> {
        let mut words = Vec::new();
        for (index, raw_line) in text.lines().enumerate() {
            let mut line = raw_line;
            for marker in ["//", "#"] {
                if let Some(at) = line.find(marker) {
                    line = &line[..at];
                }
            }
            if let Some(at) = line.find('=') {
                line = &line[at + 1..];
            }
            let tokens = line
                .split(|c: char| c.is_whitespace() || matches!(c, ',' | '{' | '}' | ';'))
                .filter(|token| !token.is_empty());
            for token in tokens {
                let word = parse_hex_word(token).ok_or_else(|| ImageError::BadHexWord {
                    line: index + 1,
                    token: token.to_string(),
                })?;
                words.push(word);
            }
        }
        Ok(Self::from_words(words))
    }

    /// Extracts the loadable contents of an ELF executable.
    ///
    /// Segments are laid out relative to the lowest `PT_LOAD` address; gaps between
    /// segments and the zero-initialized tail of each segment become zero words.
    ///
    /// # Errors
    ///
    /// `ImageError::Elf` for a malformed or misaligned file, a segment whose file bytes
    /// exceed its memory size, or a loadable span above `MAX_ELF_SPAN_BYTES`.
    /// `ImageError::NoLoadableContent` if no segment has a size.
    pub fn from_elf(bytes: &[u8]) -> Result<Self, ImageError> {
        let file = object::File::parse(bytes)?;
        if file.format() != object::BinaryFormat::Elf {
            return Err(ImageError::Elf(format!("{:?} is not ELF", file.format())));
        }

        let mut segments = Vec::new();
        for segment in file.segments() {
            if segment.size() == 0 {
                continue;
            }
            let data = segment.data()?;
            if data.len() as u64 > segment.size() {
                return Err(ImageError::Elf(format!(
                    "segment at {:#x} has {} file bytes but only {} memory bytes",
                    segment.address(),
                    data.len(),
                    segment.size()
                )));
            }
            segments.push((segment.address(), segment.size(), data));
        }
        segments.sort_by_key(|&(address, _, _)| address);

        let Some(&(origin, _, _)) = segments.first() else {
            return Err(ImageError::NoLoadableContent);
        };
        if origin % WORD_BYTES as u64 != 0 {
            return Err(ImageError::Elf(format!(
                "load address {origin:#x} is not word aligned"
            )));
        }

        let mut end = 0u64;
        for &(address, size, _) in &segments {
            let segment_end = (address - origin).checked_add(size).ok_or_else(|| {
                ImageError::Elf(format!("segment at {address:#x} overflows the address space"))
            })?;
            end = end.max(segment_end);
        }
        if end > MAX_ELF_SPAN_BYTES {
            return Err(ImageError::Elf(format!(
                "loadable span of {end:#x} bytes exceeds the {MAX_ELF_SPAN_BYTES:#x} byte limit"
            )));
        }
        // Bounded by MAX_ELF_SPAN_BYTES.
        let len = end as usize;
        let mut bytes = vec![0u8; len.next_multiple_of(WORD_BYTES)];
        for &(address, _, data) in &segments {
            // Each segment lies within `len`: data.len() <= size and address - origin + size <= end.
            let start = (address - origin) as usize;
            bytes[start..start + data.len()].copy_from_slice(data);
        }

        let words = if file.is_little_endian() {
            words_from_le(&bytes)
        } else {
            bytes
                .chunks_exact(WORD_BYTES)
                .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect()
        };
        debug!(
            segments = segments.len(),
            origin = format_args!("{origin:#x}"),
            words = words.len(),
            "ELF image decoded"
        );
        Ok(Self {
            words,
            origin,
            entry: Some(file.entry()),
        })
    }

    /// Reads an image from disk.
    ///
    /// With `format` unset the format is detected from the contents and extension.
    ///
    /// # Errors
    ///
    /// `ImageError::Io` if the file cannot be read, or the decoding error for its format.
    pub fn from_file(path: impl AsRef<Path>, format: Option<ImageFormat>) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ImageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let format = format.unwrap_or_else(|| ImageFormat::detect(path, &bytes));
        debug!(path = %path.display(), %format, bytes = bytes.len(), "reading image");
        match format {
            ImageFormat::Binary => Self::from_le_bytes(&bytes),
            ImageFormat::Hex => Self::from_hex_text(&String::from_utf8_lossy(&bytes)),
            ImageFormat::Elf => Self::from_elf(&bytes),
        }
    }

    /// Returns the instruction words.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Consumes the image, returning its words.
    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` if the image has no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Link address of the first word.
    pub const fn origin(&self) -> u64 {
        self.origin
    }

    /// Entry point recorded in the file.
    pub const fn entry(&self) -> Option<u64> {
        self.entry
    }
}

fn words_from_le(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(WORD_BYTES)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn parse_hex_word(token: &str) -> Option<u32> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token)
        .trim_end_matches(['u', 'U', 'l', 'L']);
    if digits.is_empty() || digits.len() > 8 {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}
