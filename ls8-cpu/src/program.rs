use crate::{Cpu, RAM_SIZE};
use core::fmt;

/// Failure to load a program image into memory
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoadError {
    /// A line starting with `0` or `1` is not a binary literal
    InvalidLiteral {
        /// Line number, counting from 1
        line: usize,
    },
    /// The image does not fit in memory
    TooLarge,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::InvalidLiteral { line } => {
                write!(f, "invalid binary literal on line {line}")
            }
            LoadError::TooLarge => {
                write!(f, "program does not fit in {RAM_SIZE} bytes")
            }
        }
    }
}

impl core::error::Error for LoadError {}

/// Decodes a single line of a program image
///
/// Everything after the first `#` is a comment.  A line holds an instruction
/// byte if it begins with `0` or `1`, in which case its first eight
/// characters are parsed as a base-2 literal.  Other lines return `Ok(None)`.
fn decode_line(line: &str) -> Result<Option<u8>, core::num::ParseIntError> {
    let code = line.split_once('#').map_or(line, |(code, _)| code).trim();
    if !code.starts_with(['0', '1']) {
        return Ok(None);
    }
    let end = code.char_indices().nth(8).map_or(code.len(), |(i, _)| i);
    u8::from_str_radix(&code[..end], 2).map(Some)
}

impl Cpu {
    /// Loads a textual program image, starting at address 0
    ///
    /// Returns the number of bytes written.  Memory past the end of the
    /// program is left as-is; on error, bytes decoded before the failing line
    /// have already been written.
    pub fn load(&mut self, text: &str) -> Result<usize, LoadError> {
        let mut addr = 0;
        for (i, line) in text.lines().enumerate() {
            let v = decode_line(line)
                .map_err(|_| LoadError::InvalidLiteral { line: i + 1 })?;
            let Some(v) = v else {
                continue;
            };
            let Some(cell) = self.ram.get_mut(addr) else {
                return Err(LoadError::TooLarge);
            };
            *cell = v;
            addr += 1;
        }
        Ok(addr)
    }

    /// Copies raw bytes into memory, starting at address 0
    pub fn load_bytes(&mut self, rom: &[u8]) -> Result<usize, LoadError> {
        let dst = self.ram.get_mut(..rom.len()).ok_or(LoadError::TooLarge)?;
        dst.copy_from_slice(rom);
        Ok(rom.len())
    }
}
