//! The program loader for the LS-8.
//!
//! Programs are text files holding one byte per line as a binary literal:
//!
//! ```text
//! 10000010 # LDI R0,8
//! 00000000
//! 00001000
//! 01000111 # PRN R0
//! 00000000
//! 00000001 # HLT
//! ```
//!
//! Everything from a `#` to the end of the line is a comment. Blank lines are skipped.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use nom::{
    bytes::complete::{take_till, take_while1},
    combinator::{all_consuming, map_res},
    IResult,
};
use thiserror::Error;

use crate::plat::MEMORY_SIZE;

/// An error for the loader module of the LS-8.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The program file doesn't exist.
    #[error("file not found: {}", .path.display())]
    NotFound { path: PathBuf },
    /// The program file couldn't be read.
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A line isn't a binary literal in `[0, 255]`.
    #[error("invalid binary literal on line {line}: {text:?}")]
    Parse { line: usize, text: String },
    /// The program doesn't fit in memory.
    #[error("program is {len} bytes long (must be <= {})", MEMORY_SIZE)]
    TooLarge { len: usize },
}

/// Splits a line at its comment marker, returning the part before it.
pub fn strip_comment(inp: &str) -> IResult<&str, &str> {
    take_till(|c: char| c == '#')(inp)
}

/// A base-2 literal in `[0, 255]`. Leading zeros are allowed.
pub fn lex_byte(inp: &str) -> IResult<&str, u8> {
    map_res(take_while1(|c: char| c == '0' || c == '1'), |digits: &str| {
        u8::from_str_radix(digits, 2)
    })(inp)
}

/// Parses a single line of a program, yielding `None` for blank and comment-only lines.
pub fn parse_line(line: &str) -> IResult<&str, Option<u8>> {
    let (_, code) = strip_comment(line)?;
    let code = code.trim();
    if code.is_empty() {
        return Ok((code, None));
    }
    let (rest, byte) = all_consuming(lex_byte)(code)?;
    Ok((rest, Some(byte)))
}

/// Parses program text into the bytes to be placed in memory, in order from address 0.
pub fn parse_program(source: &str) -> Result<Vec<u8>, LoadError> {
    let mut bytes = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        match parse_line(line) {
            Ok((_, None)) => {}
            Ok((_, Some(byte))) => bytes.push(byte),
            Err(_) => {
                return Err(LoadError::Parse {
                    line: idx + 1,
                    text: line.trim_end().to_owned(),
                })
            }
        }
    }
    if bytes.len() > MEMORY_SIZE {
        return Err(LoadError::TooLarge { len: bytes.len() });
    }
    Ok(bytes)
}

/// Reads and parses the program at `path`.
pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<u8>, LoadError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound {
            path: path.to_owned(),
        },
        _ => LoadError::Io {
            path: path.to_owned(),
            source: e,
        },
    })?;
    let bytes = parse_program(&source)?;
    log::info!("loaded {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}
