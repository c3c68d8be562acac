//! On-disk format of the icon index log.
//!
//! The log starts with a single [FORMAT_VERSION] byte, followed by any number of records.
//! A record is two strings, the alias and then the file path, each stored as a big-endian
//! `u32` byte length followed by that many bytes of UTF-8.

use std::path::PathBuf;

pub const FORMAT_VERSION: u8 = 1;

/// A resolved icon, as remembered across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconRecord {
    pub alias: String,
    pub file_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("record is cut short")]
    Truncated,
    #[error("record string is not utf-8")]
    NotUtf8(#[from] std::string::FromUtf8Error),
    #[error("file path is not utf-8")]
    PathNotUtf8,
}

impl IconRecord {
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), RecordError> {
        let file_path = self.file_path.to_str().ok_or(RecordError::PathNotUtf8)?;

        put_str(out, &self.alias);
        put_str(out, file_path);

        Ok(())
    }

    /// Decodes the record at the front of `input` and advances past it.
    ///
    /// Returns `Ok(None)` once `input` is exhausted.
    pub fn decode(input: &mut &[u8]) -> Result<Option<Self>, RecordError> {
        if input.is_empty() {
            return Ok(None);
        }

        let alias = take_str(input)?;
        let file_path = take_str(input)?;

        Ok(Some(IconRecord {
            alias,
            file_path: file_path.into(),
        }))
    }
}

fn put_str(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(value.as_bytes());
}

fn take_str(input: &mut &[u8]) -> Result<String, RecordError> {
    let (len, rest) = input.split_first_chunk::<4>().ok_or(RecordError::Truncated)?;
    let len = u32::from_be_bytes(*len) as usize;

    if rest.len() < len {
        return Err(RecordError::Truncated);
    }
    let (value, rest) = rest.split_at(len);
    *input = rest;

    Ok(String::from_utf8(value.to_vec())?)
}
