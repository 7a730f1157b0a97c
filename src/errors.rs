use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("unrecognized database format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to parse {section} at offset {offset}: {reason}")]
    CorruptDb {
        section: &'static str,
        offset: u64,
        reason: String,
    },

    #[error("failed to parse header: {0}")]
    MalformedHeader(String),

    #[error("tag {tag} has data type {actual}, not {expected}")]
    UnexpectedTagDataType {
        expected: &'static str,
        actual: &'static str,
        tag: String,
    },

    #[error("file arrays are inconsistent: {0}")]
    MalformedFiles(String),

    #[error("package {0} not found")]
    NotFound(String),

    #[error("timeout for parse page")]
    Cancelled,
}

impl Error {
    pub(crate) fn corrupt(section: &'static str, offset: u64, reason: impl Into<String>) -> Self {
        Error::CorruptDb {
            section,
            offset,
            reason: reason.into(),
        }
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(error: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match error {
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                Error::MalformedHeader(e.code.description().to_string())
            }
            nom::Err::Incomplete(_) => Error::MalformedHeader("unexpected end of input".to_string()),
        }
    }
}
