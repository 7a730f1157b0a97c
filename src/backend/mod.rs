//! Storage backends for the three on-disk rpm database formats.
//!
//! Every backend reduces its format to the same shape: an iterator
//! over `(blob_id, header_blob)` pairs. What a blob id means differs
//! per format (BDB hash page number, NDB package index, SQLite `hnum`)
//! but ids are stable for a given file.

pub(crate) mod bdb;
pub(crate) mod ndb;
pub(crate) mod sqlite;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::errors::*;

const SQLITE_MAGIC: [u8; 16] = *b"SQLite format 3\0";
const NDB_MAGIC: [u8; 4] = *b"RpmP";

/// How many bytes the probe looks at. Enough for the SQLite and NDB
/// magics and the fields of a BDB metadata page.
const PROBE_LEN: usize = 512;

/// On-disk format of an rpm database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbFormat {
    /// Berkeley DB hash database, the classic `Packages` file.
    BerkeleyDb,
    /// SUSE's slot-and-block `Packages.db` file.
    Ndb,
    /// The modern `rpmdb.sqlite` database.
    Sqlite,
}

#[derive(Debug)]
pub(crate) enum Backend {
    Bdb(bdb::BerkeleyHashDb<File>),
    Ndb(ndb::NdbFile<File>),
    Sqlite(sqlite::SqlitePackages),
}

impl Backend {
    /// Sniff the format of the file at `path` and construct the
    /// matching backend.
    pub(crate) fn open(path: &Path) -> Result<Backend, Error> {
        let mut file = File::open(path)?;
        let prefix = read_prefix(&mut file)?;

        if prefix.len() >= SQLITE_MAGIC.len() && prefix[..SQLITE_MAGIC.len()] == SQLITE_MAGIC {
            // rusqlite opens by path, the probe handle is dropped
            return Ok(Backend::Sqlite(sqlite::SqlitePackages::open(path)?));
        }
        if prefix.len() >= NDB_MAGIC.len() && prefix[..NDB_MAGIC.len()] == NDB_MAGIC {
            return Ok(Backend::Ndb(ndb::NdbFile::open(file)?));
        }
        if let Some(endian) = bdb::sniff_hash_metadata(&prefix) {
            return Ok(Backend::Bdb(bdb::BerkeleyHashDb::open(file, endian)?));
        }

        Err(Error::UnsupportedFormat(path.display().to_string()))
    }

    pub(crate) fn format(&self) -> DbFormat {
        match self {
            Backend::Bdb(_) => DbFormat::BerkeleyDb,
            Backend::Ndb(_) => DbFormat::Ndb,
            Backend::Sqlite(_) => DbFormat::Sqlite,
        }
    }

    /// Start a fresh traversal. Traversal order is fixed per format,
    /// so repeated calls yield identical sequences.
    pub(crate) fn blobs(&mut self) -> Result<Blobs<'_>, Error> {
        Ok(match self {
            Backend::Bdb(db) => Blobs::Bdb(db.blobs()),
            Backend::Ndb(db) => Blobs::Ndb(db.blobs()),
            Backend::Sqlite(db) => Blobs::Sqlite(db.blobs()?),
        })
    }
}

/// Fused blob iterator over whichever backend is underneath: after the
/// first `None` or `Err` nothing further is yielded.
pub(crate) enum Blobs<'a> {
    Bdb(bdb::BdbBlobs<'a, File>),
    Ndb(ndb::NdbBlobs<'a, File>),
    Sqlite(sqlite::SqliteBlobs),
}

impl Iterator for Blobs<'_> {
    type Item = Result<(u32, Vec<u8>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Blobs::Bdb(blobs) => blobs.next(),
            Blobs::Ndb(blobs) => blobs.next(),
            Blobs::Sqlite(blobs) => blobs.next(),
        }
    }
}

/// Read up to [`PROBE_LEN`] bytes; a file shorter than any metadata
/// page can still be classified (as unsupported).
fn read_prefix(file: &mut File) -> Result<Vec<u8>, Error> {
    let mut prefix = vec![0u8; PROBE_LEN];
    let mut filled = 0;
    loop {
        match file.read(&mut prefix[filled..])? {
            0 => break,
            n => filled += n,
        }
        if filled == prefix.len() {
            break;
        }
    }
    prefix.truncate(filled);
    Ok(prefix)
}
