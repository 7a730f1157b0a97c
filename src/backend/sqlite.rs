//! Reader for the SQLite rpm database, `rpmdb.sqlite`, used by Fedora,
//! recent RHEL/CentOS and CBL-Mariner.
//!
//! The whole schema boils down to one table for our purposes:
//! `Packages(hnum INTEGER, blob BLOB)`.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::errors::*;

#[derive(Debug)]
pub(crate) struct SqlitePackages {
    conn: Connection,
}

impl SqlitePackages {
    pub(crate) fn open(path: &Path) -> Result<Self, Error> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Run the packages query and stage the rows for iteration. Rows
    /// without a blob are dropped here; rpm leaves such tombstones
    /// behind mid-transaction.
    pub(crate) fn blobs(&self) -> Result<SqliteBlobs, Error> {
        let mut statement = self
            .conn
            .prepare("SELECT hnum, blob FROM Packages ORDER BY hnum")?;
        let rows = statement.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<Vec<u8>>>(1)?))
        })?;

        let mut blobs = Vec::new();
        for row in rows {
            let (hnum, blob) = row?;
            if let Some(blob) = blob {
                blobs.push((hnum as u32, blob));
            }
        }
        Ok(SqliteBlobs {
            rows: blobs.into_iter(),
        })
    }
}

pub(crate) struct SqliteBlobs {
    rows: std::vec::IntoIter<(u32, Vec<u8>)>,
}

impl Iterator for SqliteBlobs {
    type Item = Result<(u32, Vec<u8>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().map(Ok)
    }
}
