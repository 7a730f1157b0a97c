use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backend::{Backend, DbFormat};
use crate::errors::*;
use crate::PackageInfo;

/// An opened rpm package database.
///
/// The handle owns a file descriptor or SQLite connection for the
/// lifetime of the value; both are released on drop or an explicit
/// [`close`](Self::close).
#[derive(Debug)]
pub struct RpmDb {
    backend: Backend,
}

impl RpmDb {
    /// Open the database file at `path`, sniffing which of the three
    /// on-disk formats it uses.
    pub fn open(path: impl AsRef<Path>) -> Result<RpmDb, Error> {
        let path = path.as_ref();
        let backend = Backend::open(path)?;
        log::debug!("opened {} as {:?}", path.display(), backend.format());
        Ok(RpmDb { backend })
    }

    /// Which backend format the probe selected.
    pub fn format(&self) -> DbFormat {
        self.backend.format()
    }

    /// Decode every installed package, in backend-traversal order.
    ///
    /// The order is deterministic for a given file but otherwise
    /// unspecified. The first undecodable blob aborts the listing.
    pub fn list_packages(&mut self) -> Result<Vec<PackageInfo>, Error> {
        self.list_packages_with_token(&CancelToken::never())
    }

    /// [`list_packages`](Self::list_packages) with cooperative
    /// cancellation, checked between blobs. An in-flight blob parse is
    /// never interrupted.
    pub fn list_packages_with_token(
        &mut self,
        token: &CancelToken,
    ) -> Result<Vec<PackageInfo>, Error> {
        let mut packages = Vec::new();
        let mut blobs = self.backend.blobs()?;
        loop {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match blobs.next() {
                Some(result) => {
                    let (_, blob) = result?;
                    packages.push(PackageInfo::from_blob(&blob)?);
                }
                None => break,
            }
        }
        Ok(packages)
    }

    /// Find a package by exact name.
    ///
    /// When several installed packages share a name (kernels, multilib)
    /// the first one in traversal order wins.
    pub fn package(&mut self, name: &str) -> Result<PackageInfo, Error> {
        for result in self.backend.blobs()? {
            let (_, blob) = result?;
            let package = PackageInfo::from_blob(&blob)?;
            if package.name == name {
                return Ok(package);
            }
        }
        Err(Error::NotFound(name.to_string()))
    }

    /// Release the underlying file handle or connection.
    pub fn close(self) {}
}

/// Cooperative cancellation for long listings.
///
/// A token trips either when its deadline passes or when any clone of
/// it is [`cancel`](Self::cancel)led. The checks sit between blobs, so
/// cancellation latency is one blob parse at worst.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that never cancels; what [`RpmDb::list_packages`] uses.
    pub fn never() -> CancelToken {
        CancelToken::default()
    }

    pub fn with_deadline(deadline: Instant) -> CancelToken {
        CancelToken {
            deadline: Some(deadline),
            cancelled: Arc::default(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> CancelToken {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Trip the token; every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}
