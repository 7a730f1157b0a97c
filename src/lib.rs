//! # rpmdb
//!
//! A library for reading installed RPM package databases without the
//! native `rpm` binary or librpm. All three on-disk generations are
//! supported: the Berkeley DB hash `Packages` file, SUSE's NDB
//! `Packages.db` and the SQLite `rpmdb.sqlite`.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), rpmdb::Error> {
//! let mut db = rpmdb::RpmDb::open("/var/lib/rpm/rpmdb.sqlite")?;
//!
//! for pkg in db.list_packages()? {
//!     println!("{}-{}-{}.{}", pkg.name, pkg.version, pkg.release, pkg.arch);
//! }
//!
//! let openssl = db.package("openssl")?;
//! for file in openssl.installed_files()? {
//!     println!("  {} {:o}", file.path, file.mode);
//! }
//! # Ok(())
//! # }
//! ```

mod errors;
pub use crate::errors::Error;

pub(crate) mod constants;
pub use crate::constants::{DigestAlgorithm, FileFlags};

pub(crate) mod backend;
pub use crate::backend::DbFormat;

mod rpm;
pub use crate::rpm::{FileInfo, PackageInfo};

mod db;
pub use crate::db::{CancelToken, RpmDb};
