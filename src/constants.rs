//! RPM specific constants
//!
//! These constants were extracted from the rpm upstream project C headers.

use std::fmt::Display;

use bitflags::bitflags;

/// Magic prefix of a header container as stored inside an rpm file.
///
/// Blobs stored in an rpm database usually omit it; both forms are accepted.
pub const HEADER_MAGIC: [u8; 8] = [0x8e, 0xad, 0xe8, 0x01, 0x00, 0x00, 0x00, 0x00];

/// Size (in bytes) of each entry in the header index
pub const INDEX_ENTRY_SIZE: usize = 16;

pub const HEADER_SIGBASE: u32 = 256;
pub const RPMTAG_SIG_BASE: u32 = HEADER_SIGBASE;

/// The subset of header tags consumed when building a [`PackageInfo`](crate::PackageInfo).
///
/// An installed header carries many more tags; unknown ones are skipped
/// while iterating the index.
#[repr(u32)]
#[derive(
    num_derive::FromPrimitive,
    num_derive::ToPrimitive,
    Debug,
    PartialEq,
    Eq,
    Copy,
    Clone,
    enum_display_derive::Display,
)]
#[allow(non_camel_case_types)]
pub enum IndexTag {
    RPMTAG_SIGMD5 = RPMTAG_SIG_BASE + 5,
    RPMTAG_RSAHEADER = RPMTAG_SIG_BASE + 12,

    RPMTAG_NAME = 1000,
    RPMTAG_VERSION = 1001,
    RPMTAG_RELEASE = 1002,
    RPMTAG_EPOCH = 1003,
    RPMTAG_SUMMARY = 1004,
    RPMTAG_DESCRIPTION = 1005,
    RPMTAG_BUILDTIME = 1006,
    RPMTAG_INSTALLTIME = 1008,
    RPMTAG_SIZE = 1009,
    RPMTAG_VENDOR = 1011,
    RPMTAG_LICENSE = 1014,
    RPMTAG_GROUP = 1016,
    RPMTAG_URL = 1020,
    RPMTAG_ARCH = 1022,
    RPMTAG_FILESIZES = 1028,
    RPMTAG_FILEMODES = 1030,
    RPMTAG_FILEDIGESTS = 1035,
    RPMTAG_FILEFLAGS = 1037,
    RPMTAG_FILEUSERNAME = 1039,
    RPMTAG_FILEGROUPNAME = 1040,
    RPMTAG_SOURCERPM = 1044,
    RPMTAG_PROVIDENAME = 1047,
    RPMTAG_REQUIRENAME = 1049,
    RPMTAG_DIRINDEXES = 1116,
    RPMTAG_BASENAMES = 1117,
    RPMTAG_DIRNAMES = 1118,
    RPMTAG_PLATFORM = 1132,
    RPMTAG_FILEDIGESTALGO = 5011,
    RPMTAG_MODULARITYLABEL = 5096,
}

impl IndexTag {
    pub fn to_u32(self) -> u32 {
        self as u32
    }
}

bitflags! {
    /// Per-file attribute bits recorded in the `FileFlags` tag.
    #[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
    pub struct FileFlags: u32 {
        const CONFIG = 1;  // %%config
        const DOC = 1 << 1;  // %%doc
        const DONOTUSE = 1 << 2;  // %%donotuse
        const MISSINGOK = 1 << 3;  // %%config(missingok)
        const NOREPLACE = 1 << 4;  // %%config(noreplace)
        const GHOST = 1 << 6;  // %%ghost
        const LICENSE = 1 << 7;  // %%license
        const README = 1 << 8;  // %%readme
        // bits 9-10 unused
        const PUBKEY = 1 << 11;	// %%pubkey
        const ARTIFACT	= 1 << 12;	// %%artifact
    }
}

/// File digest algorithm recorded in the `FileDigestAlgo` tag.
///
/// The discriminants are the OpenPGP hash algorithm ids (RFC 4880 §9.4)
/// that rpm reuses on disk.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, num_derive::FromPrimitive)]
pub enum DigestAlgorithm {
    #[default]
    Unknown = 0,
    Md5 = 1,
    Sha1 = 2,
    Ripemd160 = 3,
    Md2 = 5,
    Tiger192 = 6,
    Haval5_160 = 7,
    Sha2_256 = 8,
    Sha2_384 = 9,
    Sha2_512 = 10,
    Sha2_224 = 11,
}
