#![allow(dead_code)]

//! Builders for synthetic database fixtures: header blobs, Berkeley DB
//! hash images, NDB images and SQLite files, assembled byte by byte so
//! the tests do not depend on multi-megabyte binary assets.

use std::path::{Path, PathBuf};

// Header tags used by the fixtures.
pub const TAG_SIGMD5: u32 = 261;
pub const TAG_PGP: u32 = 268;
pub const TAG_NAME: u32 = 1000;
pub const TAG_VERSION: u32 = 1001;
pub const TAG_RELEASE: u32 = 1002;
pub const TAG_EPOCH: u32 = 1003;
pub const TAG_SUMMARY: u32 = 1004;
pub const TAG_DESCRIPTION: u32 = 1005;
pub const TAG_INSTALLTIME: u32 = 1008;
pub const TAG_SIZE: u32 = 1009;
pub const TAG_VENDOR: u32 = 1011;
pub const TAG_LICENSE: u32 = 1014;
pub const TAG_ARCH: u32 = 1022;
pub const TAG_FILESIZES: u32 = 1028;
pub const TAG_FILEMODES: u32 = 1030;
pub const TAG_FILEDIGESTS: u32 = 1035;
pub const TAG_FILEFLAGS: u32 = 1037;
pub const TAG_FILEUSERNAME: u32 = 1039;
pub const TAG_FILEGROUPNAME: u32 = 1040;
pub const TAG_SOURCERPM: u32 = 1044;
pub const TAG_PROVIDENAME: u32 = 1047;
pub const TAG_REQUIRENAME: u32 = 1049;
pub const TAG_DIRINDEXES: u32 = 1116;
pub const TAG_BASENAMES: u32 = 1117;
pub const TAG_DIRNAMES: u32 = 1118;
pub const TAG_DIGESTALGO: u32 = 5011;
pub const TAG_MODULARITYLABEL: u32 = 5096;

/// A typed header value, serialised with the store alignment rpm uses.
pub enum Value {
    Str(String),
    I18n(Vec<String>),
    StrArray(Vec<String>),
    Bin(Vec<u8>),
    U16Array(Vec<u16>),
    U32(u32),
    U32Array(Vec<u32>),
}

pub fn s(value: &str) -> Value {
    Value::Str(value.to_string())
}

pub fn i18n(value: &str) -> Value {
    Value::I18n(vec![value.to_string()])
}

pub fn strs(values: &[&str]) -> Value {
    Value::StrArray(values.iter().map(|v| v.to_string()).collect())
}

/// Serialise tag entries into one header blob (index then store), the
/// layout every backend hands to the header parser.
pub fn header_blob(entries: &[(u32, Value)]) -> Vec<u8> {
    let mut sorted: Vec<&(u32, Value)> = entries.iter().collect();
    sorted.sort_by_key(|(tag, _)| *tag);

    let mut store: Vec<u8> = Vec::new();
    let mut index: Vec<u8> = Vec::new();
    for (tag, value) in sorted {
        match value {
            Value::U16Array(_) => align(&mut store, 2),
            Value::U32(_) | Value::U32Array(_) => align(&mut store, 4),
            _ => {}
        }
        let offset = store.len() as u32;
        let (type_code, count) = match value {
            Value::Str(string) => {
                store.extend_from_slice(string.as_bytes());
                store.push(0);
                (6u32, 1u32)
            }
            Value::I18n(strings) | Value::StrArray(strings) => {
                for string in strings {
                    store.extend_from_slice(string.as_bytes());
                    store.push(0);
                }
                let code = if matches!(value, Value::I18n(_)) { 9 } else { 8 };
                (code, strings.len() as u32)
            }
            Value::Bin(bytes) => {
                store.extend_from_slice(bytes);
                (7, bytes.len() as u32)
            }
            Value::U16Array(items) => {
                for item in items {
                    store.extend_from_slice(&item.to_be_bytes());
                }
                (3, items.len() as u32)
            }
            Value::U32(item) => {
                store.extend_from_slice(&item.to_be_bytes());
                (4, 1)
            }
            Value::U32Array(items) => {
                for item in items {
                    store.extend_from_slice(&item.to_be_bytes());
                }
                (4, items.len() as u32)
            }
        };
        index.extend_from_slice(&tag.to_be_bytes());
        index.extend_from_slice(&type_code.to_be_bytes());
        index.extend_from_slice(&offset.to_be_bytes());
        index.extend_from_slice(&count.to_be_bytes());
    }

    let mut blob = Vec::with_capacity(8 + index.len() + store.len());
    blob.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    blob.extend_from_slice(&(store.len() as u32).to_be_bytes());
    blob.extend_from_slice(&index);
    blob.extend_from_slice(&store);
    blob
}

fn align(store: &mut Vec<u8>, to: usize) {
    while store.len() % to != 0 {
        store.push(0);
    }
}

/// An OpenPGP v4 signature packet with just enough substance for the
/// summary renderer: algorithms, creation time and issuer key id.
pub fn pgp_packet(pub_algo: u8, hash_algo: u8, created: u32, key_id: u64) -> Vec<u8> {
    let mut hashed = vec![5, 2];
    hashed.extend_from_slice(&created.to_be_bytes());
    let mut unhashed = vec![9, 16];
    unhashed.extend_from_slice(&key_id.to_be_bytes());

    let mut body = vec![4, 0x00, pub_algo, hash_algo];
    body.extend_from_slice(&(hashed.len() as u16).to_be_bytes());
    body.extend_from_slice(&hashed);
    body.extend_from_slice(&(unhashed.len() as u16).to_be_bytes());
    body.extend_from_slice(&unhashed);
    body.extend_from_slice(&[0x12, 0x34, 0x01, 0x00, 0x2a]);

    let mut packet = vec![0x88, body.len() as u8];
    packet.extend(body);
    packet
}

/// Modelled on the python package of a CentOS 5 database.
pub fn python_blob() -> Vec<u8> {
    header_blob(&[
        (TAG_NAME, s("python")),
        (TAG_VERSION, s("2.4.3")),
        (TAG_RELEASE, s("56.el5")),
        (TAG_ARCH, s("x86_64")),
        (TAG_SIZE, Value::U32(74377)),
        (TAG_INSTALLTIME, Value::U32(1459411575)),
        (TAG_VENDOR, s("CentOS")),
        (TAG_LICENSE, s("PSF - see LICENSE")),
        (
            TAG_SUMMARY,
            i18n("An interpreted, interactive, object-oriented programming language."),
        ),
        (TAG_SOURCERPM, s("python-2.4.3-56.el5.src.rpm")),
        (
            TAG_SIGMD5,
            Value::Bin(hex::decode("ebfb56be33b146ef39180a090e581258").unwrap()),
        ),
        (
            TAG_PROVIDENAME,
            strs(&["Distutils", "python(abi)", "python-x86_64", "python"]),
        ),
        (
            TAG_REQUIRENAME,
            strs(&[
                "/usr/bin/env",
                "libc.so.6()(64bit)",
                "libpython2.4.so.1.0()(64bit)",
                "rtld(GNU_HASH)",
            ]),
        ),
        (TAG_BASENAMES, strs(&["python", "python2.4"])),
        (TAG_DIRINDEXES, Value::U32Array(vec![0, 0])),
        (TAG_DIRNAMES, strs(&["/usr/bin/"])),
        (TAG_FILESIZES, Value::U32Array(vec![8568, 8568])),
        (TAG_FILEMODES, Value::U16Array(vec![0o100_755, 0o100_755])),
        (TAG_FILEFLAGS, Value::U32Array(vec![0, 0])),
        (
            TAG_FILEDIGESTS,
            strs(&[
                "7cd8e09955fd5f952f6837bc17b41b95",
                "8f18b14e2161b6d0c6e7e401d2e4ea2e",
            ]),
        ),
        (TAG_FILEUSERNAME, strs(&["root", "root"])),
        (TAG_FILEGROUPNAME, strs(&["root", "root"])),
    ])
}

/// Modelled on the glibc package of a CentOS 6 database: carries a
/// signature and a file digest algorithm.
pub fn glibc_blob() -> Vec<u8> {
    header_blob(&[
        (TAG_NAME, s("glibc")),
        (TAG_VERSION, s("2.12")),
        (TAG_RELEASE, s("1.212.el6")),
        (TAG_ARCH, s("x86_64")),
        (TAG_SIZE, Value::U32(13117447)),
        (TAG_INSTALLTIME, Value::U32(1538857091)),
        (TAG_VENDOR, s("CentOS")),
        (TAG_SUMMARY, i18n("The GNU libc libraries")),
        (TAG_SOURCERPM, s("glibc-2.12-1.212.el6.src.rpm")),
        (TAG_DIGESTALGO, Value::U32(8)),
        (
            TAG_SIGMD5,
            Value::Bin(hex::decode("89e843d7979a50a26e2ea1924ef3e213").unwrap()),
        ),
        (
            TAG_PGP,
            Value::Bin(pgp_packet(1, 2, 1529494587, 0x0946fca2c105b9de)),
        ),
        (TAG_PROVIDENAME, strs(&["glibc", "glibc(x86-64)"])),
        (TAG_REQUIRENAME, strs(&["/sbin/ldconfig", "basesystem"])),
    ])
}

/// Modelled on the nodejs module stream of a CentOS 8 database: epoch
/// and modularity label set.
pub fn nodejs_blob() -> Vec<u8> {
    header_blob(&[
        (TAG_NAME, s("nodejs")),
        (TAG_EPOCH, Value::U32(1)),
        (TAG_VERSION, s("10.21.0")),
        (TAG_RELEASE, s("3.module_el8.2.0+391+8da3adc6")),
        (TAG_ARCH, s("x86_64")),
        (
            TAG_MODULARITYLABEL,
            s("nodejs:10:8020020200707141642:6a468ee4"),
        ),
        (TAG_SUMMARY, i18n("JavaScript runtime")),
        (
            TAG_PGP,
            Value::Bin(pgp_packet(1, 8, 1594138104, 0x05b555b38483c65d)),
        ),
        (TAG_DIGESTALGO, Value::U32(8)),
    ])
}

/// A package whose description alone is bigger than one BDB page, so
/// its blob must land on an overflow chain.
pub fn jumbo_blob() -> Vec<u8> {
    header_blob(&[
        (TAG_NAME, s("texlive-collection")),
        (TAG_VERSION, s("2012")),
        (TAG_RELEASE, s("1")),
        (TAG_ARCH, s("noarch")),
        (TAG_DESCRIPTION, i18n(&"TeX packages. ".repeat(600))),
    ])
}

// ---- Berkeley DB image, little-endian, 4 KiB pages ----

const BDB_PAGE: usize = 4096;
const BDB_PAGE_HEADER: usize = 26;

fn put_u16(page: &mut [u8], offset: usize, value: u16) {
    page[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(page: &mut [u8], offset: usize, value: u32) {
    page[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn bdb_metadata_page(last_page_no: u32) -> Vec<u8> {
    let mut page = vec![0u8; BDB_PAGE];
    put_u32(&mut page, 12, 0x0006_1561);
    put_u32(&mut page, 16, 9); // version
    put_u32(&mut page, 20, BDB_PAGE as u32);
    page[25] = 8; // hash metadata page
    put_u32(&mut page, 32, last_page_no);
    page
}

fn bdb_page(page_no: u32, page_type: u8, next: u32) -> Vec<u8> {
    let mut page = vec![0u8; BDB_PAGE];
    put_u32(&mut page, 8, page_no);
    put_u32(&mut page, 16, next);
    page[25] = page_type;
    page
}

fn bdb_inline_hash_page(page_no: u32, value: &[u8]) -> Vec<u8> {
    let mut page = bdb_page(page_no, 13, 0);
    put_u16(&mut page, 20, 2); // one key/value pair

    let key_slot = BDB_PAGE - 2;
    page[key_slot] = 1;
    page[key_slot + 1] = b'k';

    let value_slot = key_slot - 1 - value.len();
    page[value_slot] = 1;
    page[value_slot + 1..key_slot].copy_from_slice(value);

    put_u16(&mut page, BDB_PAGE_HEADER, key_slot as u16);
    put_u16(&mut page, BDB_PAGE_HEADER + 2, value_slot as u16);
    page
}

fn bdb_off_page_hash_page(page_no: u32, first: u32, length: u32) -> Vec<u8> {
    let mut page = bdb_page(page_no, 13, 0);
    put_u16(&mut page, 20, 2);

    let key_slot = BDB_PAGE - 2;
    page[key_slot] = 1;
    page[key_slot + 1] = b'k';

    let value_slot = key_slot - 12;
    page[value_slot] = 3;
    put_u32(&mut page, value_slot + 4, first);
    put_u32(&mut page, value_slot + 8, length);

    put_u16(&mut page, BDB_PAGE_HEADER, key_slot as u16);
    put_u16(&mut page, BDB_PAGE_HEADER + 2, value_slot as u16);
    page
}

/// Assemble a hash database: one bucket page per blob, values inline
/// when they fit and spilled onto overflow chains when they do not.
pub fn bdb_image(blobs: &[Vec<u8>]) -> Vec<u8> {
    let hash_pages = blobs.len() as u32;
    let chunk = BDB_PAGE - BDB_PAGE_HEADER;

    let mut buckets = Vec::new();
    let mut overflow = Vec::new();
    for (i, blob) in blobs.iter().enumerate() {
        let page_no = i as u32 + 1;
        if blob.len() <= BDB_PAGE - 64 {
            buckets.push(bdb_inline_hash_page(page_no, blob));
        } else {
            let first = hash_pages + 1 + overflow.len() as u32;
            let chunks: Vec<&[u8]> = blob.chunks(chunk).collect();
            for (k, piece) in chunks.iter().enumerate() {
                let this = first + k as u32;
                let next = if k + 1 == chunks.len() { 0 } else { this + 1 };
                let mut page = bdb_page(this, 7, next);
                page[BDB_PAGE_HEADER..BDB_PAGE_HEADER + piece.len()].copy_from_slice(piece);
                overflow.push(page);
            }
            buckets.push(bdb_off_page_hash_page(page_no, first, blob.len() as u32));
        }
    }

    let mut image = bdb_metadata_page(hash_pages + overflow.len() as u32);
    for page in buckets.into_iter().chain(overflow) {
        image.extend_from_slice(&page);
    }
    image
}

/// A structurally broken hash database: opens fine, errors on listing.
pub fn corrupted_bdb_image() -> Vec<u8> {
    let mut image = bdb_image(&[python_blob()]);
    // point the value entry inside the page header
    put_u16(&mut image[BDB_PAGE..], BDB_PAGE_HEADER + 2, 5);
    image
}

// ---- NDB image ----

const NDB_PAGE: usize = 4096;
const NDB_SLOT: usize = 16;
const NDB_TRAILER: usize = 16;

pub fn ndb_image(blobs: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let mut image = vec![0u8; NDB_PAGE];
    image[..4].copy_from_slice(b"RpmP");
    image[8..12].copy_from_slice(&1u32.to_le_bytes()); // generation
    image[12..16].copy_from_slice(&1u32.to_le_bytes()); // slot pages
    image[16..20].copy_from_slice(&(blobs.len() as u32 + 1).to_le_bytes());

    let mut slot_page = vec![0u8; NDB_PAGE];
    let mut data = Vec::new();
    for (index, (pkg_idx, blob)) in blobs.iter().enumerate() {
        let region_len = (NDB_TRAILER + blob.len() + 15) / 16 * 16;
        let blk_off = (2 * NDB_PAGE + data.len()) / 16;

        let slot = &mut slot_page[index * NDB_SLOT..(index + 1) * NDB_SLOT];
        slot[..4].copy_from_slice(&0x2a01_e2f7u32.to_le_bytes());
        slot[4..8].copy_from_slice(&pkg_idx.to_le_bytes());
        slot[8..12].copy_from_slice(&(blk_off as u32).to_le_bytes());
        slot[12..16].copy_from_slice(&((region_len / 16) as u32).to_le_bytes());

        let mut region = vec![0u8; region_len];
        region[..4].copy_from_slice(&0x2048_4452u32.to_le_bytes());
        region[4..8].copy_from_slice(&0u32.to_le_bytes()); // checksum, unverified
        region[8..12].copy_from_slice(&(blob.len() as u32).to_le_bytes());
        region[NDB_TRAILER..NDB_TRAILER + blob.len()].copy_from_slice(blob);
        data.extend_from_slice(&region);
    }

    image.extend_from_slice(&slot_page);
    image.extend_from_slice(&data);
    image
}

// ---- SQLite database ----

pub fn sqlite_db(path: &Path, blobs: &[Vec<u8>], null_rows: usize) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch("CREATE TABLE Packages (hnum INTEGER PRIMARY KEY, blob BLOB);")
        .unwrap();
    for (i, blob) in blobs.iter().enumerate() {
        conn.execute(
            "INSERT INTO Packages (hnum, blob) VALUES (?1, ?2)",
            rusqlite::params![i as i64 + 1, blob],
        )
        .unwrap();
    }
    for i in 0..null_rows {
        conn.execute(
            "INSERT INTO Packages (hnum, blob) VALUES (?1, NULL)",
            [blobs.len() as i64 + 1 + i as i64],
        )
        .unwrap();
    }
}

pub fn write_fixture(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
