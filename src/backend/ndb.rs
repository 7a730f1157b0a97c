//! Reader for SUSE's NDB rpm database, the `Packages.db` file.
//!
//! The format is a fixed 4 KiB header, a table of 16-byte slots, and a
//! data region addressed in 16-byte blocks. Each occupied slot points
//! at a block range holding one header blob behind a small trailer.

use std::io::{self, Read, Seek, SeekFrom};

use nom::bytes::complete::{tag, take};
use nom::number::complete::le_u32;

use crate::errors::*;

const HEADER_MAGIC: [u8; 4] = *b"RpmP";
const SLOT_MAGIC: u32 = 0x2a01_e2f7;
const BLOB_MAGIC: u32 = 0x2048_4452;

const PAGE_SIZE: u64 = 4096;
const BLOCK_SIZE: u64 = 16;
const SLOT_SIZE: usize = 16;
const TRAILER_SIZE: usize = 16;

#[derive(Debug)]
pub(crate) struct NdbFile<R> {
    reader: R,
    slots: Vec<Slot>,
    file_len: u64,
}

/// An occupied entry of the slot table.
#[derive(Debug, Clone, Copy)]
struct Slot {
    pkg_idx: u32,
    blk_off: u32,
    blk_cnt: u32,
}

struct NdbHeader {
    version: u32,
    slot_npages: u32,
}

fn parse_header(input: &[u8]) -> nom::IResult<&[u8], NdbHeader> {
    let (input, _magic) = tag(&HEADER_MAGIC[..])(input)?;
    let (input, version) = le_u32(input)?;
    let (input, _generation) = le_u32(input)?;
    let (input, slot_npages) = le_u32(input)?;
    let (input, _next_slot) = le_u32(input)?;
    Ok((
        input,
        NdbHeader {
            version,
            slot_npages,
        },
    ))
}

fn parse_slot(input: &[u8]) -> nom::IResult<&[u8], Option<Slot>> {
    let (input, magic) = le_u32(input)?;
    let (input, pkg_idx) = le_u32(input)?;
    let (input, blk_off) = le_u32(input)?;
    let (input, blk_cnt) = le_u32(input)?;
    // unoccupied or foreign slots are skipped, not errors
    let slot = (magic == SLOT_MAGIC && pkg_idx != 0).then_some(Slot {
        pkg_idx,
        blk_off,
        blk_cnt,
    });
    Ok((input, slot))
}

impl<R: Read + Seek> NdbFile<R> {
    pub(crate) fn open(mut reader: R) -> Result<Self, Error> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        let mut header_page = vec![0u8; PAGE_SIZE as usize];
        reader
            .read_exact(&mut header_page)
            .map_err(short_read("ndb header", 0))?;

        let (_, header) = parse_header(&header_page)
            .map_err(|_| Error::corrupt("ndb header", 0, "bad magic"))?;
        if header.version != 0 {
            return Err(Error::corrupt(
                "ndb header",
                4,
                format!("unsupported version {}", header.version),
            ));
        }
        if header.slot_npages == 0 {
            return Err(Error::corrupt("ndb header", 12, "empty slot table"));
        }
        let table_len = u64::from(header.slot_npages) * PAGE_SIZE;
        if PAGE_SIZE + table_len > file_len {
            return Err(Error::corrupt(
                "ndb slot table",
                PAGE_SIZE,
                format!(
                    "{} slot page(s) do not fit a {file_len}-byte file",
                    header.slot_npages
                ),
            ));
        }

        let mut table = vec![0u8; table_len as usize];
        reader
            .read_exact(&mut table)
            .map_err(short_read("ndb slot table", PAGE_SIZE))?;
        let mut slots = Vec::new();
        for raw in table.chunks_exact(SLOT_SIZE) {
            let (_, slot) = parse_slot(raw)
                .map_err(|_| Error::corrupt("ndb slot table", PAGE_SIZE, "short slot"))?;
            slots.extend(slot);
        }
        log::debug!("ndb slot table holds {} occupied slot(s)", slots.len());

        Ok(Self {
            reader,
            slots,
            file_len,
        })
    }

    /// Iterate all blobs by ascending slot index.
    pub(crate) fn blobs(&mut self) -> NdbBlobs<'_, R> {
        NdbBlobs {
            reader: &mut self.reader,
            file_len: self.file_len,
            slots: self.slots.iter(),
            done: false,
        }
    }
}

pub(crate) struct NdbBlobs<'a, R> {
    reader: &'a mut R,
    file_len: u64,
    slots: std::slice::Iter<'a, Slot>,
    done: bool,
}

impl<R: Read + Seek> NdbBlobs<'_, R> {
    fn read_slot(&mut self, slot: Slot) -> Result<(u32, Vec<u8>), Error> {
        let offset = u64::from(slot.blk_off) * BLOCK_SIZE;
        let region_len = u64::from(slot.blk_cnt) * BLOCK_SIZE;
        if region_len < TRAILER_SIZE as u64 || offset + region_len > self.file_len {
            return Err(Error::corrupt(
                "ndb blob",
                offset,
                format!(
                    "slot for package {} spans {region_len} byte(s) outside the file",
                    slot.pkg_idx
                ),
            ));
        }

        self.reader.seek(SeekFrom::Start(offset))?;
        let mut region = vec![0u8; region_len as usize];
        self.reader
            .read_exact(&mut region)
            .map_err(short_read("ndb blob", offset))?;

        // 16-byte trailer ahead of the blob: magic, checksum, length.
        // The checksum is not verified, matching the native tooling.
        let parse = |input| -> nom::IResult<&[u8], (u32, u32)> {
            let (input, magic) = le_u32(input)?;
            let (input, _checksum) = le_u32(input)?;
            let (input, length) = le_u32(input)?;
            let (input, _reserved) = take(4usize)(input)?;
            Ok((input, (magic, length)))
        };
        let (blob_area, (magic, length)) =
            parse(&region[..]).map_err(|_| Error::corrupt("ndb blob", offset, "short trailer"))?;
        if magic != BLOB_MAGIC {
            return Err(Error::corrupt("ndb blob", offset, "bad trailer magic"));
        }
        if length as usize > blob_area.len() {
            return Err(Error::corrupt(
                "ndb blob",
                offset,
                format!(
                    "declared blob length {length} exceeds the {}-byte slot region",
                    blob_area.len()
                ),
            ));
        }

        Ok((slot.pkg_idx, blob_area[..length as usize].to_vec()))
    }
}

impl<R: Read + Seek> Iterator for NdbBlobs<'_, R> {
    type Item = Result<(u32, Vec<u8>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let slot = match self.slots.next() {
            Some(slot) => *slot,
            None => {
                self.done = true;
                return None;
            }
        };
        match self.read_slot(slot) {
            Ok(blob) => Some(Ok(blob)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

fn short_read(section: &'static str, offset: u64) -> impl Fn(io::Error) -> Error {
    move |err| match err.kind() {
        io::ErrorKind::UnexpectedEof => {
            Error::corrupt(section, offset, "unexpected end of file")
        }
        _ => Error::Io(err),
    }
}
