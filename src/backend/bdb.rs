//! Reader for Berkeley DB hash databases, the classic `Packages` file
//! written by rpm on CentOS/RHEL up to version 8.
//!
//! Only the hash access method is understood; the endianness of the
//! writing host is detected once from the metadata page magic and
//! threaded into every page read. Values too large for one page live
//! on chains of overflow pages which are stitched back together here.

use std::collections::VecDeque;
use std::io::{self, Read, Seek, SeekFrom};

use nom::bytes::complete::take;
use nom::number::complete::{u16 as num_u16, u32 as num_u32, u8 as num_u8};
use nom::number::Endianness;

use crate::errors::*;

const HASH_MAGIC: u32 = 0x0006_1561;
const HASH_METADATA_PAGE_TYPE: u8 = 8;
const HASH_PAGE_TYPE: u8 = 13;
const OVERFLOW_PAGE_TYPE: u8 = 7;

/// Entry type bytes on a hash page.
const HASH_ENTRY_KEY_DATA: u8 = 1;
const HASH_ENTRY_OFF_PAGE: u8 = 3;

const PAGE_HEADER_SIZE: usize = 26;
const METADATA_MAGIC_OFFSET: usize = 12;
const METADATA_PAGE_SIZE_OFFSET: usize = 20;
const METADATA_PAGE_TYPE_OFFSET: usize = 25;

/// Decide whether `prefix` is the start of a BDB hash metadata page,
/// and under which byte order.
pub(crate) fn sniff_hash_metadata(prefix: &[u8]) -> Option<Endianness> {
    [Endianness::Little, Endianness::Big]
        .into_iter()
        .find(|&endian| {
            let Some(magic) = raw_u32(prefix, METADATA_MAGIC_OFFSET, endian) else {
                return false;
            };
            let Some(page_size) = raw_u32(prefix, METADATA_PAGE_SIZE_OFFSET, endian) else {
                return false;
            };
            magic == HASH_MAGIC
                && prefix.get(METADATA_PAGE_TYPE_OFFSET) == Some(&HASH_METADATA_PAGE_TYPE)
                && page_size.is_power_of_two()
                && (512..=65536).contains(&page_size)
        })
}

fn raw_u32(buf: &[u8], offset: usize, endian: Endianness) -> Option<u32> {
    let bytes: [u8; 4] = buf.get(offset..offset + 4)?.try_into().ok()?;
    Some(match endian {
        Endianness::Big => u32::from_be_bytes(bytes),
        _ => u32::from_le_bytes(bytes),
    })
}

struct HashMetadata {
    page_size: u32,
    last_page_no: u32,
}

fn parse_metadata(input: &[u8], endian: Endianness) -> nom::IResult<&[u8], HashMetadata> {
    let (input, _lsn) = take(8usize)(input)?;
    let (input, _page_no) = num_u32(endian)(input)?;
    let (input, _magic) = num_u32(endian)(input)?;
    let (input, _version) = num_u32(endian)(input)?;
    let (input, page_size) = num_u32(endian)(input)?;
    let (input, _encrypt_alg) = num_u8(input)?;
    let (input, _page_type) = num_u8(input)?;
    let (input, _meta_flags) = num_u8(input)?;
    let (input, _unused) = num_u8(input)?;
    let (input, _free_list) = num_u32(endian)(input)?;
    let (input, last_page_no) = num_u32(endian)(input)?;
    Ok((
        input,
        HashMetadata {
            page_size,
            last_page_no,
        },
    ))
}

struct PageHeader {
    next_page_no: u32,
    entries: u16,
    page_type: u8,
}

fn parse_page_header(input: &[u8], endian: Endianness) -> nom::IResult<&[u8], PageHeader> {
    let (input, _lsn) = take(8usize)(input)?;
    let (input, _page_no) = num_u32(endian)(input)?;
    let (input, _prev_page_no) = num_u32(endian)(input)?;
    let (input, next_page_no) = num_u32(endian)(input)?;
    let (input, entries) = num_u16(endian)(input)?;
    let (input, _hf_offset) = num_u16(endian)(input)?;
    let (input, _level) = num_u8(input)?;
    let (input, page_type) = num_u8(input)?;
    Ok((
        input,
        PageHeader {
            next_page_no,
            entries,
            page_type,
        },
    ))
}

#[derive(Debug)]
pub(crate) struct BerkeleyHashDb<R> {
    reader: R,
    endian: Endianness,
    page_size: u32,
    last_page_no: u32,
    file_len: u64,
}

impl<R: Read + Seek> BerkeleyHashDb<R> {
    pub(crate) fn open(mut reader: R, endian: Endianness) -> Result<Self, Error> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        let mut buf = [0u8; 512];
        reader.read_exact(&mut buf)?;

        let (_, meta) = parse_metadata(&buf, endian)
            .map_err(|_| Error::corrupt("hash metadata page", 0, "short metadata page"))?;
        if !meta.page_size.is_power_of_two() || !(512..=65536).contains(&meta.page_size) {
            return Err(Error::corrupt(
                "hash metadata page",
                METADATA_PAGE_SIZE_OFFSET as u64,
                format!("implausible page size {}", meta.page_size),
            ));
        }

        Ok(Self {
            reader,
            endian,
            page_size: meta.page_size,
            last_page_no: meta.last_page_no,
            file_len,
        })
    }

    /// Iterate all value blobs, by ascending page number and on-page
    /// slot index.
    pub(crate) fn blobs(&mut self) -> BdbBlobs<'_, R> {
        BdbBlobs {
            db: self,
            next_page: 1,
            pending: VecDeque::new(),
            done: false,
        }
    }

    fn page_offset(&self, page_no: u32) -> u64 {
        u64::from(page_no) * u64::from(self.page_size)
    }

    fn read_page(&mut self, page_no: u32) -> Result<Vec<u8>, Error> {
        let offset = self.page_offset(page_no);
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut page = vec![0u8; self.page_size as usize];
        self.reader
            .read_exact(&mut page)
            .map_err(|err| match err.kind() {
                io::ErrorKind::UnexpectedEof => Error::corrupt(
                    "hash page",
                    offset,
                    "page extends past the end of the file",
                ),
                _ => Error::Io(err),
            })?;
        Ok(page)
    }

    /// Collect the value blobs stored on one page. Pages of any other
    /// type than hash yield nothing.
    fn page_values(&mut self, page_no: u32) -> Result<Vec<Vec<u8>>, Error> {
        let offset = self.page_offset(page_no);
        let page = self.read_page(page_no)?;
        let (_, header) = parse_page_header(&page, self.endian)
            .map_err(|_| Error::corrupt("hash page", offset, "short page header"))?;
        if header.page_type != HASH_PAGE_TYPE {
            return Ok(Vec::new());
        }

        let slots = self.slot_offsets(&page, header.entries, offset)?;
        let mut values = Vec::new();
        // slots alternate key/value; the values sit at odd indices
        for (index, &slot) in slots.iter().enumerate().skip(1).step_by(2) {
            let slot = slot as usize;
            match page[slot] {
                HASH_ENTRY_OFF_PAGE => {
                    // {type, unused[3], page_no, length}
                    let record = page.get(slot + 4..slot + 12).ok_or_else(|| {
                        Error::corrupt("hash page", offset, "truncated off-page entry")
                    })?;
                    let first_page = raw_u32(record, 0, self.endian).unwrap_or_default();
                    let length = raw_u32(record, 4, self.endian).unwrap_or_default();
                    values.push(self.read_overflow(first_page, length, offset)?);
                }
                HASH_ENTRY_KEY_DATA => {
                    // inline data runs up to the previous entry; pages
                    // fill from the end towards the slot table
                    let end = slots[index - 1] as usize;
                    if end <= slot {
                        return Err(Error::corrupt(
                            "hash page",
                            offset,
                            format!("inline entry at {slot} overlaps its neighbour at {end}"),
                        ));
                    }
                    values.push(page[slot + 1..end].to_vec());
                }
                _ => {}
            }
        }
        Ok(values)
    }

    fn slot_offsets(&self, page: &[u8], entries: u16, page_offset: u64) -> Result<Vec<u16>, Error> {
        let table_end = PAGE_HEADER_SIZE + 2 * entries as usize;
        if table_end > page.len() {
            return Err(Error::corrupt(
                "hash page",
                page_offset,
                format!("slot table with {entries} entries overruns the page"),
            ));
        }
        let mut offsets = Vec::with_capacity(entries as usize);
        for chunk in page[PAGE_HEADER_SIZE..table_end].chunks_exact(2) {
            let bytes = [chunk[0], chunk[1]];
            let value = match self.endian {
                Endianness::Big => u16::from_be_bytes(bytes),
                _ => u16::from_le_bytes(bytes),
            };
            if (value as usize) < table_end || value as usize >= page.len() {
                return Err(Error::corrupt(
                    "hash page",
                    page_offset,
                    format!("entry offset {value} outside the page body"),
                ));
            }
            offsets.push(value);
        }
        Ok(offsets)
    }

    /// Stitch an overflow chain back into one value, `length` bytes
    /// spread over pages linked through `next_page_no`.
    fn read_overflow(&mut self, first_page: u32, length: u32, at: u64) -> Result<Vec<u8>, Error> {
        if u64::from(length) > self.file_len {
            return Err(Error::corrupt(
                "overflow chain",
                at,
                format!("declared length {length} exceeds the file size"),
            ));
        }
        let mut data = Vec::with_capacity(length as usize);
        let mut page_no = first_page;
        let mut visited = 0u32;
        while page_no != 0 && data.len() < length as usize {
            visited += 1;
            if visited > self.last_page_no.saturating_add(1) {
                return Err(Error::corrupt(
                    "overflow chain",
                    self.page_offset(page_no),
                    "cycle in overflow chain",
                ));
            }
            let offset = self.page_offset(page_no);
            let page = self.read_page(page_no)?;
            let (_, header) = parse_page_header(&page, self.endian)
                .map_err(|_| Error::corrupt("overflow page", offset, "short page header"))?;
            if header.page_type != OVERFLOW_PAGE_TYPE {
                return Err(Error::corrupt(
                    "overflow page",
                    offset,
                    format!("expected an overflow page, found page type {}", header.page_type),
                ));
            }
            let want = (length as usize - data.len()).min(page.len() - PAGE_HEADER_SIZE);
            data.extend_from_slice(&page[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + want]);
            page_no = header.next_page_no;
        }
        if data.len() < length as usize {
            return Err(Error::corrupt(
                "overflow chain",
                at,
                format!("chain ended after {} of {length} bytes", data.len()),
            ));
        }
        Ok(data)
    }
}

pub(crate) struct BdbBlobs<'a, R> {
    db: &'a mut BerkeleyHashDb<R>,
    next_page: u32,
    pending: VecDeque<(u32, Vec<u8>)>,
    done: bool,
}

impl<R: Read + Seek> Iterator for BdbBlobs<'_, R> {
    type Item = Result<(u32, Vec<u8>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(blob) = self.pending.pop_front() {
                return Some(Ok(blob));
            }
            if self.next_page > self.db.last_page_no {
                self.done = true;
                return None;
            }
            let page_no = self.next_page;
            self.next_page += 1;
            match self.db.page_values(page_no) {
                Ok(values) => self
                    .pending
                    .extend(values.into_iter().map(|blob| (page_no, blob))),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
