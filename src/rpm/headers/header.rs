use nom::{
    bytes::complete,
    number::complete::{be_u16, be_u32, be_u64, be_u8},
};

use crate::{constants::*, errors::*};

/// A parsed rpm header: the index entries of one blob with their store
/// data already decoded.
///
/// Blobs taken out of an rpm database are the `HEADER_IMMUTABLE` region
/// of the installed package, with the legacy signature tags merged into
/// the same tag space.
#[derive(Debug, PartialEq)]
pub struct Header {
    pub(crate) index_entries: Vec<IndexEntry>,
}

impl Header {
    /// Parse a header blob. The leading 8-byte magic is optional,
    /// database blobs usually omit it.
    pub(crate) fn parse(blob: &[u8]) -> Result<Header, Error> {
        let input = blob.strip_prefix(&HEADER_MAGIC).unwrap_or(blob);

        let (input, index_count) = be_u32(input)?;
        let (input, data_size) = be_u32(input)?;

        let index_len = (index_count as usize)
            .checked_mul(INDEX_ENTRY_SIZE)
            .ok_or_else(|| Error::MalformedHeader(format!("index count {index_count} overflows")))?;
        if input.len() < index_len + data_size as usize {
            return Err(Error::MalformedHeader(format!(
                "declared {index_count} entries and {data_size} store bytes but only {} bytes follow",
                input.len()
            )));
        }
        let store = &input[index_len..index_len + data_size as usize];

        let mut entries = Vec::with_capacity(index_count as usize);
        let mut index_bytes = &input[..index_len];
        for _ in 0..index_count {
            let (rest, tag) = be_u32(index_bytes)?;
            let (rest, type_code) = be_u32(rest)?;
            let (rest, offset) = be_u32(rest)?;
            let (rest, count) = be_u32(rest)?;
            index_bytes = rest;

            match IndexData::decode(type_code, store, offset, count)? {
                Some(data) => entries.push(IndexEntry { tag, data }),
                // Unknown type code on a tag we never consume: skip it.
                None => continue,
            }
        }

        Ok(Header {
            index_entries: entries,
        })
    }

    fn find_entry(&self, tag: IndexTag) -> Option<&IndexEntry> {
        self.index_entries
            .iter()
            .find(|entry| entry.tag == tag.to_u32())
    }

    fn typed<'a, T>(
        entry: Option<&'a IndexEntry>,
        tag: IndexTag,
        expected: &'static str,
        accessor: impl Fn(&'a IndexData) -> Option<T>,
    ) -> Result<Option<T>, Error> {
        match entry {
            None => Ok(None),
            Some(entry) => {
                accessor(&entry.data)
                    .map(Some)
                    .ok_or_else(|| Error::UnexpectedTagDataType {
                        expected,
                        actual: entry.data.type_name(),
                        tag: tag.to_string(),
                    })
            }
        }
    }

    pub(crate) fn get_string(&self, tag: IndexTag) -> Result<Option<&str>, Error> {
        Self::typed(self.find_entry(tag), tag, "string", IndexData::as_str)
    }

    pub(crate) fn get_i18n_string(&self, tag: IndexTag) -> Result<Option<&str>, Error> {
        Self::typed(
            self.find_entry(tag),
            tag,
            "i18n string",
            IndexData::as_i18n_str,
        )
    }

    pub(crate) fn get_u32(&self, tag: IndexTag) -> Result<Option<u32>, Error> {
        Self::typed(self.find_entry(tag), tag, "uint32", IndexData::as_u32)
    }

    pub(crate) fn get_u32_array(&self, tag: IndexTag) -> Result<Option<Vec<u32>>, Error> {
        Self::typed(
            self.find_entry(tag),
            tag,
            "uint32 array",
            IndexData::as_u32_array,
        )
    }

    pub(crate) fn get_u16_array(&self, tag: IndexTag) -> Result<Option<Vec<u16>>, Error> {
        Self::typed(
            self.find_entry(tag),
            tag,
            "uint16 array",
            IndexData::as_u16_array,
        )
    }

    pub(crate) fn get_string_array(&self, tag: IndexTag) -> Result<Option<&[String]>, Error> {
        Self::typed(
            self.find_entry(tag),
            tag,
            "string array",
            IndexData::as_string_array,
        )
    }

    pub(crate) fn get_binary(&self, tag: IndexTag) -> Result<Option<&[u8]>, Error> {
        Self::typed(self.find_entry(tag), tag, "binary", IndexData::as_binary)
    }
}

/// A single entry within the header index, data already pulled out of
/// the store.
#[derive(Debug, PartialEq)]
pub(crate) struct IndexEntry {
    pub(crate) tag: u32,
    pub(crate) data: IndexData,
}

/// Data of one [`IndexEntry`], decoded per the on-disk type code.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum IndexData {
    Null,
    Char(Vec<u8>),
    Int8(Vec<u8>),
    Int16(Vec<u16>),
    Int32(Vec<u32>),
    Int64(Vec<u64>),
    StringTag(String),
    Bin(Vec<u8>),
    StringArray(Vec<String>),
    I18NString(Vec<String>),
}

impl IndexData {
    /// Decode `count` items of `type_code` starting at `offset` in the
    /// store. Returns `Ok(None)` for type codes outside 0..=9 on tags
    /// this crate never consumes; every offset and count is validated
    /// against the store before a single byte is read.
    fn decode(
        type_code: u32,
        store: &[u8],
        offset: u32,
        count: u32,
    ) -> Result<Option<IndexData>, Error> {
        let data = match type_code {
            0 => IndexData::Null,
            1 => IndexData::Char(Self::byte_items(store, offset, count)?),
            2 => IndexData::Int8(Self::byte_items(store, offset, count)?),
            3 => {
                let mut items = Vec::with_capacity(count as usize);
                let mut input = Self::sized_region(store, offset, count, 2)?;
                for _ in 0..count {
                    let (rest, value) = be_u16::<_, nom::error::Error<&[u8]>>(input)?;
                    items.push(value);
                    input = rest;
                }
                IndexData::Int16(items)
            }
            4 => {
                let mut items = Vec::with_capacity(count as usize);
                let mut input = Self::sized_region(store, offset, count, 4)?;
                for _ in 0..count {
                    let (rest, value) = be_u32::<_, nom::error::Error<&[u8]>>(input)?;
                    items.push(value);
                    input = rest;
                }
                IndexData::Int32(items)
            }
            5 => {
                let mut items = Vec::with_capacity(count as usize);
                let mut input = Self::sized_region(store, offset, count, 8)?;
                for _ in 0..count {
                    let (rest, value) = be_u64::<_, nom::error::Error<&[u8]>>(input)?;
                    items.push(value);
                    input = rest;
                }
                IndexData::Int64(items)
            }
            6 => {
                if count != 1 {
                    return Err(Error::MalformedHeader(format!(
                        "string entry at offset {offset} has count {count}, must be 1"
                    )));
                }
                let mut strings = Self::string_items(store, offset, 1)?;
                IndexData::StringTag(strings.remove(0))
            }
            7 => IndexData::Bin(Self::byte_items(store, offset, count)?),
            8 => IndexData::StringArray(Self::string_items(store, offset, count)?),
            9 => IndexData::I18NString(Self::string_items(store, offset, count)?),
            _ => return Ok(None),
        };
        Ok(Some(data))
    }

    /// Bounds-check `offset + count * elem_size` against the store and
    /// return the covered region.
    fn sized_region(store: &[u8], offset: u32, count: u32, elem_size: u32) -> Result<&[u8], Error> {
        let end = u64::from(offset) + u64::from(count) * u64::from(elem_size);
        if end > store.len() as u64 {
            return Err(Error::MalformedHeader(format!(
                "entry at offset {offset} with {count} item(s) overruns the {}-byte store",
                store.len()
            )));
        }
        Ok(&store[offset as usize..end as usize])
    }

    fn byte_items(store: &[u8], offset: u32, count: u32) -> Result<Vec<u8>, Error> {
        Ok(Self::sized_region(store, offset, count, 1)?.to_vec())
    }

    /// Scan `count` NUL-terminated strings forward from `offset`; each
    /// must terminate inside the store.
    fn string_items(store: &[u8], offset: u32, count: u32) -> Result<Vec<String>, Error> {
        if offset as usize > store.len() {
            return Err(Error::MalformedHeader(format!(
                "string entry offset {offset} is outside the {}-byte store",
                store.len()
            )));
        }
        let mut remaining = &store[offset as usize..];
        let mut strings = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (rest, raw_string) =
                complete::take_till::<_, _, nom::error::Error<&[u8]>>(|item| item == 0)(remaining)?;
            let (rest, _) = be_u8::<_, nom::error::Error<&[u8]>>(rest).map_err(|_| {
                Error::MalformedHeader(format!(
                    "string at offset {offset} is not terminated inside the store"
                ))
            })?;
            remaining = rest;
            strings.push(String::from_utf8_lossy(raw_string).to_string());
        }
        Ok(strings)
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            IndexData::Null => "Null",
            IndexData::Char(_) => "Char",
            IndexData::Int8(_) => "i8",
            IndexData::Int16(_) => "i16",
            IndexData::Int32(_) => "i32",
            IndexData::Int64(_) => "i64",
            IndexData::StringTag(_) => "String",
            IndexData::Bin(_) => "Bin",
            IndexData::StringArray(_) => "StringArray",
            IndexData::I18NString(_) => "I18NString",
        }
    }

    pub(crate) fn as_str(&self) -> Option<&str> {
        match self {
            IndexData::StringTag(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn as_i18n_str(&self) -> Option<&str> {
        match self {
            IndexData::I18NString(strings) => strings.first().map(String::as_str),
            _ => None,
        }
    }

    pub(crate) fn as_u32(&self) -> Option<u32> {
        match self {
            IndexData::Int32(items) => items.first().copied(),
            _ => None,
        }
    }

    pub(crate) fn as_u32_array(&self) -> Option<Vec<u32>> {
        match self {
            IndexData::Int32(items) => Some(items.clone()),
            _ => None,
        }
    }

    pub(crate) fn as_u16_array(&self) -> Option<Vec<u16>> {
        match self {
            IndexData::Int16(items) => Some(items.clone()),
            _ => None,
        }
    }

    pub(crate) fn as_string_array(&self) -> Option<&[String]> {
        match self {
            IndexData::StringArray(strings) | IndexData::I18NString(strings) => Some(strings),
            _ => None,
        }
    }

    pub(crate) fn as_binary(&self) -> Option<&[u8]> {
        match self {
            IndexData::Bin(bytes) => Some(bytes.as_slice()),
            _ => None,
        }
    }
}
