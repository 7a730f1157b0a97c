//! Best-effort summary of the signature blob attached to an installed
//! package.
//!
//! Only the packet preface is read: algorithm identifiers, creation
//! time and issuer key id. The cryptographic payload is never touched,
//! let alone verified. Anything that does not look like an RFC 4880
//! signature packet yields `None`.

use chrono::{TimeZone, Utc};

struct SignaturePreface {
    public_key_algorithm: u8,
    hash_algorithm: u8,
    created: u32,
    issuer_key_id: u64,
}

/// Render the signature blob as `"<pkalgo>/<hashalgo>, <date>, Key ID <hex>"`,
/// e.g. `"RSA/SHA256, Tue Jul  7 16:08:24 2020, Key ID 05b555b38483c65d"`.
pub(crate) fn summarize(blob: &[u8]) -> Option<String> {
    let preface = parse_packet(blob)?;
    let date = Utc
        .timestamp_opt(i64::from(preface.created), 0)
        .single()?
        .format("%a %b %e %H:%M:%S %Y");
    Some(format!(
        "{}/{}, {}, Key ID {:016x}",
        public_key_algorithm_name(preface.public_key_algorithm)?,
        hash_algorithm_name(preface.hash_algorithm)?,
        date,
        preface.issuer_key_id,
    ))
}

/// RFC 4880 §9.1
fn public_key_algorithm_name(id: u8) -> Option<&'static str> {
    match id {
        1..=3 => Some("RSA"),
        16 => Some("Elgamal"),
        17 => Some("DSA"),
        18 => Some("ECDH"),
        19 => Some("ECDSA"),
        22 => Some("EdDSA"),
        _ => None,
    }
}

/// RFC 4880 §9.4
fn hash_algorithm_name(id: u8) -> Option<&'static str> {
    match id {
        1 => Some("MD5"),
        2 => Some("SHA1"),
        3 => Some("RIPEMD160"),
        8 => Some("SHA256"),
        9 => Some("SHA384"),
        10 => Some("SHA512"),
        11 => Some("SHA224"),
        _ => None,
    }
}

fn be_u16(input: &[u8]) -> Option<u16> {
    Some(u16::from_be_bytes(input.get(..2)?.try_into().ok()?))
}

fn be_u32(input: &[u8]) -> Option<u32> {
    Some(u32::from_be_bytes(input.get(..4)?.try_into().ok()?))
}

fn be_u64(input: &[u8]) -> Option<u64> {
    Some(u64::from_be_bytes(input.get(..8)?.try_into().ok()?))
}

/// Locate the first signature packet (tag 2) and parse its preface.
fn parse_packet(input: &[u8]) -> Option<SignaturePreface> {
    let (&ptag, rest) = input.split_first()?;
    if ptag & 0x80 == 0 {
        return None;
    }

    let (tag, body) = if ptag & 0x40 != 0 {
        // new format packet, one/two/five-octet length
        let tag = ptag & 0x3f;
        let (&first, rest) = rest.split_first()?;
        let (length, rest) = match first {
            0..=191 => (first as usize, rest),
            192..=223 => {
                let (&second, rest) = rest.split_first()?;
                ((first as usize - 192) * 256 + second as usize + 192, rest)
            }
            255 => (be_u32(rest)? as usize, rest.get(4..)?),
            // partial body lengths never occur in rpm signature tags
            _ => return None,
        };
        (tag, rest.get(..length)?)
    } else {
        // old format packet
        let tag = (ptag >> 2) & 0x0f;
        let (length, rest) = match ptag & 0x03 {
            0 => (*rest.first()? as usize, rest.get(1..)?),
            1 => (be_u16(rest)? as usize, rest.get(2..)?),
            2 => (be_u32(rest)? as usize, rest.get(4..)?),
            // indeterminate length: the packet runs to the end of the blob
            _ => (rest.len(), rest),
        };
        (tag, rest.get(..length)?)
    };

    if tag != 2 {
        return None;
    }
    parse_signature_body(body)
}

fn parse_signature_body(body: &[u8]) -> Option<SignaturePreface> {
    match body.first()? {
        3 => {
            // v3: version | 5 | sigtype | created | keyid | pubalgo | hashalgo
            if *body.get(1)? != 5 {
                return None;
            }
            Some(SignaturePreface {
                created: be_u32(body.get(3..)?)?,
                issuer_key_id: be_u64(body.get(7..)?)?,
                public_key_algorithm: *body.get(15)?,
                hash_algorithm: *body.get(16)?,
            })
        }
        4 => {
            // v4: version | sigtype | pubalgo | hashalgo | hashed area | unhashed area
            let public_key_algorithm = *body.get(2)?;
            let hash_algorithm = *body.get(3)?;
            let hashed_len = be_u16(body.get(4..)?)? as usize;
            let hashed = body.get(6..6 + hashed_len)?;
            let unhashed_len = be_u16(body.get(6 + hashed_len..)?)? as usize;
            let unhashed = body.get(8 + hashed_len..8 + hashed_len + unhashed_len)?;

            let (created_h, issuer_h) = scan_subpackets(hashed)?;
            let (created_u, issuer_u) = scan_subpackets(unhashed)?;
            Some(SignaturePreface {
                public_key_algorithm,
                hash_algorithm,
                created: created_h.or(created_u)?,
                issuer_key_id: issuer_h.or(issuer_u)?,
            })
        }
        _ => None,
    }
}

/// Walk a subpacket area for the creation-time (type 2) and issuer
/// (type 16) subpackets.
fn scan_subpackets(mut area: &[u8]) -> Option<(Option<u32>, Option<u64>)> {
    let mut created = None;
    let mut issuer = None;
    while !area.is_empty() {
        let (&first, rest) = area.split_first()?;
        let (length, rest) = match first {
            0..=191 => (first as usize, rest),
            192..=254 => {
                let (&second, rest) = rest.split_first()?;
                ((first as usize - 192) * 256 + second as usize + 192, rest)
            }
            255 => (be_u32(rest)? as usize, rest.get(4..)?),
        };
        let subpacket = rest.get(..length)?;
        area = rest.get(length..)?;

        // high bit of the type octet is the "critical" flag
        match subpacket.first()? & 0x7f {
            2 => created = be_u32(subpacket.get(1..)?),
            16 => issuer = be_u64(subpacket.get(1..)?),
            _ => {}
        }
    }
    Some((created, issuer))
}
