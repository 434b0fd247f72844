//! Tar-family framing for the archive body.
//!
//! One 512-byte header block per entry, body padded to the block size, two
//! zero blocks at the end. Header blocks are encoded and decoded with
//! [`tar::Header`]. The framing loop itself is local: entry names are raw
//! caller strings preserved byte-verbatim (`tar::Builder` refuses the
//! absolute paths this format requires), and extraction hands out one
//! entry at a time. Names longer than the 100-byte header field travel in
//! a GNU long-name record.

use std::io::{self, Read, Write};

use tar::{EntryType, Header};

use crate::vfs::FileMeta;

pub(crate) const BLOCK_LEN: usize = 512;

const NAME_FIELD_LEN: usize = 100;
const GNU_LONG_NAME: &[u8] = b"././@LongLink";
/// Longest entry name accepted from a long-name record.
const MAX_NAME_LEN: u64 = 4096;

const ZERO_BLOCK: [u8; BLOCK_LEN] = [0; BLOCK_LEN];

#[derive(Debug)]
pub(crate) struct EntryHeader {
    pub name: String,
    pub size: u64,
}

pub(crate) fn write_header(
    writer: &mut impl Write,
    name: &str,
    meta: &FileMeta,
) -> io::Result<()> {
    let name_bytes = name.as_bytes();
    if name_bytes.len() > NAME_FIELD_LEN {
        write_long_name(writer, name_bytes)?;
    }

    let mut header = Header::new_gnu();
    {
        let fields = header.as_old_mut();
        let len = name_bytes.len().min(NAME_FIELD_LEN);
        fields.name[..len].copy_from_slice(&name_bytes[..len]);
    }
    header.set_entry_type(EntryType::Regular);
    header.set_size(meta.len);
    header.set_mode(meta.mode);
    header.set_mtime(meta.mtime);
    header.set_cksum();
    writer.write_all(header.as_bytes())
}

fn write_long_name(writer: &mut impl Write, name: &[u8]) -> io::Result<()> {
    let mut header = Header::new_gnu();
    {
        let fields = header.as_old_mut();
        fields.name[..GNU_LONG_NAME.len()].copy_from_slice(GNU_LONG_NAME);
    }
    header.set_entry_type(EntryType::GNULongName);
    header.set_size(name.len() as u64 + 1);
    header.set_mode(0o644);
    header.set_cksum();
    writer.write_all(header.as_bytes())?;
    writer.write_all(name)?;
    writer.write_all(&[0])?;
    write_padding(writer, name.len() as u64 + 1)
}

/// Pads the entry body out to the 512-byte block boundary.
pub(crate) fn write_padding(writer: &mut impl Write, body_len: u64) -> io::Result<()> {
    let partial = (body_len % BLOCK_LEN as u64) as usize;
    if partial != 0 {
        writer.write_all(&ZERO_BLOCK[..BLOCK_LEN - partial])?;
    }
    Ok(())
}

pub(crate) fn write_end_marker(writer: &mut impl Write) -> io::Result<()> {
    writer.write_all(&ZERO_BLOCK)?;
    writer.write_all(&ZERO_BLOCK)
}

/// Reads the next entry header, resolving GNU long-name records. Returns
/// `None` at the end-of-archive marker. The caller is expected to consume
/// (or skip) the body plus its padding before calling again.
pub(crate) fn read_next_header(reader: &mut impl Read) -> io::Result<Option<EntryHeader>> {
    let mut long_name = None;
    loop {
        let mut block = [0; BLOCK_LEN];
        reader.read_exact(&mut block)?;
        if block == ZERO_BLOCK {
            // End of archive. The second zero block may be missing if the
            // writer was cut off right after the first.
            let mut second = [0; BLOCK_LEN];
            match reader.read_exact(&mut second) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {}
                Err(err) => return Err(err),
            }
            return Ok(None);
        }

        let mut header = Header::new_old();
        header.as_mut_bytes().copy_from_slice(&block);
        if !checksum_matches(&header) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "entry header checksum mismatch",
            ));
        }
        let size = header.entry_size()?;

        if header.entry_type().is_gnu_longname() {
            long_name = Some(read_long_name(reader, size)?);
            continue;
        }

        let name = match long_name.take() {
            Some(name) => name,
            None => String::from_utf8(header.path_bytes().into_owned()).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "entry name is not valid UTF-8")
            })?,
        };
        return Ok(Some(EntryHeader { name, size }));
    }
}

/// The checksum field covers the whole header block with its own eight
/// bytes counted as spaces.
fn checksum_matches(header: &Header) -> bool {
    let bytes = header.as_bytes();
    let mut sum: u32 = 0;
    for (index, byte) in bytes.iter().enumerate() {
        if (148..156).contains(&index) {
            sum += u32::from(b' ');
        } else {
            sum += u32::from(*byte);
        }
    }
    header.cksum().map(|stored| stored == sum).unwrap_or(false)
}

fn read_long_name(reader: &mut impl Read, size: u64) -> io::Result<String> {
    if size > MAX_NAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "entry name record too long",
        ));
    }
    let mut body = vec![0; size as usize];
    reader.read_exact(&mut body)?;
    skip_padding(reader, size)?;
    while body.last() == Some(&0) {
        body.pop();
    }
    String::from_utf8(body)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "entry name is not valid UTF-8"))
}

/// Consumes the padding that follows a body of `body_len` bytes.
pub(crate) fn skip_padding(reader: &mut impl Read, body_len: u64) -> io::Result<()> {
    let partial = body_len % BLOCK_LEN as u64;
    if partial != 0 {
        let expected = BLOCK_LEN as u64 - partial;
        let skipped = io::copy(&mut reader.by_ref().take(expected), &mut io::sink())?;
        if skipped != expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "archive ended inside entry padding",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn meta(len: u64) -> FileMeta {
        FileMeta {
            len,
            mode: 0o644,
            mtime: 1_700_000_000,
            is_dir: false,
        }
    }

    fn write_entry(buf: &mut Vec<u8>, name: &str, body: &[u8]) {
        write_header(buf, name, &meta(body.len() as u64)).unwrap();
        buf.extend_from_slice(body);
        write_padding(buf, body.len() as u64).unwrap();
    }

    #[test]
    fn header_roundtrip() {
        let mut buf = Vec::new();
        write_entry(&mut buf, "/data/db/files/db1.dat", b"hello");
        write_end_marker(&mut buf).unwrap();

        let mut reader = Cursor::new(buf);
        let header = read_next_header(&mut reader).unwrap().unwrap();
        assert_eq!(header.name, "/data/db/files/db1.dat");
        assert_eq!(header.size, 5);

        let mut body = vec![0; 5];
        reader.read_exact(&mut body).unwrap();
        assert_eq!(&body, b"hello");
        skip_padding(&mut reader, 5).unwrap();
        assert!(read_next_header(&mut reader).unwrap().is_none());
    }

    #[test]
    fn long_name_roundtrip() {
        let name = format!("/deep/{}/leaf.dat", "x".repeat(150));
        let mut buf = Vec::new();
        write_entry(&mut buf, &name, b"");
        write_end_marker(&mut buf).unwrap();

        let mut reader = Cursor::new(buf);
        let header = read_next_header(&mut reader).unwrap().unwrap();
        assert_eq!(header.name, name);
        assert_eq!(header.size, 0);
        assert!(read_next_header(&mut reader).unwrap().is_none());
    }

    #[test]
    fn bodies_are_block_padded() {
        let mut buf = Vec::new();
        write_entry(&mut buf, "a", b"xyz");
        assert_eq!(buf.len(), BLOCK_LEN * 2);
        write_entry(&mut buf, "b", &[5; BLOCK_LEN]);
        assert_eq!(buf.len(), BLOCK_LEN * 4);
    }

    #[test]
    fn corrupt_header_is_rejected() {
        let mut buf = Vec::new();
        write_entry(&mut buf, "a", b"xyz");
        buf[60] ^= 0xff;
        let err = read_next_header(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn missing_second_zero_block_still_terminates() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&ZERO_BLOCK);
        assert!(read_next_header(&mut Cursor::new(buf)).unwrap().is_none());
    }
}
