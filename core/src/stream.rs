//! AES-256-CTR transforms over plain byte streams.
//!
//! The transform is applied byte for byte; it adds no framing and keeps no
//! buffer beyond the cipher's own keystream block, so the wrapped stream can
//! be arbitrarily large. Encryption and decryption are the same keystream
//! XOR; the two types only differ in which side of the I/O call the
//! transform runs on.

use std::io::{self, Read, Write};

use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes256;

use crate::error::{Error, Result};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Encrypts everything written through it before handing the bytes to the
/// inner writer.
pub struct EncryptingWriter<W> {
    cipher: Aes256Ctr,
    inner: W,
}

impl<W: Write> EncryptingWriter<W> {
    pub(crate) fn new(key: &[u8], iv: &[u8], inner: W) -> Result<Self> {
        let cipher = Aes256Ctr::new_from_slices(key, iv).map_err(|_| Error::CipherInit)?;
        Ok(Self { cipher, inner })
    }

    /// Hands back the wrapped writer. The caller still owns and closes it.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for EncryptingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut block = buf.to_vec();
        self.cipher.apply_keystream(&mut block);
        self.inner.write_all(&block)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypts everything read through it after pulling the bytes from the
/// inner reader.
pub struct DecryptingReader<R> {
    cipher: Aes256Ctr,
    inner: R,
}

impl<R: Read> DecryptingReader<R> {
    pub(crate) fn new(key: &[u8], iv: &[u8], inner: R) -> Result<Self> {
        let cipher = Aes256Ctr::new_from_slices(key, iv).map_err(|_| Error::CipherInit)?;
        Ok(Self { cipher, inner })
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.inner.read(buf)?;
        self.cipher.apply_keystream(&mut buf[..len]);
        Ok(len)
    }
}
