//! The tape label: the fixed-size cryptographic header of an archive.
//!
//! A label is a random AES-256 session key plus a random counter-mode IV.
//! On the wire it occupies exactly two RSA-modulus-sized chunks: first the
//! PKCS#1 v1.5 encryption of `session_key ‖ iv` under the recipient public
//! key, then a PKCS#1 v1.5 signature over SHA-256 of the same 48 bytes
//! under the sender private key. Encrypting only the small fixed-size label
//! keeps the asymmetric work constant per archive; the body rides on the
//! symmetric stream the label unlocks.
//!
//! The reader consumes `modulus_bytes(decryption key)` bytes of ciphertext
//! and `modulus_bytes(verification key)` bytes of signature, so the two
//! sides do not need key pairs of identical size.

use std::fmt;
use std::io::{Read, Write};

use rand::rngs::OsRng;
use rand::RngCore;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::stream::{DecryptingReader, EncryptingWriter};

const SESSION_KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const HEADER_LEN: usize = SESSION_KEY_LEN + IV_LEN;

pub struct Label {
    session_key: [u8; SESSION_KEY_LEN],
    iv: [u8; IV_LEN],
    /// Modulus-sized; empty until the label has been written or verified.
    signature: Vec<u8>,
}

impl Label {
    /// Produces a label with a fresh session key and IV.
    pub fn random() -> Result<Self> {
        let mut label = Label {
            session_key: [0; SESSION_KEY_LEN],
            iv: [0; IV_LEN],
            signature: Vec::new(),
        };
        OsRng
            .try_fill_bytes(&mut label.session_key)
            .map_err(Error::Random)?;
        OsRng.try_fill_bytes(&mut label.iv).map_err(Error::Random)?;
        Ok(label)
    }

    fn header(&self) -> [u8; HEADER_LEN] {
        let mut header = [0; HEADER_LEN];
        header[..SESSION_KEY_LEN].copy_from_slice(&self.session_key);
        header[SESSION_KEY_LEN..].copy_from_slice(&self.iv);
        header
    }

    /// Serializes the label: encrypted header first, signature second. Body
    /// data must not be written until both chunks are out.
    pub fn write(
        &mut self,
        writer: &mut impl Write,
        enc_key: &RsaPublicKey,
        sign_key: &RsaPrivateKey,
    ) -> Result<()> {
        let header = self.header();
        let encrypted = enc_key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, &header)
            .map_err(|err| Error::LabelWrite(err.into()))?;
        writer
            .write_all(&encrypted)
            .map_err(|err| Error::LabelWrite(err.into()))?;

        let digest: [u8; 32] = Sha256::digest(header).into();
        self.signature = sign_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|err| Error::LabelWrite(err.into()))?;
        writer
            .write_all(&self.signature)
            .map_err(|err| Error::LabelWrite(err.into()))?;
        Ok(())
    }

    /// Reads a label back, decrypting with the recipient private key and
    /// checking the signature against the sender public key.
    pub fn read(
        reader: &mut impl Read,
        dec_key: &RsaPrivateKey,
        verify_key: &RsaPublicKey,
    ) -> Result<Self> {
        let mut encrypted = vec![0; dec_key.size()];
        reader.read_exact(&mut encrypted).map_err(Error::LabelRead)?;
        let header = dec_key
            .decrypt(Pkcs1v15Encrypt, &encrypted)
            .map_err(Error::LabelDecrypt)?;
        if header.len() != HEADER_LEN {
            // A wrong key occasionally yields well-padded garbage of some
            // other length.
            return Err(Error::LabelDecrypt(rsa::Error::Decryption));
        }
        let mut label = Label {
            session_key: [0; SESSION_KEY_LEN],
            iv: [0; IV_LEN],
            signature: Vec::new(),
        };
        label.session_key.copy_from_slice(&header[..SESSION_KEY_LEN]);
        label.iv.copy_from_slice(&header[SESSION_KEY_LEN..]);

        let mut signature = vec![0; verify_key.size()];
        reader.read_exact(&mut signature).map_err(Error::LabelRead)?;
        let digest: [u8; 32] = Sha256::digest(label.header()).into();
        verify_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
            .map_err(Error::LabelSignature)?;
        label.signature = signature;
        Ok(label)
    }

    /// Wraps `writer` in the label's encrypting stream transform.
    pub fn open_writer<W: Write>(&self, writer: W) -> Result<EncryptingWriter<W>> {
        EncryptingWriter::new(&self.session_key, &self.iv, writer)
    }

    /// Wraps `reader` in the label's decrypting stream transform.
    pub fn open_reader<R: Read>(&self, reader: R) -> Result<DecryptingReader<R>> {
        DecryptingReader::new(&self.session_key, &self.iv, reader)
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never expose the session key.
        f.debug_struct("Label").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use once_cell::sync::Lazy;
    use std::io::Cursor;

    static KEY: Lazy<RsaPrivateKey> = Lazy::new(|| RsaPrivateKey::new(&mut OsRng, 2048).unwrap());
    static OTHER_KEY: Lazy<RsaPrivateKey> =
        Lazy::new(|| RsaPrivateKey::new(&mut OsRng, 2048).unwrap());

    fn written_label() -> (Label, Vec<u8>) {
        let mut label = Label::random().unwrap();
        let mut buf = Vec::new();
        label.write(&mut buf, &KEY.to_public_key(), &KEY).unwrap();
        (label, buf)
    }

    #[test]
    fn random_labels_differ() {
        let first = Label::random().unwrap();
        let second = Label::random().unwrap();
        assert_ne!(first.session_key, second.session_key);
        assert_ne!(first.iv, second.iv);
    }

    #[test]
    fn roundtrip() {
        let (label, buf) = written_label();
        assert_eq!(buf.len(), KEY.size() * 2);

        let read = Label::read(&mut Cursor::new(&buf), &KEY, &KEY.to_public_key()).unwrap();
        assert_eq!(read.session_key, label.session_key);
        assert_eq!(read.iv, label.iv);
        assert_eq!(read.signature, label.signature);
    }

    #[test]
    fn wrong_decryption_key() {
        let (_, buf) = written_label();
        let err =
            Label::read(&mut Cursor::new(&buf), &OTHER_KEY, &KEY.to_public_key()).unwrap_err();
        assert!(matches!(err, Error::LabelDecrypt(_)), "got {err:?}");
    }

    #[test]
    fn wrong_verification_key() {
        let (_, buf) = written_label();
        let err =
            Label::read(&mut Cursor::new(&buf), &KEY, &OTHER_KEY.to_public_key()).unwrap_err();
        assert!(matches!(err, Error::LabelSignature(_)), "got {err:?}");
    }

    #[test]
    fn tampered_ciphertext_rejected() {
        let (_, mut buf) = written_label();
        buf[5] ^= 0x40;
        let err = Label::read(&mut Cursor::new(&buf), &KEY, &KEY.to_public_key()).unwrap_err();
        assert!(
            matches!(err, Error::LabelDecrypt(_) | Error::LabelSignature(_)),
            "got {err:?}"
        );
    }

    #[test]
    fn tampered_signature_rejected() {
        let (_, mut buf) = written_label();
        let offset = KEY.size() + 5;
        buf[offset] ^= 0x40;
        let err = Label::read(&mut Cursor::new(&buf), &KEY, &KEY.to_public_key()).unwrap_err();
        assert!(matches!(err, Error::LabelSignature(_)), "got {err:?}");
    }

    #[test]
    fn truncated_label_rejected() {
        let (_, buf) = written_label();
        let err = Label::read(
            &mut Cursor::new(&buf[..KEY.size() + 10]),
            &KEY,
            &KEY.to_public_key(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::LabelRead(_)), "got {err:?}");
    }
}
