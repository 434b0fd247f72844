//! Writing and reading whole tapes: label, cipher stream, entry container.

use std::io::{self, Read, Write};
use std::path::Path;

use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::debug;

use crate::entry;
use crate::error::{Error, Result};
use crate::label::Label;
use crate::stream::{DecryptingReader, EncryptingWriter};
use crate::vfs::Vfs;

/// The pair of RSA identities a tape operation runs under.
///
/// When writing, `public` encrypts the label and `private` signs it. When
/// reading, `private` decrypts the label and `public` verifies the
/// signature. The two roles stay distinct even when both halves come from
/// the same key pair: the public key always names the recipient, the
/// private key always names this side's identity.
#[derive(Clone)]
pub struct TapeKey {
    pub public: RsaPublicKey,
    pub private: RsaPrivateKey,
}

/// Streams files into an encrypted tape.
///
/// Does not own the underlying writer; after [`TapeWriter::finish`] hands
/// it back, closing it is the caller's job.
pub struct TapeWriter<W: Write> {
    label: Label,
    inner: EncryptingWriter<W>,
}

impl<W: Write> TapeWriter<W> {
    /// Generates a fresh label, writes it, and readies the cipher stream
    /// and entry encoder over `writer`.
    pub fn new(key: &TapeKey, mut writer: W) -> Result<Self> {
        let mut label =
            Label::random().map_err(|err| Error::LabelCreate(Box::new(err)))?;
        label.write(&mut writer, &key.public, &key.private)?;
        let inner = label.open_writer(writer)?;
        Ok(Self { label, inner })
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Appends one file. The entry name is `path` exactly as given, so an
    /// archive built from absolute paths restores to absolute paths.
    pub fn add_file(&mut self, fs: &dyn Vfs, path: &str) -> Result<()> {
        let meta = fs
            .metadata(path.as_ref())
            .map_err(|source| Error::StatFailed {
                path: path.to_owned(),
                source,
            })?;
        entry::write_header(&mut self.inner, path, &meta).map_err(|source| {
            Error::HeaderWrite {
                path: path.to_owned(),
                source,
            }
        })?;
        let mut input = fs.open(path.as_ref()).map_err(|source| Error::OpenInput {
            path: path.to_owned(),
            source,
        })?;
        let copied =
            io::copy(&mut input, &mut self.inner).map_err(|source| Error::CopyInput {
                path: path.to_owned(),
                source,
            })?;
        if copied != meta.len {
            // The header already promised `meta.len` bytes.
            return Err(Error::CopyInput {
                path: path.to_owned(),
                source: io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("file length changed during archiving: header says {}, copied {copied}", meta.len),
                ),
            });
        }
        entry::write_padding(&mut self.inner, copied).map_err(|source| Error::CopyInput {
            path: path.to_owned(),
            source,
        })?;
        debug!(path, size = meta.len, "added file to tape");
        Ok(())
    }

    /// Recursively appends every file under `path`, in walk order.
    /// Directories themselves produce no entries. The first error aborts
    /// the archive.
    pub fn add_directory(&mut self, fs: &dyn Vfs, path: &str) -> Result<()> {
        let files = fs.walk(path.as_ref()).map_err(|source| Error::StatFailed {
            path: path.to_owned(),
            source,
        })?;
        for file in files {
            match file.to_str() {
                Some(name) => self.add_file(fs, name)?,
                None => {
                    return Err(Error::OpenInput {
                        path: file.to_string_lossy().into_owned(),
                        source: io::Error::new(
                            io::ErrorKind::InvalidData,
                            "path is not valid UTF-8",
                        ),
                    })
                }
            }
        }
        Ok(())
    }

    /// Writes the end-of-archive marker, flushes the cipher stream, and
    /// hands back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        entry::write_end_marker(&mut self.inner).map_err(Error::Flush)?;
        self.inner.flush().map_err(Error::Flush)?;
        Ok(self.inner.into_inner())
    }
}

/// Reads an encrypted tape entry by entry.
///
/// Does not own the underlying reader.
pub struct TapeReader<R: Read> {
    label: Label,
    inner: DecryptingReader<R>,
    /// Set once the end-of-archive marker has been consumed.
    done: bool,
}

impl<R: Read> std::fmt::Debug for TapeReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapeReader")
            .field("label", &self.label)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<R: Read> TapeReader<R> {
    /// Reads and verifies the label, then readies the cipher stream and
    /// entry decoder over `reader`.
    pub fn open(key: &TapeKey, mut reader: R) -> Result<Self> {
        let label = Label::read(&mut reader, &key.private, &key.public)?;
        let inner = label.open_reader(reader)?;
        Ok(Self {
            label,
            inner,
            done: false,
        })
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Restores the next entry to the filesystem at its recorded name,
    /// creating parent directories as needed, file mode 0600. Returns the
    /// name, or `None` past the last entry.
    pub fn extract_next(&mut self, fs: &dyn Vfs) -> Result<Option<String>> {
        if self.done {
            return Ok(None);
        }
        let Some(header) = entry::read_next_header(&mut self.inner).map_err(Error::HeaderRead)?
        else {
            self.done = true;
            return Ok(None);
        };

        let path = Path::new(&header.name);
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs.mkdir_all(parent, 0o755)
                .map_err(|source| Error::OpenOutput {
                    path: header.name.clone(),
                    source,
                })?;
        }
        let mut output = fs.create(path).map_err(|source| Error::OpenOutput {
            path: header.name.clone(),
            source,
        })?;

        let copied = io::copy(&mut self.inner.by_ref().take(header.size), &mut output)
            .map_err(|source| Error::CopyInput {
                path: header.name.clone(),
                source,
            })?;
        if copied != header.size {
            return Err(Error::CopyInput {
                path: header.name.clone(),
                source: io::Error::new(io::ErrorKind::UnexpectedEof, "archive body ended early"),
            });
        }
        output.flush().map_err(|source| Error::CopyInput {
            path: header.name.clone(),
            source,
        })?;
        entry::skip_padding(&mut self.inner, header.size).map_err(Error::HeaderRead)?;
        debug!(path = header.name.as_str(), size = header.size, "extracted file from tape");
        Ok(Some(header.name))
    }

    /// Lists entry names in order, skipping bodies. Listing reads the
    /// stream through to the end-of-archive marker, so it consumes the
    /// reader: a tape cannot be listed and then extracted in one pass.
    pub fn contents(mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        while let Some(header) =
            entry::read_next_header(&mut self.inner).map_err(Error::HeaderRead)?
        {
            let skipped = io::copy(
                &mut self.inner.by_ref().take(header.size),
                &mut io::sink(),
            )
            .map_err(Error::HeaderRead)?;
            if skipped != header.size {
                return Err(Error::HeaderRead(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "archive body ended early",
                )));
            }
            entry::skip_padding(&mut self.inner, header.size).map_err(Error::HeaderRead)?;
            names.push(header.name);
        }
        Ok(names)
    }
}
