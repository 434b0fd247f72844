use std::path::Path;

use anyhow::{bail, Context, Result};
use magtape_core::{Keystore, OsFs, TapeKey, TapeReader, TapeWriter};
use tracing::{info, warn};

pub fn open_keystore(name: &str) -> Result<Keystore> {
    Keystore::open_named(&OsFs, name)
        .with_context(|| format!("failed to open keystore `{name}`"))
}

pub fn tape_key(keystore: &Keystore, privkey: &str, pubkey: &str) -> Result<TapeKey> {
    let private = keystore
        .find_private(privkey)
        .with_context(|| format!("private key `{privkey}` not found in keystore"))?;
    let public = keystore
        .find_public(pubkey)
        .with_context(|| format!("public key `{pubkey}` not found in keystore"))?;
    Ok(TapeKey { public, private })
}

pub fn pack(
    archive: &Path,
    keystore_name: &str,
    privkey: &str,
    pubkey: &str,
    dir: Option<&str>,
    files: &[String],
) -> Result<()> {
    if dir.is_none() && files.is_empty() {
        bail!("nothing to pack: pass files or --dir");
    }
    let keystore = open_keystore(keystore_name)?;
    let key = tape_key(&keystore, privkey, pubkey)?;

    let output = fs_err::File::create(archive)
        .with_context(|| format!("failed to create archive {}", archive.display()))?;
    let mut tape = TapeWriter::new(&key, output)?;
    for file in files {
        // Keep going when a listed file cannot be added.
        if let Err(err) = tape.add_file(&OsFs, file) {
            warn!(%err, %file, "failed to add file to tape");
        }
    }
    if let Some(dir) = dir {
        tape.add_directory(&OsFs, dir)?;
    }
    tape.finish()?;
    info!(archive = %archive.display(), "tape written");
    Ok(())
}

pub fn unpack(archive: &Path, keystore_name: &str, privkey: &str, pubkey: &str) -> Result<()> {
    let keystore = open_keystore(keystore_name)?;
    let key = tape_key(&keystore, privkey, pubkey)?;

    let input = fs_err::File::open(archive)
        .with_context(|| format!("failed to open archive {}", archive.display()))?;
    let mut tape = TapeReader::open(&key, input)?;
    let mut count = 0u64;
    while let Some(path) = tape.extract_next(&OsFs)? {
        info!(%path, "restored");
        count += 1;
    }
    info!(count, "tape restored");
    Ok(())
}

pub fn contents(archive: &Path, keystore_name: &str, privkey: &str, pubkey: &str) -> Result<()> {
    let keystore = open_keystore(keystore_name)?;
    let key = tape_key(&keystore, privkey, pubkey)?;

    let input = fs_err::File::open(archive)
        .with_context(|| format!("failed to open archive {}", archive.display()))?;
    let tape = TapeReader::open(&key, input)?;
    for name in tape.contents()? {
        println!("{name}");
    }
    Ok(())
}
