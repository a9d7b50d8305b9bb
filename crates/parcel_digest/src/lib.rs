#![deny(missing_docs)]

//! Hashing helpers for parcel archives.
//!
//! Parcel names every packaged archive after the [`Sha256`] digest of its bytes, rendered as 64
//! lowercase hex characters. The helpers here are generic over [`Digest`] so tests and callers can
//! swap the algorithm, but the archive store only ever uses SHA-256.
//!
//! ```no_run
//! use parcel_digest::{compute_file_digest, content_name, Sha256};
//!
//! let digest = compute_file_digest::<Sha256>("archive.zip").unwrap();
//! println!("stored as {}", content_name(&digest));
//! ```

pub use digest;

use digest::{Digest, Output};
use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

pub use sha2::Sha256;

/// The output of a SHA256 hash.
pub type Sha256Hash = sha2::digest::Output<Sha256>;

/// Hashes the file at `path`.
pub fn compute_file_digest<D: Digest + Default + Write>(
    path: impl AsRef<Path>,
) -> Result<Output<D>, std::io::Error> {
    let mut file = File::open(path)?;
    compute_reader_digest::<D>(&mut file)
}

/// Hashes everything that can be read from `reader`, until end of stream.
pub fn compute_reader_digest<D: Digest + Default + Write>(
    reader: &mut impl Read,
) -> Result<Output<D>, std::io::Error> {
    let mut hasher = D::default();
    std::io::copy(reader, &mut hasher)?;
    Ok(hasher.finalize())
}

/// Hashes an in-memory buffer.
pub fn compute_bytes_digest<D: Digest + Default>(bytes: impl AsRef<[u8]>) -> Output<D> {
    let mut hasher = D::default();
    hasher.update(bytes);
    hasher.finalize()
}

/// The file name an archive with this digest is stored under.
pub fn content_name(hash: &Sha256Hash) -> String {
    format!("{hash:x}")
}

/// Parses a hex string back into a digest. Returns `None` for anything that is not exactly the
/// digest's length in hex.
pub fn parse_digest_from_hex<D: Digest>(str: &str) -> Option<Output<D>> {
    let mut hash = <Output<D>>::default();
    hex::decode_to_slice(str, &mut hash).ok()?;
    Some(hash)
}

/// Forwards writes to an inner writer and hashes every byte the inner writer accepted.
///
/// [`HashingWriter::finalize`] hands back the writer together with the digest.
pub struct HashingWriter<W, D: Digest> {
    writer: W,
    hasher: D,
}

impl<W, D: Digest + Default> HashingWriter<W, D> {
    /// Wraps `writer` with an empty hasher.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            hasher: D::default(),
        }
    }
}

impl<W, D: Digest> HashingWriter<W, D> {
    /// Returns the inner writer and the digest of everything written so far.
    pub fn finalize(self) -> (W, Output<D>) {
        (self.writer, self.hasher.finalize())
    }
}

impl<W: Write, D: Digest> Write for HashingWriter<W, D> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.writer.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
