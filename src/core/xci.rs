//! XCI cartridge image access
//!
//! The catalog only needs a handful of things from an image: the metadata
//! produced by a [`MetadataParser`], the 512-byte certificate block, and the
//! ability to truncate the file to its used size.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, warn};

use crate::core::record::{GameMetadata, CERT_LEN};

/// Byte offset of the certificate block
pub const CERT_OFFSET: u64 = 0x7000;

/// Offset of the "HEAD" magic in the cartridge header
const HEADER_MAGIC_OFFSET: u64 = 0x100;
const HEADER_MAGIC: &[u8; 4] = b"HEAD";
const HEADER_LEN: usize = 0x100;
const MEDIA_UNIT: u64 = 0x200;

/// Extracts cartridge metadata from an image on disk
///
/// Parsing never fails hard: an image that cannot be read yields metadata
/// with an empty title or title id, which the catalog's validity check turns
/// into a retry on the next refresh.
pub trait MetadataParser: Send + Sync {
    fn parse(&self, path: &Path) -> GameMetadata;
}

/// Reads the plaintext cartridge header
///
/// Title, developer and title id live inside encrypted content and are left
/// empty here. Capacity, package sizes and the certificate are filled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct XciHeaderParser;

impl MetadataParser for XciHeaderParser {
    fn parse(&self, path: &Path) -> GameMetadata {
        let mut metadata = GameMetadata::default();

        match read_header(path) {
            Ok(header) => {
                metadata.capacity = header.capacity.to_string();
                metadata.used_size = header.used_size;
                metadata.size = header.file_size;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cartridge header");
                if let Ok(meta) = fs::metadata(path) {
                    metadata.size = meta.len();
                }
            }
        }

        metadata.certificate = read_certificate(path);
        metadata
    }
}

/// The plaintext fields of an XCI header the catalog uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XciHeader {
    pub capacity: &'static str,
    pub package_id: u64,
    pub used_size: u64,
    pub file_size: u64,
}

/// Read and validate the cartridge header
pub fn read_header(path: &Path) -> io::Result<XciHeader> {
    let mut file = File::open(path)?;
    let file_size = file.metadata()?.len();

    let mut header = [0u8; HEADER_LEN];
    file.seek(SeekFrom::Start(HEADER_MAGIC_OFFSET))?;
    file.read_exact(&mut header)?;

    if &header[0..4] != HEADER_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "missing HEAD magic",
        ));
    }

    let capacity = capacity_label(header[0x0D]);
    let package_id = u64::from_le_bytes(le_array(&header[0x10..0x18]));
    let valid_data_end = u32::from_le_bytes(le_array(&header[0x18..0x1C])) as u64;
    let used_size = (valid_data_end + 1) * MEDIA_UNIT;

    Ok(XciHeader {
        capacity,
        package_id,
        used_size,
        file_size,
    })
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Card capacity from the header's card size byte
pub fn capacity_label(card_size: u8) -> &'static str {
    match card_size {
        0xFA => "1GB",
        0xF8 => "2GB",
        0xF0 => "4GB",
        0xE0 => "8GB",
        0xE1 => "16GB",
        0xE2 => "32GB",
        _ => "?",
    }
}

/// Read the 512-byte certificate block
///
/// Returns a zero-filled block when the file is absent or too short.
pub fn read_certificate(path: &Path) -> Vec<u8> {
    let mut cert = vec![0u8; CERT_LEN];

    let Ok(mut file) = File::open(path) else {
        return cert;
    };

    if file.seek(SeekFrom::Start(CERT_OFFSET)).is_err() {
        return cert;
    }

    let mut filled = 0;
    while filled < CERT_LEN {
        match file.read(&mut cert[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "certificate read stopped early");
                break;
            }
        }
    }

    cert
}

/// Truncate an image in place to its used size
///
/// Irreversible. The used size must come from a fresh parse of this file.
pub fn trim_file(path: &Path, used_size: u64) -> io::Result<u64> {
    let file = OpenOptions::new().write(true).open(path)?;
    let current = file.metadata()?.len();

    if used_size == 0 || used_size > current {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "refusing to trim {} bytes to {} bytes",
                current, used_size
            ),
        ));
    }

    file.set_len(used_size)?;
    debug!(path = %path.display(), from = current, to = used_size, "trimmed image");
    Ok(current - used_size)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    /// Build a minimal image with a valid header and a certificate block
    pub(crate) fn write_test_image(path: &Path, used_units: u32, padding: usize, cert_byte: u8) {
        let mut data = vec![0u8; CERT_OFFSET as usize + CERT_LEN + padding];
        data[0x100..0x104].copy_from_slice(HEADER_MAGIC);
        data[0x10D] = 0xF8;
        data[0x110..0x118].copy_from_slice(&0x0102030405060708u64.to_le_bytes());
        data[0x118..0x11C].copy_from_slice(&used_units.to_le_bytes());
        for b in &mut data[CERT_OFFSET as usize..CERT_OFFSET as usize + CERT_LEN] {
            *b = cert_byte;
        }
        let mut file = File::create(path).unwrap();
        file.write_all(&data).unwrap();
    }

    #[test]
    fn test_read_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.xci");
        write_test_image(&path, 0x3F, 0, 0xFF);

        let header = read_header(&path).unwrap();
        assert_eq!(header.capacity, "2GB");
        assert_eq!(header.package_id, 0x0102030405060708);
        assert_eq!(header.used_size, 0x40 * 0x200);
        assert_eq!(header.file_size, CERT_OFFSET + CERT_LEN as u64);
    }

    #[test]
    fn test_read_header_rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.xci");
        fs::write(&path, vec![0u8; 0x400]).unwrap();

        let err = read_header(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_header_parser_never_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiny.xci");
        fs::write(&path, b"tiny").unwrap();

        let metadata = XciHeaderParser.parse(&path);
        assert!(metadata.title.is_empty());
        assert_eq!(metadata.size, 4);
        assert_eq!(metadata.certificate, vec![0u8; CERT_LEN]);
    }

    #[test]
    fn test_read_certificate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.xci");
        write_test_image(&path, 0x10, 0, 0xAB);

        let cert = read_certificate(&path);
        assert_eq!(cert.len(), CERT_LEN);
        assert!(cert.iter().all(|b| *b == 0xAB));
    }

    #[test]
    fn test_read_certificate_missing_file_is_zeroed() {
        let cert = read_certificate(Path::new("/nonexistent/game.xci"));
        assert_eq!(cert, vec![0u8; CERT_LEN]);
    }

    #[test]
    fn test_trim_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.xci");
        fs::write(&path, vec![1u8; 4096]).unwrap();

        let removed = trim_file(&path, 1024).unwrap();
        assert_eq!(removed, 3072);
        assert_eq!(fs::metadata(&path).unwrap().len(), 1024);
    }

    #[test]
    fn test_trim_file_refuses_to_grow() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.xci");
        fs::write(&path, vec![1u8; 100]).unwrap();

        assert!(trim_file(&path, 200).is_err());
        assert!(trim_file(&path, 0).is_err());
        assert_eq!(fs::metadata(&path).unwrap().len(), 100);
    }
}
