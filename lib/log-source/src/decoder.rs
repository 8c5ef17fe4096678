//! Container-encoding detection (C1).
//!
//! Detects gzip/bzip2/zip/plain-text framing from the first bytes of an
//! object and produces an owned, UTF-8 decoded buffer. Decoding happens once;
//! every `FormatReader` then reads from (and rewinds over) the same buffer,
//! which is what the lifecycle note in the data model means by "read-at-position,
//! not forward-only".

use std::io::Read;

use crate::error::{self, Result};

const MIN_VALID_SIZE: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerEncoding {
    Gzip,
    Bzip2,
    Zip,
    PlainText,
}

/// First 16 bytes are enough to disambiguate every encoding this system
/// supports; unknown magic is a hard failure (`UnknownFormat`), matching the
/// "fail with kind UnknownFormat" rule in the decoder's contract.
///
/// Classification is delegated to `infer`'s magic-byte sniffing rather than
/// hand-rolled prefix checks: any archive type it recognizes that isn't one
/// of gzip/bzip2/zip is a genuinely unknown container for this system, while
/// anything it can't classify at all is assumed to be plain log text.
pub fn detect_encoding(head: &[u8]) -> Result<ContainerEncoding> {
    match infer::get(head) {
        Some(kind) if kind.mime_type() == "application/gzip" => Ok(ContainerEncoding::Gzip),
        Some(kind) if kind.mime_type() == "application/x-bzip2" => Ok(ContainerEncoding::Bzip2),
        Some(kind) if kind.mime_type() == "application/zip" => Ok(ContainerEncoding::Zip),
        Some(kind) if kind.matcher_type() == infer::MatcherType::Archive => {
            error::UnknownFormatSnafu.fail()
        }
        _ => Ok(ContainerEncoding::PlainText),
    }
}

/// Returns `None` when the object is too small to hold valid contents; the
/// caller turns that into an ignored object with reason "no valid contents".
pub fn decode_object(bytes: &[u8], advertised_size: u64) -> Result<Option<String>> {
    if advertised_size < MIN_VALID_SIZE || (bytes.len() as u64) < MIN_VALID_SIZE {
        return Ok(None);
    }
    let head = &bytes[..bytes.len().min(16)];
    let text = match detect_encoding(head)? {
        ContainerEncoding::Gzip => {
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(bytes)
                .read_to_end(&mut out)
                .map_err(|source| error::Error::Io { source })?;
            lossy_utf8(out)
        }
        ContainerEncoding::Bzip2 => {
            let mut out = Vec::new();
            bzip2::read::BzDecoder::new(bytes)
                .read_to_end(&mut out)
                .map_err(|source| error::Error::Io { source })?;
            lossy_utf8(out)
        }
        ContainerEncoding::Zip => {
            let reader = std::io::Cursor::new(bytes);
            let mut archive =
                zip::ZipArchive::new(reader).map_err(|source| error::Error::Io {
                    source: std::io::Error::new(std::io::ErrorKind::InvalidData, source),
                })?;
            if archive.is_empty() {
                return error::EmptyZipArchiveSnafu.fail();
            }
            let mut entry = archive
                .by_index(0)
                .map_err(|source| error::Error::Io {
                    source: std::io::Error::new(std::io::ErrorKind::InvalidData, source),
                })?;
            let mut out = Vec::new();
            entry
                .read_to_end(&mut out)
                .map_err(|source| error::Error::Io { source })?;
            lossy_utf8(out)
        }
        ContainerEncoding::PlainText => lossy_utf8(bytes.to_vec()),
    };
    Ok(Some(text))
}

fn lossy_utf8(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_gzip_magic() {
        assert_eq!(
            detect_encoding(&[0x1f, 0x8b, 0x08]).unwrap(),
            ContainerEncoding::Gzip
        );
    }

    #[test]
    fn detects_bzip2_magic() {
        assert_eq!(
            detect_encoding(b"BZh91AY").unwrap(),
            ContainerEncoding::Bzip2
        );
    }

    #[test]
    fn detects_zip_magic() {
        assert_eq!(
            detect_encoding(b"PK\x03\x04\x14\x00").unwrap(),
            ContainerEncoding::Zip
        );
    }

    #[test]
    fn unrecognized_archive_type_fails() {
        // xz magic bytes: an archive format this system does not support.
        assert!(detect_encoding(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]).is_err());
    }

    #[test]
    fn undersized_object_is_none() {
        assert!(decode_object(b"too small", 9).unwrap().is_none());
    }

    #[test]
    fn plain_text_roundtrips() {
        let body = b"time host msg\n2024-01-01T00:00:00Z h1 hello\n".to_vec();
        let decoded = decode_object(&body, body.len() as u64).unwrap().unwrap();
        assert!(decoded.contains("hello"));
    }
}
