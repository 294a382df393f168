//! Streaming block encryption of whole files.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::cipher::{AeadCipher, TAG_LEN, random_iv};
use super::format::{BLOCK_HEADER_LEN, BlockHeader, FileHeader, HEADER_LEN};
use crate::domain::errors::{Result, SidecarError};

pub const DEFAULT_BLOCK_LENGTH: u32 = 8192;

/// Encrypts and decrypts artifacts block by block.
///
/// Memory use is one block regardless of file size. Concurrent access to the
/// same path while a call is running is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileCodec {
    block_length: u32,
}

impl Default for FileCodec {
    fn default() -> Self {
        Self {
            block_length: DEFAULT_BLOCK_LENGTH,
        }
    }
}

impl FileCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block_length(block_length: u32) -> Result<Self> {
        if (block_length as usize) <= BLOCK_HEADER_LEN {
            return Err(SidecarError::format(format!(
                "block_length {block_length} must exceed the {BLOCK_HEADER_LEN}-byte framing"
            )));
        }
        Ok(Self { block_length })
    }

    pub fn block_length(&self) -> u32 {
        self.block_length
    }

    /// Plaintext bytes carried by one full block.
    pub fn block_data_len(&self) -> usize {
        self.block_length as usize - BLOCK_HEADER_LEN
    }

    /// Number of blocks a plaintext of `len` bytes needs. Never zero.
    pub fn packet_count(&self, len: u64) -> u64 {
        len.div_ceil(self.block_data_len() as u64).max(1)
    }

    pub fn encrypt_file(&self, src: &Path, dst: &Path, key: &[u8]) -> Result<FileHeader> {
        ensure_distinct(src, dst)?;
        let cipher = AeadCipher::new(key)?;
        remove_on_error(dst, self.encrypt_to(src, dst, &cipher))
    }

    pub fn decrypt_file(&self, src: &Path, dst: &Path, key: &[u8]) -> Result<u64> {
        ensure_distinct(src, dst)?;
        let cipher = AeadCipher::new(key)?;
        remove_on_error(dst, self.decrypt_to(src, dst, &cipher))
    }

    /// Encrypt `path` through a sibling temporary; the rename is the only
    /// visible change to `path`.
    pub fn encrypt_in_place(&self, path: &Path, key: &[u8]) -> Result<FileHeader> {
        let cipher = AeadCipher::new(key)?;
        let tmp = sibling_tmp(path);
        let header = remove_on_error(&tmp, self.encrypt_to(path, &tmp, &cipher))?;
        replace(&tmp, path)?;
        Ok(header)
    }

    pub fn decrypt_in_place(&self, path: &Path, key: &[u8]) -> Result<u64> {
        let cipher = AeadCipher::new(key)?;
        let tmp = sibling_tmp(path);
        let written = remove_on_error(&tmp, self.decrypt_to(path, &tmp, &cipher))?;
        replace(&tmp, path)?;
        Ok(written)
    }

    fn encrypt_to(&self, src: &Path, dst: &Path, cipher: &AeadCipher) -> Result<FileHeader> {
        let input = File::open(src).map_err(|e| SidecarError::io(src, e))?;
        let file_len = input.metadata().map_err(|e| SidecarError::io(src, e))?.len();
        let header = FileHeader::new(self.packet_count(file_len), self.block_length);

        let mut reader = BufReader::new(input);
        let mut writer = BufWriter::new(File::create(dst).map_err(|e| SidecarError::io(dst, e))?);
        let io = |e: std::io::Error| SidecarError::io(dst, e);

        writer.write_all(&header.encode()).map_err(io)?;
        let mut buf = vec![0u8; self.block_data_len()];
        for _ in 0..header.packet_count {
            let n = read_full(&mut reader, &mut buf).map_err(|e| SidecarError::io(src, e))?;
            let iv = random_iv();
            let tag = cipher.seal_in_place(&iv, b"", &mut buf[..n])?;
            writer
                .write_all(&BlockHeader::new(&iv, &tag)?.encode())
                .map_err(io)?;
            writer.write_all(&buf[..n]).map_err(io)?;
        }
        writer.flush().map_err(io)?;
        writer.get_ref().sync_all().map_err(io)?;

        debug!(
            src = %src.display(),
            bytes = file_len,
            packet_count = header.packet_count,
            "encrypted file"
        );
        Ok(header)
    }

    fn decrypt_to(&self, src: &Path, dst: &Path, cipher: &AeadCipher) -> Result<u64> {
        let input = File::open(src).map_err(|e| SidecarError::io(src, e))?;
        let file_len = input.metadata().map_err(|e| SidecarError::io(src, e))?.len();
        if file_len <= HEADER_LEN as u64 {
            return Err(SidecarError::format(format!(
                "{} is {file_len} bytes, too short for an encrypted file",
                src.display()
            )));
        }

        let mut reader = BufReader::new(input);
        let mut raw_header = [0u8; HEADER_LEN];
        reader
            .read_exact(&mut raw_header)
            .map_err(|e| SidecarError::io(src, e))?;
        let header = FileHeader::decode(&raw_header)?;
        let last_len = header.validate(file_len - HEADER_LEN as u64)?;

        let mut writer = BufWriter::new(File::create(dst).map_err(|e| SidecarError::io(dst, e))?);
        let mut buf = Vec::new();
        let mut written = 0u64;
        for index in 0..header.packet_count {
            let len = if index + 1 == header.packet_count {
                last_len
            } else {
                u64::from(header.block_length)
            };
            buf.resize(len as usize, 0);
            reader
                .read_exact(&mut buf)
                .map_err(|e| SidecarError::io(src, e))?;

            let (framing, ciphertext) = buf.split_at_mut(BLOCK_HEADER_LEN);
            let block = BlockHeader::decode(framing)?;
            if block.mac().len() != TAG_LEN {
                return Err(SidecarError::format(format!(
                    "block {index}: mac_len {} != {TAG_LEN}",
                    block.mac().len()
                )));
            }
            cipher
                .open_in_place(block.iv(), b"", ciphertext, block.mac())
                .map_err(|e| match e {
                    SidecarError::Integrity(msg) => {
                        SidecarError::Integrity(format!("block {index}: {msg}"))
                    }
                    other => other,
                })?;
            writer
                .write_all(ciphertext)
                .map_err(|e| SidecarError::io(dst, e))?;
            written += ciphertext.len() as u64;
        }
        writer.flush().map_err(|e| SidecarError::io(dst, e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| SidecarError::io(dst, e))?;

        debug!(src = %src.display(), bytes = written, "decrypted file");
        Ok(written)
    }
}

/// Fill `buf` from `reader`, stopping early only at end of file.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn ensure_distinct(src: &Path, dst: &Path) -> Result<()> {
    let same = src == dst
        || matches!(
            (fs::canonicalize(src), fs::canonicalize(dst)),
            (Ok(a), Ok(b)) if a == b
        );
    if same {
        return Err(SidecarError::format(format!(
            "source and destination are the same file: {}; use the in-place variant",
            src.display()
        )));
    }
    Ok(())
}

fn sibling_tmp(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.sealrun.tmp"))
}

fn replace(tmp: &Path, path: &Path) -> Result<()> {
    fs::rename(tmp, path).map_err(|e| {
        let _ = fs::remove_file(tmp);
        SidecarError::io(path, e)
    })
}

fn remove_on_error<T>(path: &Path, result: Result<T>) -> Result<T> {
    if result.is_err() {
        let _ = fs::remove_file(path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use rstest::rstest;

    fn write(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, data).unwrap();
        path
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[rstest]
    #[case::empty(0, 16)]
    #[case::one_byte(1, 32)]
    #[case::exact_block(8192 - 80, 16)]
    #[case::three_blocks(20_000, 16)]
    #[case::many_blocks(100_000, 32)]
    fn round_trip(#[case] len: usize, #[case] key_len: usize) {
        let dir = tempfile::tempdir().unwrap();
        let data = sample(len);
        let plain = write(dir.path(), "plain", &data);
        let sealed = dir.path().join("sealed");
        let opened = dir.path().join("opened");
        let key = vec![0x5a; key_len];

        let codec = FileCodec::new();
        let header = codec.encrypt_file(&plain, &sealed, &key).unwrap();
        assert_eq!(header.packet_count, codec.packet_count(len as u64));

        let written = codec.decrypt_file(&sealed, &opened, &key).unwrap();
        assert_eq!(written, len as u64);
        assert_eq!(fs::read(&opened).unwrap(), data);
    }

    #[test]
    fn twenty_thousand_bytes_take_three_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample(20_000);
        let path = write(dir.path(), "data.dat", &data);
        let codec = FileCodec::new();

        let header = codec.encrypt_in_place(&path, &[7u8; 16]).unwrap();
        assert_eq!(header.packet_count, 3);
        let on_disk = fs::read(&path).unwrap();
        assert_eq!(on_disk.len(), HEADER_LEN + 3 * BLOCK_HEADER_LEN + 20_000);
        assert_eq!(FileHeader::decode(&on_disk).unwrap().packet_count, 3);

        codec.decrypt_in_place(&path, &[7u8; 16]).unwrap();
        assert_eq!(fs::read(&path).unwrap(), data);
    }

    #[rstest]
    #[case::ciphertext(HEADER_LEN + BLOCK_HEADER_LEN + 5)]
    #[case::mac(HEADER_LEN + 48)]
    #[case::iv(HEADER_LEN + 8)]
    #[case::second_block(HEADER_LEN + 8192 + BLOCK_HEADER_LEN + 1)]
    fn tampering_is_detected(#[case] offset: usize) {
        let dir = tempfile::tempdir().unwrap();
        let plain = write(dir.path(), "plain", &sample(20_000));
        let sealed = dir.path().join("sealed");
        let opened = dir.path().join("opened");
        let codec = FileCodec::new();
        codec.encrypt_file(&plain, &sealed, &[1u8; 32]).unwrap();

        let mut bytes = fs::read(&sealed).unwrap();
        bytes[offset] ^= 0x01;
        fs::write(&sealed, &bytes).unwrap();

        let err = codec.decrypt_file(&sealed, &opened, &[1u8; 32]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(!opened.exists(), "no partial plaintext may remain");
    }

    #[test]
    fn wrong_key_is_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "x", b"secret rows");
        let codec = FileCodec::new();
        codec.encrypt_in_place(&path, &[1u8; 16]).unwrap();
        let sealed = fs::read(&path).unwrap();

        let err = codec.decrypt_in_place(&path, &[2u8; 16]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(fs::read(&path).unwrap(), sealed, "original must be untouched");
    }

    #[rstest]
    #[case::zero_block_length(FileHeader::new(1, 0))]
    #[case::overflow(FileHeader::new(u64::MAX, 8192))]
    fn malformed_headers_are_rejected(#[case] header: FileHeader) {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = header.encode().to_vec();
        bytes.extend_from_slice(&[0u8; 200]);
        let sealed = write(dir.path(), "sealed", &bytes);

        let err = FileCodec::new()
            .decrypt_file(&sealed, &dir.path().join("out"), &[0u8; 16])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn header_only_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let sealed = write(dir.path(), "sealed", &FileHeader::new(1, 8192).encode());
        let err = FileCodec::new()
            .decrypt_file(&sealed, &dir.path().join("out"), &[0u8; 16])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn invalid_key_size_is_reported_before_io() {
        let err = FileCodec::new()
            .encrypt_file(Path::new("/nonexistent/a"), Path::new("/nonexistent/b"), &[0u8; 20])
            .unwrap_err();
        assert!(matches!(err, SidecarError::InvalidKeySize(20)));
    }

    #[test]
    fn same_source_and_destination_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "x", b"data");
        let err = FileCodec::new().encrypt_file(&path, &path, &[0u8; 16]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn custom_block_length_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample(1000);
        let path = write(dir.path(), "x", &data);
        let codec = FileCodec::with_block_length(180).unwrap();

        let header = codec.encrypt_in_place(&path, &[4u8; 16]).unwrap();
        assert_eq!(header.packet_count, 10);
        codec.decrypt_in_place(&path, &[4u8; 16]).unwrap();
        assert_eq!(fs::read(&path).unwrap(), data);

        assert_eq!(FileCodec::with_block_length(80).unwrap_err().kind(), ErrorKind::Format);
    }
}
