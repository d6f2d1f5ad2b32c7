use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn sha256_reader_hex(reader: &mut dyn Read) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 16 * 1024];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Looks up `file_name` in a `sha256sum`-style listing (`<hex>  <name>`).
pub fn find_listed_checksum<'a>(listing: &'a str, file_name: &str) -> Option<&'a str> {
    listing.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let digest = fields.next()?;
        let name = fields.next()?.trim_start_matches('*');
        (name == file_name).then_some(digest)
    })
}

pub fn verify_sha256_file(path: &Path, expected_hex: &str) -> Result<()> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let actual = sha256_reader_hex(&mut file)
        .with_context(|| format!("failed to hash {}", path.display()))?;
    if !actual.eq_ignore_ascii_case(expected_hex.trim()) {
        return Err(anyhow!(
            "checksum-mismatch: {} has sha256 {actual}, release lists {}",
            path.display(),
            expected_hex.trim()
        ));
    }
    Ok(())
}
