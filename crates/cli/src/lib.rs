use std::fs;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};

pub mod commands;

/// Compute the SHA-256 hash of a file and return it as a hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read file for hashing: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let digest = hasher.finalize();
    Ok(format!("{:x}", digest))
}

/// Parse an address given as `0x`-prefixed hex or plain decimal.
///
/// Underscores are accepted as digit separators (`0xffff_fff0_0700_4000`).
pub fn parse_address(raw: &str) -> Result<u64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != '_').collect();
    let parsed = match cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => cleaned.parse::<u64>(),
    };
    parsed.map_err(|_| anyhow!("Invalid address '{}'. Use hex (0x...) or decimal.", raw))
}

/// Name to record for an image when the binary carries no install name.
pub fn file_display_name(path: &Path) -> String {
    path.file_name().and_then(|os| os.to_str()).unwrap_or("unnamed-image").to_string()
}
