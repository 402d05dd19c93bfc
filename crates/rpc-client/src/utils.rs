use std::time::Duration;

use anyhow::{anyhow, Result};

pub(crate) const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub(crate) fn to_quantity(n: u64) -> String {
    format!("{:#x}", n)
}

pub(crate) fn parse_quantity(s: &str) -> Result<u64> {
    let hex = s
        .strip_prefix("0x")
        .ok_or_else(|| anyhow!("quantity must start with 0x: {}", s))?;
    Ok(u64::from_str_radix(hex, 16)?)
}

pub(crate) fn to_hex_data(data: &[u8]) -> String {
    format!("0x{}", faster_hex::hex_string(data))
}

pub(crate) fn parse_hex_data(s: &str) -> Result<Vec<u8>> {
    let hex = s.strip_prefix("0x").unwrap_or(s);
    if hex.is_empty() {
        return Ok(Vec::new());
    }
    if hex.len() % 2 != 0 {
        return Err(anyhow!("odd length hex data"));
    }
    let mut buf = vec![0u8; hex.len() / 2];
    faster_hex::hex_decode(hex.as_bytes(), &mut buf)?;
    Ok(buf)
}
