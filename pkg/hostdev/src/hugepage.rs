//! 2 MiB hugepage provisioning for SR-IOV and GVT-d graphics.

use std::time::Duration;

use tracing::info;

use civ_constants::paths::{SYS_HUGEPAGES_FREE, SYS_HUGEPAGES_NR};

use crate::error::HostDevError;
use crate::sysfs::{read_decimal, write_string};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const POLL_ATTEMPTS: u32 = 200;

/// Parse a memory size with an optional trailing `M` (default) or `G`
/// suffix, returning the size in megabytes.
fn parse_mem_mb(spec: &str) -> Result<i64, HostDevError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(HostDevError::BadMemSize(spec.to_string()));
    }
    let (digits, multiplier) = match spec.chars().last().unwrap() {
        'G' | 'g' => (&spec[..spec.len() - 1], 1024),
        'M' | 'm' => (&spec[..spec.len() - 1], 1),
        c if c.is_ascii_digit() => (spec, 1),
        _ => return Err(HostDevError::BadMemSize(spec.to_string())),
    };
    let value: i64 = digits.parse().map_err(|_| HostDevError::BadMemSize(spec.to_string()))?;
    if value <= 0 {
        return Err(HostDevError::BadMemSize(spec.to_string()));
    }
    value
        .checked_mul(multiplier)
        .ok_or_else(|| HostDevError::BadMemSize(spec.to_string()))
}

/// Ensure enough free 2 MiB hugepages exist to back `mem_size` of guest
/// RAM, requesting more from the kernel and polling for satisfaction if
/// not.
pub async fn provision(mem_size: &str) -> Result<(), HostDevError> {
    let mem_mb = parse_mem_mb(mem_size)?;
    let needed_pages = mem_mb / 2;

    let free = read_decimal(SYS_HUGEPAGES_FREE)?;
    if free >= needed_pages {
        return Ok(());
    }

    let nr = read_decimal(SYS_HUGEPAGES_NR)?;
    let required = nr - free + needed_pages;
    write_string(SYS_HUGEPAGES_NR, &required.to_string())?;

    for _ in 0..POLL_ATTEMPTS {
        if read_decimal(SYS_HUGEPAGES_NR)? == required {
            info!(required, "hugepages provisioned");
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    Err(HostDevError::HugepageTimeout(required))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bare_megabyte_value() {
        assert_eq!(parse_mem_mb("2048").unwrap(), 2048);
    }

    #[test]
    fn parses_an_explicit_megabyte_suffix() {
        assert_eq!(parse_mem_mb("512M").unwrap(), 512);
    }

    #[test]
    fn parses_a_gigabyte_suffix() {
        assert_eq!(parse_mem_mb("4G").unwrap(), 4096);
    }

    #[test]
    fn rejects_an_unparseable_size() {
        assert!(parse_mem_mb("lots").is_err());
        assert!(parse_mem_mb("").is_err());
        assert!(parse_mem_mb("-5M").is_err());
    }
}
