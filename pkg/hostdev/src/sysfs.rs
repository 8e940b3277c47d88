//! Thin wrappers around sysfs file reads/writes shared by every host helper.

use std::path::Path;

use crate::error::HostDevError;

pub fn read_string(path: impl AsRef<Path>) -> Result<String, HostDevError> {
    let path = path.as_ref();
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| HostDevError::Read {
            path: path.display().to_string(),
            source,
        })
}

pub fn read_decimal(path: impl AsRef<Path>) -> Result<i64, HostDevError> {
    let path = path.as_ref();
    let raw = read_string(path)?;
    raw.parse::<i64>().map_err(|_| HostDevError::Read {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, "not a decimal integer"),
    })
}

pub fn read_hex(path: impl AsRef<Path>) -> Result<u32, HostDevError> {
    let path = path.as_ref();
    let raw = read_string(path)?;
    let raw = raw.trim_start_matches("0x");
    u32::from_str_radix(raw, 16).map_err(|_| HostDevError::Read {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, "not a hex integer"),
    })
}

pub fn write_string(path: impl AsRef<Path>, value: &str) -> Result<(), HostDevError> {
    let path = path.as_ref();
    std::fs::write(path, value).map_err(|source| HostDevError::Write {
        path: path.display().to_string(),
        source,
    })
}

/// Whether `driver_link` (a `.../driver` symlink) points at `vfio-pci`.
pub fn is_vfio_driver(driver_link: impl AsRef<Path>) -> bool {
    std::fs::read_link(driver_link)
        .ok()
        .and_then(|target| target.file_name().map(|n| n.to_string_lossy().into_owned()))
        .is_some_and(|name| name == civ_constants::paths::VFIO_PCI_DRIVER)
}
