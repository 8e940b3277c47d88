//! PCI/VFIO passthrough: rebind a device (and every device sharing its
//! IOMMU group) to `vfio-pci`, and rebind it back on teardown.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use civ_constants::paths::{SYS_PCI_DEVICES, SYS_PCI_DRIVERS, SYS_PCI_DRIVERS_PROBE, VFIO_PCI_DRIVER};

use crate::endcall::EndCallQueue;
use crate::error::HostDevError;
use crate::sysfs::{is_vfio_driver, read_hex, write_string};

const UNBIND_POLL_INTERVAL: Duration = Duration::from_millis(1);
const UNBIND_POLL_ATTEMPTS: u32 = 2000;

fn new_id_path() -> PathBuf {
    Path::new(SYS_PCI_DRIVERS).join(VFIO_PCI_DRIVER).join("new_id")
}

fn remove_id_path() -> PathBuf {
    Path::new(SYS_PCI_DRIVERS).join(VFIO_PCI_DRIVER).join("remove_id")
}

fn unbind_path() -> PathBuf {
    Path::new(SYS_PCI_DRIVERS).join(VFIO_PCI_DRIVER).join("unbind")
}

fn device_dir(bdf: &str) -> PathBuf {
    Path::new(SYS_PCI_DEVICES).join(bdf)
}

/// Every device sharing `bdf`'s IOMMU group, as bus-device-function strings.
fn iommu_group_members(bdf: &str) -> Result<Vec<String>, HostDevError> {
    let group_dir = device_dir(bdf).join("iommu_group").join("device");
    if !group_dir.is_dir() {
        return Err(HostDevError::IommuGroupMissing(bdf.to_string()));
    }
    let mut members = Vec::new();
    let entries = std::fs::read_dir(&group_dir).map_err(|source| crate::error::HostDevError::Read {
        path: group_dir.display().to_string(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| crate::error::HostDevError::Read {
            path: group_dir.display().to_string(),
            source,
        })?;
        members.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(members)
}

fn write_new_id(vendor_device: &str) -> Result<(), HostDevError> {
    match write_string(new_id_path(), vendor_device) {
        Ok(()) => Ok(()),
        Err(HostDevError::Write { source, .. }) if source.raw_os_error() == Some(libc_eexist()) => {
            let _ = write_string(remove_id_path(), vendor_device);
            write_string(new_id_path(), vendor_device)
        }
        Err(e) => Err(e),
    }
}

fn libc_eexist() -> i32 {
    17 // EEXIST, stable across Linux architectures this project targets.
}

/// Path of a PCI device's Nth virtual function's `enable` sysfs file.
pub fn device_bdf_path(pf_bdf: &str, vf_index: u32) -> PathBuf {
    device_dir(pf_bdf).with_file_name(format!("{pf_bdf}.{vf_index}")).join("enable")
}

/// Write a `<vendor> <device>` pair to the passthrough driver's `new_id`,
/// retrying once via `remove_id` on `EEXIST`.
pub fn vfio_new_id(vendor_device: &str) -> Result<(), HostDevError> {
    write_new_id(vendor_device)
}

/// Write a `<vendor> <device>` pair to the passthrough driver's `remove_id`.
pub fn vfio_remove_id(vendor_device: &str) -> Result<(), HostDevError> {
    write_string(remove_id_path(), vendor_device)
}

async fn wait_unbound(member_bdf: &str) -> Result<(), HostDevError> {
    let driver_link = device_dir(member_bdf).join("driver");
    for _ in 0..UNBIND_POLL_ATTEMPTS {
        if !driver_link.exists() {
            return Ok(());
        }
        tokio::time::sleep(UNBIND_POLL_INTERVAL).await;
    }
    Err(HostDevError::UnbindTimeout(member_bdf.to_string()))
}

async fn attach_member(member_bdf: &str) -> Result<(), HostDevError> {
    let driver_link = device_dir(member_bdf).join("driver");
    if driver_link.exists() {
        let vendor = read_hex(device_dir(member_bdf).join("vendor"))?;
        let device = read_hex(device_dir(member_bdf).join("device"))?;
        let vendor_device = format!("{vendor:x} {device:x}");

        if is_vfio_driver(&driver_link) {
            let _ = write_string(remove_id_path(), &vendor_device);
        }
        write_string(unbind_path(), member_bdf)?;
        wait_unbound(member_bdf).await?;
        write_new_id(&vendor_device)?;
    }
    Ok(())
}

fn restore_member(member_bdf: &str) -> Result<(), HostDevError> {
    let driver_link = device_dir(member_bdf).join("driver");
    if is_vfio_driver(&driver_link) {
        let vendor = read_hex(device_dir(member_bdf).join("vendor"))?;
        let device = read_hex(device_dir(member_bdf).join("device"))?;
        write_string(remove_id_path(), &format!("{vendor:x} {device:x}"))?;
        write_string(unbind_path(), member_bdf)?;
    }
    write_string(SYS_PCI_DRIVERS_PROBE, member_bdf)?;
    Ok(())
}

/// Rebind `bdf` (and every device in its IOMMU group) to `vfio-pci`,
/// registering a matching restore action in `queue`.
pub async fn attach(bdf: &str, queue: &EndCallQueue) -> Result<(), HostDevError> {
    let members = iommu_group_members(bdf)?;
    for member in &members {
        attach_member(member).await?;
    }
    info!(bdf, group_size = members.len(), "attached PCI device for passthrough");

    let restore_bdf = bdf.to_string();
    queue.push(Box::new(move || {
        if let Err(e) = restore(&restore_bdf) {
            warn!(bdf = %restore_bdf, error = %e, "failed to restore passthrough device");
        }
    }));
    Ok(())
}

/// Rebind every device in `bdf`'s IOMMU group back to its native driver.
/// Called directly by the restore closure `attach` registers, and
/// available standalone for callers that manage their own teardown order.
pub fn restore(bdf: &str) -> Result<(), HostDevError> {
    let members = iommu_group_members(bdf)?;
    for member in &members {
        restore_member(member)?;
        std::thread::sleep(Duration::from_secs(1));
    }
    info!(bdf, "restored PCI device to its native driver");
    Ok(())
}
