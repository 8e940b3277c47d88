//! SR-IOV virtual function selection for the integrated GPU.

use std::path::Path;

use tracing::info;

use civ_constants::coproc::MAX_SRIOV_VFS;
use civ_constants::paths::SYS_PCI_DEVICES;

use crate::error::HostDevError;
use crate::pci::{device_bdf_path, vfio_new_id, vfio_remove_id};
use crate::sysfs::{is_vfio_driver, read_decimal, read_hex, write_string};

const GPU_BDF: &str = civ_constants::paths::INTEL_GPU_BDF;

fn gpu_dir() -> std::path::PathBuf {
    Path::new(SYS_PCI_DEVICES).join(GPU_BDF)
}

/// Cap the GPU's total VFs to `MAX_SRIOV_VFS`, re-probing if the host
/// offers more than that, then return the index of the first VF whose
/// `enable` file still reads `0`.
pub async fn select_free_vf() -> Result<u32, HostDevError> {
    let total = read_decimal(gpu_dir().join("sriov_totalvfs"))?;
    if total <= 0 {
        return Err(HostDevError::NoFreeVf);
    }
    let capped = total.min(MAX_SRIOV_VFS as i64);

    if total > capped {
        let autoprobe = gpu_dir().join("sriov_drivers_autoprobe");
        let numvfs = gpu_dir().join("sriov_numvfs");
        write_string(&autoprobe, "0")?;
        write_string(&numvfs, &capped.to_string())?;
        write_string(&autoprobe, "1")?;
    }

    let device_id = read_hex(gpu_dir().join("device"))?;
    let vendor_device = format!("8086 {device_id:x}");

    let driver_link = gpu_dir().join("driver");
    if is_vfio_driver(&driver_link) {
        let _ = vfio_remove_id(&vendor_device);
    }
    vfio_new_id(&vendor_device)?;

    for i in 0..capped {
        let enable_path = device_bdf_path(GPU_BDF, i as u32);
        if let Ok(status) = read_decimal(&enable_path) {
            if status == 0 {
                info!(vf = i, "selected free SR-IOV virtual function");
                return Ok(i as u32);
            }
        }
    }
    Err(HostDevError::NoFreeVf)
}
