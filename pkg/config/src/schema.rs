//! The fixed section/key schema permitted in a guest config file.

/// `(section, &[keys])` pairs. A config file may omit any section or key;
/// it may not contain a section or key outside this table.
pub const SCHEMA: &[(&str, &[&str])] = &[
    ("global", &["name", "flashfiles", "adb_port", "fastboot_port", "vsock_cid"]),
    ("emulator", &["type", "path"]),
    ("memory", &["size"]),
    ("vcpu", &["num"]),
    ("firmware", &["type", "path", "code", "vars"]),
    ("disk", &["size", "path"]),
    ("graphics", &["type", "gvtg_version", "vgpu_uuid"]),
    ("vtpm", &["bin_path", "data_dir"]),
    ("rpmb", &["bin_path", "data_dir"]),
    ("aaf", &["path", "support_suspend"]),
    ("passthrough", &["passthrough_pci"]),
    ("mediation", &["battery_med", "thermal_med"]),
    ("guest_control", &["time_keep", "pm_control"]),
    ("extra", &["cmd", "service"]),
];

pub const EMULATOR_TYPES: &[&str] = &["QEMU"];
pub const FIRMWARE_TYPES: &[&str] = &["unified", "splited"];
pub const GRAPHICS_TYPES: &[&str] = &[
    "headless", "virtio", "ramfb", "GVT-g", "GVT-d", "virtio2d", "sriov",
];
pub const SUSPEND_TOGGLE: &[&str] = &["enable", "disable"];

pub fn section_keys(section: &str) -> Option<&'static [&'static str]> {
    SCHEMA
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| *keys)
}

pub fn is_known_section(section: &str) -> bool {
    SCHEMA.iter().any(|(name, _)| *name == section)
}
