//! Translates a validated [`GuestConfig`] into an emulator command line, a
//! list of co-processes, a teardown queue, and the CID it acquired.
//!
//! Step numbering in comments matches the fixed build order so ordering
//! bugs show up as an obviously-wrong argument list in tests.

use std::path::Path;

use civ_cid::CidPool;
use civ_config::GuestConfig;
use civ_hostdev::EndCallQueue;

use crate::aaf::AafSettings;
use crate::error::ArgBuilderError;
use crate::pathsearch::resolve_emulator_path;
use crate::spec::{BuildOutput, CoProcSpec};

const FIXED_SUFFIX: &[&str] = &[
    "-M", "q35",
    "-machine", "kernel_irqchip=on",
    "-k", "en-us",
    "-cpu", "host,-waitpkg",
    "-enable-kvm",
    "-device", "qemu-xhci,id=xhci,p2=8,p3=8",
    "-device", "usb-mouse",
    "-device", "usb-kbd",
];

pub async fn build(
    config: &GuestConfig,
    config_dir: &Path,
    cid_pool: &CidPool,
) -> Result<BuildOutput, ArgBuilderError> {
    let queue = EndCallQueue::new();
    let mut args: Vec<String> = Vec::new();
    let mut coprocs: Vec<CoProcSpec> = Vec::new();

    // Step 1: resolve the emulator binary.
    let emulator_path =
        resolve_emulator_path(config.get("emulator", "path")).ok_or(ArgBuilderError::EmulatorNotFound)?;

    // Step 2: storage-key (rpmb) helper.
    let rpmb_bin = config.get("rpmb", "bin_path");
    let rpmb_data = config.get("rpmb", "data_dir");
    if !rpmb_bin.is_empty() && !rpmb_data.is_empty() {
        args.push("-device".into());
        args.push("virtio-serial,addr=1".into());
        args.push("-device".into());
        args.push("virtserialport,chardev=rpmb0,name=rpmb0,nr=1".into());
        args.push("-chardev".into());
        args.push(format!(
            "socket,id=rpmb0,path={}/{}",
            rpmb_data,
            civ_constants::paths::RPMB_SOCK_FILE
        ));
        coprocs.push(CoProcSpec::Rpmb {
            bin_path: rpmb_bin.to_string(),
            data_dir: rpmb_data.to_string(),
        });
    }

    // Step 3: AAF attestation share.
    let aaf_path = config.get("aaf", "path");
    let mut aaf = if !aaf_path.is_empty() {
        args.push("-virtfs".into());
        args.push(format!(
            "local,mount_tag=Download9p,security_model=none,addr=3,path={aaf_path}"
        ));
        let mut settings = AafSettings::enabled(aaf_path);
        let suspend = config.get("aaf", "support_suspend");
        if !suspend.is_empty() {
            settings.set_suspend_policy(suspend);
        }
        settings
    } else {
        AafSettings::default()
    };

    // Step 4: name / QMP (global.name is required by GuestConfig::load already).
    let name = config.name();
    args.push("-name".into());
    args.push(name.to_string());
    let qmp_socket = config_dir.join(format!(".{name}.qmp.unix.socket"));
    args.push("-qmp".into());
    args.push(format!("unix:{},server,nowait", qmp_socket.display()));

    // Step 5: networking.
    let adb_port = config.get("global", "adb_port");
    let fastboot_port = config.get("global", "fastboot_port");
    let mut netdev = "-netdev user,id=net0".to_string();
    if !adb_port.is_empty() {
        netdev.push_str(&format!(",hostfwd=tcp::{adb_port}-:5555"));
    }
    if !fastboot_port.is_empty() {
        netdev.push_str(&format!(",hostfwd=tcp::{fastboot_port}-:5554"));
    }
    args.push("-netdev".into());
    let netdev_value = netdev.trim_start_matches("-netdev ").to_string();
    args.push(netdev_value);
    args.push("-device".into());
    args.push("e1000,netdev=net0".into());

    // Step 6: vsock CID.
    let cid_field = config.get("global", "vsock_cid");
    let cid = if cid_field.is_empty() {
        cid_pool.acquire()?
    } else {
        let requested: u32 = cid_field
            .parse()
            .map_err(|_| ArgBuilderError::InvalidVsockCid(cid_field.to_string()))?;
        cid_pool.acquire_specific(requested)?
    };
    args.push("-device".into());
    args.push(format!(
        "vhost-vsock-pci,id=vhost-vsock-pci0,bus=pcie.0,addr=0x20,guest-cid={cid}"
    ));

    // Step 7: virtual TPM helper.
    let vtpm_bin = config.get("vtpm", "bin_path");
    let vtpm_data = config.get("vtpm", "data_dir");
    if !vtpm_bin.is_empty() && !vtpm_data.is_empty() {
        args.push("-chardev".into());
        args.push(format!(
            "socket,id=chrtpm,path={}/{}",
            vtpm_data,
            civ_constants::paths::VTPM_SOCK_FILE
        ));
        args.push("-tpmdev".into());
        args.push("emulator,id=tpm0,chardev=chrtpm".into());
        args.push("-device".into());
        args.push("tpm-crb,tpmdev=tpm0".into());
        coprocs.push(CoProcSpec::Vtpm {
            bin_path: vtpm_bin.to_string(),
            data_dir: vtpm_data.to_string(),
        });
    }

    // Step 8: virtual GPU.
    let gpu_type = config.get("graphics", "type");
    if !gpu_type.is_empty() {
        build_graphics(gpu_type, config, &mut args, &mut aaf, &queue).await?;
    }

    // Step 9: memory and vCPU.
    args.push("-m".into());
    args.push(config.get("memory", "size").to_string());
    args.push("-smp".into());
    args.push(config.get("vcpu", "num").to_string());

    // Step 10: firmware.
    let firm_type = config.get("firmware", "type");
    match firm_type {
        "unified" => {
            args.push("-drive".into());
            args.push(format!("if=pflash,format=raw,file={}", config.get("firmware", "path")));
        }
        "splited" => {
            args.push("-drive".into());
            args.push(format!(
                "if=pflash,format=raw,readonly=on,file={}",
                config.get("firmware", "code")
            ));
            args.push("-drive".into());
            args.push(format!("if=pflash,format=raw,file={}", config.get("firmware", "vars")));
        }
        other => return Err(ArgBuilderError::UnsupportedFirmwareType(other.to_string())),
    }

    // Step 11: disk.
    args.push("-drive".into());
    args.push(format!(
        "file={},if=none,id=disk1,discard=unmap,detect-zeroes=unmap",
        config.get("disk", "path")
    ));
    args.push("-device".into());
    args.push("virtio-blk-pci,drive=disk1,bootindex=1".into());

    // Step 12: additional passthrough.
    let passthrough = config.get("passthrough", "passthrough_pci");
    if !passthrough.is_empty() {
        for bdf in passthrough.split(',') {
            let bdf = bdf.trim();
            if bdf.is_empty() {
                continue;
            }
            civ_hostdev::attach_pci_device(bdf, &queue).await?;
            args.push("-device".into());
            args.push(format!("vfio-pci,host={bdf},x-no-kvm-intx=on"));
        }
    }

    // Step 13: mediation and guest-control helpers.
    for (section, key) in [
        ("mediation", "battery_med"),
        ("mediation", "thermal_med"),
        ("guest_control", "time_keep"),
        ("guest_control", "pm_control"),
    ] {
        let value = config.get(section, key);
        if !value.is_empty() {
            coprocs.push(CoProcSpec::Generic {
                program: value.to_string(),
                args: Vec::new(),
            });
        }
    }

    // Step 14: audio.
    args.push("-device".into());
    args.push("ich9-intel-hda".into());
    args.push("-device".into());
    args.push("hda-duplex".into());
    args.push("-audiodev".into());
    args.push("pa,id=pa0,server=/var/run/pulse/native".into());

    // Step 15: extra command / services.
    let extra_cmd = config.get("extra", "cmd");
    if !extra_cmd.is_empty() {
        args.extend(extra_cmd.split_whitespace().map(str::to_string));
    }
    let extra_services = config.get("extra", "service");
    if !extra_services.is_empty() {
        for svc in extra_services.split(';') {
            let svc = svc.trim();
            if !svc.is_empty() {
                coprocs.push(CoProcSpec::Generic {
                    program: svc.to_string(),
                    args: Vec::new(),
                });
            }
        }
    }

    // Step 16: fixed suffix flags, IOMMU device must be last before -nodefaults.
    args.extend(FIXED_SUFFIX.iter().map(|s| s.to_string()));
    args.push("-device".into());
    args.push("intel-iommu,device-iotlb=on,caching-mode=on".into());
    args.push("-nodefaults".into());

    // Step 17: flush AAF settings.
    aaf.flush()?;

    Ok(BuildOutput {
        emulator_path,
        emulator_args: args,
        coprocs,
        cid,
        queue,
    })
}

async fn build_graphics(
    gpu_type: &str,
    config: &GuestConfig,
    args: &mut Vec<String>,
    aaf: &mut AafSettings,
    queue: &EndCallQueue,
) -> Result<(), ArgBuilderError> {
    match gpu_type {
        "GVT-g" => {
            let uuid = config.get("graphics", "vgpu_uuid");
            let parsed = uuid::Uuid::parse_str(uuid).map_err(|_| ArgBuilderError::InvalidVgpuUuid(uuid.to_string()))?;
            args.push("-display".into());
            args.push("gtk,gl=on".into());
            args.push("-device".into());
            args.push(format!(
                "vfio-pci-nohotplug,ramfb=on,display=on,addr=2.0,x-igd-opregion=on,sysfsdev={}{}",
                civ_constants::paths::SYS_PCI_DEVICES,
                parsed.hyphenated()
            ));
            aaf.set_gpu_type("gvtg");
        }
        "GVT-d" => {
            civ_hostdev::unload_sof_audio_if_needed(queue).await?;
            civ_hostdev::attach_pci_device(civ_constants::paths::INTEL_GPU_BDF, queue).await?;
            args.push("-vga".into());
            args.push("none".into());
            args.push("-nographic".into());
            args.push("-device".into());
            args.push(
                "vfio-pci,host=00:02.0,x-igd-gms=2,id=hostdev0,bus=pcie.0,addr=0x2,x-igd-opregion=on".into(),
            );
            aaf.set_gpu_type("gvtd");
        }
        "virtio" => {
            args.push("-display".into());
            args.push("gtk,gl=on".into());
            args.push("-device".into());
            args.push("virtio-vga-gl".into());
            aaf.set_gpu_type("virtio");
        }
        "ramfb" => {
            args.push("-display".into());
            args.push("gtk,gl=on".into());
            args.push("-device".into());
            args.push("ramfb".into());
        }
        "virtio2d" => {
            args.push("-display".into());
            args.push("gtk,gl=on".into());
            args.push("-device".into());
            args.push("virtio-vga".into());
            aaf.set_gpu_type("virtio");
        }
        "sriov" => {
            let mem_size = config.get("memory", "size");
            civ_hostdev::provision_hugepages(mem_size).await?;
            let vf = civ_hostdev::select_free_vf().await?;
            args.push("-display".into());
            args.push("gtk,gl=on".into());
            args.push("-device".into());
            args.push("virtio-vga,max_outputs=1,blob=true".into());
            args.push("-device".into());
            args.push(format!("vfio-pci,host=0000:00:02.{vf}"));
            args.push("-object".into());
            args.push(format!("memory-backend-memfd,hugetlb=on,id=mem_sriov,size={mem_size}"));
            args.push("-machine".into());
            args.push("memory-backend=mem_sriov".into());
            aaf.set_gpu_type("virtio");
        }
        "headless" => {}
        other => return Err(ArgBuilderError::UnsupportedGraphicsType(other.to_string())),
    }
    Ok(())
}
