//! Turns a validated guest configuration into an emulator command line.
//!
//! The build order below is fixed (see `build::build`'s step comments) so
//! the argument list is deterministic and testable. A failed build
//! releases its CID and drains whatever end-call actions it had already
//! registered — nothing outlives a failed build.

mod aaf;
mod build;
mod error;
mod pathsearch;
mod spec;

pub use build::build;
pub use error::ArgBuilderError;
pub use spec::{BuildOutput, CoProcSpec};

#[cfg(test)]
mod tests {
    use super::*;
    use civ_cid::CidPool;
    use civ_config::GuestConfig;
    use std::io::Write;

    struct TempIni {
        path: std::path::PathBuf,
    }
    impl TempIni {
        fn new(contents: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "civ-argbuilder-test-{}-{}.ini",
                std::process::id(),
                contents.len()
            ));
            let mut f = std::fs::File::create(&path).unwrap();
            f.write_all(contents.as_bytes()).unwrap();
            TempIni { path }
        }
    }
    impl Drop for TempIni {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn minimal_config() -> &'static str {
        "[global]\nname = demo\n[firmware]\ntype = unified\npath = /fw/unified.bin\n[disk]\npath = /disk/demo.img\n[memory]\nsize = 2048M\n[vcpu]\nnum = 2\n"
    }

    #[tokio::test]
    async fn a_minimal_config_builds_successfully_and_acquires_a_cid() {
        let f = TempIni::new(minimal_config());
        let cfg = GuestConfig::load(&f.path).unwrap();
        let pool = CidPool::new();
        let out = build(&cfg, std::path::Path::new("/tmp"), &pool).await.unwrap();
        assert_eq!(out.cid, civ_constants::vsock::CID_BASE);
        assert!(out.emulator_args.contains(&"-name".to_string()));
        assert!(out.coprocs.is_empty());
    }

    #[tokio::test]
    async fn name_and_qmp_flags_are_present_and_ordered_before_cid_device() {
        let f = TempIni::new(minimal_config());
        let cfg = GuestConfig::load(&f.path).unwrap();
        let pool = CidPool::new();
        let out = build(&cfg, std::path::Path::new("/tmp"), &pool).await.unwrap();
        let name_idx = out.emulator_args.iter().position(|a| a == "-name").unwrap();
        let vsock_idx = out
            .emulator_args
            .iter()
            .position(|a| a.contains("vhost-vsock-pci"))
            .unwrap();
        assert!(name_idx < vsock_idx);
    }

    #[tokio::test]
    async fn rpmb_section_produces_a_coproc_and_chardev_flags() {
        let f = TempIni::new(&format!(
            "{}[rpmb]\nbin_path = /usr/bin/rpmb_dev\ndata_dir = /tmp/rpmb\n",
            minimal_config()
        ));
        let cfg = GuestConfig::load(&f.path).unwrap();
        let pool = CidPool::new();
        let out = build(&cfg, std::path::Path::new("/tmp"), &pool).await.unwrap();
        assert!(matches!(out.coprocs.as_slice(), [CoProcSpec::Rpmb { .. }]));
        assert!(out.emulator_args.iter().any(|a| a.contains("rpmb0")));
    }

    #[tokio::test]
    async fn a_specific_vsock_cid_is_honored() {
        let f = TempIni::new(
            "[global]\nname = demo\nvsock_cid = 1050\n[firmware]\ntype = unified\npath = /fw/unified.bin\n[disk]\npath = /disk/demo.img\n[memory]\nsize = 2048M\n[vcpu]\nnum = 2\n",
        );
        let cfg = GuestConfig::load(&f.path).unwrap();
        let pool = CidPool::new();
        let out = build(&cfg, std::path::Path::new("/tmp"), &pool).await.unwrap();
        assert_eq!(out.cid, 1050);
    }

    #[tokio::test]
    async fn an_unsupported_firmware_type_is_rejected_by_config_load_not_the_builder() {
        let f = TempIni::new("[global]\nname = demo\n[firmware]\ntype = bogus\n");
        assert!(GuestConfig::load(&f.path).is_err());
    }

    #[tokio::test]
    async fn the_iommu_device_appears_exactly_once_immediately_before_nodefaults() {
        let f = TempIni::new(minimal_config());
        let cfg = GuestConfig::load(&f.path).unwrap();
        let pool = CidPool::new();
        let out = build(&cfg, std::path::Path::new("/tmp"), &pool).await.unwrap();
        let iommu_positions: Vec<_> = out
            .emulator_args
            .iter()
            .enumerate()
            .filter(|(_, a)| a.contains("intel-iommu"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(iommu_positions.len(), 1, "intel-iommu device must appear exactly once");
        assert_eq!(out.emulator_args[iommu_positions[0] - 1], "-device");
        assert_eq!(out.emulator_args.last().unwrap(), "-nodefaults");
    }

    #[tokio::test]
    async fn rpmb_and_aaf_flags_are_ordered_before_name_and_qmp() {
        let f = TempIni::new(&format!(
            "{}[rpmb]\nbin_path = /usr/bin/rpmb_dev\ndata_dir = /tmp/rpmb\n",
            minimal_config()
        ));
        let cfg = GuestConfig::load(&f.path).unwrap();
        let pool = CidPool::new();
        let out = build(&cfg, std::path::Path::new("/tmp"), &pool).await.unwrap();
        let rpmb_idx = out.emulator_args.iter().position(|a| a.contains("rpmb0")).unwrap();
        let name_idx = out.emulator_args.iter().position(|a| a == "-name").unwrap();
        assert!(rpmb_idx < name_idx);
    }
}
