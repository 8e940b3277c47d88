//! The guest lifecycle state machine: build, start, stop, and the
//! per-guest supervisor task that bridges readiness and exit.

mod error;
mod instance;
mod registry;
mod state;
mod supervise;

pub use error::GuestError;
pub use instance::GuestInstance;
pub use registry::GuestRegistry;
pub use state::GuestState;
pub use supervise::{boot, wait_vm_ready, watch_exit};

#[cfg(test)]
mod tests {
    use super::*;
    use civ_cid::CidPool;
    use civ_config::GuestConfig;
    use std::io::Write;
    use std::path::PathBuf;

    struct TempIni {
        path: PathBuf,
    }
    impl TempIni {
        fn new(contents: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "civ-guest-test-{}-{}.ini",
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
        "[global]\nname = demo\n[emulator]\ntype = QEMU\npath = /bin/true\n[firmware]\ntype = unified\npath = /dev/null\n[disk]\npath = /dev/null\n[memory]\nsize = 64M\n[vcpu]\nnum = 1\n"
    }

    #[tokio::test]
    async fn build_start_stop_drives_the_full_state_machine() {
        let f = TempIni::new(minimal_config());
        let cfg = GuestConfig::load(&f.path).unwrap();
        let pool = CidPool::new();
        let instance = GuestInstance::new("demo", f.path.clone(), std::env::temp_dir(), std::env::temp_dir());

        assert_eq!(instance.state(), GuestState::Empty);
        instance.build(&cfg, &pool).await.unwrap();
        assert_eq!(instance.state(), GuestState::Created);
        let cid = instance.cid().unwrap();

        instance.start(vec![]).await.unwrap();
        assert_eq!(instance.state(), GuestState::Booting);

        instance.stop(&pool).await;
        assert_eq!(instance.state(), GuestState::Empty);
        assert!(instance.cid().is_none());
        assert!(pool.acquire_specific(cid).is_ok());
    }

    #[tokio::test]
    async fn stopping_an_empty_instance_is_a_no_op() {
        let instance = GuestInstance::new("demo", PathBuf::from("/tmp/x.ini"), std::env::temp_dir(), std::env::temp_dir());
        let pool = CidPool::new();
        instance.stop(&pool).await;
        assert_eq!(instance.state(), GuestState::Empty);
    }

    #[tokio::test]
    async fn starting_before_building_is_an_instance_conflict() {
        let instance = GuestInstance::new("demo", PathBuf::from("/tmp/x.ini"), std::env::temp_dir(), std::env::temp_dir());
        let err = instance.start(vec![]).await.unwrap_err();
        assert!(matches!(err, GuestError::InstanceConflict(_)));
    }

    #[tokio::test]
    async fn building_twice_is_an_instance_conflict() {
        let f = TempIni::new(minimal_config());
        let cfg = GuestConfig::load(&f.path).unwrap();
        let pool = CidPool::new();
        let instance = GuestInstance::new("demo", f.path.clone(), std::env::temp_dir(), std::env::temp_dir());
        instance.build(&cfg, &pool).await.unwrap();
        let err = instance.build(&cfg, &pool).await.unwrap_err();
        assert!(matches!(err, GuestError::InstanceConflict(_)));
    }
}
