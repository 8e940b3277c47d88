//! Process supervision for co-processes and the main emulator.
//!
//! Every managed child gets its own log file and its own monitor task; a
//! stop sends SIGTERM and gives the child 10 seconds to exit before the
//! wait is abandoned.

mod coproc;
mod error;
mod naming;
mod supervisor;

pub use coproc::{CoProcess, GenericCoProcess, RpmbCoProcess, VtpmCoProcess};
pub use error::ProcessError;
pub use supervisor::ProcessSupervisor;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn a_generic_coprocess_runs_and_reports_running() {
        let mut proc = GenericCoProcess::new(
            "/bin/sh",
            vec!["-c".into(), "sleep 5".into()],
            std::env::temp_dir(),
        );
        proc.run().await.unwrap();
        assert!(proc.running());
        proc.stop().await;
    }

    #[tokio::test]
    async fn stop_is_a_no_op_before_run() {
        let mut proc = GenericCoProcess::new("/bin/true", vec![], std::env::temp_dir());
        proc.stop().await;
        assert!(!proc.running());
    }

    #[tokio::test]
    async fn a_finished_child_stops_reporting_running() {
        let mut proc = GenericCoProcess::new("/bin/true", vec![], std::env::temp_dir());
        proc.run().await.unwrap();
        proc.join().await;
        assert!(!proc.running());
    }

    #[tokio::test]
    async fn spawn_failure_is_surfaced() {
        let mut proc = GenericCoProcess::new("/no/such/binary", vec![], std::env::temp_dir());
        assert!(proc.run().await.is_err());
    }

    #[tokio::test]
    async fn vtpm_refuses_to_start_without_a_data_dir() {
        let mut vtpm = VtpmCoProcess::new(
            "/bin/true",
            PathBuf::from("/nonexistent/vtpm/data"),
            std::env::temp_dir(),
        );
        let err = vtpm.run().await.unwrap_err();
        assert!(matches!(err, ProcessError::DataDirMissing(_)));
    }
}
