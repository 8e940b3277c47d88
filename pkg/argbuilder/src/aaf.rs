//! In-memory settings handed to the guest's Application-Authentication
//! Framework, flushed to a file under `aaf.path` at the end of the build.

use std::path::Path;

use crate::error::ArgBuilderError;

#[derive(Debug, Default, Clone)]
pub struct AafSettings {
    path: Option<String>,
    suspend_policy: Option<String>,
    audio_type: Option<String>,
    gpu_type: Option<String>,
}

impl AafSettings {
    pub fn enabled(path: impl Into<String>) -> Self {
        AafSettings {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn set_suspend_policy(&mut self, policy: impl Into<String>) {
        self.suspend_policy = Some(policy.into());
    }

    pub fn set_audio_type(&mut self, audio_type: impl Into<String>) {
        self.audio_type = Some(audio_type.into());
    }

    pub fn set_gpu_type(&mut self, gpu_type: impl Into<String>) {
        self.gpu_type = Some(gpu_type.into());
    }

    /// Serialize to `<path>/aaf.settings` as `key=value` lines.
    pub fn flush(&self) -> Result<(), ArgBuilderError> {
        let Some(dir) = &self.path else { return Ok(()) };
        let file_path = Path::new(dir).join("aaf.settings");
        let mut body = String::new();
        if let Some(v) = &self.suspend_policy {
            body.push_str(&format!("suspend_policy={v}\n"));
        }
        if let Some(v) = &self.audio_type {
            body.push_str(&format!("audio_type={v}\n"));
        }
        if let Some(v) = &self.gpu_type {
            body.push_str(&format!("gpu_type={v}\n"));
        }
        std::fs::write(&file_path, body).map_err(|source| ArgBuilderError::AafFlush {
            path: file_path.display().to_string(),
            source,
        })
    }
}
