//! Guest configuration: a two-level section/key/value map loaded from an
//! INI file and validated against a fixed schema.
//!
//! Unknown sections or keys are rejected at load time. Lookups on a
//! present-but-unset key return an empty string rather than an error —
//! only a handful of fields (`global.name`, the enum-typed fields) are
//! actually required, and that is enforced separately in `validate`.

mod error;
mod schema;

pub use error::ConfigError;
pub use schema::{EMULATOR_TYPES, FIRMWARE_TYPES, GRAPHICS_TYPES, SUSPEND_TOGGLE};

use std::collections::HashMap;
use std::path::Path;

use civ_constants::vsock::MAX_GUEST_NAME_LEN;

/// A loaded, schema-validated guest configuration.
#[derive(Debug, Clone, Default)]
pub struct GuestConfig {
    sections: HashMap<String, HashMap<String, String>>,
}

impl GuestConfig {
    /// Load and validate a config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotAFile(path.display().to_string()));
        }
        let ini = ini::Ini::load_from_file(path).map_err(|source| ConfigError::Load {
            path: path.display().to_string(),
            source,
        })?;

        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        for (section, props) in ini.iter() {
            let section = section.unwrap_or_default().to_string();
            if !schema::is_known_section(&section) {
                return Err(ConfigError::UnknownSection(section));
            }
            let allowed = schema::section_keys(&section).expect("just checked known");
            let mut map = HashMap::new();
            for (key, value) in props.iter() {
                if !allowed.contains(&key) {
                    return Err(ConfigError::UnknownKey {
                        section: section.clone(),
                        key: key.to_string(),
                    });
                }
                map.insert(key.to_string(), value.to_string());
            }
            sections.insert(section, map);
        }

        let config = GuestConfig { sections };
        config.validate()?;
        Ok(config)
    }

    /// Look up `section.key`; returns `""` if either is absent.
    pub fn get(&self, section: &str, key: &str) -> &str {
        self.sections
            .get(section)
            .and_then(|m| m.get(key))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    pub fn name(&self) -> &str {
        self.get("global", "name")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let name = self.name();
        if name.is_empty() {
            return Err(ConfigError::MissingRequired {
                section: "global".into(),
                key: "name".into(),
            });
        }
        if name.chars().count() > MAX_GUEST_NAME_LEN {
            return Err(ConfigError::NameTooLong(name.chars().count()));
        }

        if self.has_section("emulator") {
            self.require_enum("emulator", "type", schema::EMULATOR_TYPES)?;
        }
        if self.has_section("firmware") {
            self.require_enum("firmware", "type", schema::FIRMWARE_TYPES)?;
        }
        if self.has_section("graphics") {
            self.require_enum("graphics", "type", schema::GRAPHICS_TYPES)?;
            if self.get("graphics", "type") == "GVT-g" && self.get("graphics", "vgpu_uuid").is_empty() {
                return Err(ConfigError::MissingRequired {
                    section: "graphics".into(),
                    key: "vgpu_uuid".into(),
                });
            }
        }
        let suspend = self.get("aaf", "support_suspend");
        if !suspend.is_empty() && !schema::SUSPEND_TOGGLE.contains(&suspend) {
            return Err(ConfigError::InvalidEnum {
                section: "aaf".into(),
                key: "support_suspend".into(),
                value: suspend.into(),
            });
        }
        Ok(())
    }

    fn require_enum(&self, section: &str, key: &str, allowed: &[&str]) -> Result<(), ConfigError> {
        let value = self.get(section, key);
        if value.is_empty() {
            return Err(ConfigError::MissingRequired {
                section: section.into(),
                key: key.into(),
            });
        }
        if !allowed.contains(&value) {
            return Err(ConfigError::InvalidEnum {
                section: section.into(),
                key: key.into(),
                value: value.into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile_path::TempIni {
        tempfile_path::TempIni::new(contents)
    }

    mod tempfile_path {
        use std::io::Write;
        pub struct TempIni {
            pub path: std::path::PathBuf,
        }
        impl TempIni {
            pub fn new(contents: &str) -> Self {
                let path = std::env::temp_dir().join(format!(
                    "civ-config-test-{}-{}.ini",
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
    }

    #[test]
    fn a_config_with_only_a_name_is_accepted() {
        let f = write_config("[global]\nname = demo\n");
        let cfg = GuestConfig::load(&f.path).unwrap();
        assert_eq!(cfg.name(), "demo");
        assert_eq!(cfg.get("memory", "size"), "");
    }

    #[test]
    fn unknown_section_is_rejected() {
        let f = write_config("[global]\nname = demo\n[bogus]\nx = 1\n");
        let err = GuestConfig::load(&f.path).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSection(s) if s == "bogus"));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let f = write_config("[global]\nname = demo\nbogus_key = 1\n");
        let err = GuestConfig::load(&f.path).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { .. }));
    }

    #[test]
    fn gvtg_graphics_without_uuid_is_rejected() {
        let f = write_config("[global]\nname = demo\n[graphics]\ntype = GVT-g\n");
        let err = GuestConfig::load(&f.path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingRequired { section, key } if section == "graphics" && key == "vgpu_uuid"
        ));
    }

    #[test]
    fn gvtg_graphics_with_uuid_is_accepted() {
        let f = write_config(
            "[global]\nname = demo\n[graphics]\ntype = GVT-g\nvgpu_uuid = 11111111-1111-1111-1111-111111111111\n",
        );
        assert!(GuestConfig::load(&f.path).is_ok());
    }

    #[test]
    fn firmware_section_without_type_is_rejected() {
        let f = write_config("[global]\nname = demo\n[firmware]\npath = /x\n");
        let err = GuestConfig::load(&f.path).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { section, key } if section == "firmware" && key == "type"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = GuestConfig::load("/nonexistent/path/guest.ini").unwrap_err();
        assert!(matches!(err, ConfigError::NotAFile(_)));
    }
}
