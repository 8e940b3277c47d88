use civ_constants::vsock::MAX_GUEST_NAME_LEN;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not a regular file")]
    NotAFile(String),
    #[error("failed to load {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: ini::Error,
    },
    #[error("unknown config section [{0}]")]
    UnknownSection(String),
    #[error("unknown config key {section}.{key}")]
    UnknownKey { section: String, key: String },
    #[error("{section}.{key} is required")]
    MissingRequired { section: String, key: String },
    #[error("{section}.{key} = \"{value}\" is not one of the permitted values")]
    InvalidEnum {
        section: String,
        key: String,
        value: String,
    },
    #[error("global.name is {0} characters, exceeding the {MAX_GUEST_NAME_LEN}-character limit")]
    NameTooLong(usize),
}
