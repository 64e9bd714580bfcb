//! Port configuration
//!
//! `port.toml` is compiled into the binary and parsed at boot. Every key
//! is optional; a file that fails to parse is replaced by the built-in
//! defaults.

use serde::Deserialize;
use thiserror::Error;

/// Embedded configuration (edit port.toml and rebuild to customize)
pub const EMBEDDED_CONFIG: &str = include_str!("../port.toml");

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid port.toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("[fs] cwd must be an absolute path")]
    RelativeCwd,
    #[error("[hal] delay_slice_ms must be greater than zero")]
    ZeroDelaySlice,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub name: String,
    pub mcu: String,
    pub platform: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: "SPRESENSE".into(),
            mcu: "cxd56".into(),
            platform: "nuttx".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Working directory at boot
    pub cwd: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            cwd: spresense_machine::uos::DEFAULT_CWD.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    pub banner: String,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            banner: "Spresense port; SPRESENSE with cxd56".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HalConfig {
    pub delay_slice_ms: u32,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self { delay_slice_ms: 50 }
    }
}

/// Whole `port.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    pub board: BoardConfig,
    pub fs: FsConfig,
    pub repl: ReplConfig,
    pub hal: HalConfig,
}

/// Parse and check a configuration
pub fn parse_config(src: &str) -> Result<PortConfig, ConfigError> {
    let config: PortConfig = toml::from_str(src)?;
    if !config.fs.cwd.starts_with('/') {
        return Err(ConfigError::RelativeCwd);
    }
    if config.hal.delay_slice_ms == 0 {
        return Err(ConfigError::ZeroDelaySlice);
    }
    Ok(config)
}

/// Parse a configuration, falling back to the defaults on error
pub fn load_config(src: &str) -> PortConfig {
    match parse_config(src) {
        Ok(config) => {
            info!("Loaded port configuration");
            config
        }
        Err(e) => {
            let reason = e.to_string();
            warn!("port.toml rejected ({=str}), using built-in defaults", reason.as_str());
            PortConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_config_matches_defaults() {
        let config = parse_config(EMBEDDED_CONFIG).unwrap();
        assert_eq!(config, PortConfig::default());
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = parse_config("[fs]\ncwd = \"/mnt/sd0\"\n").unwrap();
        assert_eq!(config.fs.cwd, "/mnt/sd0");
        assert_eq!(config.board.name, "SPRESENSE");
        assert_eq!(config.hal.delay_slice_ms, 50);
    }

    #[test]
    fn test_rejected_config() {
        assert!(matches!(parse_config("[fs\n"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            parse_config("[fs]\ncwd = \"sd0\"\n"),
            Err(ConfigError::RelativeCwd)
        ));
        assert!(matches!(
            parse_config("[hal]\ndelay_slice_ms = 0\n"),
            Err(ConfigError::ZeroDelaySlice)
        ));
        assert_eq!(load_config("[hal]\ndelay_slice_ms = \"fast\"\n"), PortConfig::default());
    }

    #[test]
    fn test_rejection_reason_names_the_key() {
        let err = parse_config("[hal]\ndelay_slice_ms = \"fast\"\n").unwrap_err();
        let reason = err.to_string();
        assert!(reason.starts_with("invalid port.toml: "), "{}", reason);
        assert!(reason.contains("delay_slice_ms"), "{}", reason);
        assert_eq!(
            parse_config("[fs]\ncwd = \"sd0\"\n").unwrap_err().to_string(),
            "[fs] cwd must be an absolute path"
        );
    }
}
