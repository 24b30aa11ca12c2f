//! User configuration: key bindings and themes, read from a TOML file.
//!
//! ```toml
//! [[keybind]]
//! key = "mod4+control+r"
//! cmd = "reload"
//!
//! [[theme]]
//! name = "default"
//! font = "-*-fixed-medium-r-*-*-13-*-*-*-*-*-*-*"
//! ```

use std::path::Path;
use std::path::PathBuf;

use log::info;
use log::warn;
use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct KeybindConfig {
    pub key: String,
    pub cmd: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct ThemeConfig {
    pub name: String,
    pub font: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default, rename = "keybind")]
    pub keybinds: Vec<KeybindConfig>,
    #[serde(default, rename = "theme")]
    pub themes: Vec<ThemeConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let bind = |key: &str, cmd: &str| KeybindConfig {
            key: key.to_string(),
            cmd: cmd.to_string(),
        };
        Self {
            keybinds: vec![
                bind("mod4+Return", "spawn xterm"),
                bind("mod4+control+r", "reload"),
                bind("mod4+control+q", "quit"),
            ],
            themes: vec![ThemeConfig {
                name: "default".to_string(),
                font: "fixed".to_string(),
            }],
        }
    }
}

impl Config {
    pub fn parse(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Falls back to the built-in configuration if the file is missing or
    /// broken.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!("no config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(cfg) => {
                info!("loaded config from {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("{}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }
}

/// `$XDG_CONFIG_HOME/wmfs/wmfsrc.toml`
pub fn default_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    PathBuf::from(base).join("wmfs").join("wmfsrc.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bindings_and_themes() {
        let cfg = Config::parse(
            r#"
            [[keybind]]
            key = "mod4+p"
            cmd = "spawn dmenu_run -b"

            [[keybind]]
            key = "mod4+control+q"
            cmd = "quit"

            [[theme]]
            name = "default"
            font = "fixed"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.keybinds.len(), 2);
        assert_eq!(cfg.keybinds[0].cmd, "spawn dmenu_run -b");
        assert_eq!(cfg.themes[0].name, "default");
    }

    #[test]
    fn sections_are_optional() {
        let cfg = Config::parse("").unwrap();
        assert!(cfg.keybinds.is_empty());
        assert!(cfg.themes.is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::parse("[[keybind]]\nkey = 3\n").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!(
            "wmfs-no-such-config-{}.toml",
            std::process::id()
        ));
        assert_eq!(Config::load_or_default(&path), Config::default());
    }

    #[test]
    fn defaults_can_quit_and_reload() {
        let cfg = Config::default();
        let cmds: Vec<&str> = cfg.keybinds.iter().map(|k| k.cmd.as_str()).collect();
        assert!(cmds.contains(&"quit"));
        assert!(cmds.contains(&"reload"));
    }
}
