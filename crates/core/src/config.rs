//! Application configuration.
//!
//! Settings are read from an optional TOML file. Every section and field has a
//! default, so an empty file (or no file at all) yields a working setup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Window settings
    #[serde(default)]
    pub window: WindowConfig,
    /// GPU and rendering settings
    #[serde(default)]
    pub graphics: GraphicsConfig,
    /// Diagnostics sink settings
    #[serde(default)]
    pub log: LogConfig,
    /// Simulated GPU settings for headless runs
    #[serde(default)]
    pub headless: HeadlessConfig,
}

/// Window configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Initial client width in pixels (default: 1280)
    #[serde(default = "default_width")]
    pub width: u32,
    /// Initial client height in pixels (default: 720)
    #[serde(default = "default_height")]
    pub height: u32,
    /// Window title
    #[serde(default = "default_title")]
    pub title: String,
    /// Whether the user may resize the window (default: true)
    #[serde(default = "default_true")]
    pub resizable: bool,
}

/// Rendering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// Enable Vulkan validation layers (default: on in debug builds)
    #[serde(default = "default_validation")]
    pub validation: bool,
    /// Wait for vertical blank when presenting (default: true)
    #[serde(default = "default_true")]
    pub vsync: bool,
    /// Background color of every frame, RGBA (default: opaque black)
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
    /// Directory holding compiled `<name>.spv` shader blobs, relative to the
    /// executable unless absolute
    #[serde(default = "default_shader_dir")]
    pub shader_dir: PathBuf,
}

/// Diagnostics sink configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Plain-text log file, truncated at startup (default: log.txt)
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
    /// Default filter directive, overridden by RUST_LOG (default: info)
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Mirror log lines to stderr (default: true)
    #[serde(default = "default_true")]
    pub console: bool,
}

/// Headless run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlessConfig {
    /// Frames to render before closing (default: 5)
    #[serde(default = "default_frames")]
    pub frames: u64,
    /// Simulated execution time of one command list in milliseconds (default: 0)
    #[serde(default)]
    pub gpu_latency_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: default_title(),
            resizable: true,
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            validation: default_validation(),
            vsync: true,
            clear_color: default_clear_color(),
            shader_dir: default_shader_dir(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            filter: default_filter(),
            console: true,
        }
    }
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            frames: default_frames(),
            gpu_latency_ms: 0,
        }
    }
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_title() -> String {
    "Triangle Renderer".to_string()
}

fn default_true() -> bool {
    true
}

fn default_validation() -> bool {
    cfg!(debug_assertions)
}

fn default_clear_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn default_shader_dir() -> PathBuf {
    PathBuf::from("shaders/spirv")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("log.txt")
}

fn default_filter() -> String {
    "info".to_string()
}

fn default_frames() -> u64 {
    5
}

impl Config {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Can not read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Can not parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Can not serialize config: {}", e)))
    }

    /// Rejects values the renderer can not start with.
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config(format!(
                "Window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        if self.log.file.as_os_str().is_empty() {
            return Err(Error::Config("Log file path is empty".to_string()));
        }
        if self.graphics.shader_dir.as_os_str().is_empty() {
            return Err(Error::Config("Shader directory is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.graphics.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.log.file, PathBuf::from("log.txt"));
        assert_eq!(config.headless.frames, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_text_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [window]
            width = 640

            [graphics]
            clear_color = [0.1, 0.2, 0.3, 1.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.graphics.clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert!(config.graphics.vsync);
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = Config::from_toml_str("[window]\nheight = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let err = Config::from_toml_str("[window\nwidth = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triangle.toml");
        std::fs::write(&path, "[headless]\nframes = 12\ngpu_latency_ms = 3\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.headless.frames, 12);
        assert_eq!(config.headless.gpu_latency_ms, 3);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_serialize_parses_back() {
        let mut config = Config::default();
        config.window.title = "Resized".to_string();
        let text = config.to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }
}
