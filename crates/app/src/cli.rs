//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;

use triangle_core::{Config, LogConfig, Result};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "triangle")]
#[command(about = "Draws a colored triangle with explicit GPU frame synchronization")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Render on the simulated GPU without opening a window
    #[arg(long)]
    pub headless: bool,

    /// Frames to render in headless mode
    #[arg(long)]
    pub frames: Option<u64>,

    /// Window width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height in pixels
    #[arg(long)]
    pub height: Option<u32>,
}

impl Cli {
    /// Loads the configuration file (or defaults) and applies the overrides.
    ///
    /// # Errors
    ///
    /// Returns [`triangle_core::Error::Config`] if the file can not be read or
    /// the merged configuration is invalid.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(width) = self.width {
            config.window.width = width;
        }
        if let Some(height) = self.height {
            config.window.height = height;
        }
        if let Some(frames) = self.frames {
            config.headless.frames = frames;
        }

        config.validate()?;
        Ok(config)
    }

    /// Logging settings for this run; the defaults when the configuration
    /// can not be resolved, so that failure still reaches a log file.
    pub fn log_config(&self) -> LogConfig {
        self.resolve_config()
            .map(|config| config.log)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headless_flags() {
        let cli = Cli::try_parse_from(["triangle", "--headless", "--frames", "12", "--width", "640"])
            .unwrap();
        assert!(cli.headless);
        assert_eq!(cli.frames, Some(12));
        assert_eq!(cli.width, Some(640));
        assert_eq!(cli.height, None);
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triangle.toml");
        std::fs::write(&path, "[window]\nwidth = 800\nheight = 600\n\n[headless]\nframes = 3\n").unwrap();

        let cli = Cli {
            config: Some(path),
            height: Some(480),
            ..Cli::default()
        };
        let config = cli.resolve_config().unwrap();

        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 480);
        assert_eq!(config.headless.frames, 3);
    }

    #[test]
    fn test_zero_width_override_is_rejected() {
        let cli = Cli {
            width: Some(0),
            ..Cli::default()
        };
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn test_log_config_follows_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triangle.toml");
        std::fs::write(&path, "[log]\nfile = \"logs/run.txt\"\n").unwrap();

        let cli = Cli {
            config: Some(path),
            ..Cli::default()
        };
        assert_eq!(cli.log_config().file, std::path::Path::new("logs/run.txt"));
    }

    #[test]
    fn test_log_config_falls_back_when_config_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli {
            config: Some(dir.path().join("missing.toml")),
            ..Cli::default()
        };

        assert!(cli.resolve_config().is_err());
        assert_eq!(cli.log_config(), LogConfig::default());
    }
}
