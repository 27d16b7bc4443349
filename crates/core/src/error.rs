//! Error types for the renderer.
//!
//! Every failure in the frame lifecycle is fatal. Errors are wrapped with a
//! higher-level description as they propagate (see [`ResultExt`]) and are
//! reported once at the process boundary.

use thiserror::Error;

/// Main error type for the renderer.
#[derive(Error, Debug)]
pub enum Error {
    /// No compatible GPU device or presentation mechanism is available.
    #[error("Can not create presentation surface: {0}")]
    SurfaceCreation(String),

    /// Device, adapter, pipeline state or other one-shot setup failed.
    #[error("Setup error: {0}")]
    Setup(String),

    /// A frame slot allocator was reset before the GPU retired its marker.
    #[error(
        "Frame slot {slot} is still in use: marker {marker} not reached (completed {completed})"
    )]
    ResourceInUse {
        /// Slot index.
        slot: usize,
        /// Marker last assigned to the slot.
        marker: u64,
        /// Fence value observed at the time of the reset.
        completed: u64,
    },

    /// A GPU command-recording call failed.
    #[error("Recording error: {0}")]
    Recording(String),

    /// A queue submission or present request failed.
    #[error("Submission error: {0}")]
    Submission(String),

    /// Fence signal or wait failed; the GPU context is no longer valid.
    #[error("Device lost: {0}")]
    DeviceLost(String),

    /// Back-buffer reallocation failed.
    #[error("Resize error: {0}")]
    Resize(String),

    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Shader bytecode could not be provided
    #[error("Shader error: {0}")]
    Shader(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// An error wrapped with a higher-level description.
    #[error("{context}")]
    Context {
        /// Description of the operation that failed.
        context: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps this error with a higher-level description.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping all context layers.
    pub fn root(&self) -> &Error {
        let mut current = self;
        while let Error::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Returns the taxonomy name of the root error.
    pub fn kind_name(&self) -> &'static str {
        match self.root() {
            Error::SurfaceCreation(_) => "SurfaceCreationError",
            Error::Setup(_) => "SetupError",
            Error::ResourceInUse { .. } => "ResourceInUseError",
            Error::Recording(_) => "RecordingError",
            Error::Submission(_) => "SubmissionError",
            Error::DeviceLost(_) => "DeviceLostError",
            Error::Resize(_) => "ResizeError",
            Error::Window(_) => "WindowError",
            Error::Shader(_) => "ShaderError",
            Error::Io(_) => "IoError",
            Error::Config(_) => "ConfigError",
            // root() never stops on a context layer
            Error::Context { .. } => "Context",
        }
    }

    /// Returns true if the GPU context is gone.
    pub fn is_device_lost(&self) -> bool {
        matches!(self.root(), Error::DeviceLost(_))
    }

    /// Formats the full chain, outermost first, as `a: b: c`.
    pub fn chain(&self) -> String {
        let mut parts = Vec::new();
        let mut current = self;
        loop {
            match current {
                Error::Context { context, source } => {
                    parts.push(context.clone());
                    current = source;
                }
                other => {
                    parts.push(other.to_string());
                    break;
                }
            }
        }
        parts.join(": ")
    }
}

/// Result type alias using the renderer's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Adds context wrapping to `Result`.
pub trait ResultExt<T> {
    /// Wraps the error with a fixed description.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Wraps the error with a lazily built description.
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_wraps_and_root_unwraps() {
        let err = Error::Setup("Can not create command queue".to_string())
            .context("Can not initialize pipeline");

        assert_eq!(err.to_string(), "Can not initialize pipeline");
        assert!(matches!(err.root(), Error::Setup(_)));
        assert_eq!(err.kind_name(), "SetupError");
    }

    #[test]
    fn test_chain_lists_outermost_first() {
        let result: Result<()> = Err(Error::DeviceLost("wait failed".to_string()));
        let err = result
            .context("Can not wait for GPU")
            .with_context(|| format!("Can not resize to {}x{}", 640, 480))
            .unwrap_err();

        assert_eq!(
            err.chain(),
            "Can not resize to 640x480: Can not wait for GPU: Device lost: wait failed"
        );
        assert!(err.is_device_lost());
    }

    #[test]
    fn test_resource_in_use_message() {
        let err = Error::ResourceInUse {
            slot: 1,
            marker: 7,
            completed: 5,
        };
        assert_eq!(err.kind_name(), "ResourceInUseError");
        assert!(err.to_string().contains("marker 7"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert_eq!(err.kind_name(), "IoError");
    }
}
