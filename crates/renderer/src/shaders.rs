//! Precompiled shader lookup.
//!
//! Shaders are compiled to SPIR-V ahead of time (`glslc triangle.vert -o
//! triangle.vert.spv`) and looked up by name in a single directory. A relative
//! directory is taken relative to the running executable, not the working
//! directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use triangle_core::{Error, Result};

/// Directory of `<name>.spv` blobs.
#[derive(Debug, Clone)]
pub struct ShaderLibrary {
    dir: PathBuf,
}

impl ShaderLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Library rooted at `dir`, resolved against the executable's directory
    /// when relative.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the executable path can not be determined.
    pub fn beside_executable(dir: &Path) -> Result<Self> {
        let exe = std::env::current_exe()?;
        let base = exe.parent().unwrap_or_else(|| Path::new(""));
        let library = Self::new(resolve_dir(dir, base));
        info!("Shaders located at: {}", library.dir.display());
        Ok(library)
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the blob for `name`.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.spv", name))
    }

    /// Reads the SPIR-V bytes for `name` (for example `"triangle.vert"`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shader`] if the blob is missing, unreadable or empty.
    pub fn load(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(name);
        let bytes = fs::read(&path).map_err(|e| {
            Error::Shader(format!("Can not read shader {}: {}", path.display(), e))
        })?;
        if bytes.is_empty() {
            return Err(Error::Shader(format!(
                "Shader {} is empty",
                path.display()
            )));
        }

        debug!("Loaded shader {} ({} bytes)", path.display(), bytes.len());
        Ok(bytes)
    }
}

fn resolve_dir(dir: &Path, base: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        base.join(dir)
    }
}
