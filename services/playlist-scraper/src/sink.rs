use std::{fs, io::Write, path::{Path, PathBuf}};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::errors::ScraperError;

/// Writes whole json documents, replacing the target in one rename
pub struct JsonFileSink {
    path: PathBuf
}

impl JsonFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pretty prints `value` with four space indentation
    pub fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<&Path, ScraperError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from(".")
        };
        fs::create_dir_all(&parent).map_err(|e| ScraperError::Io(std::io::Error::new(
            e.kind(), format!("create dir {}: {e}", parent.display())
        )))?;

        let mut temp = tempfile::NamedTempFile::new_in(&parent)?;
        {
            let formatter = PrettyFormatter::with_indent(b"    ");
            let mut ser = Serializer::with_formatter(temp.as_file_mut(), formatter);
            value.serialize(&mut ser)?;
        }
        temp.as_file_mut().write_all(b"\n")?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)?;

        Ok(&self.path)
    }
}
