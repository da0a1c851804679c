use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// A picture the user picked or captured, still in its encoded form.
///
/// The bytes are shared, so handing the image to a worker is a refcount bump.
/// Decoding happens on the worker, never on the caller's context.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedImage {
    name: Option<String>,
    bytes: Arc<[u8]>,
}

impl SelectedImage {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: None,
            bytes: Arc::from(bytes.into()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let image = Self::from_bytes(bytes);
        Ok(match path.file_name() {
            Some(name) => image.with_name(name.to_string_lossy()),
            None => image,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            name: self.name.clone(),
            byte_len: self.bytes.len(),
        }
    }
}

// Dumping the raw bytes into logs is never useful.
impl fmt::Debug for SelectedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedImage")
            .field("name", &self.name)
            .field("byte_len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub name: Option<String>,
    pub byte_len: usize,
}
