//! Normalized file/directory records / 规范化的文件与目录属性

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Object visibility / 对象可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" | "public-read" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(format!("unknown visibility: {}", other)),
        }
    }
}

/// File attributes / 文件属性
///
/// Built once from a listing or HEAD response and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
}

impl FileAttributes {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_size: None,
            visibility: None,
            last_modified: None,
            mime_type: None,
        }
    }

    pub fn with_file_size(mut self, size: Option<u64>) -> Self {
        self.file_size = size;
        self
    }

    pub fn with_visibility(mut self, visibility: Option<Visibility>) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_last_modified(mut self, timestamp: Option<i64>) -> Self {
        self.last_modified = timestamp;
        self
    }

    pub fn with_mime_type(mut self, mime_type: Option<String>) -> Self {
        self.mime_type = mime_type;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file_size(&self) -> Option<u64> {
        self.file_size
    }

    pub fn visibility(&self) -> Option<Visibility> {
        self.visibility
    }

    /// Unix timestamp in seconds / Unix 时间戳（秒）
    pub fn last_modified(&self) -> Option<i64> {
        self.last_modified
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }
}

/// Directory attributes (a common prefix, not a stored object) / 目录属性
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryAttributes {
    path: String,
}

impl DirectoryAttributes {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Listing entry / 列表条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageAttributes {
    File(FileAttributes),
    Directory(DirectoryAttributes),
}

impl StorageAttributes {
    pub fn path(&self) -> &str {
        match self {
            StorageAttributes::File(f) => f.path(),
            StorageAttributes::Directory(d) => d.path(),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, StorageAttributes::File(_))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, StorageAttributes::Directory(_))
    }

    pub fn as_file(&self) -> Option<&FileAttributes> {
        match self {
            StorageAttributes::File(f) => Some(f),
            StorageAttributes::Directory(_) => None,
        }
    }
}

impl From<FileAttributes> for StorageAttributes {
    fn from(value: FileAttributes) -> Self {
        StorageAttributes::File(value)
    }
}

impl From<DirectoryAttributes> for StorageAttributes {
    fn from(value: DirectoryAttributes) -> Self {
        StorageAttributes::Directory(value)
    }
}
