//! Error types / 错误类型
//!
//! `BackendError` is what an object-storage backend returns. `FilesystemError`
//! wraps it together with the adapter operation and the path(s) involved.

use std::fmt;
use thiserror::Error;

/// Error raised by a storage backend call / 存储后端错误
#[derive(Debug, Error)]
pub enum BackendError {
    /// The service answered with a non-success status / 服务端返回错误状态
    #[error("service returned {status} {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Paginated listing returned the marker it was given / 分页标记未前进
    #[error("continuation marker did not advance: {0:?}")]
    MarkerStalled(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn service(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        BackendError::Service {
            status,
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    pub fn not_found(key: &str) -> Self {
        Self::service(404, "NoSuchKey", format!("the specified key does not exist: {}", key))
    }

    /// HTTP status if the error came from the service / 服务端HTTP状态码
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Service { status, .. } => Some(*status),
            BackendError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Which metadata a failed lookup was after / 元数据类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    MimeType,
    LastModified,
    FileSize,
    Visibility,
    All,
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetadataKind::MimeType => "mime type",
            MetadataKind::LastModified => "last modified",
            MetadataKind::FileSize => "file size",
            MetadataKind::Visibility => "visibility",
            MetadataKind::All => "metadata",
        };
        f.write_str(name)
    }
}

/// Why a move did not happen / 移动失败原因
#[derive(Debug, Error)]
pub enum MoveFailure {
    #[error("source does not exist")]
    SourceNotFound,
    #[error("source and destination are the same location")]
    SameLocation,
    #[error("copy failed: {0}")]
    CopyFailed(#[source] BackendError),
}

/// Typed failure of a filesystem operation / 文件系统操作错误
#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error("unable to check existence of `{path}`: {source}")]
    CheckExistence {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("unable to write `{path}`: {source}")]
    Write {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("unable to read `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("unable to delete `{path}`: {source}")]
    Delete {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("unable to delete directory `{path}`: {source}")]
    DeleteDirectory {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("unable to create directory `{path}`: {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("unable to set visibility of `{path}`: {source}")]
    SetVisibility {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("unable to retrieve {kind} of `{path}`: {source}")]
    Metadata {
        path: String,
        kind: MetadataKind,
        #[source]
        source: BackendError,
    },
    #[error("unable to list contents of `{path}`: {source}")]
    List {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("unable to copy `{from}` to `{to}`: {source}")]
    Copy {
        from: String,
        to: String,
        #[source]
        source: BackendError,
    },
    #[error("unable to move `{from}` to `{to}`: {reason}")]
    Move {
        from: String,
        to: String,
        #[source]
        reason: MoveFailure,
    },
    #[error("unable to generate URL for `{path}`: {source}")]
    Url {
        path: String,
        #[source]
        source: BackendError,
    },
    #[error("invalid argument for {operation} on `{path}`: {message}")]
    InvalidArgument {
        operation: &'static str,
        path: String,
        message: String,
    },
}

impl FilesystemError {
    /// Name of the failed operation / 失败的操作名
    pub fn operation(&self) -> &'static str {
        match self {
            FilesystemError::CheckExistence { .. } => "check_existence",
            FilesystemError::Write { .. } => "write",
            FilesystemError::Read { .. } => "read",
            FilesystemError::Delete { .. } => "delete",
            FilesystemError::DeleteDirectory { .. } => "delete_directory",
            FilesystemError::CreateDirectory { .. } => "create_directory",
            FilesystemError::SetVisibility { .. } => "set_visibility",
            FilesystemError::Metadata { .. } => "retrieve_metadata",
            FilesystemError::List { .. } => "list_contents",
            FilesystemError::Copy { .. } => "copy",
            FilesystemError::Move { .. } => "move",
            FilesystemError::Url { .. } => "url",
            FilesystemError::InvalidArgument { operation, .. } => *operation,
        }
    }

    /// Paths involved, source first / 涉及的路径
    pub fn paths(&self) -> Vec<&str> {
        match self {
            FilesystemError::Copy { from, to, .. } | FilesystemError::Move { from, to, .. } => {
                vec![from.as_str(), to.as_str()]
            }
            FilesystemError::CheckExistence { path, .. }
            | FilesystemError::Write { path, .. }
            | FilesystemError::Read { path, .. }
            | FilesystemError::Delete { path, .. }
            | FilesystemError::DeleteDirectory { path, .. }
            | FilesystemError::CreateDirectory { path, .. }
            | FilesystemError::SetVisibility { path, .. }
            | FilesystemError::Metadata { path, .. }
            | FilesystemError::List { path, .. }
            | FilesystemError::Url { path, .. }
            | FilesystemError::InvalidArgument { path, .. } => vec![path.as_str()],
        }
    }

    /// Underlying backend error, when there is one / 底层后端错误
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            FilesystemError::CheckExistence { source, .. }
            | FilesystemError::Write { source, .. }
            | FilesystemError::Read { source, .. }
            | FilesystemError::Delete { source, .. }
            | FilesystemError::DeleteDirectory { source, .. }
            | FilesystemError::CreateDirectory { source, .. }
            | FilesystemError::SetVisibility { source, .. }
            | FilesystemError::Metadata { source, .. }
            | FilesystemError::List { source, .. }
            | FilesystemError::Url { source, .. }
            | FilesystemError::Copy { source, .. } => Some(source),
            FilesystemError::Move { reason: MoveFailure::CopyFailed(source), .. } => Some(source),
            FilesystemError::Move { .. } | FilesystemError::InvalidArgument { .. } => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            FilesystemError::Move { reason: MoveFailure::SourceNotFound, .. } => true,
            _ => self.backend_error().map(|e| e.is_not_found()).unwrap_or(false),
        }
    }
}

pub type FsResult<T> = std::result::Result<T, FilesystemError>;
