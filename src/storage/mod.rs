use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::io::{AsyncRead, AsyncReadExt};

pub mod attributes;
pub mod error;

pub use attributes::{DirectoryAttributes, FileAttributes, StorageAttributes, Visibility};
pub use error::{BackendError, FilesystemError, FsResult, MetadataKind, MoveFailure};

/// Boxed byte stream returned by streaming reads / 流式读取器
pub type ByteReader = Box<dyn AsyncRead + Unpin + Send>;

/// Per-call write options / 写入选项
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Visibility applied as an ACL at upload time / 上传时设置的可见性
    #[serde(default)]
    pub visibility: Option<Visibility>,
    /// Explicit content type, otherwise guessed from the key / 内容类型
    #[serde(default)]
    pub content_type: Option<String>,
    /// Extra request headers passed through to the backend / 额外请求头
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl WriteOptions {
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }
}

/// Result of a move / 移动结果
///
/// A move is a copy followed by a delete of the source. The destination is
/// always complete once a `MoveOutcome` is returned; only the cleanup of the
/// source may have been left behind.
#[derive(Debug)]
pub enum MoveOutcome {
    /// Copied and source removed / 复制并删除源对象
    Moved,
    /// Copied, but the source could not be deleted / 已复制，源对象未删除
    SourceRetained { cause: BackendError },
}

impl MoveOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, MoveOutcome::Moved)
    }
}

/// Filesystem adapter interface / 文件系统适配器接口
///
/// One implementation per storage backend. Paths are object keys relative to
/// the bucket root; a leading `/` is ignored.
#[async_trait]
pub trait FilesystemAdapter: Send + Sync {
    /// Adapter name / 适配器名称
    fn name(&self) -> &str;

    /// Whether an object exists at `path` / 文件是否存在
    async fn file_exists(&self, path: &str) -> FsResult<bool>;

    /// Whether at least one object lives under `path/` / 目录是否存在
    async fn directory_exists(&self, path: &str) -> FsResult<bool>;

    /// Write complete contents / 写入完整内容
    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> FsResult<()>;

    /// Write from a reader / 从读取器写入
    ///
    /// Default implementation buffers the whole stream and calls `write`.
    async fn write_stream(
        &self,
        path: &str,
        mut reader: ByteReader,
        options: &WriteOptions,
    ) -> FsResult<()> {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| FilesystemError::Write {
                path: path.to_string(),
                source: BackendError::Io(e),
            })?;
        self.write(path, Bytes::from(buf), options).await
    }

    /// Read complete contents / 读取完整内容
    async fn read(&self, path: &str) -> FsResult<Bytes>;

    /// Open a streaming reader / 打开流式读取器
    async fn read_stream(&self, path: &str) -> FsResult<ByteReader>;

    async fn delete(&self, path: &str) -> FsResult<()>;

    async fn delete_directory(&self, path: &str) -> FsResult<()>;

    async fn create_directory(&self, path: &str, options: &WriteOptions) -> FsResult<()>;

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> FsResult<()>;

    async fn visibility(&self, path: &str) -> FsResult<FileAttributes>;

    async fn mime_type(&self, path: &str) -> FsResult<FileAttributes>;

    async fn last_modified(&self, path: &str) -> FsResult<FileAttributes>;

    async fn file_size(&self, path: &str) -> FsResult<FileAttributes>;

    /// Lazily list entries under `path` / 惰性列出目录内容
    ///
    /// A backend failure while fetching a page ends the stream without an
    /// error item; entries already yielded stay valid. Use
    /// `try_list_contents` to observe the failure.
    fn list_contents<'a>(&'a self, path: &str, deep: bool) -> BoxStream<'a, StorageAttributes>;

    /// Like `list_contents`, but a page failure is yielded as the last item / 严格模式列表
    fn try_list_contents<'a>(
        &'a self,
        path: &str,
        deep: bool,
    ) -> BoxStream<'a, FsResult<StorageAttributes>>;

    /// Server-side copy / 服务端复制
    async fn copy(&self, source: &str, destination: &str, options: &WriteOptions) -> FsResult<()>;

    /// Copy then delete source / 复制后删除源对象
    async fn move_file(
        &self,
        source: &str,
        destination: &str,
        options: &WriteOptions,
    ) -> FsResult<MoveOutcome>;
}

/// Builds adapters from JSON configuration / 适配器工厂
pub trait AdapterFactory: Send + Sync {
    /// Driver type name / 驱动类型名称
    fn driver_type(&self) -> &'static str;

    /// Create an adapter instance / 创建适配器实例
    fn create_adapter(&self, config: serde_json::Value) -> anyhow::Result<Box<dyn FilesystemAdapter>>;
}
