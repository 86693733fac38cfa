//! COS文件系统适配器 / COS filesystem adapter
//!
//! 设计原则：
//! - 每个操作映射为一次（或两次）COS 调用
//! - move = 服务端复制 + 删除源对象，删除失败只记录警告
//! - 列举是惰性分页流

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};

use crate::storage::{
    BackendError, ByteReader, FileAttributes, FilesystemAdapter, FilesystemError, FsResult, MetadataKind,
    MoveFailure, MoveOutcome, StorageAttributes, Visibility, WriteOptions,
};
use super::client::CosBackend;
use super::config::CosConfig;
use super::http::CosHttpClient;
use super::listing::{self, normalize_prefix, ListingQuery};
use super::types::{CannedAcl, ListObjectsRequest, ObjectMeta, PresignOptions, PutOptions, MAX_KEYS};

/// Server-side encryption algorithm used when `encrypt` is on / 服务端加密算法
const SSE_ALGORITHM: &str = "AES256";

fn key_of(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Key of the object at `path`; the bucket root names no object / 对象键
fn object_key<'p>(operation: &'static str, path: &'p str) -> FsResult<&'p str> {
    let key = key_of(path);
    if key.is_empty() {
        return Err(FilesystemError::InvalidArgument {
            operation,
            path: path.to_string(),
            message: "path does not name an object".to_string(),
        });
    }
    Ok(key)
}

/// Placeholder key `path/` of a directory / 目录占位对象键
fn directory_key(operation: &'static str, path: &str) -> FsResult<String> {
    let key = normalize_prefix(path);
    if key.is_empty() {
        return Err(FilesystemError::InvalidArgument {
            operation,
            path: path.to_string(),
            message: "the bucket root is not a directory object".to_string(),
        });
    }
    Ok(key)
}

fn acl_for(visibility: Visibility) -> CannedAcl {
    match visibility {
        Visibility::Public => CannedAcl::PublicRead,
        Visibility::Private => CannedAcl::Private,
    }
}

/// COS适配器 / Filesystem adapter over a COS backend
pub struct CosAdapter<B = CosHttpClient> {
    backend: B,
    config: CosConfig,
    page_size: u32,
}

impl<B: CosBackend> CosAdapter<B> {
    pub fn new(backend: B, config: CosConfig) -> Self {
        Self {
            backend,
            config,
            page_size: MAX_KEYS,
        }
    }

    /// Keys per listing request, clamped to 1..=1000 / 每页条目数
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_KEYS);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &CosConfig {
        &self.config
    }

    /// CDN URL of a key when a CDN domain is configured / CDN地址
    pub fn cdn_url(&self, path: &str) -> Option<String> {
        self.config
            .cdn()
            .map(|cdn| format!("{}/{}", cdn, key_of(path)))
    }

    /// Presigned GET URL using the configured scheme / 预签名地址
    pub fn presigned_url(&self, path: &str, expires: Duration, options: PresignOptions) -> FsResult<String> {
        let options = PresignOptions {
            scheme: Some(self.config.scheme.clone()),
            ..options
        };
        let key = object_key("url", path)?;
        self.backend
            .presign_get(key, expires, &options)
            .map_err(|source| FilesystemError::Url {
                path: path.to_string(),
                source,
            })
    }

    fn put_options(&self, key: &str, options: &WriteOptions) -> PutOptions {
        let content_type = options.content_type.clone().or_else(|| {
            mime_guess::from_path(key)
                .first()
                .map(|mime| mime.essence_str().to_string())
        });
        PutOptions {
            content_type,
            server_side_encryption: self.config.encrypt.then(|| SSE_ALGORITHM.to_string()),
            acl: options.visibility.map(acl_for),
            headers: options.headers.clone(),
        }
    }

    async fn head(&self, operation: &'static str, path: &str, kind: MetadataKind) -> FsResult<ObjectMeta> {
        let key = object_key(operation, path)?;
        self.backend
            .head_object(key)
            .await
            .map_err(|source| FilesystemError::Metadata {
                path: path.to_string(),
                kind,
                source,
            })
    }

    /// All HEAD metadata at once / 一次获取全部元数据
    pub async fn metadata(&self, path: &str) -> FsResult<FileAttributes> {
        let meta = self.head("metadata", path, MetadataKind::All).await?;
        Ok(FileAttributes::new(path)
            .with_file_size(meta.content_length)
            .with_last_modified(meta.last_modified_timestamp())
            .with_mime_type(meta.content_type))
    }
}

#[async_trait]
impl<B: CosBackend> FilesystemAdapter for CosAdapter<B> {
    fn name(&self) -> &str {
        "qcloud-cos"
    }

    async fn file_exists(&self, path: &str) -> FsResult<bool> {
        let key = object_key("file_exists", path)?;
        match self.backend.head_object(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(source) => Err(FilesystemError::CheckExistence {
                path: path.to_string(),
                source,
            }),
        }
    }

    async fn directory_exists(&self, path: &str) -> FsResult<bool> {
        let request = ListObjectsRequest {
            prefix: normalize_prefix(path),
            delimiter: None,
            marker: String::new(),
            max_keys: 1,
        };
        let page = self
            .backend
            .list_objects(&request)
            .await
            .map_err(|source| FilesystemError::CheckExistence {
                path: path.to_string(),
                source,
            })?;
        Ok(!page.contents.is_empty())
    }

    async fn write(&self, path: &str, contents: Bytes, options: &WriteOptions) -> FsResult<()> {
        let key = object_key("write", path)?;
        tracing::debug!("COS write: key={}, size={}", key, contents.len());
        self.backend
            .put_object(key, contents, &self.put_options(key, options))
            .await
            .map_err(|source| FilesystemError::Write {
                path: path.to_string(),
                source,
            })
    }

    async fn read(&self, path: &str) -> FsResult<Bytes> {
        let key = object_key("read", path)?;
        let result = match self.cdn_url(path).filter(|_| self.config.should_read_from_cdn()) {
            Some(url) => self.backend.fetch_url(&url).await,
            None => self.backend.get_object(key).await,
        };
        result.map_err(|source| FilesystemError::Read {
            path: path.to_string(),
            source,
        })
    }

    async fn read_stream(&self, path: &str) -> FsResult<ByteReader> {
        let key = object_key("read_stream", path)?;
        self.backend
            .get_object_stream(key)
            .await
            .map_err(|source| FilesystemError::Read {
                path: path.to_string(),
                source,
            })
    }

    async fn delete(&self, path: &str) -> FsResult<()> {
        let key = object_key("delete", path)?;
        self.backend
            .delete_object(key)
            .await
            .map_err(|source| FilesystemError::Delete {
                path: path.to_string(),
                source,
            })
    }

    async fn delete_directory(&self, path: &str) -> FsResult<()> {
        // Only the placeholder object; keys below it are left alone
        let key = directory_key("delete_directory", path)?;
        self.backend
            .delete_object(&key)
            .await
            .map_err(|source| FilesystemError::DeleteDirectory {
                path: path.to_string(),
                source,
            })
    }

    async fn create_directory(&self, path: &str, options: &WriteOptions) -> FsResult<()> {
        let key = directory_key("create_directory", path)?;
        let put_options = PutOptions {
            content_type: None,
            ..self.put_options(&key, options)
        };
        self.backend
            .put_object(&key, Bytes::new(), &put_options)
            .await
            .map_err(|source| FilesystemError::CreateDirectory {
                path: path.to_string(),
                source,
            })
    }

    async fn set_visibility(&self, path: &str, visibility: Visibility) -> FsResult<()> {
        let key = object_key("set_visibility", path)?;
        self.backend
            .put_object_acl(key, acl_for(visibility))
            .await
            .map_err(|source| FilesystemError::SetVisibility {
                path: path.to_string(),
                source,
            })
    }

    async fn visibility(&self, path: &str) -> FsResult<FileAttributes> {
        let key = object_key("visibility", path)?;
        let policy = self
            .backend
            .get_object_acl(key)
            .await
            .map_err(|source| FilesystemError::Metadata {
                path: path.to_string(),
                kind: MetadataKind::Visibility,
                source,
            })?;
        let visibility = if policy.is_public_read() {
            Visibility::Public
        } else {
            Visibility::Private
        };
        Ok(FileAttributes::new(path).with_visibility(Some(visibility)))
    }

    async fn mime_type(&self, path: &str) -> FsResult<FileAttributes> {
        let meta = self.head("mime_type", path, MetadataKind::MimeType).await?;
        Ok(FileAttributes::new(path).with_mime_type(meta.content_type))
    }

    async fn last_modified(&self, path: &str) -> FsResult<FileAttributes> {
        let meta = self.head("last_modified", path, MetadataKind::LastModified).await?;
        Ok(FileAttributes::new(path).with_last_modified(meta.last_modified_timestamp()))
    }

    async fn file_size(&self, path: &str) -> FsResult<FileAttributes> {
        let meta = self.head("file_size", path, MetadataKind::FileSize).await?;
        Ok(FileAttributes::new(path).with_file_size(meta.content_length))
    }

    fn list_contents<'a>(&'a self, path: &str, deep: bool) -> BoxStream<'a, StorageAttributes> {
        let path = path.to_string();
        listing::entries(&self.backend, ListingQuery::new(&path, deep, self.page_size))
            .scan((), move |_, item| {
                let entry = match item {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        // The listing ends here without reporting the failure
                        tracing::warn!("COS listing of {:?} stopped early: {}", path, e);
                        None
                    }
                };
                future::ready(entry)
            })
            .boxed()
    }

    fn try_list_contents<'a>(
        &'a self,
        path: &str,
        deep: bool,
    ) -> BoxStream<'a, FsResult<StorageAttributes>> {
        let path = path.to_string();
        listing::entries(&self.backend, ListingQuery::new(&path, deep, self.page_size))
            .map_err(move |source| FilesystemError::List {
                path: path.clone(),
                source,
            })
            .boxed()
    }

    async fn copy(&self, source: &str, destination: &str, _options: &WriteOptions) -> FsResult<()> {
        let (src_key, dst_key) = (object_key("copy", source)?, object_key("copy", destination)?);
        tracing::debug!("COS copy: {} -> {}", src_key, dst_key);
        self.backend
            .copy_object(src_key, dst_key)
            .await
            .map_err(|e| FilesystemError::Copy {
                from: source.to_string(),
                to: destination.to_string(),
                source: e,
            })
    }

    async fn move_file(
        &self,
        source: &str,
        destination: &str,
        _options: &WriteOptions,
    ) -> FsResult<MoveOutcome> {
        let (src_key, dst_key) = (object_key("move_file", source)?, object_key("move_file", destination)?);
        let fail = |reason: MoveFailure| FilesystemError::Move {
            from: source.to_string(),
            to: destination.to_string(),
            reason,
        };

        if src_key == dst_key {
            return Err(fail(MoveFailure::SameLocation));
        }

        tracing::debug!("COS move: {} -> {}", src_key, dst_key);

        if let Err(e) = self.backend.copy_object(src_key, dst_key).await {
            let reason = if e.is_not_found() {
                MoveFailure::SourceNotFound
            } else {
                MoveFailure::CopyFailed(e)
            };
            return Err(fail(reason));
        }

        match self.backend.delete_object(src_key).await {
            Ok(()) => Ok(MoveOutcome::Moved),
            Err(cause) => {
                tracing::warn!(
                    "COS move: copied {} to {} but failed to delete the source: {}",
                    src_key,
                    dst_key,
                    cause
                );
                Ok(MoveOutcome::SourceRetained { cause })
            }
        }
    }
}
