//! COS后端接口 / Storage backend capability set
//!
//! Everything the adapter needs from the object store. `CosHttpClient`
//! talks to the real service; tests plug in an in-memory fake.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::storage::{BackendError, ByteReader};
use super::types::{
    AccessControlPolicy, CannedAcl, ListBucketResult, ListObjectsRequest, ObjectMeta, PresignOptions,
    PutOptions,
};

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// 对象存储后端 / Object storage backend, bound to one bucket
#[async_trait]
pub trait CosBackend: Send + Sync {
    /// HEAD Object
    async fn head_object(&self, key: &str) -> BackendResult<ObjectMeta>;

    /// PUT Object
    async fn put_object(&self, key: &str, body: Bytes, options: &PutOptions) -> BackendResult<()>;

    /// GET Object
    async fn get_object(&self, key: &str) -> BackendResult<Bytes>;

    /// GET Object as a reader / 流式获取对象
    ///
    /// Default implementation buffers the body.
    async fn get_object_stream(&self, key: &str) -> BackendResult<ByteReader> {
        let data = self.get_object(key).await?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    /// DELETE Object
    async fn delete_object(&self, key: &str) -> BackendResult<()>;

    /// PUT Object - Copy (server side, same bucket) / 服务端复制
    async fn copy_object(&self, source_key: &str, destination_key: &str) -> BackendResult<()>;

    /// GET Bucket (one page) / 列出一页对象
    async fn list_objects(&self, request: &ListObjectsRequest) -> BackendResult<ListBucketResult>;

    /// GET Object acl
    async fn get_object_acl(&self, key: &str) -> BackendResult<AccessControlPolicy>;

    /// PUT Object acl
    async fn put_object_acl(&self, key: &str, acl: CannedAcl) -> BackendResult<()>;

    /// Presigned GET URL / 预签名下载链接
    fn presign_get(&self, key: &str, expires: Duration, options: &PresignOptions) -> BackendResult<String>;

    /// Plain unsigned GET of an absolute URL (CDN reads, remote files) / 直接获取URL内容
    async fn fetch_url(&self, url: &str) -> BackendResult<Bytes>;
}
