//! COS扩展文件系统 / URL helpers and remote uploads on top of the adapter

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use url::Url;

use crate::storage::{FilesystemAdapter, FilesystemError, FsResult, WriteOptions};
use super::adapter::CosAdapter;
use super::client::CosBackend;
use super::http::CosHttpClient;
use super::sign::Signer;
use super::types::PresignOptions;

/// Lifetime of URLs returned by `url` / 默认链接有效期
const DEFAULT_URL_TTL: Duration = Duration::from_secs(30 * 60);

/// Lifetime of `authorization` values / 签名有效期
const AUTHORIZATION_TTL: i64 = 3600;

/// 扩展文件系统 / Extended COS filesystem
pub struct CosFilesystem<B = CosHttpClient> {
    adapter: CosAdapter<B>,
}

impl<B: CosBackend> CosFilesystem<B> {
    pub fn new(adapter: CosAdapter<B>) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &CosAdapter<B> {
        &self.adapter
    }

    /// Underlying COS client / 底层COS客户端
    pub fn backend(&self) -> &B {
        self.adapter.backend()
    }

    /// Public URL: CDN address if configured, else a 30-minute presigned URL / 文件访问地址
    pub fn url(&self, path: &str) -> FsResult<String> {
        if let Some(url) = self.adapter.cdn_url(path) {
            return Ok(url);
        }
        self.adapter
            .presigned_url(path, DEFAULT_URL_TTL, PresignOptions::default())
    }

    /// Same as `url` / CDN地址
    pub fn cdn_url(&self, path: &str) -> FsResult<String> {
        self.url(path)
    }

    /// Presigned URL valid until `expiration` / 临时访问地址
    pub fn temporary_url(
        &self,
        path: &str,
        expiration: DateTime<Utc>,
        options: PresignOptions,
    ) -> FsResult<String> {
        let seconds = (expiration - Utc::now()).num_seconds();
        if seconds <= 0 {
            return Err(FilesystemError::InvalidArgument {
                operation: "temporary_url",
                path: path.to_string(),
                message: format!("expiration {} is not in the future", expiration.to_rfc3339()),
            });
        }
        self.adapter
            .presigned_url(path, Duration::from_secs(seconds as u64), options)
    }

    /// Cloud Infinite (数据万象) image URL / 图片处理地址
    pub fn cloud_infinite_url(&self, path: &str, params: &BTreeMap<String, String>) -> String {
        let config = self.adapter.config();
        let mut url = format!(
            "{}://{}/{}",
            config.scheme,
            config.picture_host(),
            path.trim_start_matches('/')
        );
        if !params.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params.iter())
                .finish();
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    /// `Authorization` header value for a request to `url`, valid for one hour / 生成请求签名
    pub fn authorization(&self, method: &str, url: &str) -> FsResult<String> {
        let invalid = |message: String| FilesystemError::InvalidArgument {
            operation: "authorization",
            path: url.to_string(),
            message,
        };
        let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| invalid("url has no host".to_string()))?;

        let path = urlencoding::decode(parsed.path())
            .map_err(|e| invalid(e.to_string()))?
            .into_owned();
        let params: BTreeMap<String, String> = parsed.query_pairs().into_owned().collect();
        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), host.to_string());

        let credentials = &self.adapter.config().credentials;
        let signer = Signer::new(&credentials.secret_id, &credentials.secret_key);
        let now = Utc::now().timestamp();
        Ok(signer.sign(method, &path, &params, &headers, now, now + AUTHORIZATION_TTL))
    }

    /// Download `remote_url` and store it at `path` / 抓取远程文件并上传
    pub async fn put_remote_file(&self, path: &str, remote_url: &str, options: &WriteOptions) -> FsResult<()> {
        let contents = self.fetch_remote(remote_url).await?;
        self.adapter.write(path, contents, options).await
    }

    /// Like `put_remote_file`, storing under the URL's file name / 以远程文件名上传
    pub async fn put_remote_file_as(&self, remote_url: &str, options: &WriteOptions) -> FsResult<String> {
        let name = Url::parse(remote_url)
            .ok()
            .and_then(|u| u.path_segments().and_then(|s| s.last()).map(str::to_string))
            .and_then(|s| urlencoding::decode(&s).ok().map(|d| d.into_owned()))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FilesystemError::InvalidArgument {
                operation: "put_remote_file_as",
                path: remote_url.to_string(),
                message: "url has no file name".to_string(),
            })?;
        self.put_remote_file(&name, remote_url, options).await?;
        Ok(name)
    }

    async fn fetch_remote(&self, remote_url: &str) -> FsResult<Bytes> {
        tracing::debug!("fetching remote file {}", remote_url);
        self.backend()
            .fetch_url(remote_url)
            .await
            .map_err(|source| FilesystemError::Read {
                path: remote_url.to_string(),
                source,
            })
    }
}

impl<B: CosBackend> From<CosAdapter<B>> for CosFilesystem<B> {
    fn from(adapter: CosAdapter<B>) -> Self {
        Self::new(adapter)
    }
}
