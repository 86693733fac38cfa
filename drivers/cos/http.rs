//! COS HTTP客户端 / reqwest-based COS backend
//!
//! 设计原则：
//! - 每个操作一次请求，不做重试
//! - 超时由配置决定（reqwest::Client 级别）
//! - 只签名 host 头和查询参数

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::{Method, Response};
use tokio_util::io::StreamReader;

use crate::storage::{BackendError, ByteReader};
use super::client::{BackendResult, CosBackend};
use super::config::CosConfig;
use super::sign::Signer;
use super::types::{
    AccessControlPolicy, CannedAcl, ErrorResponse, ListBucketResult, ListObjectsRequest, ObjectMeta,
    PresignOptions, PutOptions,
};

/// Validity of a request signature / 请求签名有效期
const REQUEST_SIGN_TTL: i64 = 600;

/// Percent-encode every path segment, keep `/` / 编码对象键
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn encode_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| {
            if v.is_empty() {
                urlencoding::encode(k).into_owned()
            } else {
                format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Object calls with an empty key would address the bucket itself / 拒绝空对象键
fn require_key(key: &str) -> BackendResult<()> {
    if key.is_empty() {
        return Err(BackendError::InvalidRequest("object key must not be empty".into()));
    }
    Ok(())
}

/// Upload headers: encryption, then caller headers, then the ACL / 上传请求头
///
/// Names are lowercased so a caller header replaces a built-in one of the
/// same name, except `x-cos-acl`, which always follows the visibility.
fn upload_headers(options: &PutOptions) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    if let Some(content_type) = &options.content_type {
        headers.insert("content-type".to_string(), content_type.clone());
    }
    if let Some(sse) = &options.server_side_encryption {
        headers.insert("x-cos-server-side-encryption".to_string(), sse.clone());
    }
    for (name, value) in &options.headers {
        headers.insert(name.to_ascii_lowercase(), value.clone());
    }
    if let Some(acl) = options.acl {
        headers.insert("x-cos-acl".to_string(), acl.as_str().to_string());
    }
    headers
}

fn header_str(headers: &HeaderMap, name: impl reqwest::header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// COS客户端 / COS client bound to one bucket
pub struct CosHttpClient {
    config: CosConfig,
    signer: Signer,
    http: reqwest::Client,
}

impl CosHttpClient {
    pub fn new(config: CosConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;
        let signer = Signer::new(&config.credentials.secret_id, &config.credentials.secret_key);
        Ok(Self { config, signer, http })
    }

    pub fn config(&self) -> &CosConfig {
        &self.config
    }

    fn object_url(&self, scheme: &str, key: &str) -> String {
        format!("{}://{}/{}", scheme, self.config.host(), encode_key(key))
    }

    fn sign(&self, method: &Method, key: &str, params: &BTreeMap<String, String>, ttl: i64) -> BackendResult<String> {
        let mut signed_headers = BTreeMap::new();
        signed_headers.insert("host".to_string(), self.config.host());
        let now = Utc::now().timestamp();
        let end = now
            .checked_add(ttl)
            .ok_or_else(|| BackendError::InvalidRequest(format!("signature lifetime {}s is too long", ttl)))?;
        Ok(self.signer.sign(
            method.as_str(),
            &format!("/{}", key),
            params,
            &signed_headers,
            now,
            end,
        ))
    }

    /// Sign and send one request / 发送签名请求
    async fn send(
        &self,
        method: Method,
        key: &str,
        params: BTreeMap<String, String>,
        headers: BTreeMap<String, String>,
        body: Option<Bytes>,
    ) -> BackendResult<Response> {
        let mut url = self.object_url(&self.config.scheme, key);
        if !params.is_empty() {
            url.push('?');
            url.push_str(&encode_query(&params));
        }
        let authorization = self.sign(&method, key, &params, REQUEST_SIGN_TTL)?;

        tracing::debug!("COS {} {}", method, url);

        let mut request = self
            .http
            .request(method, &url)
            .header("Authorization", authorization);
        if let Some(token) = self.config.credentials.token.as_deref().filter(|t| !t.is_empty()) {
            request = request.header("x-cos-security-token", token);
        }
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        Self::check(response).await
    }

    /// Turn non-2xx responses into `BackendError::Service` / 解析错误响应
    async fn check(response: Response) -> BackendResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let request_id = header_str(response.headers(), "x-cos-request-id");
        let body = response.text().await.unwrap_or_default();
        let parsed: ErrorResponse = quick_xml::de::from_str(&body).unwrap_or_default();
        let code = if parsed.code.is_empty() {
            status.canonical_reason().unwrap_or("Unknown").to_string()
        } else {
            parsed.code
        };
        tracing::debug!("COS error response: status={}, code={}", status, code);
        Err(BackendError::Service {
            status: status.as_u16(),
            code,
            message: parsed.message,
            request_id: parsed.request_id.or(request_id),
        })
    }
}

#[async_trait]
impl CosBackend for CosHttpClient {
    async fn head_object(&self, key: &str) -> BackendResult<ObjectMeta> {
        require_key(key)?;
        let response = self
            .send(Method::HEAD, key, BTreeMap::new(), BTreeMap::new(), None)
            .await?;
        let headers = response.headers();
        Ok(ObjectMeta {
            content_length: header_str(headers, CONTENT_LENGTH).and_then(|v| v.parse().ok()),
            last_modified: header_str(headers, LAST_MODIFIED),
            content_type: header_str(headers, CONTENT_TYPE),
            etag: header_str(headers, ETAG),
        })
    }

    async fn put_object(&self, key: &str, body: Bytes, options: &PutOptions) -> BackendResult<()> {
        require_key(key)?;
        self.send(Method::PUT, key, BTreeMap::new(), upload_headers(options), Some(body))
            .await?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> BackendResult<Bytes> {
        require_key(key)?;
        let response = self
            .send(Method::GET, key, BTreeMap::new(), BTreeMap::new(), None)
            .await?;
        Ok(response.bytes().await?)
    }

    async fn get_object_stream(&self, key: &str) -> BackendResult<ByteReader> {
        require_key(key)?;
        let response = self
            .send(Method::GET, key, BTreeMap::new(), BTreeMap::new(), None)
            .await?;
        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(Box::new(StreamReader::new(Box::pin(stream))))
    }

    async fn delete_object(&self, key: &str) -> BackendResult<()> {
        require_key(key)?;
        self.send(Method::DELETE, key, BTreeMap::new(), BTreeMap::new(), None)
            .await?;
        Ok(())
    }

    async fn copy_object(&self, source_key: &str, destination_key: &str) -> BackendResult<()> {
        require_key(source_key)?;
        require_key(destination_key)?;
        let mut headers = BTreeMap::new();
        headers.insert(
            "x-cos-copy-source".to_string(),
            format!("{}/{}", self.config.host(), encode_key(source_key)),
        );
        self.send(Method::PUT, destination_key, BTreeMap::new(), headers, None)
            .await?;
        Ok(())
    }

    async fn list_objects(&self, request: &ListObjectsRequest) -> BackendResult<ListBucketResult> {
        let mut params = BTreeMap::new();
        params.insert("prefix".to_string(), request.prefix.clone());
        if let Some(delimiter) = &request.delimiter {
            params.insert("delimiter".to_string(), delimiter.clone());
        }
        if !request.marker.is_empty() {
            params.insert("marker".to_string(), request.marker.clone());
        }
        params.insert("max-keys".to_string(), request.max_keys.to_string());

        let response = self
            .send(Method::GET, "", params, BTreeMap::new(), None)
            .await?;
        let body = response.text().await?;
        quick_xml::de::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn get_object_acl(&self, key: &str) -> BackendResult<AccessControlPolicy> {
        require_key(key)?;
        let mut params = BTreeMap::new();
        params.insert("acl".to_string(), String::new());
        let response = self
            .send(Method::GET, key, params, BTreeMap::new(), None)
            .await?;
        let body = response.text().await?;
        quick_xml::de::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn put_object_acl(&self, key: &str, acl: CannedAcl) -> BackendResult<()> {
        require_key(key)?;
        let mut params = BTreeMap::new();
        params.insert("acl".to_string(), String::new());
        let mut headers = BTreeMap::new();
        headers.insert("x-cos-acl".to_string(), acl.as_str().to_string());
        self.send(Method::PUT, key, params, headers, None).await?;
        Ok(())
    }

    fn presign_get(&self, key: &str, expires: Duration, options: &PresignOptions) -> BackendResult<String> {
        require_key(key)?;
        if expires.is_zero() {
            return Err(BackendError::InvalidRequest("presign expiry must be positive".into()));
        }
        let ttl = i64::try_from(expires.as_secs())
            .map_err(|_| BackendError::InvalidRequest(format!("presign expiry {:?} is too long", expires)))?;
        let scheme = options.scheme.as_deref().unwrap_or(&self.config.scheme);
        let mut params = options.params.clone();
        if let Some(token) = self.config.credentials.token.as_deref().filter(|t| !t.is_empty()) {
            params.insert("x-cos-security-token".to_string(), token.to_string());
        }
        let signature = self.sign(&Method::GET, key, &params, ttl)?;

        let mut url = self.object_url(scheme, key);
        url.push('?');
        url.push_str(&signature);
        if !params.is_empty() {
            url.push('&');
            url.push_str(&encode_query(&params));
        }
        Ok(url)
    }

    async fn fetch_url(&self, url: &str) -> BackendResult<Bytes> {
        tracing::debug!("GET {}", url);
        let response = self.http.get(url).send().await?;
        let response = Self::check(response).await?;
        Ok(response.bytes().await?)
    }
}
