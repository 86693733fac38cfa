//! COS数据类型 / COS request and response types

use std::collections::BTreeMap;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::storage::{DirectoryAttributes, FileAttributes, StorageAttributes};

/// Largest `max-keys` COS accepts / 单次列举上限
pub const MAX_KEYS: u32 = 1000;

/// Grantee URI that marks anonymous access / 公共读授权对象
pub const ALL_USERS_URI: &str = "global/AllUsers";

/// GET Bucket 请求参数 / List request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsRequest {
    pub prefix: String,
    pub delimiter: Option<String>,
    pub marker: String,
    pub max_keys: u32,
}

/// GET Bucket 响应 / One listing page
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListBucketResult {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub marker: String,
    #[serde(default)]
    pub next_marker: Option<String>,
    #[serde(default)]
    pub is_truncated: bool,
    #[serde(default)]
    pub contents: Vec<ObjectRecord>,
    #[serde(default)]
    pub common_prefixes: Vec<CommonPrefix>,
}

impl ListBucketResult {
    /// Marker for the following request / 下一页的起始标记
    ///
    /// COS only returns `NextMarker` when a delimiter was sent, so the last
    /// key or prefix of the page stands in for it.
    pub fn continuation_marker(&self) -> Option<String> {
        if let Some(marker) = self.next_marker.as_deref().filter(|m| !m.is_empty()) {
            return Some(marker.to_string());
        }
        let last_key = self.contents.last().map(|o| o.key.as_str());
        let last_prefix = self.common_prefixes.last().map(|p| p.prefix.as_str());
        match (last_key, last_prefix) {
            (Some(k), Some(p)) => Some(k.max(p).to_string()),
            (Some(k), None) => Some(k.to_string()),
            (None, Some(p)) => Some(p.to_string()),
            (None, None) => None,
        }
    }

    /// Objects first, then common prefixes, each in response order / 条目顺序
    pub fn into_entries(self) -> impl Iterator<Item = StorageAttributes> {
        self.contents
            .into_iter()
            .map(|o| StorageAttributes::File(o.into()))
            .chain(
                self.common_prefixes
                    .into_iter()
                    .map(|p| StorageAttributes::Directory(p.into())),
            )
    }
}

/// 对象条目 / Raw object record
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectRecord {
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default, rename = "ETag")]
    pub etag: Option<String>,
}

impl From<ObjectRecord> for FileAttributes {
    fn from(record: ObjectRecord) -> Self {
        let last_modified = record.last_modified.as_deref().and_then(parse_timestamp);
        FileAttributes::new(record.key)
            .with_file_size(record.size)
            .with_last_modified(last_modified)
    }
}

/// 公共前缀 / Raw common prefix record
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommonPrefix {
    pub prefix: String,
}

impl From<CommonPrefix> for DirectoryAttributes {
    fn from(record: CommonPrefix) -> Self {
        let path = record.prefix.strip_suffix('/').unwrap_or(&record.prefix);
        DirectoryAttributes::new(path)
    }
}

/// HEAD Object 结果 / Object metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub content_length: Option<u64>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

impl ObjectMeta {
    pub fn last_modified_timestamp(&self) -> Option<i64> {
        self.last_modified.as_deref().and_then(parse_timestamp)
    }
}

/// 预设ACL / Canned ACL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CannedAcl {
    #[serde(rename = "private")]
    Private,
    #[serde(rename = "public-read")]
    PublicRead,
}

impl CannedAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
        }
    }
}

/// PUT Object 选项 / Upload options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    /// e.g. `AES256`
    pub server_side_encryption: Option<String>,
    pub acl: Option<CannedAcl>,
    pub headers: BTreeMap<String, String>,
}

/// 预签名选项 / Presign options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresignOptions {
    /// Override the configured scheme / 覆盖协议
    pub scheme: Option<String>,
    /// Extra query parameters, e.g. `response-content-disposition` / 额外查询参数
    pub params: BTreeMap<String, String>,
}

/// GET Object acl 响应 / ACL document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessControlPolicy {
    #[serde(default)]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub access_control_list: AccessControlList,
}

impl AccessControlPolicy {
    /// Public iff some grant gives READ to all users / 是否公共读
    ///
    /// Other grants are not considered.
    pub fn is_public_read(&self) -> bool {
        self.access_control_list.grants.iter().any(|grant| {
            grant.permission == "READ"
                && grant
                    .grantee
                    .uri
                    .as_deref()
                    .map(|uri| uri.contains(ALL_USERS_URI))
                    .unwrap_or(false)
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Owner {
    #[serde(default, rename = "ID")]
    pub id: Option<String>,
    #[serde(default, rename = "DisplayName")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessControlList {
    #[serde(default, rename = "Grant")]
    pub grants: Vec<Grant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Grant {
    #[serde(default)]
    pub grantee: Grantee,
    #[serde(default)]
    pub permission: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Grantee {
    #[serde(default, rename = "URI")]
    pub uri: Option<String>,
    #[serde(default, rename = "ID")]
    pub id: Option<String>,
}

/// 错误响应 / Error document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Parse COS timestamps into Unix seconds / 解析时间戳
///
/// Listings use ISO 8601 (`2024-01-02T03:04:05.000Z`), HEAD uses HTTP-date.
pub fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .map(|dt| dt.timestamp())
        .ok()
}
