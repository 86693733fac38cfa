//! COS驱动配置 / COS driver configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Legacy region names accepted in configuration / 旧版地域别名
const REGION_ALIASES: &[(&str, &str)] = &[
    ("cn-east", "ap-shanghai"),
    ("cn-sorth", "ap-guangzhou"),
    ("cn-north", "ap-beijing-1"),
    ("cn-south-2", "ap-guangzhou-2"),
    ("cn-southwest", "ap-chengdu"),
    ("sg", "ap-singapore"),
    ("tj", "ap-beijing-1"),
    ("bj", "ap-beijing"),
    ("sh", "ap-shanghai"),
    ("gz", "ap-guangzhou"),
    ("cd", "ap-chengdu"),
    ("sgp", "ap-singapore"),
];

/// 访问凭证 / Credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CosCredentials {
    /// APPID
    #[serde(default, alias = "appId")]
    pub app_id: String,
    /// SecretId
    #[serde(alias = "secretId")]
    pub secret_id: String,
    /// SecretKey
    #[serde(alias = "secretKey")]
    pub secret_key: String,
    /// 临时密钥的会话令牌 / Session token for temporary credentials
    #[serde(default)]
    pub token: Option<String>,
}

/// COS配置 / COS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosConfig {
    /// 地域，如 ap-guangzhou
    #[serde(default = "default_region")]
    pub region: String,
    pub credentials: CosCredentials,
    /// 存储桶名称（可带或不带 -APPID 后缀）
    pub bucket: String,
    /// CDN域名，如 https://cdn.example.com
    #[serde(default)]
    pub cdn: Option<String>,
    /// http 或 https
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// 通过CDN读取文件
    #[serde(default)]
    pub read_from_cdn: bool,
    /// 请求超时（秒）
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// 连接超时（秒）
    #[serde(default = "default_timeout")]
    pub connect_timeout: u64,
    /// 服务端加密 (AES256)
    #[serde(default)]
    pub encrypt: bool,
}

fn default_region() -> String {
    "ap-guangzhou".to_string()
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_timeout() -> u64 {
    60
}

impl CosConfig {
    pub fn new(region: &str, bucket: &str, credentials: CosCredentials) -> Self {
        Self {
            region: region.to_string(),
            credentials,
            bucket: bucket.to_string(),
            cdn: None,
            scheme: default_scheme(),
            read_from_cdn: false,
            timeout: default_timeout(),
            connect_timeout: default_timeout(),
            encrypt: false,
        }
    }

    /// Check required fields / 校验必填项
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(anyhow!("bucket is required"));
        }
        if self.credentials.secret_id.is_empty() || self.credentials.secret_key.is_empty() {
            return Err(anyhow!("credentials.secret_id and credentials.secret_key are required"));
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(anyhow!("unsupported scheme: {}", self.scheme));
        }
        Ok(())
    }

    /// Bucket name without the APPID suffix / 去掉 APPID 后缀的桶名
    pub fn bucket(&self) -> &str {
        let app_id = self.credentials.app_id.as_str();
        if app_id.is_empty() {
            return &self.bucket;
        }
        self.bucket
            .strip_suffix(app_id)
            .and_then(|rest| rest.strip_suffix('-'))
            .unwrap_or(&self.bucket)
    }

    /// `{bucket}-{appid}` as COS expects / 完整桶名
    pub fn bucket_with_app_id(&self) -> String {
        if self.credentials.app_id.is_empty() {
            self.bucket().to_string()
        } else {
            format!("{}-{}", self.bucket(), self.credentials.app_id)
        }
    }

    /// Canonical region, resolving legacy aliases / 规范化地域
    pub fn region(&self) -> &str {
        REGION_ALIASES
            .iter()
            .find(|(alias, _)| *alias == self.region)
            .map(|(_, region)| *region)
            .unwrap_or(&self.region)
    }

    /// Bucket endpoint host / 存储桶域名
    pub fn host(&self) -> String {
        format!("{}.cos.{}.myqcloud.com", self.bucket_with_app_id(), self.region())
    }

    /// Cloud Infinite (image processing) host / 数据万象域名
    pub fn picture_host(&self) -> String {
        format!("{}.pic.{}.myqcloud.com", self.bucket_with_app_id(), self.region())
    }

    /// CDN domain if configured and non-empty / CDN域名
    pub fn cdn(&self) -> Option<&str> {
        self.cdn
            .as_deref()
            .map(|c| c.trim_end_matches('/'))
            .filter(|c| !c.is_empty())
    }

    pub fn should_read_from_cdn(&self) -> bool {
        self.read_from_cdn && self.cdn().is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}
