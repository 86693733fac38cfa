//! COS驱动工厂 / Builds COS adapters from JSON configuration

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::storage::{AdapterFactory, FilesystemAdapter};
use super::adapter::CosAdapter;
use super::config::CosConfig;
use super::filesystem::CosFilesystem;
use super::http::CosHttpClient;

/// COS驱动工厂
pub struct CosAdapterFactory;

impl AdapterFactory for CosAdapterFactory {
    fn driver_type(&self) -> &'static str {
        "qcloud-cos"
    }

    fn create_adapter(&self, config: Value) -> Result<Box<dyn FilesystemAdapter>> {
        let config: CosConfig = serde_json::from_value(config)
            .map_err(|e| anyhow!("配置解析失败 / invalid COS config: {}", e))?;
        Ok(Box::new(create_adapter(config)?))
    }
}

/// Create a COS client / 创建COS客户端
pub fn create_client(config: CosConfig) -> Result<CosHttpClient> {
    CosHttpClient::new(config)
}

/// Create the filesystem adapter / 创建文件系统适配器
pub fn create_adapter(config: CosConfig) -> Result<CosAdapter> {
    let client = create_client(config.clone())?;
    tracing::info!(
        "COS adapter ready: bucket={}, region={}",
        config.bucket_with_app_id(),
        config.region()
    );
    Ok(CosAdapter::new(client, config))
}

/// Create the extended filesystem (URLs, remote uploads) / 创建扩展文件系统
pub fn create_filesystem(config: CosConfig) -> Result<CosFilesystem> {
    Ok(CosFilesystem::new(create_adapter(config)?))
}
