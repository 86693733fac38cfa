// Driver package / 驱动包
pub mod cos;

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::storage::{AdapterFactory, FilesystemAdapter};

/// All registered driver factories / 所有驱动工厂
pub fn factories() -> Vec<Box<dyn AdapterFactory>> {
    vec![Box::new(cos::CosAdapterFactory)]
}

/// Create an adapter by driver type / 按驱动类型创建适配器
pub fn create_adapter(driver_type: &str, config: Value) -> Result<Box<dyn FilesystemAdapter>> {
    let factory = factories()
        .into_iter()
        .find(|f| f.driver_type() == driver_type)
        .ok_or_else(|| anyhow!("Driver type not found: {}", driver_type))?;
    let adapter = factory.create_adapter(config)?;
    tracing::info!("Adapter created: {}", driver_type);
    Ok(adapter)
}
