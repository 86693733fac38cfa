//! 腾讯云COS驱动 / Tencent Cloud COS driver

pub mod adapter;
pub mod client;
pub mod config;
pub mod factory;
pub mod filesystem;
pub mod http;
pub mod listing;
pub mod sign;
pub mod types;

#[cfg(test)]
pub(crate) mod memory;

pub use adapter::CosAdapter;
pub use client::{BackendResult, CosBackend};
pub use config::{CosConfig, CosCredentials};
pub use factory::{create_adapter, create_client, create_filesystem, CosAdapterFactory};
pub use filesystem::CosFilesystem;
pub use http::CosHttpClient;
pub use types::{CannedAcl, ListBucketResult, ListObjectsRequest, ObjectMeta, PresignOptions, PutOptions};
