pub mod config;
pub mod storage;

// Driver modules (point to project root drivers via path attribute) / 驱动模块
#[path = "../drivers/mod.rs"]
pub mod drivers;

pub use drivers::cos::{CosAdapter, CosConfig, CosFilesystem};
pub use storage::{FilesystemAdapter, FilesystemError, FsResult, StorageAttributes, Visibility, WriteOptions};
