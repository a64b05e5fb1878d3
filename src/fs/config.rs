use std::path::PathBuf;

use crate::disk::DISK_SIZE;

// inode 中直接块指针的个数
pub const DIRECT_BLOCKS: usize = 3;

// 文件系统标识与魔数，写入快照用于识别
pub const FS_TYPE: &str = "TierFS";
pub const FS_MAGIC: u64 = 0x5449_4552_4653_0001;

// 元数据快照文件的扩展名：<disk>.meta
pub const META_EXTENSION: &str = "meta";

pub const DEFAULT_DISK_PATH: &str = "DISK_SIM_FILE.img";
pub const HISTORY_FILE: &str = ".tierfs_history";
pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// 启动时挂载磁盘所需的参数
#[derive(Debug, Clone)]
pub struct DiskOptions {
    /// None 表示使用内存磁盘
    pub disk_path: Option<PathBuf>,
    pub capacity: usize,
    /// 新磁盘启动时自动格式化所用的块大小
    pub block_size: Option<usize>,
}

impl Default for DiskOptions {
    fn default() -> Self {
        Self {
            disk_path: Some(PathBuf::from(DEFAULT_DISK_PATH)),
            capacity: DISK_SIZE,
            block_size: None,
        }
    }
}
