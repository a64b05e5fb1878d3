use serde::{Deserialize, Serialize};

use crate::{
    disk::Geometry,
    fs::{
        config::{FS_MAGIC, FS_TYPE},
        error::{FsError, Result},
    },
    utils::{current_timestamp, generate_uuid},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuperBlock {
    pub fs_type: String, // 文件系统标识
    pub magic: u64,      // 魔数，用于识别文件系统
    /** 块信息 */
    pub geometry: Geometry,
    /** 其他元信息 */
    pub volume_id: String,   // 每次格式化生成的卷 ID
    pub formatted_at: i64,   // 格式化时间
}

impl SuperBlock {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            fs_type: FS_TYPE.to_string(),
            magic: FS_MAGIC,
            geometry,
            volume_id: generate_uuid(),
            formatted_at: current_timestamp(),
        }
    }

    /// 校验快照中的超级块是否属于本文件系统
    pub fn validate(&self, device_len: u64) -> Result<()> {
        if self.magic != FS_MAGIC || self.fs_type != FS_TYPE {
            return Err(FsError::Corrupted(format!(
                "unknown file system '{}' (magic {:#x})",
                self.fs_type, self.magic
            )));
        }
        if self.geometry.capacity as u64 != device_len {
            return Err(FsError::Corrupted(format!(
                "volume was formatted for {} bytes, disk has {}",
                self.geometry.capacity, device_len
            )));
        }
        Ok(())
    }

    pub fn block_size(&self) -> usize {
        self.geometry.block_size
    }

    pub fn total_blocks(&self) -> usize {
        self.geometry.block_count()
    }
}
