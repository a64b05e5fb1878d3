use crate::disk::BlockId;
use crate::fs::config::DIRECT_BLOCKS;
use crate::fs::inode::Branch;

/// 打开文件表中一个槽位的展示信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorInfo {
    pub index: usize,
    pub name: String,
    pub in_use: bool,
    /// 文件已删除时为 None
    pub size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: usize,
    pub blocks: usize,
    pub modified_at: i64,
}

/// 单个文件的块布局
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub name: String,
    pub size: usize,
    pub blocks_in_use: usize,
    pub total_blocks: usize,
    pub direct: [Option<BlockId>; DIRECT_BLOCKS],
    pub single_indirect: Option<BlockId>,
    pub single_count: usize,
    pub double_indirect: Option<BlockId>,
    pub branches: Vec<Branch>,
    /// 按文件顺序排列的数据块
    pub data_blocks: Vec<BlockId>,
    pub created_at: i64,
    pub modified_at: i64,
}

/// 磁盘使用情况
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usage {
    pub volume_id: String,
    pub block_size: usize,
    pub block_count: usize,
    pub used_blocks: usize,
    pub free_blocks: usize,
    pub bytes_used: usize,
    pub capacity: usize,
    pub max_file_size: usize,
    pub files: usize,
}
