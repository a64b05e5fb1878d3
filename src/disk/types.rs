use serde::{Deserialize, Serialize};

/// 模拟磁盘的默认总大小（字节）
/// 整个文件系统只占用这一小块平坦的存储区域。
pub const DISK_SIZE: usize = 512;

/// 格式化时允许的最小块大小
pub const MIN_BLOCK_SIZE: usize = 2;

/// 没有指定块大小时使用的默认值
pub const DEFAULT_BLOCK_SIZE: usize = 4;

/// 间接块里每个块号指针占用的字节数。
/// 指针宽度决定了可寻址的块数上限：256^POINTER_WIDTH。
pub const POINTER_WIDTH: usize = 1;

/// 指针能够表示的最大块数（单字节指针时为 256）
pub const MAX_ADDRESSABLE_BLOCKS: usize = 1 << (8 * POINTER_WIDTH);

/// 块号
pub type BlockId = usize;

/// 格式化时确定的块布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub block_size: usize,
    pub capacity: usize,
}

impl Geometry {
    pub fn new(block_size: usize, capacity: usize) -> Self {
        Self {
            block_size,
            capacity,
        }
    }

    /// 可分配的块数，块号超出指针表示范围的块不会被分配
    pub fn block_count(&self) -> usize {
        if self.block_size == 0 {
            return 0;
        }
        (self.capacity / self.block_size).min(MAX_ADDRESSABLE_BLOCKS)
    }

    /// 一个间接块能放多少个指针
    pub fn pointers_per_block(&self) -> usize {
        self.block_size / POINTER_WIDTH
    }

    /// 可分配块覆盖的字节数
    pub fn usable_bytes(&self) -> usize {
        self.block_count() * self.block_size
    }

    /// 三级结构能描述的最大文件：3B + P·B + P²·B
    /// 块很大时结果饱和到 usize::MAX
    pub fn max_file_size(&self) -> usize {
        let b = self.block_size;
        let p = self.pointers_per_block();
        let direct = crate::fs::config::DIRECT_BLOCKS.saturating_mul(b);
        let single = p.saturating_mul(b);
        let double = p.saturating_mul(p).saturating_mul(b);
        direct.saturating_add(single).saturating_add(double)
    }

    /// `block` 在磁盘上的起始偏移
    pub fn offset_of(&self, block: BlockId) -> u64 {
        (block * self.block_size) as u64
    }
}

/// 把块号编码成 POINTER_WIDTH 字节（小端）
pub fn encode_pointer(block: BlockId) -> [u8; POINTER_WIDTH] {
    let mut out = [0u8; POINTER_WIDTH];
    out.copy_from_slice(&block.to_le_bytes()[..POINTER_WIDTH]);
    out
}

/// 从 POINTER_WIDTH 字节解码块号
pub fn decode_pointer(raw: &[u8]) -> BlockId {
    raw.iter()
        .take(POINTER_WIDTH)
        .rev()
        .fold(0usize, |acc, &byte| (acc << 8) | byte as usize)
}
