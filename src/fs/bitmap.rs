use serde::{Deserialize, Serialize};

use crate::disk::BlockId;

/// 块位图：每个 bit 表示一个块是否被占用
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockBitmap {
    bits: Vec<u8>,      // 位图数据
    total_blocks: usize, // 块总数
    used_blocks: usize,  // 已占用块数，随分配/释放增量维护
}

impl BlockBitmap {
    pub fn new(total_blocks: usize) -> Self {
        Self {
            bits: vec![0; total_blocks.div_ceil(8)],
            total_blocks,
            used_blocks: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.total_blocks
    }

    pub fn is_empty(&self) -> bool {
        self.total_blocks == 0
    }

    pub fn used_count(&self) -> usize {
        self.used_blocks
    }

    pub fn free_count(&self) -> usize {
        self.total_blocks - self.used_blocks
    }

    /// 线性扫描，返回第一个空闲块号
    pub fn find_free(&self) -> Option<BlockId> {
        for (byte_index, byte) in self.bits.iter().enumerate() {
            if *byte == 0xFF {
                continue;
            }
            for bit in 0..8 {
                let block = byte_index * 8 + bit;
                if block >= self.total_blocks {
                    return None;
                }
                if *byte & (1 << bit) == 0 {
                    return Some(block);
                }
            }
        }
        None
    }

    /// 分配第一个空闲块并标记为占用
    pub fn alloc(&mut self) -> Option<BlockId> {
        let block = self.find_free()?;
        self.mark_used(block);
        Some(block)
    }

    /// 标记占用；返回该块之前是否空闲
    pub fn mark_used(&mut self, block: BlockId) -> bool {
        if block >= self.total_blocks || self.is_used(block) {
            return false;
        }
        self.bits[block / 8] |= 1 << (block % 8);
        self.used_blocks += 1;
        true
    }

    /// 释放一个块；重复释放不做任何事
    pub fn free(&mut self, block: BlockId) -> bool {
        if block >= self.total_blocks || !self.is_used(block) {
            return false;
        }
        self.bits[block / 8] &= !(1 << (block % 8));
        self.used_blocks -= 1;
        true
    }

    pub fn is_used(&self, block: BlockId) -> bool {
        block < self.total_blocks && self.bits[block / 8] & (1 << (block % 8)) != 0
    }

    pub fn is_free(&self, block: BlockId) -> bool {
        block < self.total_blocks && !self.is_used(block)
    }

    /// 重新统计占用块数，用于校验增量计数
    pub fn recount(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn used_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.total_blocks).filter(move |&block| self.is_used(block))
    }
}
