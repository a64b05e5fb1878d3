use log::{debug, info, trace};

use crate::disk::{
    decode_pointer, encode_pointer, BlockDevice, BlockId, Geometry, MIN_BLOCK_SIZE, POINTER_WIDTH,
};
use crate::fs::bitmap::BlockBitmap;
use crate::fs::error::{FsError, Result};

/// `write_bytes` 写到哪里
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// 从位图取第一个空闲块
    Allocate,
    /// 写入已拥有的块，从 `offset` 开始
    Existing { block: BlockId, offset: usize },
}

/// 底层块存储：磁盘 + 空闲块位图 + 已写字节数
pub struct BlockStore {
    device: Box<dyn BlockDevice>,
    geometry: Geometry,
    bitmap: BlockBitmap,
    bytes_used: usize,
}

impl BlockStore {
    /// 包装未格式化的设备，`format` 之前不能分配块
    pub fn new(device: Box<dyn BlockDevice>) -> Self {
        let capacity = device.len() as usize;
        Self {
            device,
            geometry: Geometry::new(0, capacity),
            bitmap: BlockBitmap::new(0),
            bytes_used: 0,
        }
    }

    /// 清零整个设备，按 `block_size` 重建位图
    pub fn format(&mut self, block_size: usize) -> Result<()> {
        let capacity = self.device.len() as usize;
        if block_size < MIN_BLOCK_SIZE || block_size > capacity {
            return Err(FsError::InvalidBlockSize(block_size));
        }

        self.device.write_at(0, &vec![0u8; capacity])?;
        self.device.sync()?;

        self.geometry = Geometry::new(block_size, capacity);
        self.bitmap = BlockBitmap::new(self.geometry.block_count());
        self.bytes_used = 0;
        info!(
            "formatted {} bytes with block size {} ({} blocks)",
            capacity,
            block_size,
            self.geometry.block_count()
        );
        Ok(())
    }

    /// 从快照恢复分配状态
    pub fn restore(
        &mut self,
        geometry: Geometry,
        bitmap: BlockBitmap,
        bytes_used: usize,
    ) -> Result<()> {
        if geometry.capacity != self.device.len() as usize {
            return Err(FsError::Corrupted(format!(
                "snapshot capacity {} does not match disk size {}",
                geometry.capacity,
                self.device.len()
            )));
        }
        if bitmap.len() != geometry.block_count() {
            return Err(FsError::Corrupted(format!(
                "bitmap covers {} blocks, geometry has {}",
                bitmap.len(),
                geometry.block_count()
            )));
        }
        if bitmap.recount() != bitmap.used_count() {
            return Err(FsError::Corrupted("bitmap counter out of sync".into()));
        }
        self.geometry = geometry;
        self.bitmap = bitmap;
        self.bytes_used = bytes_used;
        Ok(())
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn block_size(&self) -> usize {
        self.geometry.block_size
    }

    pub fn bitmap(&self) -> &BlockBitmap {
        &self.bitmap
    }

    pub fn used_blocks(&self) -> usize {
        self.bitmap.used_count()
    }

    pub fn free_blocks(&self) -> usize {
        self.bitmap.free_count()
    }

    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    pub fn find_free_block(&self) -> Option<BlockId> {
        self.bitmap.find_free()
    }

    /// 还能否再分配 `blocks` 个块（同时检查位图和已用字节数）
    pub fn can_admit(&self, blocks: usize) -> bool {
        self.bitmap.free_count() >= blocks
            && self.bytes_used + blocks * self.geometry.block_size <= self.geometry.usable_bytes()
    }

    /// 只占用块不写数据，用于索引块
    pub fn allocate_block(&mut self) -> Result<BlockId> {
        let block = self.bitmap.alloc().ok_or(FsError::OutOfSpace)?;
        debug!("allocated index block {}", block);
        Ok(block)
    }

    /// 读取整块到 `buf`
    pub fn read_block(&mut self, block: BlockId, buf: &mut [u8]) -> Result<()> {
        let size = self.geometry.block_size;
        if buf.len() < size {
            return Err(FsError::Corrupted(format!(
                "read buffer of {} bytes is smaller than a block",
                buf.len()
            )));
        }
        self.check_block(block)?;
        self.device
            .read_at(self.geometry.offset_of(block), &mut buf[..size])?;
        Ok(())
    }

    /// 写入 `min(data.len(), max_len)` 字节，返回 (块号, 写入字节数)
    /// 写不满时块的其余部分保持不变
    pub fn write_bytes(
        &mut self,
        data: &[u8],
        max_len: usize,
        placement: Placement,
    ) -> Result<(BlockId, usize)> {
        let size = self.geometry.block_size;
        let (block, offset, fresh) = match placement {
            Placement::Allocate => {
                let block = self.find_free_block().ok_or(FsError::OutOfSpace)?;
                (block, 0, true)
            }
            Placement::Existing { block, offset } => {
                self.check_block(block)?;
                (block, offset.min(size), false)
            }
        };

        let amount = data.len().min(max_len).min(size - offset);
        self.device.write_at(
            self.geometry.offset_of(block) + offset as u64,
            &data[..amount],
        )?;

        if fresh {
            self.bitmap.mark_used(block);
            debug!("allocated data block {} ({} bytes)", block, amount);
        } else {
            trace!("wrote {} bytes into block {} at {}", amount, block, offset);
        }
        self.bytes_used += amount;
        Ok((block, amount))
    }

    /// 把 `target` 写到索引块 `pointer_block` 的第 `index` 项
    pub fn write_pointer(
        &mut self,
        pointer_block: BlockId,
        index: usize,
        target: BlockId,
    ) -> Result<()> {
        let offset = self.pointer_offset(pointer_block, index)?;
        self.write_raw(offset, &encode_pointer(target))
    }

    pub fn read_pointer(&mut self, pointer_block: BlockId, index: usize) -> Result<BlockId> {
        let offset = self.pointer_offset(pointer_block, index)?;
        let mut raw = [0u8; POINTER_WIDTH];
        self.device.read_at(offset, &mut raw)?;
        let block = decode_pointer(&raw);
        if block >= self.geometry.block_count() {
            return Err(FsError::Corrupted(format!(
                "index block {} entry {} points past the disk ({})",
                pointer_block, index, block
            )));
        }
        Ok(block)
    }

    /// 读取索引块的前 `count` 项
    pub fn read_pointers(&mut self, pointer_block: BlockId, count: usize) -> Result<Vec<BlockId>> {
        (0..count)
            .map(|index| self.read_pointer(pointer_block, index))
            .collect()
    }

    /// 按偏移直接写，用于指针项
    pub fn write_raw(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.device.write_at(offset, bytes)?;
        Ok(())
    }

    /// 归还块，重复释放无影响
    pub fn free_block(&mut self, block: BlockId) {
        if self.bitmap.free(block) {
            debug!("freed block {}", block);
        }
    }

    pub fn release_bytes(&mut self, amount: usize) {
        self.bytes_used = self.bytes_used.saturating_sub(amount);
    }

    /// 整个磁盘的原始字节
    pub fn contents(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.device.len() as usize];
        self.device.read_at(0, &mut buf)?;
        Ok(buf)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.device.sync()?;
        Ok(())
    }

    fn pointer_offset(&self, pointer_block: BlockId, index: usize) -> Result<u64> {
        self.check_block(pointer_block)?;
        if index >= self.geometry.pointers_per_block() {
            return Err(FsError::Corrupted(format!(
                "pointer index {} exceeds index block capacity {}",
                index,
                self.geometry.pointers_per_block()
            )));
        }
        Ok(self.geometry.offset_of(pointer_block) + (index * POINTER_WIDTH) as u64)
    }

    fn check_block(&self, block: BlockId) -> Result<()> {
        if block >= self.geometry.block_count() {
            return Err(FsError::Corrupted(format!(
                "block {} is outside the disk ({} blocks)",
                block,
                self.geometry.block_count()
            )));
        }
        Ok(())
    }
}
