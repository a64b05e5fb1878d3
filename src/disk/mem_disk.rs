use std::io::{Error, ErrorKind, Result};

use crate::disk::block_device::BlockDevice;

/// 内存中的磁盘，扁平化存储所有字节
#[derive(Debug, Clone)]
pub struct MemDisk {
    bytes: Vec<u8>,
}

impl MemDisk {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0u8; size],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn range(&self, offset: u64, len: usize) -> Result<std::ops::Range<usize>> {
        let start = offset as usize;
        let end = start + len;
        if end > self.bytes.len() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "access exceeds memory disk size",
            ));
        }
        Ok(start..end)
    }
}

impl BlockDevice for MemDisk {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let range = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        let range = self.range(offset, buf.len())?;
        self.bytes[range].copy_from_slice(buf);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}
