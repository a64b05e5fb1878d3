use std::{
    fs::{File, OpenOptions},
    io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::debug;

use crate::disk::block_device::BlockDevice;

/// 用宿主文件模拟的磁盘
#[derive(Debug)]
pub struct FileDisk {
    file: File,
    path: PathBuf,
    size: u64,
}

impl FileDisk {
    /// 打开（或创建）磁盘镜像。
    /// 新镜像扩展到 `size` 字节；已有镜像长度不符时拒绝打开，不改动其内容。
    pub fn open<P: AsRef<Path>>(path: P, size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        let current = file.metadata()?.len();
        if current == 0 {
            debug!(
                "sizing new disk image {} to {} bytes",
                path.as_ref().display(),
                size
            );
            file.set_len(size)?;
        } else if current != size {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "disk image {} has {} bytes, expected {}",
                    path.as_ref().display(),
                    current,
                    size
                ),
            ));
        }

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_range(&self, offset: u64, len: usize) -> Result<()> {
        if offset + len as u64 > self.size {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "access of {} bytes at offset {} exceeds disk size {}",
                    len, offset, self.size
                ),
            ));
        }
        Ok(())
    }
}

impl BlockDevice for FileDisk {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(offset, buf.len())?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.check_range(offset, buf.len())?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        // 同步写：每次写入后立即落盘
        self.file.flush()?;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.size
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()
    }
}
