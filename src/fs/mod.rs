use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::{
    disk::BlockDevice,
    fs::{
        block_store::BlockStore,
        check::CheckReport,
        descriptor::DescriptorTable,
        directory::Directory,
        error::{FsError, Result},
        info::{DescriptorInfo, FileInfo, FileStat, Usage},
        inode::{Inode, InodeId, InodeTable},
        snapshot::SnapshotRef,
        super_block::SuperBlock,
    },
};

pub mod bitmap;
pub mod block_store;
pub mod check;
pub mod config;
pub mod dealloc;
pub mod descriptor;
pub mod directory;
pub mod error;
pub mod info;
pub mod inode;
pub mod reader;
pub mod snapshot;
pub mod super_block;
pub mod writer;

/// 格式化之后才存在的文件系统状态
#[derive(Debug)]
struct Volume {
    super_block: SuperBlock,       // 文件系统总体信息
    inodes: InodeTable,            // 所有 inode
    directory: Directory,          // 文件名 -> inode
    descriptors: DescriptorTable, // 打开文件表，不写入快照
}

impl Volume {
    fn new(super_block: SuperBlock) -> Self {
        Self {
            super_block,
            inodes: InodeTable::new(),
            directory: Directory::new(),
            descriptors: DescriptorTable::new(),
        }
    }

    fn lookup(&self, name: &str) -> Result<InodeId> {
        self.directory
            .find(name)
            .ok_or_else(|| FsError::FileNotFound(name.to_string()))
    }

    fn inode(&self, id: InodeId) -> Result<&Inode> {
        self.inodes
            .get(id)
            .ok_or_else(|| FsError::Corrupted(format!("inode {} is missing", id)))
    }

    fn ensure_closed(&self, name: &str) -> Result<()> {
        if self.descriptors.is_open(name) {
            return Err(FsError::FileInUse(name.to_string()));
        }
        Ok(())
    }

    /// 释放文件的所有块并删除目录项，调用方保证文件未打开
    fn remove(&mut self, store: &mut BlockStore, name: &str) -> Result<()> {
        let id = self.lookup(name)?;
        if let Some(inode) = self.inodes.get_mut(id) {
            dealloc::release(store, inode)?;
        }
        self.directory.remove(name);
        self.inodes.free(id);
        self.descriptors.clear_name(name);
        Ok(())
    }
}

/// 文件系统：块存储，加上格式化后的卷
pub struct FileSystem {
    store: BlockStore,              // 底层块存储与位图
    volume: Option<Volume>,         // None 表示尚未格式化
    meta_path: Option<PathBuf>,     // 元数据快照位置
}

impl FileSystem {
    /// 包装未格式化的设备
    pub fn new(device: Box<dyn BlockDevice>) -> Self {
        Self {
            store: BlockStore::new(device),
            volume: None,
            meta_path: None,
        }
    }

    /// `sync` 写快照的位置
    pub fn with_meta_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.meta_path = Some(path.into());
        self
    }

    /// 打开设备并加载 `meta_path` 处的快照，没有快照时保持未格式化
    /// 快照加载后做一次一致性检查，不通过则拒绝挂载
    pub fn mount(device: Box<dyn BlockDevice>, meta_path: impl Into<PathBuf>) -> Result<Self> {
        let meta_path = meta_path.into();
        let mut fs = Self::new(device).with_meta_path(meta_path.clone());
        if !meta_path.exists() {
            info!("no metadata at {}, disk is unformatted", meta_path.display());
            return Ok(fs);
        }

        let snapshot = snapshot::load(&meta_path)?;
        snapshot
            .super_block
            .validate(fs.store.geometry().capacity as u64)?;
        fs.store.restore(
            snapshot.super_block.geometry,
            snapshot.bitmap,
            snapshot.bytes_used,
        )?;
        let report = check::check(&mut fs.store, &snapshot.inodes, &snapshot.directory)?;
        if !report.is_clean() {
            return Err(FsError::Corrupted(format!(
                "volume {} fails the consistency check: {:?}",
                snapshot.super_block.volume_id, report
            )));
        }
        info!(
            "mounted volume {} ({} files, {} blocks in use)",
            snapshot.super_block.volume_id,
            snapshot.directory.len(),
            fs.store.used_blocks()
        );
        fs.volume = Some(Volume {
            super_block: snapshot.super_block,
            inodes: snapshot.inodes,
            directory: snapshot.directory,
            descriptors: DescriptorTable::new(),
        });
        Ok(fs)
    }

    pub fn is_formatted(&self) -> bool {
        self.volume.is_some()
    }

    pub fn super_block(&self) -> Option<&SuperBlock> {
        self.volume.as_ref().map(|vol| &vol.super_block)
    }

    pub fn meta_path(&self) -> Option<&Path> {
        self.meta_path.as_deref()
    }

    pub fn file_count(&self) -> usize {
        self.volume.as_ref().map_or(0, |vol| vol.directory.len())
    }

    /// 格式化：清空磁盘、位图、inode、目录和打开文件表
    pub fn format(&mut self, block_size: usize) -> Result<()> {
        self.store.format(block_size)?;
        let super_block = SuperBlock::new(self.store.geometry());
        info!("new volume {}", super_block.volume_id);
        self.volume = Some(Volume::new(super_block));
        self.sync()
    }

    /// 创建空文件并打开
    pub fn create(&mut self, name: &str) -> Result<usize> {
        let (store, vol) = self.parts()?;
        if vol.directory.contains(name) {
            return Err(FsError::FileAlreadyExists(name.to_string()));
        }
        let id = vol.inodes.alloc(Inode::new(store.geometry()));
        vol.directory.add(name, id)?;
        let fd = vol.descriptors.allocate_slot(name, id);
        info!("created '{}' (inode {}, fd {})", name, id, fd);
        Ok(fd)
    }

    pub fn open(&mut self, name: &str) -> Result<usize> {
        let vol = self.volume_mut()?;
        let id = vol.lookup(name)?;
        vol.ensure_closed(name)?;
        let fd = vol.descriptors.allocate_slot(name, id);
        debug!("opened '{}' as fd {}", name, fd);
        Ok(fd)
    }

    /// 关闭 `fd`，返回文件名
    pub fn close(&mut self, fd: usize) -> Result<String> {
        let name = self.volume_mut()?.descriptors.mark_closed(fd)?;
        debug!("closed fd {} ('{}')", fd, name);
        Ok(name)
    }

    /// 追加最多 `len` 字节，遇到 NUL 停止，返回实际写入字节数
    pub fn write(&mut self, fd: usize, data: &[u8], len: usize) -> Result<usize> {
        let (store, vol) = self.parts()?;
        let id = vol.descriptors.inode_of(fd)?;
        let inode = vol
            .inodes
            .get_mut(id)
            .ok_or(FsError::InvalidDescriptor(fd))?;
        if inode.is_full() && !inode.has_slack() {
            return Err(FsError::OutOfSpace);
        }
        writer::append(store, inode, clip(data, len))
    }

    /// 读取文件前 `len` 字节
    pub fn read(&mut self, fd: usize, len: isize) -> Result<Vec<u8>> {
        if len < 0 {
            return Err(FsError::InvalidLength(len));
        }
        let (store, vol) = self.parts()?;
        let id = vol.descriptors.inode_of(fd)?;
        let inode = vol.inode(id)?;
        reader::read(store, inode, len as usize)
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        let (store, vol) = self.parts()?;
        vol.lookup(name)?;
        vol.ensure_closed(name)?;
        vol.remove(store, name)?;
        info!("deleted '{}'", name);
        Ok(())
    }

    /// 复制 `src` 到 `dest`，`dest` 已存在则替换
    /// 副本走正常写入路径重新分配块，返回复制的字节数
    pub fn copy(&mut self, src: &str, dest: &str) -> Result<usize> {
        if src == dest {
            return Err(FsError::SameSourceAndDestination(src.to_string()));
        }
        let (store, vol) = self.parts()?;
        let src_id = vol.lookup(src)?;
        vol.ensure_closed(src)?;

        let required = vol.inode(src_id)?.total_blocks();
        let reclaimable = match vol.directory.find(dest) {
            Some(id) => vol.inode(id)?.total_blocks(),
            None => 0,
        };
        if store.free_blocks() + reclaimable < required {
            return Err(FsError::OutOfSpace);
        }
        let replace = vol.directory.contains(dest);
        if replace {
            vol.ensure_closed(dest)?;
        }

        // 先读完源文件，读失败时旧的目标文件保持不变
        let src_fd = vol.descriptors.allocate_slot(src, src_id);
        let content = match reader::read(store, vol.inode(src_id)?, usize::MAX) {
            Ok(content) => content,
            Err(err) => {
                vol.descriptors.mark_closed(src_fd)?;
                return Err(err);
            }
        };
        if replace {
            if let Err(err) = vol.remove(store, dest) {
                vol.descriptors.mark_closed(src_fd)?;
                return Err(err);
            }
        }

        let dest_id = vol.inodes.alloc(Inode::new(store.geometry()));
        vol.directory.add(dest, dest_id)?;
        let dest_fd = vol.descriptors.allocate_slot(dest, dest_id);
        let written = match vol.inodes.get_mut(dest_id) {
            Some(inode) => writer::append(store, inode, &content),
            None => Err(FsError::Corrupted(format!("inode {} is missing", dest_id))),
        };
        vol.descriptors.mark_closed(src_fd)?;
        vol.descriptors.mark_closed(dest_fd)?;

        match written {
            Ok(bytes) => {
                info!("copied '{}' to '{}' ({} bytes)", src, dest, bytes);
                Ok(bytes)
            }
            Err(err) => {
                warn!("copy of '{}' failed, removing '{}': {}", src, dest, err);
                vol.remove(store, dest)?;
                Err(err)
            }
        }
    }

    /// 只改目录项，inode 和数据不动
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        let vol = self.volume_mut()?;
        vol.lookup(old)?;
        if old == new {
            return Err(FsError::SameSourceAndDestination(old.to_string()));
        }
        if vol.directory.contains(new) {
            return Err(FsError::FileAlreadyExists(new.to_string()));
        }
        vol.ensure_closed(old)?;
        vol.directory.rename(old, new)?;
        vol.descriptors.rename_all(old, new);
        info!("renamed '{}' to '{}'", old, new);
        Ok(())
    }

    pub fn list_descriptors(&self) -> Result<Vec<DescriptorInfo>> {
        let vol = self.volume()?;
        Ok(vol
            .descriptors
            .entries()
            .iter()
            .enumerate()
            .map(|(index, slot)| DescriptorInfo {
                index,
                name: slot.name.clone(),
                in_use: slot.in_use,
                size: slot
                    .inode
                    .and_then(|id| vol.inodes.get(id))
                    .map(|inode| inode.file_size),
            })
            .collect())
    }

    /// 整个磁盘的原始字节
    pub fn disk_contents(&mut self) -> Result<Vec<u8>> {
        self.store.contents()
    }

    pub fn list_files(&self) -> Result<Vec<FileInfo>> {
        let vol = self.volume()?;
        vol.directory
            .list_sorted()
            .into_iter()
            .map(|entry| {
                let inode = vol.inode(entry.inode)?;
                Ok(FileInfo {
                    name: entry.name,
                    size: inode.file_size,
                    blocks: inode.total_blocks(),
                    modified_at: inode.modified_at,
                })
            })
            .collect()
    }

    pub fn stat(&mut self, name: &str) -> Result<FileStat> {
        let (store, vol) = self.parts()?;
        let inode = vol.inode(vol.lookup(name)?)?;
        Ok(FileStat {
            name: name.to_string(),
            size: inode.file_size,
            blocks_in_use: inode.blocks_in_use,
            total_blocks: inode.total_blocks(),
            direct: inode.direct,
            single_indirect: inode.single_indirect,
            single_count: inode.single_count,
            double_indirect: inode.double_indirect,
            branches: inode.branches.clone(),
            data_blocks: reader::data_blocks(store, inode)?,
            created_at: inode.created_at,
            modified_at: inode.modified_at,
        })
    }

    pub fn usage(&self) -> Result<Usage> {
        let vol = self.volume()?;
        let geometry = self.store.geometry();
        Ok(Usage {
            volume_id: vol.super_block.volume_id.clone(),
            block_size: geometry.block_size,
            block_count: geometry.block_count(),
            used_blocks: self.store.used_blocks(),
            free_blocks: self.store.free_blocks(),
            bytes_used: self.store.bytes_used(),
            capacity: geometry.capacity,
            max_file_size: geometry.max_file_size(),
            files: vol.directory.len(),
        })
    }

    /// fsck：位图与各文件块的一致性检查
    pub fn check(&mut self) -> Result<CheckReport> {
        let (store, vol) = self.parts()?;
        check::check(store, &vol.inodes, &vol.directory)
    }

    /// 刷盘并写元数据快照
    pub fn sync(&mut self) -> Result<()> {
        self.store.sync()?;
        if let (Some(path), Some(vol)) = (&self.meta_path, &self.volume) {
            snapshot::save(
                path,
                &SnapshotRef {
                    super_block: &vol.super_block,
                    bitmap: self.store.bitmap(),
                    bytes_used: self.store.bytes_used(),
                    inodes: &vol.inodes,
                    directory: &vol.directory,
                },
            )?;
        }
        Ok(())
    }

    fn volume(&self) -> Result<&Volume> {
        self.volume.as_ref().ok_or(FsError::NotFormatted)
    }

    fn volume_mut(&mut self) -> Result<&mut Volume> {
        self.volume.as_mut().ok_or(FsError::NotFormatted)
    }

    fn parts(&mut self) -> Result<(&mut BlockStore, &mut Volume)> {
        let vol = self.volume.as_mut().ok_or(FsError::NotFormatted)?;
        Ok((&mut self.store, vol))
    }
}

/// 写入长度取 len 与数据长度的较小值，并在第一个 NUL 处截断
fn clip(data: &[u8], len: usize) -> &[u8] {
    let data = &data[..len.min(data.len())];
    match data.iter().position(|&b| b == 0) {
        Some(end) => &data[..end],
        None => data,
    }
}
