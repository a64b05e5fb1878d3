use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::fs::error::{FsError, Result};
use crate::fs::inode::InodeId;

// 一个目录项：文件名 -> inode
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inode: InodeId,
}

/// 扁平的单级目录
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Directory {
    entries: Vec<DirEntry>,
    #[serde(skip)]
    index_map: HashMap<String, usize>, // name -> entries 索引
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    // 反序列化后 index_map 为空，需要重建
    pub fn rebuild_index_map(&mut self) {
        self.index_map.clear();
        for (i, entry) in self.entries.iter().enumerate() {
            self.index_map.insert(entry.name.clone(), i);
        }
    }

    // 添加目录项
    pub fn add(&mut self, name: &str, inode: InodeId) -> Result<()> {
        if self.index_map.contains_key(name) {
            return Err(FsError::FileAlreadyExists(name.to_string()));
        }
        self.entries.push(DirEntry {
            name: name.to_string(),
            inode,
        });
        self.index_map.insert(name.to_string(), self.entries.len() - 1);
        Ok(())
    }

    // 删除目录项，返回 inode id
    pub fn remove(&mut self, name: &str) -> Option<InodeId> {
        let idx = self.index_map.get(name).copied()?;
        let entry = self.entries.remove(idx);
        self.rebuild_index_map();
        Some(entry.inode)
    }

    // 查找目录项，返回 inode id
    pub fn find(&self, name: &str) -> Option<InodeId> {
        self.index_map
            .get(name)
            .map(|&idx| self.entries[idx].inode)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_map.contains_key(name)
    }

    /// 改名，inode 不变
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        if self.contains(new) {
            return Err(FsError::FileAlreadyExists(new.to_string()));
        }
        let idx = self
            .index_map
            .remove(old)
            .ok_or_else(|| FsError::FileNotFound(old.to_string()))?;
        self.entries[idx].name = new.to_string();
        self.index_map.insert(new.to_string(), idx);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn list_sorted(&self) -> Vec<DirEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}
