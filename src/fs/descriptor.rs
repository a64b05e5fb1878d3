use crate::fs::error::{FsError, Result};
use crate::fs::inode::InodeId;

/// 打开文件表中的一个槽位
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,            // 打开时的文件名，文件删除后清空
    pub inode: Option<InodeId>,  // 文件删除后为 None
    pub in_use: bool,
}

/// 打开文件表，槽位只会被标记关闭再复用，不会删除
#[derive(Debug, Default)]
pub struct DescriptorTable {
    slots: Vec<Descriptor>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 优先复用第一个已关闭的槽位
    pub fn allocate_slot(&mut self, name: &str, inode: InodeId) -> usize {
        let descriptor = Descriptor {
            name: name.to_string(),
            inode: Some(inode),
            in_use: true,
        };
        match self.slots.iter().position(|slot| !slot.in_use) {
            Some(index) => {
                self.slots[index] = descriptor;
                index
            }
            None => {
                self.slots.push(descriptor);
                self.slots.len() - 1
            }
        }
    }

    /// 第一个名为 `name` 的槽位（不论是否打开）
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.name == name)
    }

    /// 名为 `name` 且已打开的槽位
    pub fn find_open(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.in_use && slot.name == name)
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.find_open(name).is_some()
    }

    pub fn is_valid(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .is_some_and(|slot| slot.in_use && slot.inode.is_some())
    }

    /// 已打开描述符对应的 inode
    pub fn inode_of(&self, index: usize) -> Result<InodeId> {
        let slot = self
            .slots
            .get(index)
            .ok_or(FsError::InvalidDescriptor(index))?;
        if !slot.in_use {
            return Err(FsError::AlreadyClosed(index));
        }
        slot.inode.ok_or(FsError::InvalidDescriptor(index))
    }

    /// 关闭槽位，返回其文件名
    pub fn mark_closed(&mut self, index: usize) -> Result<String> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(FsError::InvalidDescriptor(index))?;
        if !slot.in_use {
            return Err(FsError::AlreadyClosed(index));
        }
        slot.in_use = false;
        Ok(slot.name.clone())
    }

    pub fn rename(&mut self, index: usize, new_name: &str) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.name = new_name.to_string();
        }
    }

    /// 重命名所有记录旧文件名的槽位
    pub fn rename_all(&mut self, old: &str, new: &str) {
        for index in 0..self.slots.len() {
            if self.slots[index].name == old {
                self.rename(index, new);
            }
        }
    }

    /// 文件被删除：清空名字并解除 inode 绑定，槽位保留
    pub fn clear_name(&mut self, name: &str) {
        for slot in self.slots.iter_mut().filter(|slot| slot.name == name) {
            slot.name.clear();
            slot.inode = None;
        }
    }

    pub fn entries(&self) -> &[Descriptor] {
        &self.slots
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
