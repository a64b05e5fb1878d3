use serde::{Deserialize, Serialize};

use crate::{
    disk::{BlockId, Geometry},
    fs::config::DIRECT_BLOCKS,
    utils::current_timestamp,
};

/// inode 在 [`InodeTable`] 中的稳定编号
pub type InodeId = usize;

/// 三级寻址中的一级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Direct,
    Single,
    Double,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Direct, Tier::Single, Tier::Double];
}

/// 二级间接块下挂的一个一级索引块
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// 该分支的指针块
    pub block: BlockId,
    /// 分支中已记录的数据块数
    pub blocks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inode {
    pub file_size: usize,      // 文件大小（字节）
    pub blocks_in_use: usize,  // 数据块数（不含指针块）
    pub direct: [Option<BlockId>; DIRECT_BLOCKS],
    pub single_indirect: Option<BlockId>,
    pub single_count: usize,   // 一级间接块中的有效指针数
    pub double_indirect: Option<BlockId>,
    pub branches: Vec<Branch>, // 二级间接块下的各个分支
    pub geometry: Geometry,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Inode {
    pub fn new(geometry: Geometry) -> Self {
        let now = current_timestamp();
        Self {
            file_size: 0,
            blocks_in_use: 0,
            direct: [None; DIRECT_BLOCKS],
            single_indirect: None,
            single_count: 0,
            double_indirect: None,
            branches: Vec::new(),
            geometry,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn block_size(&self) -> usize {
        self.geometry.block_size
    }

    pub fn touch(&mut self) {
        self.modified_at = current_timestamp();
    }

    /// 文件已达最大长度
    pub fn is_full(&self) -> bool {
        self.file_size >= self.geometry.max_file_size()
    }

    /// `tier` 最后一个数据块末尾的空闲字节
    /// 已经越过的层级没有空闲
    pub fn slack(&self, tier: Tier) -> usize {
        let promoted = match tier {
            Tier::Direct => self.single_indirect.is_some(),
            Tier::Single => self.double_indirect.is_some(),
            Tier::Double => false,
        };
        if promoted || self.file_size % self.block_size() == 0 {
            return 0;
        }
        self.blocks_in_use * self.block_size() - self.file_size
    }

    pub fn has_slack(&self) -> bool {
        Tier::ALL.iter().any(|&tier| self.slack(tier) > 0)
    }

    /// 第一个空的直接块槽位
    pub fn available_direct(&self) -> Option<usize> {
        self.direct.iter().position(Option::is_none)
    }

    /// 按分配顺序的直接块
    pub fn direct_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.direct.iter().flatten().copied()
    }

    /// 该 inode 拥有的索引块：一级、二级以及各分支块
    pub fn index_blocks(&self) -> usize {
        let mut count = usize::from(self.single_indirect.is_some());
        if self.double_indirect.is_some() {
            count += 1 + self.branches.len();
        }
        count
    }

    /// 数据块 + 索引块
    pub fn total_blocks(&self) -> usize {
        self.blocks_in_use + self.index_blocks()
    }

    pub fn last_branch(&self) -> Option<&Branch> {
        self.branches.last()
    }
}

/// inode 表：以稳定整数 id 索引的 inode 仓库
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct InodeTable {
    slots: Vec<Option<Inode>>,
}

impl InodeTable {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// 存入 inode，优先复用最小的空槽
    pub fn alloc(&mut self, inode: Inode) -> InodeId {
        match self.slots.iter().position(Option::is_none) {
            Some(id) => {
                self.slots[id] = Some(inode);
                id
            }
            None => {
                self.slots.push(Some(inode));
                self.slots.len() - 1
            }
        }
    }

    pub fn free(&mut self, id: InodeId) -> Option<Inode> {
        self.slots.get_mut(id).and_then(Option::take)
    }

    pub fn get(&self, id: InodeId) -> Option<&Inode> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: InodeId) -> Option<&mut Inode> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    /// 存活 inode 数
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (InodeId, &Inode)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|inode| (id, inode)))
    }
}
