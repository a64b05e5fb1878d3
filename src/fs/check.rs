use log::warn;
use std::collections::BTreeMap;

use crate::disk::BlockId;
use crate::fs::block_store::BlockStore;
use crate::fs::directory::Directory;
use crate::fs::error::{FsError, Result};
use crate::fs::inode::{Inode, InodeId, InodeTable};
use crate::fs::reader;

/// fsck 结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub files: usize,
    pub reachable_blocks: usize,
    /// 位图已占用但没有任何 inode 引用
    pub leaked: Vec<BlockId>,
    /// inode 引用但位图未占用
    pub dangling: Vec<BlockId>,
    /// 被引用了不止一次
    pub shared: Vec<BlockId>,
    pub errors: Vec<String>,
}

impl CheckReport {
    pub fn blocks_ok(&self) -> bool {
        self.leaked.is_empty() && self.dangling.is_empty() && self.shared.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.blocks_ok() && self.errors.is_empty()
    }
}

/// 遍历所有 inode，把可达块与位图比对
pub fn check(
    store: &mut BlockStore,
    inodes: &InodeTable,
    directory: &Directory,
) -> Result<CheckReport> {
    let mut report = CheckReport {
        files: directory.len(),
        ..CheckReport::default()
    };
    let mut owners: BTreeMap<BlockId, usize> = BTreeMap::new();

    for entry in directory.entries() {
        if inodes.get(entry.inode).is_none() {
            report
                .errors
                .push(format!("'{}' points at missing inode {}", entry.name, entry.inode));
        }
    }
    for (id, inode) in inodes.iter() {
        if !directory.entries().iter().any(|entry| entry.inode == id) {
            report.errors.push(format!("inode {} has no directory entry", id));
        }
        match reachable(store, inode) {
            Ok(blocks) => {
                for block in blocks {
                    *owners.entry(block).or_default() += 1;
                }
            }
            Err(FsError::Corrupted(msg)) => report.errors.push(format!("inode {}: {}", id, msg)),
            Err(err) => return Err(err),
        }
        check_sizes(id, inode, &mut report);
    }

    let bitmap = store.bitmap();
    for (&block, &count) in &owners {
        if count > 1 {
            report.shared.push(block);
        }
        if !bitmap.is_used(block) {
            report.dangling.push(block);
        }
    }
    report.leaked = bitmap
        .used_blocks()
        .filter(|block| !owners.contains_key(block))
        .collect();
    report.reachable_blocks = owners.len();

    if bitmap.recount() != bitmap.used_count() {
        report.errors.push(format!(
            "used block counter {} disagrees with bitmap ({})",
            bitmap.used_count(),
            bitmap.recount()
        ));
    }

    if !report.is_clean() {
        warn!(
            "check found {} leaked, {} dangling, {} shared blocks and {} other problems",
            report.leaked.len(),
            report.dangling.len(),
            report.shared.len(),
            report.errors.len()
        );
    }
    Ok(report)
}

/// `inode` 可达的数据块和索引块
fn reachable(store: &mut BlockStore, inode: &Inode) -> Result<Vec<BlockId>> {
    let mut blocks = reader::data_blocks(store, inode)?;
    blocks.extend(inode.single_indirect);
    blocks.extend(inode.double_indirect);
    blocks.extend(inode.branches.iter().map(|branch| branch.block));
    Ok(blocks)
}

fn check_sizes(id: InodeId, inode: &Inode, report: &mut CheckReport) {
    let data = inode.direct_blocks().count()
        + inode.single_count
        + inode.branches.iter().map(|b| b.blocks).sum::<usize>();
    if data != inode.blocks_in_use {
        report.errors.push(format!(
            "inode {} records {} data blocks but references {}",
            id, inode.blocks_in_use, data
        ));
    }
    if inode.file_size.div_ceil(inode.block_size()) != inode.blocks_in_use {
        report.errors.push(format!(
            "inode {} size {} does not fit {} blocks",
            id, inode.file_size, inode.blocks_in_use
        ));
    }
}
