use log::{debug, trace, warn};

use crate::disk::BlockId;
use crate::fs::block_store::{BlockStore, Placement};
use crate::fs::config::DIRECT_BLOCKS;
use crate::fs::error::{FsError, Result};
use crate::fs::inode::{Branch, Inode, Tier};

/// 单步写入的结果
#[derive(Debug)]
enum Step {
    /// 写了一个块，本层还能继续
    Progressed,
    /// 本层已满，进入下一层
    TierExhausted,
    /// 数据已写完
    NothingToWrite,
    Failed(FsError),
}

/// 按 直接块 -> 一级间接 -> 二级间接 的顺序追加 `data`，返回写入字节数
/// 每步分配新块前先填满上一个块的尾部空闲
/// 出错前已写入的块仍属于文件
pub fn append(store: &mut BlockStore, inode: &mut Inode, data: &[u8]) -> Result<usize> {
    if inode.is_full() {
        return Err(FsError::OutOfSpace);
    }

    let mut pending = data;
    let outcome = drive(store, inode, &mut pending);
    let written = data.len() - pending.len();
    if written > 0 {
        inode.touch();
    }

    match outcome {
        Ok(()) if pending.is_empty() => Ok(written),
        Ok(()) => {
            warn!(
                "file full after {} of {} bytes (size {})",
                written,
                data.len(),
                inode.file_size
            );
            Err(FsError::OutOfSpace)
        }
        Err(err) => {
            if written > 0 {
                warn!("write stopped after {} of {} bytes: {}", written, data.len(), err);
            }
            Err(err)
        }
    }
}

fn drive(store: &mut BlockStore, inode: &mut Inode, pending: &mut &[u8]) -> Result<()> {
    for tier in Tier::ALL {
        loop {
            match step(store, inode, tier, pending) {
                Step::Progressed => continue,
                Step::TierExhausted => {
                    trace!("{:?} tier exhausted at size {}", tier, inode.file_size);
                    break;
                }
                Step::NothingToWrite => return Ok(()),
                Step::Failed(err) => return Err(err),
            }
        }
    }
    Ok(())
}

fn step(store: &mut BlockStore, inode: &mut Inode, tier: Tier, pending: &mut &[u8]) -> Step {
    let outcome = match tier {
        Tier::Direct => direct_step(store, inode, pending),
        Tier::Single => single_step(store, inode, pending),
        Tier::Double => double_step(store, inode, pending),
    };
    outcome.unwrap_or_else(Step::Failed)
}

fn direct_step(store: &mut BlockStore, inode: &mut Inode, pending: &mut &[u8]) -> Result<Step> {
    fill_tail(store, inode, Tier::Direct, pending)?;

    let Some(slot) = inode.available_direct() else {
        return Ok(Step::TierExhausted);
    };
    if pending.is_empty() {
        return Ok(Step::NothingToWrite);
    }
    admit(store, 1)?;

    let (block, written) = store.write_bytes(pending, inode.block_size(), Placement::Allocate)?;
    inode.direct[slot] = Some(block);
    record(inode, pending, written);
    Ok(Step::Progressed)
}

fn single_step(store: &mut BlockStore, inode: &mut Inode, pending: &mut &[u8]) -> Result<Step> {
    fill_tail(store, inode, Tier::Single, pending)?;

    if inode.single_count >= inode.geometry.pointers_per_block() {
        return Ok(Step::TierExhausted);
    }
    if pending.is_empty() {
        return Ok(Step::NothingToWrite);
    }

    let index_block = match inode.single_indirect {
        Some(block) => {
            admit(store, 1)?;
            block
        }
        None => {
            // 索引块 + 数据块
            admit(store, 2)?;
            let block = store.allocate_block()?;
            inode.single_indirect = Some(block);
            debug!("single-indirect block {} opened", block);
            block
        }
    };

    let (block, written) = store.write_bytes(pending, inode.block_size(), Placement::Allocate)?;
    link(store, index_block, inode.single_count, block, written)?;
    inode.single_count += 1;
    record(inode, pending, written);
    Ok(Step::Progressed)
}

fn double_step(store: &mut BlockStore, inode: &mut Inode, pending: &mut &[u8]) -> Result<Step> {
    fill_tail(store, inode, Tier::Double, pending)?;

    if pending.is_empty() {
        return Ok(Step::NothingToWrite);
    }
    if inode.is_full() {
        return Ok(Step::TierExhausted);
    }

    let per_block = inode.geometry.pointers_per_block();
    match (inode.double_indirect, inode.last_branch().copied()) {
        (None, _) => {
            // 二级索引块、第一个分支块、数据块
            admit(store, 3)?;
            let top = store.allocate_block()?;
            inode.double_indirect = Some(top);
            debug!("double-indirect block {} opened", top);
            open_branch(store, inode, top)?;
        }
        (Some(_), Some(last)) if last.blocks < per_block => admit(store, 1)?,
        (Some(top), _) => {
            if inode.branches.len() >= per_block {
                return Ok(Step::TierExhausted);
            }
            admit(store, 2)?;
            open_branch(store, inode, top)?;
        }
    }

    let branch = inode.branches.len() - 1;
    let Branch { block: branch_block, blocks } = inode.branches[branch];
    let (block, written) = store.write_bytes(pending, inode.block_size(), Placement::Allocate)?;
    link(store, branch_block, blocks, block, written)?;
    inode.branches[branch].blocks += 1;
    record(inode, pending, written);
    Ok(Step::Progressed)
}

/// 分配新的分支块并登记到二级索引块
fn open_branch(store: &mut BlockStore, inode: &mut Inode, top: BlockId) -> Result<()> {
    let block = store.allocate_block()?;
    if let Err(err) = store.write_pointer(top, inode.branches.len(), block) {
        store.free_block(block);
        return Err(err);
    }
    inode.branches.push(Branch { block, blocks: 0 });
    debug!("branch {} opened at block {}", inode.branches.len() - 1, block);
    Ok(())
}

/// 把新数据块登记到索引块，指针写失败时归还该块
fn link(
    store: &mut BlockStore,
    index_block: BlockId,
    index: usize,
    data_block: BlockId,
    written: usize,
) -> Result<()> {
    if let Err(err) = store.write_pointer(index_block, index, data_block) {
        store.free_block(data_block);
        store.release_bytes(written);
        return Err(err);
    }
    Ok(())
}

/// 把待写数据填进 `tier` 最后一个块的尾部空闲
fn fill_tail(
    store: &mut BlockStore,
    inode: &mut Inode,
    tier: Tier,
    pending: &mut &[u8],
) -> Result<()> {
    let slack = inode.slack(tier);
    if slack == 0 || pending.is_empty() {
        return Ok(());
    }
    let Some(block) = last_data_block(store, inode, tier)? else {
        return Ok(());
    };

    let offset = inode.block_size() - slack;
    let (_, written) = store.write_bytes(pending, slack, Placement::Existing { block, offset })?;
    inode.file_size += written;
    *pending = &pending[written..];
    debug!("tail-filled {} bytes into block {}", written, block);
    Ok(())
}

fn last_data_block(store: &mut BlockStore, inode: &Inode, tier: Tier) -> Result<Option<BlockId>> {
    match tier {
        Tier::Direct => {
            let used = inode.blocks_in_use;
            if used == 0 || used > DIRECT_BLOCKS {
                return Ok(None);
            }
            Ok(inode.direct[used - 1])
        }
        Tier::Single => match inode.single_indirect {
            Some(index_block) if inode.single_count > 0 => store
                .read_pointer(index_block, inode.single_count - 1)
                .map(Some),
            _ => Ok(None),
        },
        Tier::Double => match inode.last_branch() {
            Some(branch) if branch.blocks > 0 => {
                store.read_pointer(branch.block, branch.blocks - 1).map(Some)
            }
            _ => Ok(None),
        },
    }
}

fn admit(store: &BlockStore, blocks: usize) -> Result<()> {
    if store.can_admit(blocks) {
        Ok(())
    } else {
        Err(FsError::OutOfSpace)
    }
}

fn record(inode: &mut Inode, pending: &mut &[u8], written: usize) {
    inode.file_size += written;
    inode.blocks_in_use += 1;
    *pending = &pending[written..];
}
