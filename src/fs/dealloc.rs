use log::debug;

use crate::fs::block_store::BlockStore;
use crate::fs::error::Result;
use crate::fs::inode::Inode;

/// 归还 `inode` 拥有的全部块并把它重置为空文件
/// 返回释放的块数（含索引块）
pub fn release(store: &mut BlockStore, inode: &mut Inode) -> Result<usize> {
    let mut freed = 0;

    for block in inode.direct_blocks().collect::<Vec<_>>() {
        store.free_block(block);
        freed += 1;
    }

    if let Some(index_block) = inode.single_indirect {
        for block in store.read_pointers(index_block, inode.single_count)? {
            store.free_block(block);
            freed += 1;
        }
        store.free_block(index_block);
        freed += 1;
    }

    for branch in &inode.branches {
        for block in store.read_pointers(branch.block, branch.blocks)? {
            store.free_block(block);
            freed += 1;
        }
        store.free_block(branch.block);
        freed += 1;
    }
    if let Some(top) = inode.double_indirect {
        store.free_block(top);
        freed += 1;
    }

    store.release_bytes(inode.file_size);
    debug!("released {} blocks ({} bytes)", freed, inode.file_size);

    let geometry = inode.geometry;
    let created_at = inode.created_at;
    *inode = Inode::new(geometry);
    inode.created_at = created_at;
    Ok(freed)
}
