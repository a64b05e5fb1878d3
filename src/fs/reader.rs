use log::trace;

use crate::disk::BlockId;
use crate::fs::block_store::BlockStore;
use crate::fs::error::Result;
use crate::fs::inode::Inode;

/// 按文件顺序列出 inode 的数据块：直接块、一级间接块、再到二级间接块的各分支
pub fn data_blocks(store: &mut BlockStore, inode: &Inode) -> Result<Vec<BlockId>> {
    let mut blocks: Vec<BlockId> = inode.direct_blocks().collect();

    if let Some(index_block) = inode.single_indirect {
        blocks.extend(store.read_pointers(index_block, inode.single_count)?);
    }
    for branch in &inode.branches {
        blocks.extend(store.read_pointers(branch.block, branch.blocks)?);
    }
    Ok(blocks)
}

/// 读取前 `len` 字节，超过文件长度时读整个文件
pub fn read(store: &mut BlockStore, inode: &Inode, len: usize) -> Result<Vec<u8>> {
    let wanted = len.min(inode.file_size);
    let block_size = inode.block_size();
    let mut out = Vec::with_capacity(wanted);
    if wanted == 0 {
        return Ok(out);
    }

    let mut buf = vec![0u8; block_size];
    for block in data_blocks(store, inode)? {
        let take = (wanted - out.len()).min(block_size);
        store.read_block(block, &mut buf)?;
        out.extend_from_slice(&buf[..take]);
        trace!("read {} bytes from block {}", take, block);
        if out.len() == wanted {
            break;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemDisk;
    use crate::fs::writer;

    fn setup() -> (BlockStore, Inode) {
        let mut store = BlockStore::new(Box::new(MemDisk::new(512)));
        store.format(4).unwrap();
        let inode = Inode::new(store.geometry());
        (store, inode)
    }

    #[test]
    fn prefix_and_clamp() {
        let (mut store, mut inode) = setup();
        writer::append(&mut store, &mut inode, b"HELLOWORLD").unwrap();
        writer::append(&mut store, &mut inode, b"WORLD").unwrap();

        assert_eq!(read(&mut store, &inode, 5).unwrap(), b"HELLO");
        assert_eq!(read(&mut store, &inode, 100).unwrap(), b"HELLOWORLDWORLD");
        assert!(read(&mut store, &inode, 0).unwrap().is_empty());
    }

    #[test]
    fn blocks_are_listed_in_file_order() {
        let (mut store, mut inode) = setup();
        writer::append(&mut store, &mut inode, &[b'q'; 33]).unwrap();
        // 0..=2 直接块，3 一级索引，4..=7 一级数据，8 二级索引，9 分支，10..=11 数据
        assert_eq!(
            data_blocks(&mut store, &inode).unwrap(),
            vec![0, 1, 2, 4, 5, 6, 7, 10, 11]
        );
    }

    #[test]
    fn empty_file_reads_nothing() {
        let (mut store, inode) = setup();
        assert!(data_blocks(&mut store, &inode).unwrap().is_empty());
        assert!(read(&mut store, &inode, 10).unwrap().is_empty());
    }
}
