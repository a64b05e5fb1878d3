use log::info;
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::fs::{
    bitmap::BlockBitmap, config::META_EXTENSION, directory::Directory, error::Result,
    inode::InodeTable, super_block::SuperBlock,
};

/// 写入时借用文件系统的各部分，避免整体克隆
#[derive(Serialize)]
pub struct SnapshotRef<'a> {
    pub super_block: &'a SuperBlock,
    pub bitmap: &'a BlockBitmap,
    pub bytes_used: usize,
    pub inodes: &'a InodeTable,
    pub directory: &'a Directory,
}

/// 读回的快照，字段顺序与 SnapshotRef 一致
#[derive(Debug, Deserialize)]
pub struct Snapshot {
    pub super_block: SuperBlock,
    pub bitmap: BlockBitmap,
    pub bytes_used: usize,
    pub inodes: InodeTable,
    pub directory: Directory,
}

/// 元数据快照放在镜像旁：`DISK_SIM_FILE.img` -> `DISK_SIM_FILE.img.meta`
pub fn meta_path(disk: &Path) -> PathBuf {
    let mut name = OsString::from(disk.as_os_str());
    name.push(".");
    name.push(META_EXTENSION);
    PathBuf::from(name)
}

pub fn save(path: &Path, snapshot: &SnapshotRef<'_>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, snapshot)?;
    writer.flush()?;
    info!("metadata written to {}", path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<Snapshot> {
    let reader = BufReader::new(File::open(path)?);
    let mut snapshot: Snapshot = bincode::deserialize_from(reader)?;
    snapshot.directory.rebuild_index_map();
    info!("metadata loaded from {}", path.display());
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::Geometry;
    use crate::fs::inode::Inode;

    #[test]
    fn meta_path_appends_extension() {
        assert_eq!(
            meta_path(Path::new("/tmp/DISK_SIM_FILE.img")),
            PathBuf::from("/tmp/DISK_SIM_FILE.img.meta")
        );
    }

    #[test]
    fn snapshot_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disk.img.meta");

        let geometry = Geometry::new(4, 512);
        let super_block = SuperBlock::new(geometry);
        let mut bitmap = BlockBitmap::new(geometry.block_count());
        bitmap.mark_used(0);
        let mut inodes = InodeTable::new();
        let mut inode = Inode::new(geometry);
        inode.file_size = 3;
        inode.blocks_in_use = 1;
        inode.direct[0] = Some(0);
        let id = inodes.alloc(inode.clone());
        let mut directory = Directory::new();
        directory.add("a", id).unwrap();

        save(
            &path,
            &SnapshotRef {
                super_block: &super_block,
                bitmap: &bitmap,
                bytes_used: 3,
                inodes: &inodes,
                directory: &directory,
            },
        )
        .unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.super_block, super_block);
        assert_eq!(loaded.bitmap, bitmap);
        assert_eq!(loaded.bytes_used, 3);
        assert_eq!(loaded.directory.find("a"), Some(id));
        assert_eq!(loaded.inodes.get(id), Some(&inode));
    }

    #[test]
    fn garbage_is_a_snapshot_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.meta");
        std::fs::write(&path, [0xFFu8; 3]).unwrap();
        assert!(load(&path).is_err());
    }
}
