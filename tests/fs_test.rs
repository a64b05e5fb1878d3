use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tierfs::{
    disk::{BlockDevice, FileDisk, MemDisk, DISK_SIZE},
    fs::snapshot::meta_path,
    FileSystem, FsError,
};

fn formatted(block_size: usize) -> FileSystem {
    let mut fs = FileSystem::new(Box::new(MemDisk::new(DISK_SIZE)));
    fs.format(block_size).unwrap();
    fs
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| b'a' + (i % 26) as u8).collect()
}

/// 创建 `name` 写入 `data` 后关闭
fn put(fs: &mut FileSystem, name: &str, data: &[u8]) {
    let fd = fs.create(name).unwrap();
    fs.write(fd, data, data.len()).unwrap();
    fs.close(fd).unwrap();
}

fn content(fs: &mut FileSystem, name: &str) -> Vec<u8> {
    let fd = fs.open(name).unwrap();
    let data = fs.read(fd, isize::MAX).unwrap();
    fs.close(fd).unwrap();
    data
}

fn assert_consistent(fs: &mut FileSystem) {
    let report = fs.check().unwrap();
    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(report.reachable_blocks, fs.usage().unwrap().used_blocks);
}

#[test]
fn hello_world_fills_three_direct_blocks() {
    let mut fs = formatted(4);
    let fd = fs.create("a").unwrap();
    assert_eq!(fs.write(fd, b"HELLOWORLD", 10).unwrap(), 10);

    let stat = fs.stat("a").unwrap();
    assert_eq!(stat.size, 10);
    assert_eq!(stat.direct, [Some(0), Some(1), Some(2)]);
    assert_eq!(stat.single_indirect, None);
    assert_eq!(fs.read(fd, 10).unwrap(), b"HELLOWORLD");
}

#[test]
fn second_write_fills_the_tail_then_goes_indirect() {
    let mut fs = formatted(4);
    let fd = fs.create("a").unwrap();
    fs.write(fd, b"HELLOWORLD", 10).unwrap();
    fs.write(fd, b"WORLD", 5).unwrap();

    let stat = fs.stat("a").unwrap();
    assert_eq!(stat.size, 15);
    assert_eq!(stat.single_indirect, Some(3));
    assert_eq!(stat.single_count, 1);
    assert_eq!(stat.data_blocks, vec![0, 1, 2, 4]);
    assert_eq!(fs.read(fd, 15).unwrap(), b"HELLOWORLDWORLD");
    assert_eq!(fs.usage().unwrap().used_blocks, 5);
}

#[test]
fn round_trip_at_tier_boundaries() {
    // B = 4 时的 0, 1, B-1, B, B+1, 3B, 3B+1, 3B+B², 3B+B²+B³
    for len in [0, 1, 3, 4, 5, 12, 13, 28, 92] {
        let mut fs = formatted(4);
        let data = pattern(len);
        let fd = fs.create("f").unwrap();
        assert_eq!(fs.write(fd, &data, len).unwrap(), len);
        assert_eq!(fs.read(fd, len as isize).unwrap(), data, "length {}", len);
        assert_consistent(&mut fs);
    }
}

#[test]
fn round_trip_with_larger_blocks() {
    let mut fs = formatted(16);
    let data = pattern(400);
    let fd = fs.create("big").unwrap();
    fs.write(fd, &data, data.len()).unwrap();
    assert_eq!(fs.read(fd, 400).unwrap(), data);
    assert_consistent(&mut fs);
}

#[test]
fn writing_past_the_maximum_stops_at_the_bound() {
    let mut fs = formatted(4);
    let fd = fs.create("f").unwrap();
    let data = pattern(100);
    assert!(matches!(
        fs.write(fd, &data, data.len()),
        Err(FsError::OutOfSpace)
    ));
    assert_eq!(fs.stat("f").unwrap().size, 92);
    assert!(matches!(fs.write(fd, b"x", 1), Err(FsError::OutOfSpace)));
    assert_eq!(fs.read(fd, 200).unwrap(), &data[..92]);
    assert_consistent(&mut fs);
}

#[test]
fn double_indirect_branch_rollover() {
    let mut fs = formatted(4);
    let fd = fs.create("f").unwrap();
    fs.write(fd, &pattern(44), 44).unwrap();
    assert_eq!(fs.stat("f").unwrap().branches.len(), 1);

    fs.write(fd, b"z", 1).unwrap();
    let stat = fs.stat("f").unwrap();
    assert_eq!(stat.branches.len(), 2);
    assert_eq!(stat.branches[0].blocks, 4);
    assert_eq!(stat.branches[1].blocks, 1);
    assert_eq!(stat.total_blocks, 16);

    let mut expected = pattern(44);
    expected.push(b'z');
    assert_eq!(fs.read(fd, 45).unwrap(), expected);
    assert_consistent(&mut fs);
}

#[test]
fn delete_returns_every_block() {
    let mut fs = formatted(4);
    put(&mut fs, "keep", b"0123456789");
    let before = fs.usage().unwrap();

    put(&mut fs, "tmp", &pattern(92));
    fs.delete("tmp").unwrap();

    let after = fs.usage().unwrap();
    assert_eq!(after.used_blocks, before.used_blocks);
    assert_eq!(after.bytes_used, before.bytes_used);
    assert_eq!(content(&mut fs, "keep"), b"0123456789");
    assert_consistent(&mut fs);
}

#[test]
fn bitmap_matches_reachable_blocks_through_a_workload() {
    let mut fs = formatted(4);
    for round in 0..4 {
        for name in ["a", "b", "c"] {
            let fd = fs.create(&format!("{}{}", name, round)).unwrap();
            fs.write(fd, &pattern(7 + round * 11), 7 + round * 11).unwrap();
            fs.write(fd, b"tail", 4).unwrap();
            fs.close(fd).unwrap();
            assert_consistent(&mut fs);
        }
        fs.delete(&format!("b{}", round)).unwrap();
        assert_consistent(&mut fs);
    }
    assert_eq!(fs.file_count(), 8);
}

#[test]
fn deleting_an_open_file_fails() {
    let mut fs = formatted(4);
    let fd = fs.create("a").unwrap();
    fs.write(fd, b"HELLOWORLD", 10).unwrap();
    assert!(matches!(fs.delete("a"), Err(FsError::FileInUse(_))));

    fs.close(fd).unwrap();
    fs.delete("a").unwrap();
    assert!(matches!(fs.open("a"), Err(FsError::FileNotFound(_))));
    assert!(matches!(fs.delete("a"), Err(FsError::FileNotFound(_))));
}

#[test]
fn descriptor_errors() {
    let mut fs = formatted(4);
    let fd = fs.create("a").unwrap();
    assert!(matches!(fs.create("a"), Err(FsError::FileAlreadyExists(_))));
    assert!(matches!(fs.open("missing"), Err(FsError::FileNotFound(_))));
    assert_eq!(fs.close(fd).unwrap(), "a");
    assert!(matches!(fs.close(fd), Err(FsError::AlreadyClosed(_))));
    assert!(matches!(fs.close(99), Err(FsError::InvalidDescriptor(99))));
    assert!(matches!(fs.read(fd, 1), Err(FsError::AlreadyClosed(_))));
}

#[test]
fn write_stops_at_length_and_nul() {
    let mut fs = formatted(4);
    let fd = fs.create("a").unwrap();
    assert_eq!(fs.write(fd, b"abcdef", 3).unwrap(), 3);
    assert_eq!(fs.write(fd, b"xy\0zz", 5).unwrap(), 2);
    assert_eq!(fs.read(fd, 100).unwrap(), b"abcxy");
}

#[test]
fn read_length_is_clamped_and_checked() {
    let mut fs = formatted(4);
    let fd = fs.create("a").unwrap();
    fs.write(fd, b"short", 5).unwrap();
    assert_eq!(fs.read(fd, 3).unwrap(), b"sho");
    assert_eq!(fs.read(fd, 50).unwrap(), b"short");
    assert!(matches!(fs.read(fd, -2), Err(FsError::InvalidLength(-2))));
}

#[test]
fn copy_is_independent_of_its_source() {
    let mut fs = formatted(4);
    put(&mut fs, "src", b"original text");
    assert_eq!(fs.copy("src", "dst").unwrap(), 13);

    let fd = fs.open("src").unwrap();
    fs.write(fd, b" changed", 8).unwrap();
    fs.close(fd).unwrap();

    assert_eq!(content(&mut fs, "dst"), b"original text");
    assert_eq!(content(&mut fs, "src"), b"original text changed");
    assert_consistent(&mut fs);
}

#[test]
fn copy_replaces_an_existing_destination() {
    let mut fs = formatted(4);
    put(&mut fs, "src", b"new");
    put(&mut fs, "dst", &pattern(60));
    fs.copy("src", "dst").unwrap();

    assert_eq!(content(&mut fs, "dst"), b"new");
    assert_eq!(fs.stat("dst").unwrap().total_blocks, 1);
    assert_consistent(&mut fs);
}

#[test]
fn copy_preconditions() {
    let mut fs = formatted(4);
    put(&mut fs, "a", b"data");
    assert!(matches!(
        fs.copy("a", "a"),
        Err(FsError::SameSourceAndDestination(_))
    ));
    assert!(matches!(fs.copy("nope", "b"), Err(FsError::FileNotFound(_))));

    let fd = fs.open("a").unwrap();
    assert!(matches!(fs.copy("a", "b"), Err(FsError::FileInUse(_))));
    fs.close(fd).unwrap();

    put(&mut fs, "b", b"busy");
    let fd = fs.open("b").unwrap();
    assert!(matches!(fs.copy("a", "b"), Err(FsError::FileInUse(_))));
    fs.close(fd).unwrap();
    assert_eq!(content(&mut fs, "b"), b"busy");
}

#[test]
fn copy_without_room_leaves_nothing_behind() {
    // 16 个 4 字节块
    let mut fs = FileSystem::new(Box::new(MemDisk::new(64)));
    fs.format(4).unwrap();
    put(&mut fs, "big", &pattern(40));
    let used = fs.usage().unwrap().used_blocks;

    assert!(matches!(fs.copy("big", "twin"), Err(FsError::OutOfSpace)));
    assert!(matches!(fs.open("twin"), Err(FsError::FileNotFound(_))));
    assert_eq!(fs.usage().unwrap().used_blocks, used);
    assert_consistent(&mut fs);
}

/// 内存磁盘，写次数用完后写入失败；`fail_reads` 置位时读取失败
struct FlakyDisk {
    inner: MemDisk,
    writes_left: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
}

impl FlakyDisk {
    fn new(writes_left: &Arc<AtomicUsize>, fail_reads: &Arc<AtomicBool>) -> Self {
        Self {
            inner: MemDisk::new(DISK_SIZE),
            writes_left: Arc::clone(writes_left),
            fail_reads: Arc::clone(fail_reads),
        }
    }
}

impl BlockDevice for FlakyDisk {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected read failure"));
        }
        self.inner.read_at(offset, buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        let left = self.writes_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "injected failure"));
        }
        self.writes_left.store(left - 1, Ordering::SeqCst);
        self.inner.write_at(offset, buf)
    }

    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn failed_copy_is_rolled_back() {
    let budget = Arc::new(AtomicUsize::new(usize::MAX));
    let disk = FlakyDisk::new(&budget, &Arc::new(AtomicBool::new(false)));
    let mut fs = FileSystem::new(Box::new(disk));
    fs.format(4).unwrap();
    put(&mut fs, "src", &pattern(20));
    let before = fs.usage().unwrap();

    // 副本写入两块后磁盘出错
    budget.store(2, Ordering::SeqCst);
    assert!(matches!(fs.copy("src", "dst"), Err(FsError::Io(_))));
    budget.store(usize::MAX, Ordering::SeqCst);

    assert!(matches!(fs.open("dst"), Err(FsError::FileNotFound(_))));
    let after = fs.usage().unwrap();
    assert_eq!(after.used_blocks, before.used_blocks);
    assert_eq!(after.bytes_used, before.bytes_used);
    assert_eq!(after.files, 1);
    assert_consistent(&mut fs);
}

#[test]
fn unreadable_source_keeps_the_old_destination() {
    let fail_reads = Arc::new(AtomicBool::new(false));
    let disk = FlakyDisk::new(&Arc::new(AtomicUsize::new(usize::MAX)), &fail_reads);
    let mut fs = FileSystem::new(Box::new(disk));
    fs.format(4).unwrap();
    put(&mut fs, "src", &pattern(20));
    put(&mut fs, "dst", b"keep me");

    fail_reads.store(true, Ordering::SeqCst);
    assert!(matches!(fs.copy("src", "dst"), Err(FsError::Io(_))));
    fail_reads.store(false, Ordering::SeqCst);

    assert_eq!(content(&mut fs, "dst"), b"keep me");
    assert_eq!(fs.file_count(), 2);
    assert!(fs.list_descriptors().unwrap().iter().all(|s| !s.in_use));
    assert_consistent(&mut fs);
}

#[test]
fn rename_keeps_content_and_rules() {
    let mut fs = formatted(4);
    put(&mut fs, "old", b"payload");
    put(&mut fs, "taken", b"x");
    let blocks = fs.stat("old").unwrap().data_blocks;

    assert!(matches!(
        fs.rename("old", "taken"),
        Err(FsError::FileAlreadyExists(_))
    ));
    let fd = fs.open("old").unwrap();
    assert!(matches!(fs.rename("old", "new"), Err(FsError::FileInUse(_))));
    fs.close(fd).unwrap();

    fs.rename("old", "new").unwrap();
    assert!(matches!(fs.open("old"), Err(FsError::FileNotFound(_))));
    assert_eq!(fs.stat("new").unwrap().data_blocks, blocks);
    assert_eq!(content(&mut fs, "new"), b"payload");

    let names: Vec<_> = fs
        .list_descriptors()
        .unwrap()
        .into_iter()
        .map(|slot| slot.name)
        .collect();
    assert!(names.iter().all(|name| name != "old"));
}

#[test]
fn disk_exhaustion_across_files() {
    // 16 个 4 字节块
    let mut fs = FileSystem::new(Box::new(MemDisk::new(64)));
    fs.format(4).unwrap();
    put(&mut fs, "a", &pattern(40));

    let fd = fs.create("b").unwrap();
    let result = fs.write(fd, &pattern(40), 40);
    assert!(matches!(result, Err(FsError::OutOfSpace)));
    let written = fs.stat("b").unwrap().size;
    assert!(written > 0 && written < 40);
    assert_eq!(fs.read(fd, 100).unwrap(), pattern(written));
    assert_consistent(&mut fs);
}

#[test]
fn reformat_discards_everything() {
    let mut fs = formatted(4);
    put(&mut fs, "a", b"data");
    let fd = fs.open("a").unwrap();

    fs.format(8).unwrap();
    assert_eq!(fs.file_count(), 0);
    assert!(fs.list_descriptors().unwrap().is_empty());
    assert!(matches!(fs.read(fd, 1), Err(FsError::InvalidDescriptor(_))));
    let usage = fs.usage().unwrap();
    assert_eq!(usage.block_size, 8);
    assert_eq!(usage.used_blocks, 0);
    assert!(fs.disk_contents().unwrap().iter().all(|&b| b == 0));
}

#[test]
fn invalid_block_sizes_are_rejected() {
    let mut fs = FileSystem::new(Box::new(MemDisk::new(DISK_SIZE)));
    assert!(matches!(fs.format(1), Err(FsError::InvalidBlockSize(1))));
    assert!(matches!(
        fs.format(DISK_SIZE + 1),
        Err(FsError::InvalidBlockSize(_))
    ));
    assert!(!fs.is_formatted());
}

#[test]
fn listing_reports_files_and_slots() {
    let mut fs = formatted(4);
    put(&mut fs, "zeta", b"12345");
    let fd = fs.create("alpha").unwrap();

    let files = fs.list_files().unwrap();
    let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
    assert_eq!(files[1].size, 5);

    let slots = fs.list_descriptors().unwrap();
    assert!(slots[fd].in_use);
    assert_eq!(slots[fd].name, "alpha");
    assert_eq!(&fs.disk_contents().unwrap()[..5], b"12345");
}

#[test]
fn file_disk_survives_remount() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("DISK_SIM_FILE.img");

    {
        let disk = FileDisk::open(&path, DISK_SIZE as u64).unwrap();
        let mut fs = FileSystem::mount(Box::new(disk), meta_path(&path)).unwrap();
        assert!(!fs.is_formatted());
        fs.format(4).unwrap();
        put(&mut fs, "a", b"HELLOWORLDWORLD");
        put(&mut fs, "b", &pattern(60));
        fs.delete("b").unwrap();
        put(&mut fs, "c", b"third");
        fs.sync().unwrap();
    }

    let disk = FileDisk::open(&path, DISK_SIZE as u64).unwrap();
    let mut fs = FileSystem::mount(Box::new(disk), meta_path(&path)).unwrap();
    assert!(fs.is_formatted());
    assert_eq!(fs.file_count(), 2);
    assert_eq!(content(&mut fs, "a"), b"HELLOWORLDWORLD");
    assert_eq!(content(&mut fs, "c"), b"third");
    assert_consistent(&mut fs);

    // 挂载后所有文件都是关闭状态
    assert!(fs.list_descriptors().unwrap().iter().all(|s| !s.in_use));
}

#[test]
fn snapshot_from_a_different_disk_size_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");
    {
        let disk = FileDisk::open(&path, 512).unwrap();
        let mut fs = FileSystem::new(Box::new(disk)).with_meta_path(meta_path(&path));
        fs.format(4).unwrap();
    }

    let other = dir.path().join("other.img");
    let disk = FileDisk::open(&other, 1024).unwrap();
    assert!(matches!(
        FileSystem::mount(Box::new(disk), meta_path(&path)),
        Err(FsError::Corrupted(_))
    ));
}

#[test]
fn wrong_capacity_does_not_damage_the_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");
    {
        let disk = FileDisk::open(&path, 512).unwrap();
        let mut fs = FileSystem::new(Box::new(disk)).with_meta_path(meta_path(&path));
        fs.format(4).unwrap();
        put(&mut fs, "a", &[b'Q'; 92]);
        put(&mut fs, "b", &[b'R'; 92]);
        fs.sync().unwrap();
    }

    assert!(FileDisk::open(&path, 64).is_err());
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 512);

    let disk = FileDisk::open(&path, 512).unwrap();
    let mut fs = FileSystem::mount(Box::new(disk), meta_path(&path)).unwrap();
    assert_eq!(content(&mut fs, "a"), vec![b'Q'; 92]);
    assert_eq!(content(&mut fs, "b"), vec![b'R'; 92]);
    assert_consistent(&mut fs);
}

#[test]
fn damaged_index_block_is_refused_at_mount() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.img");
    let single = {
        let disk = FileDisk::open(&path, 512).unwrap();
        let mut fs = FileSystem::new(Box::new(disk)).with_meta_path(meta_path(&path));
        fs.format(4).unwrap();
        put(&mut fs, "a", &[b'Q'; 92]);
        put(&mut fs, "b", &[b'R'; 92]);
        fs.sync().unwrap();
        fs.stat("b").unwrap().single_indirect.unwrap()
    };

    // 把 b 的一级索引块清零，指针全部变成块 0
    let mut image = std::fs::read(&path).unwrap();
    image[single * 4..single * 4 + 4].fill(0);
    std::fs::write(&path, &image).unwrap();

    let disk = FileDisk::open(&path, 512).unwrap();
    assert!(matches!(
        FileSystem::mount(Box::new(disk), meta_path(&path)),
        Err(FsError::Corrupted(_))
    ));
}
