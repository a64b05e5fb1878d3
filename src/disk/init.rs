use log::info;
use std::{sync::mpsc::Sender, thread, time::Duration};

use crate::{
    disk::{BlockDevice, FileDisk, MemDisk},
    fs::{config::DiskOptions, error::Result, snapshot::meta_path, FileSystem},
    shell::BootProgress,
};

/// 在后台线程中打开磁盘并挂载文件系统，通过 channel 汇报进度
pub fn perform_disk_initialization(tx: Sender<BootProgress>, options: DiskOptions) {
    let _ = tx.send(BootProgress::Step("🧠 Initializing virtual disk..."));

    let result = mount_disk(&tx, &options);
    if result.is_ok() {
        for i in 50..=100 {
            if tx.send(BootProgress::Progress(i)).is_err() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    // 无论挂载成功与否，都将最终结果发送回去
    let _ = tx.send(BootProgress::Finished(result));
}

fn mount_disk(tx: &Sender<BootProgress>, options: &DiskOptions) -> Result<FileSystem> {
    let mut fs = match &options.disk_path {
        Some(path) => {
            let disk = FileDisk::open(path, options.capacity as u64)?;
            info!("opened {} ({} bytes)", path.display(), disk.len());
            let _ = tx.send(BootProgress::Progress(50));
            let _ = tx.send(BootProgress::Step("⚙️  Mounting file system..."));
            FileSystem::mount(Box::new(disk), meta_path(path))?
        }
        None => {
            info!("using a {} byte memory disk", options.capacity);
            let _ = tx.send(BootProgress::Progress(50));
            FileSystem::new(Box::new(MemDisk::new(options.capacity)))
        }
    };

    // 只有明确是新磁盘且给出了块大小才自动格式化
    if let (false, Some(block_size)) = (fs.is_formatted(), options.block_size) {
        let _ = tx.send(BootProgress::Step(
            "🔧 No file system found, formatting new disk...",
        ));
        fs.format(block_size)?;
    }
    Ok(fs)
}
