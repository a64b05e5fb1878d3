use clap::Parser;
use std::path::PathBuf;

use crate::{
    disk::DISK_SIZE,
    fs::config::{DiskOptions, DEFAULT_DISK_PATH, DEFAULT_HISTORY_SIZE},
};

#[derive(Parser, Debug)]
#[command(name = "tierfs", version, about = "Interactive shell over a simulated inode file system")]
pub struct Cli {
    #[arg(long, short, default_value = DEFAULT_DISK_PATH, help = "Disk image backing the file system")]
    pub disk: PathBuf,

    #[arg(long, short, default_value_t = DISK_SIZE, help = "Disk size in bytes")]
    pub capacity: usize,

    #[arg(long, short, help = "Format a fresh disk with this block size on boot")]
    pub block_size: Option<usize>,

    #[arg(long, short, help = "Keep the disk in memory instead of a file")]
    pub memory: bool,

    #[arg(long, default_value_t = DEFAULT_HISTORY_SIZE, help = "Number of shell history entries to keep")]
    pub history: usize,
}

impl Cli {
    pub fn disk_options(&self) -> DiskOptions {
        DiskOptions {
            disk_path: (!self.memory).then(|| self.disk.clone()),
            capacity: self.capacity,
            block_size: self.block_size,
        }
    }
}
