use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::{
    fs::{error::Result, FileSystem},
    utils::{format_timestamp, printable},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Format(usize),
    Create(String),
    Open(String),
    Close(usize),
    Write(usize, String),
    Read(usize, isize),
    Rm(String),
    Cp(String, String),
    Mv(String, String),
    Ls,
    List,
    Stat(String),
    Df,
    Fsck,
    Sync,
    Clear,
    Exit,
}

pub fn execute_command(cmd: &Command, fs: &mut FileSystem) -> Result<()> {
    match cmd {
        Command::Help => print_help(),
        Command::Format(block_size) => format_disk(fs, *block_size)?,
        Command::Create(name) => {
            let fd = fs.create(name)?;
            println!("📝 Created file: {} (fd {})", name.green(), fd);
        }
        Command::Open(name) => {
            let fd = fs.open(name)?;
            println!("📂 Opened {} as fd {}", name.cyan(), fd);
        }
        Command::Close(fd) => {
            let name = fs.close(*fd)?;
            println!("🔒 Closed fd {} ({})", fd, name.cyan());
        }
        Command::Write(fd, text) => {
            let written = fs.write(*fd, text.as_bytes(), text.len())?;
            println!("✏️  Wrote {} bytes to fd {}", written.to_string().green(), fd);
        }
        Command::Read(fd, len) => {
            let data = fs.read(*fd, *len)?;
            println!("📖 {}", printable(&data));
        }
        Command::Rm(name) => {
            fs.delete(name)?;
            println!("🗑️  Deleted file: {}", name.red());
        }
        Command::Cp(src, dest) => {
            let bytes = fs.copy(src, dest)?;
            println!("📋 Copied {} -> {} ({} bytes)", src.cyan(), dest.green(), bytes);
        }
        Command::Mv(old, new) => {
            fs.rename(old, new)?;
            println!("🚚 Renamed {} -> {}", old.cyan(), new.green());
        }
        Command::Ls => list_files(fs)?,
        Command::List => list_all(fs)?,
        Command::Stat(name) => stat_file(fs, name)?,
        Command::Df => disk_usage(fs)?,
        Command::Fsck => check(fs)?,
        Command::Sync => {
            fs.sync()?;
            println!("{}", "💾 Metadata synced".green());
        }
        Command::Clear => {
            if let Err(e) = super::clear_screen() {
                println!("{} {}", "⚠️".yellow(), e);
            }
        }
        Command::Exit => println!("{}", "👋 Exiting TierFS shell...".yellow().bold()),
    }

    Ok(())
}

fn format_disk(fs: &mut FileSystem, block_size: usize) -> Result<()> {
    if fs.file_count() > 0 {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Formatting destroys {} file(s). Continue?",
                fs.file_count()
            ))
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            println!("{}", "Format cancelled".bright_black());
            return Ok(());
        }
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message("💾 Formatting virtual disk...");

    match fs.format(block_size) {
        Ok(()) => {
            let usage = fs.usage()?;
            spinner.finish_with_message(format!(
                "✅ Disk formatted: {} blocks of {} bytes",
                usage.block_count, usage.block_size
            ));
            Ok(())
        }
        Err(e) => {
            spinner.finish_and_clear();
            Err(e)
        }
    }
}

fn list_files(fs: &FileSystem) -> Result<()> {
    let files = fs.list_files()?;
    if files.is_empty() {
        println!("{}", "(empty)".bright_black());
        return Ok(());
    }
    println!(
        "{}",
        format!("{:<20} {:>8} {:>7}  {}", "NAME", "SIZE", "BLOCKS", "MODIFIED").bold()
    );
    for file in files {
        println!(
            "📄 {:<17} {:>8} {:>7}  {}",
            file.name,
            file.size,
            file.blocks,
            format_timestamp(file.modified_at).bright_black()
        );
    }
    Ok(())
}

/// 打开文件表 + 整个磁盘内容
fn list_all(fs: &mut FileSystem) -> Result<()> {
    println!("{}", "Open file table".bright_yellow().bold());
    for slot in fs.list_descriptors()? {
        let state = if slot.in_use {
            "open".green()
        } else {
            "closed".bright_black()
        };
        let size = slot
            .size
            .map_or_else(|| "-".to_string(), |size| size.to_string());
        println!(
            "  fd {:<3} {:<16} {:<7} size {}",
            slot.index, slot.name, state, size
        );
    }
    let contents = fs.disk_contents()?;
    println!("{}", "Disk content".bright_yellow().bold());
    println!("'{}'", printable(&contents));
    Ok(())
}

fn stat_file(fs: &mut FileSystem, name: &str) -> Result<()> {
    let stat = fs.stat(name)?;
    let show = |block: Option<usize>| block.map_or_else(|| "-".to_string(), |b| b.to_string());

    println!("{}", "📊 File Info".bright_yellow().bold());
    println!("{}: {}", "Name".blue(), stat.name);
    println!("{}: {} bytes", "Size".blue(), stat.size);
    println!(
        "{}: {} data + {} index",
        "Blocks".blue(),
        stat.blocks_in_use,
        stat.total_blocks - stat.blocks_in_use
    );
    let direct: Vec<String> = stat.direct.iter().map(|b| show(*b)).collect();
    println!("{}: [{}]", "Direct".blue(), direct.join(", "));
    println!(
        "{}: {} ({} entries)",
        "Single indirect".blue(),
        show(stat.single_indirect),
        stat.single_count
    );
    println!("{}: {}", "Double indirect".blue(), show(stat.double_indirect));
    for (i, branch) in stat.branches.iter().enumerate() {
        println!("  branch {} @ block {}: {} entries", i, branch.block, branch.blocks);
    }
    println!("{}: {:?}", "Data blocks".blue(), stat.data_blocks);
    println!("{}: {}", "Created".blue(), format_timestamp(stat.created_at));
    println!("{}: {}", "Modified".blue(), format_timestamp(stat.modified_at));
    Ok(())
}

fn disk_usage(fs: &FileSystem) -> Result<()> {
    let usage = fs.usage()?;
    println!("{}", "💽 Disk usage".bright_yellow().bold());
    println!("{}: {}", "Volume".blue(), usage.volume_id);
    println!(
        "{}: {} x {} bytes (capacity {})",
        "Blocks".blue(),
        usage.block_count,
        usage.block_size,
        usage.capacity
    );
    println!(
        "{}: {} used, {} free",
        "Allocation".blue(),
        usage.used_blocks,
        usage.free_blocks
    );
    println!("{}: {}", "Bytes used".blue(), usage.bytes_used);
    println!("{}: {}", "Max file size".blue(), usage.max_file_size);
    println!("{}: {}", "Files".blue(), usage.files);
    Ok(())
}

fn check(fs: &mut FileSystem) -> Result<()> {
    let report = fs.check()?;
    if report.is_clean() {
        println!(
            "{} {} files, {} blocks reachable",
            "✅ Clean:".green().bold(),
            report.files,
            report.reachable_blocks
        );
        return Ok(());
    }
    println!("{}", "❗ File system has problems".red().bold());
    if !report.leaked.is_empty() {
        println!("  leaked blocks: {:?}", report.leaked);
    }
    if !report.dangling.is_empty() {
        println!("  dangling blocks: {:?}", report.dangling);
    }
    if !report.shared.is_empty() {
        println!("  shared blocks: {:?}", report.shared);
    }
    for error in &report.errors {
        println!("  {}", error);
    }
    Ok(())
}

fn print_help() {
    println!("{}", "📘 TierFS Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  format [size]      Format the disk (block size defaults to 4)
  create <file>      Create a file and open it
  open <file>        Open a file, prints its fd
  close <fd>         Close a file descriptor
  write <fd> <text>  Append text to an open file
  read <fd> <len>    Read the first len bytes of an open file
  rm <file>          Delete a closed file
  cp <src> <dst>     Copy a file
  mv <old> <new>     Rename a file
  ls                 List files
  list               Show the open file table and raw disk content
  stat <file>        Show the block layout of a file
  df                 Show disk usage
  fsck               Check bitmap against file blocks
  sync               Write metadata next to the disk image
  clear              Clear the screen
  help               Show this help message
  exit               Sync and quit the shell
"
        .bright_black()
    );
}
