pub mod command;
pub mod parse;

use crate::{
    disk::init::perform_disk_initialization,
    fs::{
        config::{DiskOptions, HISTORY_FILE},
        error::FsError,
        FileSystem,
    },
    shell::{
        command::{execute_command, Command},
        parse::parse_command,
    },
};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use std::{
    io::{self, stdout},
    path::PathBuf,
    sync::mpsc,
    thread,
};

/// 后台挂载线程发回的进度消息
pub enum BootProgress {
    Step(&'static str),
    Progress(u64),
    Finished(Result<FileSystem, FsError>),
}

pub fn start_shell(options: DiskOptions, history_size: usize) {
    let Some(mut fs) = boot(options) else {
        return;
    };

    let username = whoami::username();
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());

    if !fs.is_formatted() {
        println!(
            "{}",
            "Disk is not formatted. Run 'format [size]' first.".yellow()
        );
    }
    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    // 初始化 reedline
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(HISTORY_FILE);

    let mut line_editor = Reedline::create();
    match FileBackedHistory::with_file(history_size, history_path) {
        Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
        Err(e) => warn!("shell history disabled: {}", e),
    }

    // 命令补全
    let commands: Vec<String> = [
        "help", "format", "create", "open", "close", "write", "read", "rm", "cp", "mv", "ls",
        "list", "stat", "df", "fsck", "sync", "clear", "exit",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    let completer = DefaultCompleter::new_with_wordlen(commands, 2);
    line_editor = line_editor.with_completer(Box::new(completer));

    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic(format!("{}@{}", username, hostname)),
        DefaultPromptSegment::Basic("TierFS".to_string()),
    );

    loop {
        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut fs) {
                            println!("{} {}", "❌ Error:".red().bold(), e);
                        }
                        if matches!(cmd, Command::Exit) {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command or bad arguments. Type 'help' for command list."
                            .yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting TierFS...".yellow());
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    if let Err(e) = fs.sync() {
        println!("{} {}", "❌ Sync failed:".red().bold(), e);
    }
    println!("{}", "👋 Bye!".bright_yellow());
}

/// 在后台线程挂载磁盘，前台用进度条显示
fn boot(options: DiskOptions) -> Option<FileSystem> {
    if let Err(e) = clear_screen() {
        warn!("cannot clear screen: {}", e);
    }
    println!("{}", "[TierFS Booting...]".bright_yellow().bold());

    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || perform_disk_initialization(tx, options));

    let pb = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% {msg}") {
        pb.set_style(style.progress_chars("=> "));
    }

    let mut result = None;
    for message in rx {
        match message {
            BootProgress::Step(step) => pb.println(step),
            BootProgress::Progress(pos) => pb.set_position(pos),
            BootProgress::Finished(outcome) => {
                result = Some(outcome);
                break;
            }
        }
    }
    if worker.join().is_err() {
        warn!("disk initialization thread panicked");
    }

    match result {
        Some(Ok(fs)) => {
            pb.finish_with_message("✅ Ready!");
            if let Err(e) = welcome() {
                warn!("cannot draw welcome banner: {}", e);
            }
            Some(fs)
        }
        Some(Err(e)) => {
            pb.abandon_with_message("❌ Boot failed");
            println!("{} {}", "❌ Error:".red().bold(), e);
            None
        }
        None => {
            pb.abandon_with_message("❌ Boot aborted");
            None
        }
    }
}

pub(crate) fn clear_screen() -> io::Result<()> {
    let mut stdout = stdout();
    execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))
}

fn welcome() -> io::Result<()> {
    clear_screen()?;
    let mut stdout = stdout();
    execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print(format!("Welcome to TierFS v{}\n", env!("CARGO_PKG_VERSION"))),
        ResetColor
    )
}
