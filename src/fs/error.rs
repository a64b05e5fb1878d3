use thiserror::Error;

/// 文件系统错误类型
#[derive(Error, Debug)]
pub enum FsError {
    #[error("disk is not formatted")]
    NotFormatted,
    #[error("invalid block size {0}")]
    InvalidBlockSize(usize),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("file already exists: {0}")]
    FileAlreadyExists(String),
    #[error("file is open: {0}")]
    FileInUse(String),
    #[error("invalid file descriptor: {0}")]
    InvalidDescriptor(usize),
    #[error("file descriptor {0} is already closed")]
    AlreadyClosed(usize),
    #[error("no space left on disk")]
    OutOfSpace,
    #[error("source and destination are the same file: {0}")]
    SameSourceAndDestination(String),
    #[error("invalid length: {0}")]
    InvalidLength(isize),
    #[error("file system corrupted: {0}")]
    Corrupted(String),
    #[error("disk I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FsError>;
