pub mod cli;
pub mod disk;
pub mod fs;
pub mod shell;
pub mod utils;

pub use fs::{error::FsError, FileSystem};
