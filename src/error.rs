use std::io;
use std::path::PathBuf;

use flexi_logger::FlexiLoggerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImgMigrateError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Root path '{}' does not exist", .0.display())]
    RootNotFound(PathBuf),

    #[error("Root path '{}' is not a directory", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("Cannot create output script '{}': {source}", path.display())]
    OutputUnwritable { path: PathBuf, source: io::Error },

    #[error("Cannot read directory '{}': {source}", path.display())]
    DirectoryUnreadable { path: PathBuf, source: io::Error },

    #[error("Cannot read file '{}': {source}", path.display())]
    FileUnreadable { path: PathBuf, source: io::Error },

    #[error("File name '{}' is not valid UTF-8", .0.display())]
    NonUtf8Name(PathBuf),

    #[error("Logging error: {0}")]
    LoggerError(#[from] FlexiLoggerError),

    #[error("Error: {0}")]
    Error(String), // Allows custom application errors
}
