use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::error::ImgMigrateError;

/// Lazy, depth-first walk yielding every file below a root directory.
///
/// A directory is only read once the files queued before it have been
/// consumed. The first error ends the walk.
pub struct DirWalker {
    sorted: bool,
    pending_dirs: VecDeque<PathBuf>,
    pending_files: VecDeque<PathBuf>,
    directories_visited: u64,
}

impl DirWalker {
    pub fn new(root: &Path, sorted: bool) -> Self {
        DirWalker {
            sorted,
            pending_dirs: VecDeque::from([root.to_path_buf()]),
            pending_files: VecDeque::new(),
            directories_visited: 0,
        }
    }

    pub fn directories_visited(&self) -> u64 {
        self.directories_visited
    }

    fn read_directory(&mut self, dir: &Path) -> Result<(), ImgMigrateError> {
        let unreadable = |source| ImgMigrateError::DirectoryUnreadable {
            path: dir.to_path_buf(),
            source,
        };

        self.directories_visited += 1;
        trace!("Reading directory '{}'", dir.display());

        let mut files = Vec::new();
        let mut subdirs = Vec::new();

        for entry in fs::read_dir(dir).map_err(unreadable)? {
            let entry = entry.map_err(unreadable)?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(unreadable)?;

            if file_type.is_dir() {
                subdirs.push(path);
            } else if file_type.is_file() {
                files.push(path);
            } else if file_type.is_symlink() {
                // Symlinked directories are never descended into. Anything
                // else, dangling links included, is read through the link.
                match fs::metadata(&path) {
                    Ok(target) if target.is_dir() => {
                        debug!("Skipping symlink to directory '{}'", path.display());
                    }
                    _ => files.push(path),
                }
            } else {
                debug!("Skipping special file '{}'", path.display());
            }
        }

        if self.sorted {
            files.sort();
            subdirs.sort();
        }

        self.pending_files.extend(files);
        // Pre-order: this directory's subdirectories come before its siblings
        for subdir in subdirs.into_iter().rev() {
            self.pending_dirs.push_front(subdir);
        }

        Ok(())
    }
}

impl Iterator for DirWalker {
    type Item = Result<PathBuf, ImgMigrateError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(file) = self.pending_files.pop_front() {
                return Some(Ok(file));
            }

            let dir = self.pending_dirs.pop_front()?;
            if let Err(e) = self.read_directory(&dir) {
                self.pending_dirs.clear();
                self.pending_files.clear();
                return Some(Err(e));
            }
        }
    }
}
