use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use clap::ValueEnum;
use log::{debug, info, warn, Level};
use logging_timer::timer;
use serde::{Deserialize, Serialize};

use crate::error::ImgMigrateError;
use crate::script::{IdentifierQuoting, ScriptWriter};
use crate::walker::DirWalker;

/// What goes into the `imageIdentifier` column.
#[derive(Serialize, Deserialize, ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierMode {
    /// Base filename only. Same-named files in different directories collide.
    Filename,
    /// Path relative to the root, `/` separated.
    Relative,
}

impl IdentifierMode {
    /// Builds the identifier for `path`. Names that are not valid UTF-8 are
    /// rejected: a lossy rendering would let distinct files share one
    /// identifier.
    pub fn identifier_for(&self, root: &Path, path: &Path) -> Result<String, ImgMigrateError> {
        let non_utf8 = || ImgMigrateError::NonUtf8Name(path.to_path_buf());

        match self {
            IdentifierMode::Filename => match path.file_name() {
                Some(name) => name.to_str().map(str::to_owned).ok_or_else(non_utf8),
                None => Ok(String::new()),
            },
            IdentifierMode::Relative => {
                let rel = path.strip_prefix(root).unwrap_or(path);
                let parts = rel
                    .components()
                    .filter_map(|c| match c {
                        Component::Normal(part) => Some(part.to_str().ok_or_else(non_utf8)),
                        _ => None,
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(parts.join("/"))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub root: PathBuf,
    pub output: PathBuf,
    pub table: String,
    pub identifier: IdentifierMode,
    pub quoting: IdentifierQuoting,
    pub sorted: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerateSummary {
    pub statements: u64,
    pub blob_bytes: u64,
    pub directories: u64,
    pub duplicate_identifiers: u64,
}

impl fmt::Display for GenerateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Statements:            {}", self.statements)?;
        writeln!(f, "Image bytes:           {}", self.blob_bytes)?;
        writeln!(f, "Directories:           {}", self.directories)?;
        write!(f, "Duplicate identifiers: {}", self.duplicate_identifiers)
    }
}

pub struct Generator<'a, W: Write> {
    options: &'a GenerateOptions,
    writer: ScriptWriter<W>,
    skip_path: Option<PathBuf>,
    seen_identifiers: HashSet<String>,
    duplicate_identifiers: u64,
}

impl Generator<'_, fs::File> {
    /// Writes the migration script for `options.root` to `options.output`.
    ///
    /// The root is checked before the output file is created, so a bad root
    /// leaves nothing behind. Any later failure aborts the run and leaves the
    /// statements written so far in place.
    pub fn generate(options: &GenerateOptions) -> Result<GenerateSummary, ImgMigrateError> {
        let _tmr = timer!(Level::Debug; "Generator::generate", "{}", options.root.display());

        let root = Self::validate_root(&options.root)?;
        info!(
            "Generating '{}' from '{}'",
            options.output.display(),
            root.display()
        );

        let writer = ScriptWriter::create(&options.output, &options.table, options.quoting)?;
        // The script must not end up inserting itself
        let skip_path = fs::canonicalize(&options.output).ok();

        let mut generator = Generator::new(options, writer);
        generator.skip_path = skip_path;
        let summary = generator.run(&root)?;

        info!(
            "Wrote {} statements ({} image bytes) to '{}'",
            summary.statements,
            summary.blob_bytes,
            options.output.display()
        );

        Ok(summary)
    }

    fn validate_root(root: &Path) -> Result<PathBuf, ImgMigrateError> {
        if root.as_os_str().is_empty() {
            return Err(ImgMigrateError::Error("Provided root path is empty".to_string()));
        }

        let metadata = match fs::metadata(root) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ImgMigrateError::RootNotFound(root.to_path_buf()));
            }
            Err(e) => return Err(ImgMigrateError::IoError(e)),
        };

        if !metadata.is_dir() {
            return Err(ImgMigrateError::RootNotDirectory(root.to_path_buf()));
        }

        Ok(root.to_path_buf())
    }
}

impl<'a, W: Write> Generator<'a, W> {
    pub fn new(options: &'a GenerateOptions, writer: ScriptWriter<W>) -> Self {
        Generator {
            options,
            writer,
            skip_path: None,
            seen_identifiers: HashSet::new(),
            duplicate_identifiers: 0,
        }
    }

    /// Walks `root` and writes one statement per file, consuming the
    /// generator. The writer is flushed before returning.
    pub fn run(mut self, root: &Path) -> Result<GenerateSummary, ImgMigrateError> {
        let mut walker = DirWalker::new(root, self.options.sorted);

        for path in walker.by_ref() {
            let path = path?;
            if self.is_output_file(&path) {
                debug!("Skipping output script '{}'", path.display());
                continue;
            }
            self.handle_file(root, &path)?;
        }

        let (_, script) = self.writer.finish()?;

        Ok(GenerateSummary {
            statements: script.statements,
            blob_bytes: script.blob_bytes,
            directories: walker.directories_visited(),
            duplicate_identifiers: self.duplicate_identifiers,
        })
    }

    fn handle_file(&mut self, root: &Path, path: &Path) -> Result<(), ImgMigrateError> {
        let blob = fs::read(path).map_err(|source| ImgMigrateError::FileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let identifier = self.options.identifier.identifier_for(root, path)?;
        if !self.seen_identifiers.insert(identifier.clone()) {
            self.duplicate_identifiers += 1;
            warn!(
                "Identifier '{}' is used by more than one file (latest: '{}')",
                identifier,
                path.display()
            );
        }

        debug!("{} -> '{}' ({} bytes)", path.display(), identifier, blob.len());
        self.writer.write_insert(&identifier, &blob)
    }

    fn is_output_file(&self, path: &Path) -> bool {
        let Some(skip_path) = &self.skip_path else {
            return false;
        };
        if path.file_name() != skip_path.file_name() {
            return false;
        }
        fs::canonicalize(path).is_ok_and(|p| p == *skip_path)
    }
}
