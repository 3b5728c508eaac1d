use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::bytea::ByteaLiteral;
use crate::error::ImgMigrateError;

/// How an identifier is placed inside its SQL string literal.
#[derive(Serialize, Deserialize, ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierQuoting {
    /// Single quotes are doubled so the literal is always well formed.
    Escaped,
    /// The identifier is concatenated verbatim. Names containing `'` yield
    /// broken (or injectable) SQL.
    Raw,
}

impl IdentifierQuoting {
    pub fn quote<'a>(&self, identifier: &'a str) -> Cow<'a, str> {
        match self {
            IdentifierQuoting::Escaped if identifier.contains('\'') => {
                Cow::Owned(identifier.replace('\'', "''"))
            }
            _ => Cow::Borrowed(identifier),
        }
    }
}

/// A single `insert` statement for one image file.
pub struct InsertStatement<'a> {
    pub table: &'a str,
    pub identifier: &'a str,
    pub quoting: IdentifierQuoting,
    pub blob: &'a [u8],
}

impl InsertStatement<'_> {
    /// The version column of every inserted row.
    pub const VERSION: u32 = 0;
}

impl fmt::Display for InsertStatement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "insert into {} (version, imageIdentifier, imageBlob) values ({}, '{}', E'{}');",
            self.table,
            Self::VERSION,
            self.quoting.quote(self.identifier),
            ByteaLiteral(self.blob)
        )
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScriptSummary {
    pub statements: u64,
    pub blob_bytes: u64,
}

/// Buffered sink for the migration script. Statements are written one per
/// line as they are produced.
pub struct ScriptWriter<W: Write> {
    out: BufWriter<W>,
    table: String,
    quoting: IdentifierQuoting,
    summary: ScriptSummary,
}

impl ScriptWriter<File> {
    pub fn create(
        path: &Path,
        table: &str,
        quoting: IdentifierQuoting,
    ) -> Result<Self, ImgMigrateError> {
        let file = File::create(path).map_err(|source| ImgMigrateError::OutputUnwritable {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(ScriptWriter::new(file, table, quoting))
    }
}

impl<W: Write> ScriptWriter<W> {
    pub fn new(inner: W, table: &str, quoting: IdentifierQuoting) -> Self {
        ScriptWriter {
            out: BufWriter::new(inner),
            table: table.to_owned(),
            quoting,
            summary: ScriptSummary::default(),
        }
    }

    pub fn write_insert(&mut self, identifier: &str, blob: &[u8]) -> Result<(), ImgMigrateError> {
        let statement = InsertStatement {
            table: &self.table,
            identifier,
            quoting: self.quoting,
            blob,
        };
        writeln!(self.out, "{statement}")?;

        self.summary.statements += 1;
        self.summary.blob_bytes += blob.len() as u64;

        Ok(())
    }

    /// Flushes buffered statements and hands back the underlying writer.
    pub fn finish(self) -> Result<(W, ScriptSummary), ImgMigrateError> {
        let summary = self.summary;
        let inner = self
            .out
            .into_inner()
            .map_err(|e| ImgMigrateError::IoError(e.into_error()))?;

        Ok((inner, summary))
    }
}
