//! Splitting SQL dumps into executable statements.
//!
//! The split is line based, not SQL aware: a statement ends where a raw input
//! line ends in `;`. A `;` followed by anything on the same line does not end a
//! statement, and a line ending in `;` inside a string literal does. Lines of
//! one statement are joined with no separator. Dumps produced by `mysqldump`
//! satisfy these rules.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::trace;

use crate::error::{AppError, AppResult};

/// Split raw SQL text into statements.
pub fn chunk(raw: &str) -> Vec<String> {
    let mut chunker = Chunker::default();
    for line in raw.lines() {
        chunker.push_line(line);
    }
    chunker.finish()
}

/// Split SQL read from any reader. Fails if the input is not valid UTF-8 text.
pub fn chunk_reader<R: BufRead>(reader: R) -> std::io::Result<Vec<String>> {
    let mut chunker = Chunker::default();
    for line in reader.lines() {
        chunker.push_line(&line?);
    }
    Ok(chunker.finish())
}

/// Decompress a gzipped dump and split it into statements.
pub fn read_gz_statements(path: &Path) -> AppResult<Vec<String>> {
    let parse_error = |cause: std::io::Error| AppError::Parse {
        file: path.display().to_string(),
        cause: cause.to_string(),
    };

    let file = File::open(path).map_err(parse_error)?;
    let statements = read_gz(file).map_err(parse_error)?;

    for (index, statement) in statements.iter().enumerate() {
        trace!("{} ##{}##", index, statement);
    }
    Ok(statements)
}

fn read_gz<R: Read>(input: R) -> std::io::Result<Vec<String>> {
    chunk_reader(BufReader::new(GzDecoder::new(input)))
}

#[derive(Default)]
struct Chunker {
    statements: Vec<String>,
    current: String,
}

impl Chunker {
    fn push_line(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            return;
        }

        match line.strip_suffix(';') {
            Some(body) => {
                self.current.push_str(body);
                self.flush();
            }
            None => self.current.push_str(line),
        }
    }

    fn flush(&mut self) {
        let statement = std::mem::take(&mut self.current);
        if !statement.is_empty() {
            self.statements.push(statement);
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.statements
    }
}
