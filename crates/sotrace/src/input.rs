use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use sotrace_core::PostId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: '{value}' is not a post id")]
    MalformedPostId { line: usize, value: String },
}

/// One post id per line. Blank lines are skipped; surrounding whitespace is
/// ignored. Line numbers in errors are 1-based.
pub fn parse_post_ids(reader: impl BufRead) -> Result<Vec<PostId>, InputError> {
    let mut post_ids = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let value = line.trim();
        if value.is_empty() {
            continue;
        }

        let post_id = value
            .parse::<PostId>()
            .map_err(|_| InputError::MalformedPostId {
                line: index + 1,
                value: value.to_owned(),
            })?;
        post_ids.push(post_id);
    }

    Ok(post_ids)
}

pub fn load_post_ids(path: impl AsRef<Path>) -> Result<Vec<PostId>, InputError> {
    let file = File::open(path.as_ref())?;
    parse_post_ids(BufReader::new(file))
}
