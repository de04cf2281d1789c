use std::fs;
use std::path::{Path, PathBuf};

use sotrace_core::{BlockId, BlockType, BlockVersion, DiffRow, PostId, PostLineage, RevisionId};
use sotrace_store::LineageSource;

use crate::AnalysisError;
use crate::walker::{ChainWalker, VisitedBlocks};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffKey {
    pub post_id: PostId,
    pub revision_id: RevisionId,
    pub local_id: i64,
    pub block_id: BlockId,
    pub preceding_block_id: BlockId,
    pub block_type: BlockType,
}

impl DiffKey {
    pub fn new(post_id: PostId, revision_id: RevisionId, block: &BlockVersion) -> Self {
        Self {
            post_id,
            revision_id,
            local_id: block.local_id,
            block_id: block.id,
            preceding_block_id: block.preceding_block_id,
            block_type: block.block_type,
        }
    }

    /// `PostId-RevisionId-LocalId-BlockId-PredecessorBlockId-TypeTag.txt`
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}-{}.txt",
            self.post_id,
            self.revision_id,
            self.local_id,
            self.block_id,
            self.preceding_block_id,
            self.block_type.tag()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffDocument {
    pub key: DiffKey,
    pub text: String,
}

/// Prefixes every line of every row with its operation marker.
pub fn render_diff_rows(rows: &[DiffRow]) -> String {
    let mut rendered = String::new();
    for row in rows {
        let prefix = row.operation.line_prefix();
        for line in row_lines(&row.text) {
            rendered.push_str(prefix);
            rendered.push_str(line);
            rendered.push('\n');
        }
    }
    rendered
}

/// Segments between `'\n'` with trailing empty segments dropped. `\r` stays
/// part of the line and text without any `'\n'` is a single line, even when
/// empty.
fn row_lines(text: &str) -> Vec<&str> {
    if !text.contains('\n') {
        return vec![text];
    }

    let mut lines: Vec<&str> = text.split('\n').collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

pub trait DiffSink {
    fn write_document(&mut self, document: &DiffDocument) -> Result<(), AnalysisError>;
}

impl DiffSink for Vec<DiffDocument> {
    fn write_document(&mut self, document: &DiffDocument) -> Result<(), AnalysisError> {
        self.push(document.clone());
        Ok(())
    }
}

/// Writes each document to `<root>/<post id>/<file name>`.
pub struct DirectoryDiffSink {
    root: PathBuf,
    written: usize,
}

impl DirectoryDiffSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn document_path(&self, key: &DiffKey) -> PathBuf {
        self.root
            .join(key.post_id.to_string())
            .join(key.file_name())
    }
}

impl DiffSink for DirectoryDiffSink {
    fn write_document(&mut self, document: &DiffDocument) -> Result<(), AnalysisError> {
        let path = self.document_path(&document.key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &document.text)?;
        self.written += 1;
        Ok(())
    }
}

pub struct DiffEmitter<'s, S: ?Sized> {
    source: &'s S,
}

impl<'s, S: LineageSource + ?Sized> DiffEmitter<'s, S> {
    pub fn new(source: &'s S) -> Self {
        Self { source }
    }

    /// Walks every block chain of the post and hands one document per newly
    /// visited block that has diff rows to `sink`. Returns the document count.
    pub fn emit_post(
        &self,
        lineage: &PostLineage,
        sink: &mut dyn DiffSink,
    ) -> Result<usize, AnalysisError> {
        let walker = ChainWalker::new(lineage);
        let mut visited = VisitedBlocks::new();
        let mut emitted = 0;

        for revision in lineage.revisions() {
            for block in revision.blocks() {
                walker.walk_blocks(revision.id(), block, &mut visited, |owner, visited_block| {
                    if self.source.diff_row_count(visited_block.id)? == 0 {
                        return Ok::<(), AnalysisError>(());
                    }

                    let rows = self.source.diff_rows_for_block(visited_block.id)?;
                    let document = DiffDocument {
                        key: DiffKey::new(lineage.post_id(), owner.id(), visited_block),
                        text: render_diff_rows(&rows),
                    };
                    sink.write_document(&document)?;
                    emitted += 1;
                    Ok(())
                })?;
            }
        }

        tracing::debug!(post_id = lineage.post_id(), documents = emitted, "emitted diff documents");
        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use sotrace_core::DiffOperation;
    use tempfile::tempdir;

    use super::*;
    use crate::build_post_lineage;
    use crate::testing::{MemorySource, code, origin, successor};

    fn row(text: &str, operation: DiffOperation) -> DiffRow {
        DiffRow {
            text: text.to_owned(),
            operation,
        }
    }

    #[test]
    fn render_prefixes_each_line_by_operation() {
        let rows = vec![
            row("int a;\nint b;", DiffOperation::Equal),
            row("int c;\n", DiffOperation::Delete),
            row("int d;", DiffOperation::Insert),
            row("raw", DiffOperation::Other(7)),
        ];

        assert_eq!(
            render_diff_rows(&rows),
            "   int a;\n   int b;\n - int c;\n + int d;\nraw\n"
        );
        assert_eq!(render_diff_rows(&[]), "");
    }

    #[test]
    fn render_keeps_carriage_returns_and_empty_rows() {
        let rows = vec![
            row("a\n\n", DiffOperation::Insert),
            row("", DiffOperation::Equal),
            row("c\r\nd", DiffOperation::Delete),
        ];

        assert_eq!(render_diff_rows(&rows), " + a\n   \n - c\r\n - d\n");
        assert_eq!(render_diff_rows(&[row("\n\n", DiffOperation::Insert)]), "");
    }

    #[test]
    fn key_file_name_carries_lineage_coordinates() {
        let block = code(successor(42, 3, (7, 41), 0.5));
        let key = DiffKey::new(100, 8, &block);
        assert_eq!(key.file_name(), "100-8-3-42-41-1.txt");
    }

    #[test]
    fn emit_post_writes_only_blocks_with_diff_rows_once() {
        let mut source = MemorySource::default();
        source
            .add(3, 1, false, origin(10, 1))
            .add(3, 2, false, successor(20, 1, (1, 10), 0.7))
            .add(3, 3, true, successor(30, 1, (2, 20), 0.9))
            .add(3, 3, true, successor(31, 2, (2, 20), 0.6))
            .add_diff(20, row("a\nb", DiffOperation::Insert))
            .add_diff(20, row("c", DiffOperation::Equal))
            .add_diff(31, row("x", DiffOperation::Delete));
        let lineage = build_post_lineage(&source, 3).expect("build lineage");

        let mut documents: Vec<DiffDocument> = Vec::new();
        let emitted = DiffEmitter::new(&source)
            .emit_post(&lineage, &mut documents)
            .expect("emit diffs");

        assert_eq!(emitted, 2);
        let names: Vec<_> = documents.iter().map(|doc| doc.key.file_name()).collect();
        assert_eq!(names, vec!["3-2-1-20-10-0.txt", "3-3-2-31-20-0.txt"]);
        assert_eq!(documents[0].text, " + a\n + b\n   c\n");
        assert_eq!(documents[1].text, " - x\n");
        // 30, 20, 10 via the first chain and 31 via the second.
        assert_eq!(source.diff_queries.get(), 4);
    }

    #[test]
    fn directory_sink_writes_per_post_tree() {
        let temp = tempdir().expect("tempdir");
        let mut sink = DirectoryDiffSink::new(temp.path().join("diff"));
        let block = successor(20, 1, (1, 10), 0.7);
        let document = DiffDocument {
            key: DiffKey::new(3, 2, &block),
            text: " + a\n".to_owned(),
        };

        sink.write_document(&document).expect("write document");

        let path = temp.path().join("diff").join("3").join("3-2-1-20-10-0.txt");
        assert_eq!(sink.document_path(&document.key), path);
        assert_eq!(fs::read_to_string(&path).expect("read diff"), " + a\n");
        assert_eq!(sink.written(), 1);
    }
}
