use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use sotrace_analysis::{
    BlockSimilarityRecord, ChangeTally, LineageSummary, PostChange, render_lineage_summary,
};
use sotrace_core::PostLineage;

use crate::cli::SummaryFormat;

pub const SIMILARITY_CSV_HEADER: &str =
    "PostId,UniqueId,PostBlockType,Revisions,MinSim,MaxSim,AvgSim";

/// Opens `path` for writing, creating parent directories. `-` is stdout.
pub fn open_output(path: &Path) -> io::Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdout().lock()));
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(Box::new(BufWriter::new(File::create(path)?)))
}

pub fn format_similarity_row(record: &BlockSimilarityRecord) -> String {
    format!(
        "{},{},{},{},{},{},{}",
        record.post_id,
        record.block_id,
        record.block_type.tag(),
        record.revisions,
        record.min_similarity,
        record.max_similarity,
        record.avg_similarity
    )
}

/// CSV sink that flushes after every post so rows already written survive a
/// later failure.
pub struct SimilarityCsvWriter<W: Write> {
    out: W,
    rows: usize,
}

impl<W: Write> SimilarityCsvWriter<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "{SIMILARITY_CSV_HEADER}")?;
        out.flush()?;
        Ok(Self { out, rows: 0 })
    }

    pub fn write_post(&mut self, records: &[BlockSimilarityRecord]) -> io::Result<()> {
        for record in records {
            writeln!(self.out, "{}", format_similarity_row(record))?;
        }
        self.rows += records.len();
        self.out.flush()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn write_lineage_summary(
    lineage: &PostLineage,
    format: SummaryFormat,
    out: &mut dyn Write,
) -> io::Result<()> {
    match format {
        SummaryFormat::Text => writeln!(out, "{}", render_lineage_summary(lineage)),
        SummaryFormat::Json => {
            let summary = LineageSummary::from(lineage);
            serde_json::to_writer(&mut *out, &summary)?;
            writeln!(out)
        }
    }
}

pub fn write_post_change(change: &PostChange, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}\t{}", change.post_id, change.kind.as_str())
}

pub fn write_change_tally(tally: &ChangeTally, out: &mut dyn Write) -> io::Result<()> {
    writeln!(
        out,
        "Code changes: {}, Text changes: {}, BothChanges: {}, Unchanged: {}",
        tally.code, tally.text, tally.both, tally.unchanged
    )
}
