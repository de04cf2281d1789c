use std::io::Write;

use anyhow::{Context, Result};
use sotrace_analysis::{
    ChangeClassifier, ChangeTally, DiffEmitter, DiffSink, LineageBuilder, SimilarityAggregator,
    SimilarityBand, SimilaritySummary,
};
use sotrace_config::MissingPolicy;
use sotrace_core::PostId;
use sotrace_store::LineageSource;

use crate::cli::SummaryFormat;
use crate::output::{
    SimilarityCsvWriter, write_change_tally, write_lineage_summary, write_post_change,
};

pub fn run_summary<S: LineageSource>(
    builder: &LineageBuilder<S>,
    post_ids: &[PostId],
    format: SummaryFormat,
    out: &mut dyn Write,
) -> Result<usize> {
    tracing::info!(posts = post_ids.len(), "writing lineage summaries");
    let mut written = 0;

    builder.for_each_post(post_ids, |lineage| -> Result<()> {
        write_lineage_summary(&lineage, format, out)
            .with_context(|| format!("failed to write summary for post {}", lineage.post_id()))?;
        written += 1;
        Ok(())
    })?;
    out.flush().context("failed to flush summary output")?;

    tracing::info!(posts = written, "lineage summaries written");
    Ok(written)
}

pub fn run_changes<S: LineageSource>(
    builder: &LineageBuilder<S>,
    post_ids: &[PostId],
    policy: MissingPolicy,
    out: &mut dyn Write,
) -> Result<ChangeTally> {
    tracing::info!(
        posts = post_ids.len(),
        missing_policy = policy.as_str(),
        "classifying post changes"
    );
    let classifier = ChangeClassifier::new(policy);
    let mut tally = ChangeTally::default();

    builder.for_each_post(post_ids, |lineage| -> Result<()> {
        let change = classifier.classify(&lineage)?;
        tracing::debug!(post_id = change.post_id, kind = change.kind.as_str(), "classified post");
        write_post_change(&change, out).context("failed to write post change")?;
        tally.record(change.kind);
        Ok(())
    })?;

    write_change_tally(&tally, out).context("failed to write change tally")?;
    out.flush().context("failed to flush change output")?;
    tracing::info!(
        code = tally.code,
        text = tally.text,
        both = tally.both,
        unchanged = tally.unchanged,
        "Code changes: {}, Text changes: {}, BothChanges: {}",
        tally.code,
        tally.text,
        tally.both
    );
    Ok(tally)
}

pub fn run_similarity<S: LineageSource, W: Write>(
    builder: &LineageBuilder<S>,
    post_ids: &[PostId],
    band: SimilarityBand,
    csv: &mut SimilarityCsvWriter<W>,
) -> Result<SimilaritySummary> {
    tracing::info!(
        posts = post_ids.len(),
        min = band.min(),
        max = band.max(),
        "computing block similarity"
    );
    let aggregator = SimilarityAggregator::new(band);
    let mut summary = SimilaritySummary::default();

    builder.for_each_post(post_ids, |lineage| -> Result<()> {
        let records = aggregator.aggregate_post(&lineage)?;
        csv.write_post(&records).with_context(|| {
            format!("failed to write similarity rows for post {}", lineage.post_id())
        })?;
        summary.add_post(&records);
        Ok(())
    })?;

    tracing::info!(
        posts = summary.posts,
        records = summary.records,
        in_band = summary.in_band,
        "similarity computation finished"
    );
    Ok(summary)
}

pub fn run_diff<S: LineageSource>(
    builder: &LineageBuilder<S>,
    post_ids: &[PostId],
    sink: &mut dyn DiffSink,
) -> Result<usize> {
    tracing::info!(posts = post_ids.len(), "emitting block diffs");
    let emitter = DiffEmitter::new(builder.source());
    let mut documents = 0;

    builder.for_each_post(post_ids, |lineage| -> Result<()> {
        documents += emitter.emit_post(&lineage, sink)?;
        Ok(())
    })?;

    tracing::info!(documents, "diff emission finished");
    Ok(documents)
}
