//! Search dispatcher: one partition's identification pass.
//!
//! Every probe produces exactly `candidate_list_length` output rows.
//! When probe extraction or the identification call fails, the rows are
//! placeholder candidates rather than omissions; downstream scoring
//! expects a fixed-size list per search id.

use crate::image_io;
use crate::paths::PartitionPaths;
use crate::split::{self, SplitError};
use lineup_core::{
    Candidate, IdentEngine, ReturnCode, ReturnStatus, TemplateOutput, TemplateRole,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use thiserror::Error;

/// Candidates requested per probe.
pub const CANDIDATE_LIST_LENGTH: u32 = 20;

/// Column header of the candidate-list file.
pub const CANDIDATE_HEADER: &str =
    "searchId candidateRank searchRetCode isAssigned templateId score decision";

/// Declared sentinels for unassigned placeholder candidates. The id is
/// a printable token so whitespace-delimited parsers keep their column
/// alignment.
pub const UNASSIGNED_TEMPLATE_ID: &str = "NA";
pub const UNASSIGNED_SCORE: f64 = -1.0;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Input(#[from] SplitError),
    #[error("cannot open {0} for writing: {1}")]
    StreamOpen(String, std::io::Error),
    #[error("write to {0} failed: {1}")]
    StreamWrite(String, std::io::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct SearchStats {
    pub probes: usize,
    pub failed_searches: usize,
}

fn placeholders(len: u32) -> Vec<Candidate> {
    vec![
        Candidate {
            is_assigned: false,
            template_id: UNASSIGNED_TEMPLATE_ID.to_string(),
            similarity_score: UNASSIGNED_SCORE,
        };
        len as usize
    ]
}

/// Run the search pass for one partition against the frozen corpus.
///
/// The candidate-list stream must open or the worker aborts; per-probe
/// failures are absorbed as placeholder rows. Rank is purely the
/// position in the engine's returned order, never recomputed from
/// score. The input slice is deleted on successful completion.
pub fn run_search_partition(
    engine: &mut dyn IdentEngine,
    paths: &PartitionPaths,
    candidate_list_length: u32,
) -> Result<SearchStats, SearchError> {
    let probes = split::read_record_list(&paths.input)?;

    let mut out = File::create(&paths.report)
        .map(BufWriter::new)
        .map_err(|e| SearchError::StreamOpen(paths.report.display().to_string(), e))?;
    let write_err =
        |e: std::io::Error| SearchError::StreamWrite(paths.report.display().to_string(), e);

    writeln!(out, "{CANDIDATE_HEADER}").map_err(write_err)?;

    let mut failed = 0usize;
    for probe in &probes {
        let extracted = match image_io::read_image(std::path::Path::new(&probe.image_path)) {
            Ok(face) => engine.create_template(&face, TemplateRole::Search1N),
            Err(e) => {
                tracing::warn!(search = %probe.id, error = %e, "image load failed");
                TemplateOutput {
                    status: ReturnStatus::new(ReturnCode::InputLocationError, e.to_string()),
                    template: Vec::new(),
                    eyes: Default::default(),
                }
            }
        };

        // The status written per row is the identify status when the
        // search ran, otherwise the extraction status.
        let (status, candidates, decision) = if extracted.status.is_success() {
            let result = engine.identify_template(&extracted.template, candidate_list_length);
            if result.status.is_success() {
                (result.status, result.candidates, result.decision)
            } else {
                (result.status, placeholders(candidate_list_length), false)
            }
        } else {
            (extracted.status, placeholders(candidate_list_length), false)
        };
        if !status.is_success() {
            failed += 1;
        }

        for (rank, candidate) in candidates.iter().enumerate() {
            writeln!(
                out,
                "{} {} {} {} {} {} {}",
                probe.id,
                rank,
                status.code.as_i32(),
                u8::from(candidate.is_assigned),
                candidate.template_id,
                candidate.similarity_score,
                u8::from(decision),
            )
            .map_err(write_err)?;
        }
    }

    out.flush().map_err(write_err)?;

    if let Err(e) = std::fs::remove_file(&paths.input) {
        tracing::warn!(slice = %paths.input.display(), error = %e, "slice cleanup failed");
    }

    tracing::info!(
        partition = paths.index,
        probes = probes.len(),
        failed_searches = failed,
        "search partition complete"
    );
    Ok(SearchStats {
        probes: probes.len(),
        failed_searches: failed,
    })
}
