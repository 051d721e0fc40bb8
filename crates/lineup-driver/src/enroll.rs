//! Enrollment writer: one partition's enroll pass.
//!
//! Appends every extracted template to the partition's EDB and records
//! `(subjectId, length, offset)` in the manifest, offset taken before
//! the append so the manifest entries form a gapless, non-overlapping
//! cover of the EDB byte range. Templates are never dropped: a failed
//! extraction is stored with whatever (possibly zero) length the engine
//! returned.

use crate::image_io;
use crate::paths::PartitionPaths;
use crate::split::{self, SplitError};
use lineup_core::{EyePair, IdentEngine, ReturnCode, ReturnStatus, TemplateOutput, TemplateRole};
use std::fs::File;
use std::io::{BufWriter, Write};
use thiserror::Error;

/// Column header of the per-record enroll log.
pub const LOG_HEADER: &str = "id image returnCode templateSizeBytes isLeftEyeAssigned \
isRightEyeAssigned xleft yleft xright yright";

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error(transparent)]
    Input(#[from] SplitError),
    #[error("cannot open {0} for writing: {1}")]
    StreamOpen(String, std::io::Error),
    #[error("write to {0} failed: {1}")]
    StreamWrite(String, std::io::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct EnrollStats {
    pub records: usize,
    pub failed_extractions: usize,
}

fn open_writer(path: &std::path::Path) -> Result<BufWriter<File>, EnrollError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| EnrollError::StreamOpen(path.display().to_string(), e))
}

fn write_err(path: &std::path::Path, e: std::io::Error) -> EnrollError {
    EnrollError::StreamWrite(path.display().to_string(), e)
}

/// Run the enroll pass for one partition.
///
/// All four streams (input slice, log, EDB, manifest) are opened up
/// front; failure to open any of them aborts the worker. Per-record
/// engine failures are absorbed. Log writes are best-effort and never
/// block the EDB/manifest writes. The input slice is deleted on
/// successful completion.
pub fn run_enroll_partition(
    engine: &mut dyn IdentEngine,
    paths: &PartitionPaths,
) -> Result<EnrollStats, EnrollError> {
    let records = split::read_record_list(&paths.input)?;

    let mut log = open_writer(&paths.report)?;
    let mut edb = open_writer(&paths.edb)?;
    let mut manifest = open_writer(&paths.manifest)?;

    if let Err(e) = writeln!(log, "{LOG_HEADER}") {
        tracing::warn!(log = %paths.report.display(), error = %e, "log write failed");
    }

    let mut offset: u64 = 0;
    let mut failed = 0usize;

    for rec in &records {
        let out = match image_io::read_image(std::path::Path::new(&rec.image_path)) {
            Ok(face) => engine.create_template(&face, TemplateRole::Enrollment1N),
            // An unreadable image is absorbed like a failed extraction:
            // the record still gets its (empty) template and manifest entry.
            Err(e) => {
                tracing::warn!(subject = %rec.id, error = %e, "image load failed");
                TemplateOutput {
                    status: ReturnStatus::new(ReturnCode::InputLocationError, e.to_string()),
                    template: Vec::new(),
                    eyes: EyePair::default(),
                }
            }
        };
        if !out.status.is_success() {
            failed += 1;
        }

        // Manifest entry first, with the offset as it stands before the
        // append; the template then occupies [offset, offset + len).
        writeln!(manifest, "{} {} {}", rec.id, out.template.len(), offset)
            .map_err(|e| write_err(&paths.manifest, e))?;
        edb.write_all(&out.template)
            .map_err(|e| write_err(&paths.edb, e))?;
        offset += out.template.len() as u64;

        let eyes = &out.eyes;
        if let Err(e) = writeln!(
            log,
            "{} {} {} {} {} {} {} {} {} {}",
            rec.id,
            rec.image_path,
            out.status.code.as_i32(),
            out.template.len(),
            u8::from(eyes.is_left_assigned),
            u8::from(eyes.is_right_assigned),
            eyes.xleft,
            eyes.yleft,
            eyes.xright,
            eyes.yright,
        ) {
            tracing::warn!(log = %paths.report.display(), error = %e, "log write failed");
        }
    }

    manifest.flush().map_err(|e| write_err(&paths.manifest, e))?;
    edb.flush().map_err(|e| write_err(&paths.edb, e))?;
    if let Err(e) = log.flush() {
        tracing::warn!(log = %paths.report.display(), error = %e, "log flush failed");
    }

    // Cleanup contract only; a retried run must not rely on it.
    if let Err(e) = std::fs::remove_file(&paths.input) {
        tracing::warn!(slice = %paths.input.display(), error = %e, "slice cleanup failed");
    }

    tracing::info!(
        partition = paths.index,
        records = records.len(),
        failed_extractions = failed,
        edb_bytes = offset,
        "enroll partition complete"
    );
    Ok(EnrollStats {
        records: records.len(),
        failed_extractions: failed,
    })
}
