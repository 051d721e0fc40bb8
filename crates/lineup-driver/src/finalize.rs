//! Finalization: consolidate per-partition artifacts and freeze the
//! enrollment corpus.
//!
//! Partition workers each leave an `edb.<i>`/`manifest.<i>` pair whose
//! offsets start at zero. Consolidation concatenates the EDBs in
//! partition order, rebases every manifest offset by the running corpus
//! length, and validates that each partition's entries form a gapless,
//! non-overlapping cover of its EDB. Only then is the engine's one-shot
//! finalize call made; after it succeeds the corpus is read-only.

use crate::paths;
use lineup_core::{IdentEngine, ReturnStatus};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinalizeError {
    #[error("consolidated EDB and/or manifest missing under {0}")]
    MissingCorpus(String),
    #[error("partition {index} has {present} without {missing}")]
    UnpairedArtifact {
        index: usize,
        present: &'static str,
        missing: &'static str,
    },
    #[error("cannot read {0}: {1}")]
    Read(String, std::io::Error),
    #[error("cannot write consolidated corpus {0}: {1}")]
    Write(String, std::io::Error),
    #[error("{manifest} line {line}: malformed manifest entry")]
    MalformedManifest { manifest: String, line: usize },
    #[error("{manifest} line {line}: offset {found} breaks the cover (expected {expected})")]
    BrokenCover {
        manifest: String,
        line: usize,
        found: u64,
        expected: u64,
    },
    #[error("{manifest} covers {covered} bytes but {edb} holds {actual}")]
    CoverMismatch {
        manifest: String,
        edb: String,
        covered: u64,
        actual: u64,
    },
    #[error("engine refused finalization: code {code}: {info}")]
    EngineRefused { code: i32, info: String },
}

fn read_err(path: &Path, e: std::io::Error) -> FinalizeError {
    FinalizeError::Read(path.display().to_string(), e)
}

fn write_err(path: &Path, e: std::io::Error) -> FinalizeError {
    FinalizeError::Write(path.display().to_string(), e)
}

/// One validated manifest entry.
struct ManifestEntry {
    id: String,
    length: u64,
    offset: u64,
}

/// Parse one partition manifest and check that its offsets form a
/// contiguous cover starting at zero.
fn read_partition_manifest(path: &Path) -> Result<Vec<ManifestEntry>, FinalizeError> {
    let raw = std::fs::read_to_string(path).map_err(|e| read_err(path, e))?;
    let display = path.display().to_string();

    let mut entries = Vec::new();
    let mut expected = 0u64;
    for (i, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let entry = (|| {
            Some(ManifestEntry {
                id: fields.next()?.to_string(),
                length: fields.next()?.parse().ok()?,
                offset: fields.next()?.parse().ok()?,
            })
        })()
        .ok_or_else(|| FinalizeError::MalformedManifest {
            manifest: display.clone(),
            line: i + 1,
        })?;

        if entry.offset != expected {
            return Err(FinalizeError::BrokenCover {
                manifest: display.clone(),
                line: i + 1,
                found: entry.offset,
                expected,
            });
        }
        expected += entry.length;
        entries.push(entry);
    }
    Ok(entries)
}

/// Merge every `edb.<i>`/`manifest.<i>` pair under `output_dir` into the
/// consolidated `edb`/`manifest`, rebasing offsets by the running corpus
/// length. Partition indices are consumed from zero upward until the
/// first missing pair. A no-op when the consolidated pair already
/// exists, or when there are no partition artifacts at all.
///
/// The consolidated files are staged under temporary names and renamed
/// into place together, so an interrupted merge never leaves a
/// half-written corpus behind.
pub fn consolidate_partitions(output_dir: &Path) -> Result<(), FinalizeError> {
    let edb_path = paths::consolidated_edb(output_dir);
    let manifest_path = paths::consolidated_manifest(output_dir);
    if edb_path.exists() && manifest_path.exists() {
        tracing::info!(output_dir = %output_dir.display(), "consolidated corpus already present");
        return Ok(());
    }

    let mut partitions = Vec::new();
    for index in 0.. {
        let edb = output_dir.join(format!("edb.{index}"));
        let manifest = output_dir.join(format!("manifest.{index}"));
        match (edb.exists(), manifest.exists()) {
            (true, true) => partitions.push((index, edb, manifest)),
            (false, false) => break,
            (true, false) => {
                return Err(FinalizeError::UnpairedArtifact {
                    index,
                    present: "an EDB",
                    missing: "its manifest",
                })
            }
            (false, true) => {
                return Err(FinalizeError::UnpairedArtifact {
                    index,
                    present: "a manifest",
                    missing: "its EDB",
                })
            }
        }
    }
    if partitions.is_empty() {
        return Ok(());
    }

    let edb_tmp = output_dir.join("edb.merge");
    let manifest_tmp = output_dir.join("manifest.merge");
    let mut edb_out = File::create(&edb_tmp).map(BufWriter::new).map_err(|e| write_err(&edb_tmp, e))?;
    let mut manifest_out =
        File::create(&manifest_tmp).map(BufWriter::new).map_err(|e| write_err(&manifest_tmp, e))?;

    let mut base = 0u64;
    let mut subjects = 0usize;
    for (index, edb, manifest) in &partitions {
        let entries = read_partition_manifest(manifest)?;
        let bytes = std::fs::read(edb).map_err(|e| read_err(edb, e))?;

        let covered: u64 = entries.iter().map(|e| e.length).sum();
        if covered != bytes.len() as u64 {
            return Err(FinalizeError::CoverMismatch {
                manifest: manifest.display().to_string(),
                edb: edb.display().to_string(),
                covered,
                actual: bytes.len() as u64,
            });
        }

        for entry in &entries {
            writeln!(
                manifest_out,
                "{} {} {}",
                entry.id,
                entry.length,
                base + entry.offset
            )
            .map_err(|e| write_err(&manifest_tmp, e))?;
        }
        edb_out.write_all(&bytes).map_err(|e| write_err(&edb_tmp, e))?;
        base += bytes.len() as u64;
        subjects += entries.len();

        tracing::debug!(partition = *index, entries = entries.len(), "merged partition");
    }

    edb_out.flush().map_err(|e| write_err(&edb_tmp, e))?;
    manifest_out.flush().map_err(|e| write_err(&manifest_tmp, e))?;
    drop(edb_out);
    drop(manifest_out);

    std::fs::rename(&edb_tmp, &edb_path).map_err(|e| write_err(&edb_path, e))?;
    std::fs::rename(&manifest_tmp, &manifest_path).map_err(|e| write_err(&manifest_path, e))?;

    tracing::info!(
        partitions = partitions.len(),
        subjects,
        corpus_bytes = base,
        "consolidated enrollment corpus"
    );
    Ok(())
}

/// Consolidate, check preconditions, and hand the corpus to the engine.
///
/// A missing consolidated pair after the merge attempt is a fatal
/// configuration error, not retried. A non-success status from the
/// engine aborts the run; there is no partial-finalization state.
pub fn run_finalize(
    engine: &mut dyn IdentEngine,
    output_dir: &Path,
    enroll_dir: &Path,
) -> Result<(), FinalizeError> {
    consolidate_partitions(output_dir)?;

    let edb = paths::consolidated_edb(output_dir);
    let manifest = paths::consolidated_manifest(output_dir);
    if !edb.exists() || !manifest.exists() {
        return Err(FinalizeError::MissingCorpus(output_dir.display().to_string()));
    }

    let status: ReturnStatus = engine.finalize_enrollment(enroll_dir, &edb, &manifest);
    if !status.is_success() {
        return Err(FinalizeError::EngineRefused {
            code: status.code.as_i32(),
            info: status.info,
        });
    }
    tracing::info!(enroll_dir = %enroll_dir.display(), "enrollment corpus frozen");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineup_null::NullEngine;

    fn write_partition(dir: &Path, index: usize, entries: &[(&str, &[u8])]) {
        let mut edb = Vec::new();
        let mut manifest = String::new();
        for (id, bytes) in entries {
            manifest.push_str(&format!("{id} {} {}\n", bytes.len(), edb.len()));
            edb.extend_from_slice(bytes);
        }
        std::fs::write(dir.join(format!("edb.{index}")), edb).unwrap();
        std::fs::write(dir.join(format!("manifest.{index}")), manifest).unwrap();
    }

    #[test]
    fn test_consolidation_rebases_offsets() {
        let dir = tempfile::tempdir().unwrap();
        write_partition(dir.path(), 0, &[("a", b"aaaa"), ("b", b"bb")]);
        write_partition(dir.path(), 1, &[("c", b"ccc")]);

        consolidate_partitions(dir.path()).unwrap();

        let edb = std::fs::read(dir.path().join("edb")).unwrap();
        assert_eq!(edb, b"aaaabbccc");
        let manifest = std::fs::read_to_string(dir.path().join("manifest")).unwrap();
        assert_eq!(manifest, "a 4 0\nb 2 4\nc 3 6\n");
    }

    #[test]
    fn test_consolidated_cover_is_gapless() {
        let dir = tempfile::tempdir().unwrap();
        write_partition(dir.path(), 0, &[("a", b"xxxxx"), ("empty", b"")]);
        write_partition(dir.path(), 1, &[("b", b"yy")]);
        write_partition(dir.path(), 2, &[]);

        consolidate_partitions(dir.path()).unwrap();

        // The merged manifest must itself parse as a contiguous cover.
        let entries = read_partition_manifest(&dir.path().join("manifest")).unwrap();
        assert_eq!(entries.len(), 3);
        let covered: u64 = entries.iter().map(|e| e.length).sum();
        assert_eq!(
            covered,
            std::fs::metadata(dir.path().join("edb")).unwrap().len()
        );
    }

    #[test]
    fn test_existing_corpus_is_not_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("edb"), b"frozen").unwrap();
        std::fs::write(dir.path().join("manifest"), "a 6 0\n").unwrap();
        write_partition(dir.path(), 0, &[("z", b"zz")]);

        consolidate_partitions(dir.path()).unwrap();
        assert_eq!(std::fs::read(dir.path().join("edb")).unwrap(), b"frozen");
    }

    #[test]
    fn test_gap_in_partition_manifest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("edb.0"), b"aaaabb").unwrap();
        // Second entry claims offset 5, leaving byte 4 uncovered.
        std::fs::write(dir.path().join("manifest.0"), "a 4 0\nb 2 5\n").unwrap();

        assert!(matches!(
            consolidate_partitions(dir.path()),
            Err(FinalizeError::BrokenCover { line: 2, .. })
        ));
    }

    #[test]
    fn test_cover_length_must_match_edb_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("edb.0"), b"short").unwrap();
        std::fs::write(dir.path().join("manifest.0"), "a 9 0\n").unwrap();

        assert!(matches!(
            consolidate_partitions(dir.path()),
            Err(FinalizeError::CoverMismatch { .. })
        ));
    }

    #[test]
    fn test_unpaired_partition_artifact_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("edb.0"), b"aa").unwrap();
        assert!(matches!(
            consolidate_partitions(dir.path()),
            Err(FinalizeError::UnpairedArtifact { index: 0, .. })
        ));
    }

    #[test]
    fn test_missing_corpus_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let enroll = tempfile::tempdir().unwrap();
        let mut engine = NullEngine::new();
        assert!(matches!(
            run_finalize(&mut engine, dir.path(), enroll.path()),
            Err(FinalizeError::MissingCorpus(_))
        ));
    }

    #[test]
    fn test_finalize_hands_corpus_to_engine() {
        let dir = tempfile::tempdir().unwrap();
        let enroll = tempfile::tempdir().unwrap();
        write_partition(dir.path(), 0, &[("a", b"data")]);

        let mut engine = NullEngine::new();
        run_finalize(&mut engine, dir.path(), enroll.path()).unwrap();
        assert_eq!(
            std::fs::read(enroll.path().join("null.edb")).unwrap(),
            b"data"
        );
    }

    #[test]
    fn test_engine_refusal_aborts() {
        let dir = tempfile::tempdir().unwrap();
        write_partition(dir.path(), 0, &[("a", b"data")]);

        let mut engine = NullEngine::new();
        // An unwritable enrollment directory makes the null engine refuse.
        let missing = dir.path().join("no/such/enroll");
        assert!(matches!(
            run_finalize(&mut engine, dir.path(), &missing),
            Err(FinalizeError::EngineRefused { .. })
        ));
    }
}
