//! Workload splitting.
//!
//! Partitions the ordered input list into N contiguous, disjoint slices
//! whose concatenation reproduces the original list exactly. Slice
//! files are the work-assignment mechanism: worker i reads `input.i`
//! and nothing else.

use crate::paths;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("cannot read input list {0}: {1}")]
    ReadInput(String, std::io::Error),
    #[error("cannot write partition slice {0}: {1}")]
    WriteSlice(String, std::io::Error),
    #[error("worker count must be at least 1")]
    NoWorkers,
}

/// One unit of work: a subject id and the image to extract from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRecord {
    pub id: String,
    pub image_path: String,
}

/// Read a whitespace-tokenized `subjectId imagePath` list.
///
/// Tokens pair up in order; a dangling final token is discarded with a
/// warning, matching the tolerant stream parsing of earlier drivers.
pub fn read_record_list(path: &Path) -> Result<Vec<SubjectRecord>, SplitError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| SplitError::ReadInput(path.display().to_string(), e))?;

    let mut records = Vec::new();
    let mut tokens = raw.split_whitespace();
    while let Some(id) = tokens.next() {
        match tokens.next() {
            Some(image_path) => records.push(SubjectRecord {
                id: id.to_string(),
                image_path: image_path.to_string(),
            }),
            None => {
                tracing::warn!(
                    input = %path.display(),
                    token = id,
                    "dangling subject id without an image path; discarded"
                );
            }
        }
    }
    Ok(records)
}

/// Contiguous slice lengths for `len` records over `n` workers: the
/// first `len % n` slices carry one extra record. Some slices are empty
/// when there are fewer records than workers.
fn slice_lengths(len: usize, n: usize) -> Vec<usize> {
    let base = len / n;
    let extra = len % n;
    (0..n).map(|i| base + usize::from(i < extra)).collect()
}

/// Split `records` into `n` contiguous slices and write one `input.<i>`
/// file per slice under `output_dir`. Returns the slice paths in
/// partition order. Identical (records, n) input always produces
/// byte-identical slice files.
pub fn write_partitions(
    records: &[SubjectRecord],
    n: usize,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, SplitError> {
    if n == 0 {
        return Err(SplitError::NoWorkers);
    }

    let mut slices = Vec::with_capacity(n);
    let mut cursor = 0usize;
    for (i, len) in slice_lengths(records.len(), n).into_iter().enumerate() {
        let slice = &records[cursor..cursor + len];
        cursor += len;

        let path = paths::partition_input(output_dir, i);
        let mut body = String::new();
        for rec in slice {
            body.push_str(&rec.id);
            body.push(' ');
            body.push_str(&rec.image_path);
            body.push('\n');
        }
        let mut file = std::fs::File::create(&path)
            .map_err(|e| SplitError::WriteSlice(path.display().to_string(), e))?;
        file.write_all(body.as_bytes())
            .map_err(|e| SplitError::WriteSlice(path.display().to_string(), e))?;

        tracing::debug!(partition = i, records = len, slice = %path.display(), "wrote slice");
        slices.push(path);
    }
    Ok(slices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<SubjectRecord> {
        (0..n)
            .map(|i| SubjectRecord {
                id: format!("s{i}"),
                image_path: format!("img{i}.png"),
            })
            .collect()
    }

    #[test]
    fn test_slice_lengths_cover_all_records() {
        for len in 0..40 {
            for n in 1..8 {
                let lens = slice_lengths(len, n);
                assert_eq!(lens.len(), n);
                assert_eq!(lens.iter().sum::<usize>(), len);
                // Contiguous chunks differ by at most one record.
                let max = lens.iter().max().unwrap();
                let min = lens.iter().min().unwrap();
                assert!(max - min <= 1);
            }
        }
    }

    #[test]
    fn test_partitions_concatenate_to_original() {
        let dir = tempfile::tempdir().unwrap();
        let input = records(7);
        let slices = write_partitions(&input, 3, dir.path()).unwrap();
        assert_eq!(slices.len(), 3);

        let mut rejoined = Vec::new();
        for slice in &slices {
            rejoined.extend(read_record_list(slice).unwrap());
        }
        assert_eq!(rejoined, input);
    }

    #[test]
    fn test_example_split_three_over_two() {
        let dir = tempfile::tempdir().unwrap();
        let input = vec![
            SubjectRecord { id: "A1".into(), image_path: "img1.png".into() },
            SubjectRecord { id: "A2".into(), image_path: "img2.png".into() },
            SubjectRecord { id: "A3".into(), image_path: "img3.png".into() },
        ];
        let slices = write_partitions(&input, 2, dir.path()).unwrap();
        let first = read_record_list(&slices[0]).unwrap();
        let second = read_record_list(&slices[1]).unwrap();
        assert_eq!(first, input[..2]);
        assert_eq!(second, input[2..]);
    }

    #[test]
    fn test_fewer_records_than_workers_yields_empty_slices() {
        let dir = tempfile::tempdir().unwrap();
        let slices = write_partitions(&records(2), 4, dir.path()).unwrap();
        assert_eq!(slices.len(), 4);
        assert!(read_record_list(&slices[2]).unwrap().is_empty());
        assert!(read_record_list(&slices[3]).unwrap().is_empty());
    }

    #[test]
    fn test_split_is_deterministic() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let input = records(11);
        let first = write_partitions(&input, 4, a.path()).unwrap();
        let second = write_partitions(&input, 4, b.path()).unwrap();
        for (x, y) in first.iter().zip(&second) {
            assert_eq!(std::fs::read(x).unwrap(), std::fs::read(y).unwrap());
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            write_partitions(&records(3), 0, dir.path()),
            Err(SplitError::NoWorkers)
        ));
    }

    #[test]
    fn test_dangling_token_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("list");
        std::fs::write(&list, "s1 img1.png s2\n").unwrap();
        let recs = read_record_list(&list).unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].id, "s1");
    }
}
