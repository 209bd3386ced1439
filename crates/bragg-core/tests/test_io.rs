mod common;

use std::fs;

use ndarray::{Array1, Array3};
use num_complex::Complex64;

use bragg_core::error::BraggError;
use bragg_core::io::{
    load_population, read_complex_volume, read_real_volume, read_summary, read_trace,
    write_complex_volume, write_real_volume, write_trace, DirectorySink, FitnessSummary,
    ResultSink, VolumeKind, VolumeReader,
};
use bragg_core::quality::FitnessMetric;
use bragg_core::volume::Candidate;

use common::{complex_blob, random_volume, support_of};

// ---------------------------------------------------------------------------
// Volume files
// ---------------------------------------------------------------------------

#[test]
fn test_real_volume_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("data.vol");
    let data = random_volume((3, 4, 5), 1);
    write_real_volume(&path, &data).unwrap();

    let reader = VolumeReader::open(&path).unwrap();
    assert_eq!(reader.header.kind, VolumeKind::Real);
    assert_eq!(reader.header.rank, 3);
    assert_eq!(reader.header.dims, [3, 4, 5]);
    assert_eq!(read_real_volume(&path).unwrap(), data);
}

#[test]
fn test_complex_volume_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("image.vol");
    let image = complex_blob((4, 6, 2), 1.5);
    write_complex_volume(&path, &image).unwrap();
    assert_eq!(read_complex_volume(&path).unwrap(), image);
}

#[test]
fn test_real_file_promotes_to_complex() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("amp.vol");
    let mut data = Array3::<f64>::zeros((2, 2, 2));
    data[[1, 0, 1]] = 3.5;
    write_real_volume(&path, &data).unwrap();

    let promoted = read_complex_volume(&path).unwrap();
    assert_eq!(promoted[[1, 0, 1]], Complex64::new(3.5, 0.0));
}

#[test]
fn test_lower_rank_is_padded() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("line.vol");
    write_real_volume(&path, &Array1::from(vec![1.0, 2.0, 3.0])).unwrap();

    let reader = VolumeReader::open(&path).unwrap();
    assert_eq!(reader.header.rank, 1);
    assert_eq!(reader.header.dims, [3, 1, 1]);
    assert_eq!(read_real_volume(&path).unwrap().dim(), (3, 1, 1));
}

#[test]
fn test_trace_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("errors.vol");
    write_trace(&path, &[0.5, 0.25, 0.125]).unwrap();
    assert_eq!(read_trace(&path).unwrap(), vec![0.5, 0.25, 0.125]);
}

#[test]
fn test_rejects_bad_magic_and_truncation() {
    let tmp = tempfile::tempdir().unwrap();
    let bad = tmp.path().join("bad.vol");
    fs::write(&bad, b"NOTAVOLUMEFILE-----------------------------------").unwrap();
    assert!(matches!(
        VolumeReader::open(&bad),
        Err(BraggError::InvalidVolumeFile(_))
    ));

    let good = tmp.path().join("good.vol");
    write_real_volume(&good, &random_volume((4, 4, 4), 2)).unwrap();
    let bytes = fs::read(&good).unwrap();
    let short = tmp.path().join("short.vol");
    fs::write(&short, &bytes[..bytes.len() - 8]).unwrap();
    assert!(matches!(
        read_real_volume(&short),
        Err(BraggError::InvalidVolumeFile(_))
    ));
}

// ---------------------------------------------------------------------------
// Checkpoints and continuation
// ---------------------------------------------------------------------------

fn population(n: usize) -> Vec<Candidate> {
    (0..n)
        .map(|k| {
            let image = complex_blob((6, 6, 6), 1.0 + k as f64);
            let support = support_of(&image, 0.2);
            Candidate::new(image, support)
                .unwrap()
                .with_error_trace(vec![1.0, 0.1 * (k + 1) as f64])
        })
        .collect()
}

fn summary(generation: usize, scores: Vec<f64>) -> FitnessSummary {
    FitnessSummary {
        generation,
        metric: FitnessMetric::Chi,
        scores,
    }
}

#[test]
fn test_sink_writes_generation_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(tmp.path());
    let pop = population(3);
    sink.save(0, &pop, &summary(0, vec![0.1, 0.2, 0.3])).unwrap();

    let dir = sink.generation_dir(0);
    for index in 0..3 {
        assert!(dir.join(index.to_string()).join("image.vol").is_file());
        assert!(dir.join(index.to_string()).join("support.vol").is_file());
    }
    let read = read_summary(&dir).unwrap();
    assert_eq!(read.scores, vec![0.1, 0.2, 0.3]);
    assert_eq!(read.metric, FitnessMetric::Chi);

    let loaded = load_population(&dir, 3).unwrap();
    assert_eq!(loaded[2].image, pop[2].image);
    assert_eq!(loaded[2].support, pop[2].support);
    assert_eq!(loaded[2].error_trace, pop[2].error_trace);
    assert!(loaded[2].coherence.is_none());
}

#[test]
fn test_sink_replaces_existing_generation() {
    let tmp = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(tmp.path());
    sink.save(1, &population(3), &summary(1, vec![0.1, 0.2, 0.3]))
        .unwrap();
    sink.save(1, &population(1), &summary(1, vec![0.5])).unwrap();

    let dir = sink.generation_dir(1);
    assert!(dir.join("0").is_dir());
    assert!(!dir.join("1").exists());
    assert_eq!(read_summary(&dir).unwrap().scores, vec![0.5]);
    assert!(!tmp.path().join(".g_1.partial").exists());
}

#[test]
fn test_dataset_sinks_share_generation_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let first = DirectorySink::for_dataset(tmp.path(), "a");
    let second = DirectorySink::for_dataset(tmp.path(), "b");
    first.save(2, &population(2), &summary(2, vec![0.1, 0.2])).unwrap();
    second.save(2, &population(1), &summary(2, vec![0.3])).unwrap();
    first.save(2, &population(1), &summary(2, vec![0.4])).unwrap();

    let generation = tmp.path().join("g_2");
    assert_eq!(first.generation_dir(2), generation.join("a"));
    assert_eq!(read_summary(&generation.join("a")).unwrap().scores, vec![0.4]);
    assert_eq!(read_summary(&generation.join("b")).unwrap().scores, vec![0.3]);
    assert!(!generation.join("a").join("1").exists());
    assert!(!tmp.path().join(".g_2.a.partial").exists());
}

#[test]
fn test_continuation_missing_candidate() {
    let tmp = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(tmp.path());
    sink.save(0, &population(2), &summary(0, vec![0.1, 0.2]))
        .unwrap();

    let err = load_population(&sink.generation_dir(0), 3).unwrap_err();
    assert!(matches!(
        err,
        BraggError::ContinuationDataMissing { candidate: 2, .. }
    ));
}

#[test]
fn test_continuation_requires_support() {
    let tmp = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(tmp.path());
    sink.save(0, &population(1), &summary(0, vec![0.1])).unwrap();
    let dir = sink.generation_dir(0);
    fs::remove_file(dir.join("0").join("support.vol")).unwrap();

    assert!(matches!(
        load_population(&dir, 1),
        Err(BraggError::ContinuationDataMissing { candidate: 0, .. })
    ));
}
