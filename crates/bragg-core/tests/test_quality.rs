mod common;

use ndarray::Array3;
use num_complex::Complex64;

use bragg_core::quality::{rank, score, FitnessMetric};
use bragg_core::volume::Candidate;

fn cube(n: usize, side: usize, value: f64) -> Candidate {
    let image = Array3::from_shape_fn((n, n, n), |(i, j, k)| {
        if i < side && j < side && k < side {
            Complex64::new(value, 0.0)
        } else {
            Complex64::new(0.0, 0.0)
        }
    });
    let support = image.mapv(|v| if v.norm() > 0.0 { 1.0 } else { 0.0 });
    Candidate::new(image, support).unwrap()
}

#[test]
fn test_chi_ranks_by_final_error() {
    let pop: Vec<Candidate> = [0.5, 0.7, 0.1]
        .iter()
        .map(|&e| cube(6, 2, 1.0).with_error_trace(vec![1.0, e]))
        .collect();
    assert_eq!(rank(&pop, FitnessMetric::Chi), vec![2, 0, 1]);
}

#[test]
fn test_chi_without_trace_ranks_last() {
    let pop = vec![
        cube(4, 2, 1.0),
        cube(4, 2, 1.0).with_error_trace(vec![0.3]),
    ];
    assert!(score(&pop[0], FitnessMetric::Chi).is_infinite());
    assert_eq!(rank(&pop, FitnessMetric::Chi), vec![1, 0]);
}

#[test]
fn test_area_prefers_larger_support() {
    let pop = vec![cube(8, 2, 1.0), cube(8, 4, 1.0), cube(8, 3, 1.0)];
    assert_eq!(rank(&pop, FitnessMetric::Area), vec![1, 2, 0]);
}

#[test]
fn test_sharpness_ranks_ascending() {
    let pop = vec![cube(6, 2, 2.0), cube(6, 2, 1.0)];
    assert_eq!(score(&pop[1], FitnessMetric::Sharpness), 8.0);
    assert_eq!(rank(&pop, FitnessMetric::Sharpness), vec![1, 0]);
}

#[test]
fn test_total_variation_prefers_smooth() {
    let pop = vec![cube(6, 2, 3.0), cube(6, 2, 1.0)];
    assert_eq!(rank(&pop, FitnessMetric::TotalVariation), vec![1, 0]);
}

#[test]
fn test_metric_names_round_trip() {
    for metric in [
        FitnessMetric::Chi,
        FitnessMetric::Sharpness,
        FitnessMetric::SummedPhase,
        FitnessMetric::Area,
        FitnessMetric::TotalVariation,
    ] {
        assert_eq!(FitnessMetric::parse(metric.name()), Some(metric));
    }
}
