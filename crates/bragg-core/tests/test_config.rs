use std::time::Duration;

use bragg_core::breed::BreedMode;
use bragg_core::error::BraggError;
use bragg_core::pipeline::{ReconstructionConfig, SigmaAlgorithm};
use bragg_core::quality::FitnessMetric;

// ---------------------------------------------------------------------------
// Defaults and padding
// ---------------------------------------------------------------------------

#[test]
fn test_default_config_resolves() {
    let resolved = ReconstructionConfig::default().resolve().unwrap();
    assert_eq!(resolved.generations, 1);
    assert_eq!(resolved.samples, 1);
    assert_eq!(resolved.metrics, vec![FitnessMetric::Chi]);
    assert_eq!(resolved.breed_modes, vec![BreedMode::None]);
    assert_eq!(resolved.support_thresholds, vec![0.1]);
    assert_eq!(resolved.support_sigmas, vec![1.0]);
    assert_eq!(resolved.low_resolution_generations(), 0);
    assert_eq!(resolved.grace_period, Duration::from_secs(10));
    assert!(resolved.warnings.is_empty());
}

#[test]
fn test_per_generation_lists_are_padded() {
    let config = ReconstructionConfig {
        generations: 4,
        samples: 6,
        metrics: vec![FitnessMetric::Chi, FitnessMetric::Area],
        breed_modes: vec![BreedMode::SqrtAB],
        culling: vec![2],
        generation_support_thresholds: vec![0.2],
        support_sigma: 0.8,
        ..Default::default()
    };
    let resolved = config.resolve().unwrap();

    assert_eq!(
        resolved.metrics,
        vec![
            FitnessMetric::Chi,
            FitnessMetric::Area,
            FitnessMetric::Area,
            FitnessMetric::Area
        ]
    );
    assert_eq!(
        resolved.breed_modes,
        vec![BreedMode::SqrtAB, BreedMode::None, BreedMode::None, BreedMode::None]
    );
    assert_eq!(resolved.culling, vec![2, 0, 0, 0]);
    assert_eq!(resolved.support_thresholds, vec![0.2, 0.1, 0.1, 0.1]);
    assert_eq!(resolved.support_sigmas, vec![0.8; 4]);

    let params = resolved.breed_params(0);
    assert_eq!(params.mode, BreedMode::SqrtAB);
    assert_eq!(params.cull, 2);
    assert_eq!(params.support_threshold, 0.2);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(config: ReconstructionConfig) -> bool {
    matches!(config.resolve(), Err(BraggError::InvalidConfig(_)))
}

#[test]
fn test_rejects_zero_generations_and_samples() {
    assert!(invalid(ReconstructionConfig {
        generations: 0,
        ..Default::default()
    }));
    assert!(invalid(ReconstructionConfig {
        samples: 0,
        ..Default::default()
    }));
}

#[test]
fn test_rejects_bad_support_parameters() {
    assert!(invalid(ReconstructionConfig {
        support_threshold: 0.0,
        ..Default::default()
    }));
    assert!(invalid(ReconstructionConfig {
        generations: 2,
        generation_support_sigmas: vec![1.0, -0.5],
        ..Default::default()
    }));
}

#[test]
fn test_rejects_culling_whole_population() {
    assert!(invalid(ReconstructionConfig {
        generations: 3,
        samples: 4,
        breed_modes: vec![BreedMode::AvgAB, BreedMode::AvgAB],
        culling: vec![2, 2],
        ..Default::default()
    }));
    // Culling in the last generation never breeds.
    assert!(ReconstructionConfig {
        generations: 2,
        samples: 4,
        breed_modes: vec![BreedMode::AvgAB, BreedMode::AvgAB],
        culling: vec![2, 9],
        ..Default::default()
    }
    .resolve()
    .is_ok());
}

// ---------------------------------------------------------------------------
// Low resolution schedules
// ---------------------------------------------------------------------------

#[test]
fn test_space_linear_schedule() {
    let resolved = ReconstructionConfig {
        generations: 4,
        low_resolution_generations: 3,
        low_resolution_sigma_max: 0.9,
        support_sigma: 0.3,
        ..Default::default()
    }
    .resolve()
    .unwrap();
    assert_eq!(resolved.low_resolution_generations(), 3);
    let sigmas: Vec<f64> = (0..4).filter_map(|g| resolved.low_resolution_sigma(g)).collect();
    assert_eq!(sigmas.len(), 3);
    assert!((sigmas[0] - 0.9).abs() < 1e-12);
    assert!((sigmas[1] - 0.6).abs() < 1e-12);
    assert!((sigmas[2] - 0.3).abs() < 1e-12);
    assert_eq!(resolved.low_resolution_sigma(3), None);
}

#[test]
fn test_assigned_without_list_disables_low_resolution() {
    let resolved = ReconstructionConfig {
        generations: 2,
        low_resolution_generations: 2,
        low_resolution_sigma_alg: SigmaAlgorithm::Assigned,
        ..Default::default()
    }
    .resolve()
    .unwrap();
    assert_eq!(resolved.low_resolution_generations(), 0);
    assert_eq!(resolved.warnings.len(), 1);
}

#[test]
fn test_assigned_list_too_short() {
    assert!(invalid(ReconstructionConfig {
        generations: 3,
        low_resolution_generations: 3,
        low_resolution_sigma_alg: SigmaAlgorithm::Assigned,
        low_resolution_sigmas: Some(vec![0.5, 0.4]),
        ..Default::default()
    }));
}

#[test]
fn test_low_resolution_longer_than_run() {
    assert!(invalid(ReconstructionConfig {
        generations: 1,
        low_resolution_generations: 2,
        ..Default::default()
    }));
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

#[test]
fn test_toml_with_defaults_and_names() {
    let text = r#"
        generations = 3
        samples = 5
        metrics = ["chi", "summed_phase", "bogus"]
        breed_modes = ["sqrt_ab", "Dhalf"]
        low_resolution_sigma_alg = "ScalePower"
        device_ids = [0, 2]
    "#;
    let config: ReconstructionConfig = toml::from_str(text).unwrap();
    assert_eq!(config.samples, 5);
    assert_eq!(
        config.metrics,
        vec![FitnessMetric::Chi, FitnessMetric::SummedPhase, FitnessMetric::Chi]
    );
    assert_eq!(config.breed_modes, vec![BreedMode::SqrtAB, BreedMode::DHalf]);
    assert_eq!(config.low_resolution_sigma_alg, SigmaAlgorithm::ScalePower);
    assert_eq!(config.device_ids, vec![0, 2]);
    assert_eq!(config.support_threshold, 0.1);
}

#[test]
fn test_json_round_trip() {
    let config = ReconstructionConfig {
        generations: 2,
        samples: 3,
        metrics: vec![FitnessMetric::TotalVariation],
        breed_modes: vec![BreedMode::TwoAMinusBPa],
        per_run_bytes: Some(1 << 20),
        ..Default::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"2a-b_pa\""));
    assert!(json.contains("\"tv\""));
    let back: ReconstructionConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_toml_pretty_round_trip() {
    let config = ReconstructionConfig::default();
    let text = toml::to_string_pretty(&config).unwrap();
    let back: ReconstructionConfig = toml::from_str(&text).unwrap();
    assert_eq!(back, config);
}
