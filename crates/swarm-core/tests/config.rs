//! Configuration loading tests
//!
//! TOML files on disk through to a finished run and its exported report.

use std::fs;

use swarm_core::config::SeedSetting;
use swarm_core::{BehaviorClass, ConfigError, PaymentSystem, SimConfig, Simulation};
use swarm_events::RunReport;

const SAMPLE: &str = r#"
combine_strategy = "running_reputation_weighted"

[simulation]
ticks = 120
seed = 99
sampling_interval = 40

[arena]
width = 240.0
height = 240.0
food = { x = 180.0, y = 180.0, radius = 25.0 }
nest = { x = 60.0, y = 60.0, radius = 25.0 }

[agent]
speed = 2.5
communication_radius = 25.0

[agent.noise]
model = "uniform"
step_sd = 3.0

[[behaviors]]
class_name = "CarefulBehavior"
population_size = 6

[behaviors.parameters]
batch_size = 2

[[behaviors]]
class_name = "SaboteurReputationRankingBehavior"
population_size = 2

[payment]
system = "outlier_penalisation"
reputation_metric = "sign_only"
information_share = 0.4
"#;

#[test]
fn test_load_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("swarm.toml");
    fs::write(&path, SAMPLE).unwrap();

    let config = SimConfig::from_file(&path).unwrap();
    assert_eq!(config.simulation.seed, SeedSetting::Fixed(99));
    assert_eq!(config.arena.width, 240.0);
    assert_eq!(config.agent.speed, 2.5);
    assert_eq!(config.agent.radius, 2.0);
    assert_eq!(config.behaviors[0].class_name, BehaviorClass::CarefulBehavior);
    assert_eq!(config.behaviors[0].parameters.batch_size, 2);
    assert_eq!(config.payment.system, PaymentSystem::OutlierPenalisation);
    assert_eq!(config.population(), 8);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = SimConfig::from_file(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_bad_fraction_rejected_at_load() {
    let result = SimConfig::from_str(
        r#"
        [payment]
        information_share = 1.5
        "#,
    );
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_config_to_report_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimConfig::from_str(SAMPLE).unwrap();
    let mut sim = Simulation::new(config).unwrap();
    let report = sim.run().unwrap();

    let path = dir.path().join("out").join("report.json");
    report.write_to(&path).unwrap();
    let loaded = RunReport::read_from(&path).unwrap();

    assert_eq!(loaded.seed, 99);
    assert_eq!(loaded.ticks, 120);
    assert_eq!(loaded.agents.len(), 8);
    assert_eq!(loaded.evolution.len(), 3);
    assert_eq!(loaded.to_json().unwrap(), report.to_json().unwrap());
}

#[test]
fn test_written_defaults_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("defaults.toml");
    fs::write(&path, SimConfig::default().to_toml().unwrap()).unwrap();

    assert_eq!(SimConfig::from_file(&path).unwrap(), SimConfig::default());
}

#[test]
fn test_sample_config_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/swarm.toml");
    let config = SimConfig::from_file(&path).unwrap();
    assert_eq!(config.population(), 25);
    assert_eq!(config.behaviors[1].parameters.rotation_angle, 90.0);
}
