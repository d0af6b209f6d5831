mod util;

use mesh_localops::adapt::Engine;
use mesh_localops::adapt::config::RemeshConfig;
use mesh_localops::mesh_error::MeshOpsError;
use mesh_localops::partitioning::PartitionConfig;
use mesh_localops::topology::validation::NonManifoldHandling;

#[test]
fn full_document_round_trips() {
    let cfg = RemeshConfig {
        target_edge_length: 0.05,
        stop_energy: 8.0,
        num_threads: 4,
        non_manifold: NonManifoldHandling::Error,
        ..RemeshConfig::default()
    };
    let json = serde_json::to_string_pretty(&cfg).unwrap();
    assert!(json.contains("\"non_manifold\": \"Error\""));
    let back: RemeshConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn missing_fields_take_defaults() {
    let cfg: RemeshConfig =
        serde_json::from_str(r#"{ "num_threads": 2, "preserve_topology": false }"#).unwrap();
    assert_eq!(cfg.num_threads, 2);
    assert!(!cfg.preserve_topology);
    assert_eq!(cfg.split_ratio, RemeshConfig::default().split_ratio);
    assert_eq!(cfg.non_manifold, NonManifoldHandling::Warn);

    let part: PartitionConfig = serde_json::from_str(r#"{ "n_parts": 8 }"#).unwrap();
    assert_eq!(part.n_parts, 8);
    assert_eq!(part.quantization, PartitionConfig::default().quantization);
}

#[test]
fn engine_setup_validates_the_document() {
    let cfg: RemeshConfig =
        serde_json::from_str(r#"{ "split_ratio": 0.5, "collapse_ratio": 0.9 }"#).unwrap();
    let err = Engine::new(util::single_tet(), cfg).unwrap_err();
    assert!(matches!(err, MeshOpsError::InvalidConfig(_)));
    assert!(err.to_string().contains("collapse_ratio"));

    let bad_partition = PartitionConfig {
        n_parts: 1,
        quantization: 40,
    };
    let engine = Engine::new(util::single_tet(), RemeshConfig::default()).unwrap();
    assert!(engine.with_partition(bad_partition).is_err());
}
