//! Reference scenarios across the whole stack

use qnet_channel::transmission_probability;
use qnet_core::Confidence;
use qnet_scale::{BatchedNetworkBuilder, LinkConfig, NetworkConfig, SwapConfig};
use qnet_test::{bell_pair, ideal_two_link_swap, init_tracing, nv_repeater_chain, two_link_swap};

#[test]
fn test_fifty_km_is_one_tenth() {
    let p = transmission_probability(50.0, 0.2).unwrap();
    assert!((p - 0.1).abs() < 1e-15);
}

#[test]
fn test_two_link_swap_at_095() {
    init_tracing();
    let report = ideal_two_link_swap(0.95).unwrap().with_shots(10).run().unwrap();
    assert_eq!(report.statistics.success_rate, 1.0);
    for shot in &report.shots {
        assert!(shot.success);
        let f = shot.end_to_end_fidelity.unwrap().value();
        assert!((f - 0.9).abs() < 0.01);
    }
}

#[test]
fn test_two_link_swap_over_fifty_km() {
    init_tracing();
    let report = two_link_swap().unwrap().with_shots(2000).run().unwrap();
    // Both 50 km links must deliver: 0.1 * 0.1
    let rate = report.statistics.success_rate;
    println!("two-link swap success rate {:.4}", rate);
    assert!((rate - 0.01).abs() < 0.01);
    if let Some(f) = report.statistics.mean_fidelity {
        assert!((f - 1.0).abs() < 1e-12);
    }
}

#[test]
fn test_bell_pair_over_distance() {
    init_tracing();
    let near = bell_pair(5.0).unwrap().run().unwrap();
    let far = bell_pair(50.0).unwrap().run().unwrap();
    assert!(near.statistics.success_rate > far.statistics.success_rate);
}

#[test]
fn test_nv_chain_fidelity_includes_measurement_error() {
    init_tracing();
    let report = nv_repeater_chain().unwrap().with_shots(300).run().unwrap();
    // Three links of 0.98 and two measurements of 0.99
    let expected = 0.98f64.powi(3) * 0.99f64.powi(2);
    let mean = report.statistics.mean_fidelity.unwrap();
    assert!((mean - expected).abs() < 1e-12);
    assert!(report.statistics.mean_elapsed.as_nanos() > 0.0);
}

#[test]
fn test_chain_fidelity_scaling_law() {
    init_tracing();
    let config = NetworkConfig::default().with_link(LinkConfig::new(2.0, 0.97)).with_shots(300);
    for nodes in [2usize, 5, 9, 17] {
        let report = BatchedNetworkBuilder::new(config.clone().with_node_count(nodes).with_batch_width(4))
            .unwrap()
            .run()
            .unwrap();
        let expected = 0.97f64.powi(nodes as i32 - 1);
        let mean = report.summary.mean_fidelity.unwrap();
        println!("n={:>3}  F={:.6}  F0^(n-1)={:.6}", nodes, mean, expected);
        assert!((mean - expected).abs() < 1e-9);
    }
}

#[test]
fn test_above_ceiling_everything_is_extrapolated() {
    init_tracing();
    let config = NetworkConfig::large_chain()
        .with_link(LinkConfig::new(1.0, 0.98))
        .with_simulation_ceiling(64)
        .with_calibration_node_counts(vec![2, 8, 16, 32])
        .with_shots(200);
    let builder = BatchedNetworkBuilder::new(config).unwrap();
    let report = builder.run().unwrap();

    assert_eq!(report.confidence, Confidence::Extrapolated);
    assert_eq!(report.summary.confidence, Confidence::Extrapolated);
    assert!(report.shots.is_none());
    assert!(report.estimated_peak_memory_bytes <= builder.config().budget.max_memory_bytes);
    assert!(report.peak_resident_nodes <= 32);
}

#[test]
fn test_continuity_at_calibration_boundary() {
    init_tracing();
    let swap = SwapConfig {
        measurement_fidelity: 0.995,
        ..SwapConfig::default()
    };
    let config = NetworkConfig::default()
        .with_node_count(200)
        .with_link(LinkConfig::new(1.0, 0.99))
        .with_swap(swap)
        .with_simulation_ceiling(24)
        .with_calibration_node_counts(vec![4, 12, 24])
        .with_shots(200);
    let report = BatchedNetworkBuilder::new(config.clone()).unwrap().run().unwrap();
    let continuity = report.continuity.unwrap();
    assert!(continuity.holds, "{:?}", continuity);
    assert_eq!(continuity.node_count, 24);

    // An independent run of the boundary point agrees with the model
    let independent = config.with_node_count(24).with_seed(7).with_shots(400);
    let simulated = BatchedNetworkBuilder::new(independent).unwrap().run().unwrap();
    assert_eq!(simulated.confidence, Confidence::Simulated);
    let model = report.parameters.unwrap().fidelity_at(24);
    let direct = simulated.summary.mean_fidelity.unwrap();
    assert!((model - direct).abs() <= continuity.tolerance);
}

#[test]
fn test_extrapolated_report_serializes_to_json() {
    init_tracing();
    let config = NetworkConfig::large_chain()
        .with_link(LinkConfig::new(1.0, 0.98))
        .with_simulation_ceiling(32)
        .with_calibration_node_counts(vec![2, 8, 16])
        .with_shots(50);
    let report = BatchedNetworkBuilder::new(config).unwrap().run().unwrap();

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains(r#""confidence":"extrapolated""#));
    assert!(json.contains(r#""shots":null"#));

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["node_count"], report.node_count);
    assert_eq!(value["summary"]["confidence"], "extrapolated");

    let back: qnet_scale::NetworkReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.confidence, Confidence::Extrapolated);
    assert_eq!(back.node_count, report.node_count);
    assert_eq!(back.parameters, report.parameters);
}
