//! Property tests over randomly drawn parameters

use proptest::prelude::*;
use qnet_channel::Channel;
use qnet_core::{Fidelity, FidelityBackend, RngStreams, ShotId};
use qnet_protocol::{ChainLayout, RepeaterChain, ShotProtocol};
use qnet_scheduler::RunBudget;

proptest! {
    #[test]
    fn prop_chain_results_are_well_formed(
        nodes in 2usize..24,
        length_km in 0.1f64..30.0,
        fidelity in 0.5f64..=1.0,
        eta in 0.8f64..=1.0,
        p_bsm in 0.3f64..=1.0,
        width in 2usize..8,
        seed in any::<u64>(),
    ) {
        let channel = Channel::telecom(length_km)
            .unwrap()
            .with_pair_fidelity(Fidelity::new(fidelity).unwrap());
        let chain = RepeaterChain::new(
            ChainLayout::uniform(nodes, channel).unwrap(),
            FidelityBackend::new(eta, p_bsm).unwrap(),
        )
        .with_segment_width(width)
        .unwrap();

        let streams = RngStreams::new(seed);
        for i in 0..8 {
            let shot = ShotId::new(i);
            let result = chain
                .run_shot(shot, &mut streams.stream(shot), RunBudget::unlimited())
                .unwrap();
            prop_assert_eq!(result.hop_count as usize, nodes - 1);
            prop_assert!(!result.truncated);
            prop_assert!(result.measurements as usize <= nodes - 2);
            match result.end_to_end_fidelity {
                Some(f) => {
                    prop_assert!(result.success);
                    prop_assert!((0.0..=1.0).contains(&f.value()));
                    // Never better than the ideal fold
                    prop_assert!(f.value() <= fidelity.powi(nodes as i32 - 1) + 1e-12);
                }
                None => prop_assert!(!result.success),
            }
        }
    }

    #[test]
    fn prop_segmenting_preserves_ideal_outcomes(
        nodes in 3usize..30,
        width in 2usize..10,
        seed in any::<u64>(),
    ) {
        let channel = Channel::telecom(3.0).unwrap();
        let layout = ChainLayout::uniform(nodes, channel).unwrap();
        let whole = RepeaterChain::new(layout.clone(), FidelityBackend::ideal());
        let split = RepeaterChain::new(layout, FidelityBackend::ideal())
            .with_segment_width(width)
            .unwrap();

        let streams = RngStreams::new(seed);
        for i in 0..4 {
            let shot = ShotId::new(i);
            let a = whole.run_shot(shot, &mut streams.stream(shot), RunBudget::unlimited()).unwrap();
            let b = split.run_shot(shot, &mut streams.stream(shot), RunBudget::unlimited()).unwrap();
            prop_assert_eq!(a.success, b.success);
            prop_assert_eq!(a.end_to_end_fidelity, b.end_to_end_fidelity);
            prop_assert_eq!(a.elapsed_time, b.elapsed_time);
        }
    }
}
