//! Threshold calibration: the separable scenario, β-monotonicity, and
//! calibration of a searched model on its evaluation rows.

mod common;

use proptest::prelude::*;
use shelterlab_core::metrics::{apply_threshold, Confusion};
use shelterlab_core::{build_lagged, split_at, BoostedTreesTrainer, Classifier};
use shelterlab_runner::{run_search, SelectionMetric, SubgroupCalibrator, TrialData};

use common::{prepared, small_search};

#[test]
fn separable_scores_pick_the_boundary() {
    let members: Vec<String> = vec!["all".into(); 4];
    let cal = SubgroupCalibrator::new(2.0)
        .unwrap()
        .calibrate(&[0.1, 0.4, 0.6, 0.9], &[0, 0, 1, 1], &[("d", members.as_slice())])
        .unwrap();
    let t = cal.thresholds.get("d", "all").unwrap();
    assert!(t > 0.4 && t <= 0.6, "threshold {t}");
    assert_eq!(cal.dimensions[0].decisions, vec![0, 0, 1, 1]);
}

fn recall_at(labels: &[u8], probs: &[f64], beta: f64) -> f64 {
    let t = SubgroupCalibrator::new(beta)
        .unwrap()
        .best_threshold(labels, probs)
        .unwrap();
    Confusion::from_labels(labels, &apply_threshold(probs, t)).recall()
}

proptest! {
    #[test]
    fn f2_threshold_recalls_at_least_as_much_as_f1(
        rows in prop::collection::vec((0.0f64..1.0, 0u8..2), 1..40)
    ) {
        let probs: Vec<f64> = rows.iter().map(|r| r.0).collect();
        let labels: Vec<u8> = rows.iter().map(|r| r.1).collect();
        prop_assume!(labels.contains(&1));
        prop_assert!(recall_at(&labels, &probs, 2.0) >= recall_at(&labels, &probs, 1.0));
    }
}

#[test]
fn calibrates_the_searched_model() {
    let (panel, cfg) = prepared(small_search(4, 2, 3));
    let data = TrialData::new(&panel.table, &panel.schema, None);
    let outcome =
        run_search(&cfg.search, &data, &BoostedTreesTrainer::default(), None).unwrap();
    let best = outcome.best_result(SelectionMetric::Combined).unwrap();

    let frame = build_lagged(&panel.table, &panel.schema, best.params.lags).unwrap();
    let eval = split_at(&frame, data.cutoff).eval;
    let calibrator = SubgroupCalibrator::new(cfg.calibration.beta).unwrap();
    let cal = calibrator
        .calibrate_frame(
            &best.model,
            &best.normalizer,
            &eval,
            &panel.dimension_columns,
        )
        .unwrap();

    let x = best.normalizer.transform(&eval.features).unwrap();
    assert_eq!(cal.default_decisions, best.model.predict(&x).unwrap());

    let gender = cal.dimension("gender").unwrap();
    assert_eq!(gender.decisions.len(), eval.len());
    let names: Vec<&str> = gender.subgroups.iter().map(|s| s.subgroup.as_str()).collect();
    assert_eq!(names, vec!["female", "male"]);
    for report in &gender.subgroups {
        assert!(report.n_positive > 0);
        assert!(report.f2_after >= report.f2_before - 1e-12);
    }
}
