//! Artifact store round trips with a real searched model.

mod common;

use shelterlab_core::{build_lagged, split_at, BoostedTrees, BoostedTreesTrainer, Classifier, Trainer};
use shelterlab_runner::{
    artifact_file_name, run_search, save_calibration, ArtifactStore, ModelArtifact,
    SelectionMetric, SubgroupCalibrator, TrialData,
};

use common::{prepared, small_search};

#[test]
fn saved_models_predict_like_the_originals() {
    let dir = tempfile::tempdir().unwrap();
    let (panel, cfg) = prepared(small_search(4, 2, 5));
    let data = TrialData::new(&panel.table, &panel.schema, None);
    let trainer = BoostedTreesTrainer::default();
    let outcome = run_search(&cfg.search, &data, &trainer, None).unwrap();

    let store = ArtifactStore::new(dir.path().join("models"));
    let paths = store
        .save_outcome(&outcome, trainer.name(), data.cutoff)
        .unwrap();
    assert!(!paths.is_empty() && paths.len() <= 3);
    assert!(paths.len() == store.list().unwrap().len());

    for metric in SelectionMetric::ALL {
        let original = outcome.best_result(metric).unwrap();
        let loaded: ModelArtifact<BoostedTrees> = store.load_by_metric(metric).unwrap();
        assert_eq!(loaded.params.key(), original.params.key());
        assert_eq!(loaded.feature_names, original.feature_names);
        assert_eq!(loaded.trainer, "boosted_trees");
        assert_eq!(
            paths.iter().filter(|p| p.ends_with(artifact_file_name(metric, &loaded.params))).count(),
            1
        );

        let frame = build_lagged(&panel.table, &panel.schema, loaded.params.lags).unwrap();
        let eval = split_at(&frame, loaded.cutoff).eval;
        let x_loaded = loaded.normalizer.transform(&eval.features).unwrap();
        let x_original = original.normalizer.transform(&eval.features).unwrap();
        let p_loaded = loaded.model.predict_proba(&x_loaded).unwrap();
        let p_original = original.model.predict_proba(&x_original).unwrap();
        for (a, b) in p_loaded.iter().zip(&p_original) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}

#[test]
fn calibration_bundle_from_a_stored_model() {
    let dir = tempfile::tempdir().unwrap();
    let (panel, cfg) = prepared(small_search(3, 3, 9));
    let data = TrialData::new(&panel.table, &panel.schema, None);
    let trainer = BoostedTreesTrainer::default();
    let outcome = run_search(&cfg.search, &data, &trainer, None).unwrap();
    let store = ArtifactStore::new(dir.path());
    store
        .save_outcome(&outcome, trainer.name(), data.cutoff)
        .unwrap();

    let artifact: ModelArtifact<BoostedTrees> =
        store.load_by_metric(SelectionMetric::F2).unwrap();
    let frame = build_lagged(&panel.table, &panel.schema, artifact.params.lags).unwrap();
    let eval = split_at(&frame, artifact.cutoff).eval;
    let cal = SubgroupCalibrator::default()
        .calibrate_frame(
            &artifact.model,
            &artifact.normalizer,
            &eval,
            &panel.dimension_columns,
        )
        .unwrap();

    let out = dir.path().join("calibration");
    let written = save_calibration(&cal, &out).unwrap();
    assert!(written.iter().all(|p| p.exists()));
    let report = std::fs::read_to_string(out.join("subgroup_report.csv")).unwrap();
    assert_eq!(report.lines().count(), 3);
}
