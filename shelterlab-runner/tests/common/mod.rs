//! Shared synthetic panel for runner integration tests.

#![allow(dead_code)]

use shelterlab_core::{PanelTable, SubgroupDimension};
use shelterlab_runner::{
    prepare_panel, CalibrationConfig, PreparedPanel, SchemaConfig, SearchConfig, SearchSpace,
    ShelterConfig,
};

pub const ENTITIES: i64 = 14;
pub const FIRST_YEAR: i32 = 2015;
pub const LAST_YEAR: i32 = 2021;

/// 14 entities over 2015..=2021. The count cycles mod 7 with an entity
/// offset, so every year has both rising and falling entities.
pub fn panel() -> PanelTable {
    let mut entities = Vec::new();
    let mut periods = Vec::new();
    let mut count = Vec::new();
    let mut income = Vec::new();
    let mut male = Vec::new();
    let mut female = Vec::new();
    for e in 0..ENTITIES {
        for year in FIRST_YEAR..=LAST_YEAR {
            entities.push(90_000 + e);
            periods.push(year);
            count.push(((3 * e + 5 * year as i64) % 7) as f64);
            income.push(10.0 * e as f64 + f64::from(year - FIRST_YEAR));
            male.push((e % 3) as f64);
            female.push(1.0);
        }
    }
    PanelTable::new(entities, periods)
        .unwrap()
        .with_numeric("homeless_count", count)
        .unwrap()
        .with_numeric("median_income", income)
        .unwrap()
        .with_numeric("population_male", male)
        .unwrap()
        .with_numeric("population_female", female)
        .unwrap()
}

pub fn small_search(n_calls: usize, n_initial_points: usize, seed: u64) -> SearchConfig {
    SearchConfig {
        n_calls,
        n_initial_points,
        seed,
        acq_candidates: 64,
        bounds: SearchSpace {
            lags: (0, 1),
            max_depth: (1, 3),
            n_estimators: (3, 8),
            learning_rate: (0.1, 0.3),
        },
        ..SearchConfig::default()
    }
}

pub fn config(search: SearchConfig) -> ShelterConfig {
    ShelterConfig {
        schema: SchemaConfig {
            entity_column: "zip_code".into(),
            period_column: "year".into(),
            target: "homeless_count".into(),
            features: vec![],
            exclude: vec![],
            categorical: vec![],
        },
        search,
        calibration: CalibrationConfig {
            beta: 2.0,
            dimensions: vec![SubgroupDimension::new(
                "gender",
                vec!["male".into(), "female".into()],
            )],
        },
    }
}

pub fn prepared(search: SearchConfig) -> (PreparedPanel, ShelterConfig) {
    let cfg = config(search);
    (prepare_panel(panel(), &cfg).unwrap(), cfg)
}
