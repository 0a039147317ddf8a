use engine::ingest::{read_ratings_path, DEFAULT_DELIMITER};
use engine::similarity::pearson;
use engine::{CancelToken, Cancelled, CfConfig, Model, PredictionList, Rating};
use std::fs;
use tempfile::tempdir;

/// Two taste groups over 30 items, plus a handful of users below the cold threshold.
fn synthetic() -> Vec<Rating> {
    let mut out = Vec::new();
    for u in 1..=40u32 {
        let taste = u % 2;
        for i in 0..30u32 {
            if (u + i) % 4 == 0 {
                continue;
            }
            let base: i32 = if i % 2 == taste { 5 } else { 1 };
            let jitter = ((u * 31 + i * 17) % 3) as i32 - 1;
            out.push(Rating::new(u, i, (base + jitter).clamp(1, 5) as u8));
        }
    }
    for u in 100..105u32 {
        for i in 0..3 {
            out.push(Rating::new(u, i, 4));
        }
    }
    out
}

fn small_config(workers: usize) -> CfConfig {
    CfConfig { workers, ..CfConfig::default() }
}

#[test]
fn every_user_gets_a_list() {
    let model = Model::fit(&synthetic(), &small_config(4)).unwrap();
    let summary = model.summary();
    assert_eq!(summary.users, 45);
    assert_eq!(summary.cold_users, 5);
    assert_eq!(summary.warm_users, 40);
    assert_eq!(summary.items, 30);
    for &u in model.store().profiles.keys() {
        assert!(model.recommendations(u).is_some());
    }
    assert!(model.recommendations(999).is_none());
}

#[test]
fn means_match_raw_profiles() {
    let model = Model::fit(&synthetic(), &small_config(3)).unwrap();
    for (&u, profile) in &model.store().profiles {
        let sum: u32 = profile.values().map(|&s| u32::from(s)).sum();
        let mean = f64::from(sum) / profile.len() as f64;
        assert_eq!(model.mean(u), Some(mean));
        let norm = model.centered().profile(u).unwrap();
        assert_eq!(norm.len(), profile.len());
        for (item, &s) in profile {
            assert_eq!(norm[item], f64::from(s) - mean);
        }
    }
}

#[test]
fn neighbor_lists_are_bounded_and_ranked() {
    let cfg = CfConfig { k_neighbors: 6, ..small_config(4) };
    let model = Model::fit(&synthetic(), &cfg).unwrap();
    let mut saw_neighbors = false;
    for &u in model.store().profiles.keys() {
        let nbs = model.neighbors(u).unwrap();
        assert!(nbs.len() <= cfg.k_neighbors);
        saw_neighbors |= !nbs.is_empty();
        for pair in nbs.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.similarity > b.similarity || (a.similarity == b.similarity && a.overlap >= b.overlap));
        }
        for nb in nbs {
            assert_ne!(nb.user, u);
            assert!(nb.overlap >= cfg.min_overlap);
            assert!(nb.similarity != 0.0 && (-1.0..=1.0).contains(&nb.similarity));
        }
    }
    assert!(saw_neighbors);
}

#[test]
fn similarity_is_symmetric() {
    let model = Model::fit(&synthetic(), &small_config(2)).unwrap();
    let c = model.centered();
    for u in 1..=10u32 {
        for v in 1..=10u32 {
            let (uv, n1) = pearson(c.profile(u).unwrap(), c.profile(v).unwrap(), 5);
            let (vu, n2) = pearson(c.profile(v).unwrap(), c.profile(u).unwrap(), 5);
            assert_eq!(n1, n2);
            assert!((uv - vu).abs() < 1e-9);
        }
    }
}

#[test]
fn warm_predictions_are_valid() {
    let cfg = small_config(4);
    let model = Model::fit(&synthetic(), &cfg).unwrap();
    let mut produced = 0;
    for u in 1..=40u32 {
        let list = model.recommendations(u).unwrap();
        assert!(!list.is_cold_start());
        let items = list.items();
        assert!(items.len() <= cfg.top_n);
        let seen = model.store().get(u).unwrap();
        for p in items {
            assert!((1.0..=5.0).contains(&p.score));
            assert!(!seen.contains_key(&p.item));
        }
        assert!(items.windows(2).all(|w| w[0].score >= w[1].score));
        produced += items.len();
    }
    assert!(produced > 0);
}

#[test]
fn cold_users_get_global_popularity_verbatim() {
    let model = Model::fit(&synthetic(), &small_config(4)).unwrap();
    for u in 100..105u32 {
        let list = model.recommendations(u).unwrap();
        let PredictionList::ColdStart(items) = list else { panic!("user {u} should be cold") };
        assert_eq!(&items[..], model.popularity());
    }
}

#[test]
fn worker_count_does_not_change_results() {
    let records = synthetic();
    let cfg = CfConfig { k_neighbors: 6, ..small_config(1) };
    let one = Model::fit(&records, &cfg).unwrap();
    let many = Model::fit(&records, &CfConfig { workers: 16, ..cfg.clone() }).unwrap();
    for &u in one.store().profiles.keys() {
        assert_eq!(one.neighbors(u), many.neighbors(u));
        assert_eq!(one.recommendations(u).unwrap().items(), many.recommendations(u).unwrap().items());
    }
}

#[test]
fn toy_example_has_no_neighbors() {
    let records = vec![
        Rating::new(1, 1, 5), Rating::new(1, 2, 4),
        Rating::new(2, 1, 4), Rating::new(2, 2, 5),
        Rating::new(3, 1, 1), Rating::new(3, 2, 2),
    ];
    let model = Model::fit(&records, &CfConfig::default()).unwrap();
    for u in 1..=3 {
        assert!(model.neighbors(u).unwrap().is_empty());
        assert!(model.recommendations(u).unwrap().is_cold_start());
    }
    assert_eq!(model.mean(1), Some(4.5));
    assert_eq!(model.mean(3), Some(1.5));
}

#[test]
fn empty_input_fits_empty_model() {
    let model = Model::fit(&[], &CfConfig::default()).unwrap();
    assert_eq!(model.summary().users, 0);
    assert!(model.popularity().is_empty());
}

#[test]
fn cancelled_fit_names_the_phase() {
    let token = CancelToken::new();
    token.cancel();
    let err = Model::fit_with_cancel(&synthetic(), &CfConfig::default(), token).unwrap_err();
    assert!(err.to_string().contains("rating store phase failed"));
    assert!(err.root_cause().downcast_ref::<Cancelled>().is_some());
}

#[test]
fn invalid_config_is_rejected() {
    let cfg = CfConfig { top_n: 0, ..CfConfig::default() };
    assert!(Model::fit(&synthetic(), &cfg).is_err());
}

#[test]
fn reads_ratings_from_directory() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("part")).unwrap();
    fs::write(dir.path().join("a.dat"), "1::10::5::0\n1::11::oops::0\n").unwrap();
    fs::write(dir.path().join("part/b.dat"), "2::10::3::0\n2::12::4::0\n").unwrap();
    fs::write(dir.path().join("notes.txt"), "3::10::3::0\n").unwrap();

    let (ratings, stats) = read_ratings_path(dir.path(), DEFAULT_DELIMITER).unwrap();
    assert_eq!(ratings.len(), 3);
    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.dropped, 1);
    assert_eq!(ratings[0], Rating::new(1, 10, 5));
}

#[test]
fn missing_input_is_fatal() {
    let dir = tempdir().unwrap();
    let err = read_ratings_path(dir.path().join("nope.dat"), DEFAULT_DELIMITER).unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[cfg(unix)]
#[test]
fn unreadable_subdirectory_is_fatal() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.dat"), "1::10::5::0\n").unwrap();
    let locked = dir.path().join("locked");
    fs::create_dir_all(&locked).unwrap();
    fs::write(locked.join("b.dat"), "2::10::3::0\n").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // privileged users can list it anyway; nothing to check then
    let listable = fs::read_dir(&locked).is_ok();
    let res = read_ratings_path(dir.path(), DEFAULT_DELIMITER);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    if listable {
        return;
    }
    let err = res.unwrap_err();
    assert!(err.to_string().contains("walking"));
}
