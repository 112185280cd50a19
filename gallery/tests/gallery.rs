//! End-to-end behavior of the recognizer over real file stores.

use facetrack_gallery::{
    Backend, Config, Embedding, Gallery, GalleryStore, JsonFileStore, MemoryStore, Recognizer,
};

fn unit(dim: usize, hot: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[hot] = 1.0;
    v
}

fn pseudo_random(seed: u64, dim: usize) -> Vec<f32> {
    let mut state = seed.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
    let mut v: Vec<f32> = (0..dim)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 33) as f32) / (u32::MAX as f32) - 0.25
        })
        .collect();
    facetrack_gallery::l2_normalize(&mut v);
    v
}

fn memory_recognizer(backend: Backend) -> Recognizer {
    let cfg = Config::default().with_backend(backend);
    Recognizer::new(&cfg, Box::new(MemoryStore::new()))
}

#[test]
fn file_round_trip_within_tolerance() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("gallery.json"));

    let mut g = Gallery::new();
    for i in 0..3 {
        g.push("alice", Embedding::new(pseudo_random(i, 128)));
    }
    g.push("bob", Embedding::new(pseudo_random(10, 512)));
    g.push("čestmír", Embedding::new(pseudo_random(11, 100)));
    store.save(&g).unwrap();

    let loaded = store.load();
    assert_eq!(loaded.len(), g.len());
    for (name, embs) in g.iter() {
        let got = loaded.get(name).expect("identity survives round trip");
        assert_eq!(got.len(), embs.len());
        for (a, b) in embs.iter().zip(got) {
            assert_eq!(a.dim(), b.dim());
            for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
                assert!((x - y).abs() <= 1e-6);
            }
        }
    }
}

#[test]
fn recognizer_reopens_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config::default()
        .with_gallery_path(dir.path().join("gallery.json"));

    let mut rec = Recognizer::new(&cfg, Box::new(JsonFileStore::new(&cfg.gallery_path)));
    let emb = rec.prepare(pseudo_random(1, 128));
    rec.enroll("tester", emb, None, false);
    drop(rec);

    let rec = Recognizer::new(&cfg, Box::new(JsonFileStore::new(&cfg.gallery_path)));
    assert!(rec.gallery().contains("tester"));
    assert!(!rec.projector().is_trained());
}

#[test]
fn open_writes_thumbnails() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = Config::default().with_gallery_path(dir.path().join("gallery.json"));
    cfg.thumbnail_dir = dir.path().join("thumbs");

    let mut rec = Recognizer::open(&cfg);
    let face = image::RgbImage::from_pixel(24, 24, image::Rgb([10, 20, 30]));
    rec.enroll("ivy", Some(unit(128, 0)), Some(&face), false);
    // Names that would escape the directory are skipped, enrollment is not.
    rec.enroll("../evil", Some(unit(128, 1)), Some(&face), false);

    assert!(dir.path().join("thumbs").join("ivy.jpg").exists());
    assert!(rec.gallery().contains("../evil"));
}

#[test]
fn unknown_on_empty_and_missing() {
    for backend in [Backend::DeepLearning, Backend::Classical] {
        let rec = memory_recognizer(backend);
        let m = rec.identify(Some(&unit(100, 0)));
        assert_eq!((m.label(), m.score), ("unknown", 0.0));

        let m = rec.identify(None);
        assert_eq!((m.label(), m.score), ("unknown", 0.0));
    }
}

#[test]
fn bob_and_carl_scenario() {
    for backend in [Backend::DeepLearning, Backend::Classical] {
        let mut rec = memory_recognizer(backend);
        rec.enroll("bob", Some(unit(100, 0)), None, false);

        let m = rec.identify(Some(&unit(100, 0)));
        assert_eq!(m.label(), "bob");
        assert!((m.score - 1.0).abs() < 1e-6);

        let mut carl = unit(100, 1);
        carl[0] = 0.05;
        let carl = rec.prepare(carl);
        rec.enroll("carl", carl, None, false);

        let m = rec.identify(Some(&unit(100, 0)));
        assert_eq!(m.label(), "bob", "{backend}: bob should still win");
        assert!((m.score - 1.0).abs() < 1e-6);
    }
}

#[test]
fn threshold_monotonicity() {
    let mut rec = memory_recognizer(Backend::Classical);
    rec.enroll("xena", Some(unit(100, 0)), None, false);
    let query = unit(100, 0);
    assert_eq!(rec.identify(Some(&query)).label(), "xena");

    // A dissimilar enrollment drags xena's mean to 0.5, below 0.58.
    rec.enroll("xena", Some(unit(100, 1)), None, false);
    let m = rec.identify(Some(&query));
    assert_eq!(m.label(), "unknown");
    assert!((m.score - 0.5).abs() < 1e-6);
}

#[test]
fn enrollment_creates_identity_once() {
    let mut rec = memory_recognizer(Backend::DeepLearning);
    rec.enroll("alice", Some(unit(100, 0)), None, false);
    assert_eq!(rec.gallery().len(), 1);
    assert_eq!(rec.gallery().count("alice"), 1);

    rec.enroll("alice", Some(unit(100, 1)), None, false);
    assert_eq!(rec.gallery().len(), 1);
    assert_eq!(rec.gallery().count("alice"), 2);
}

#[test]
fn prune_invariant() {
    let mut rec = memory_recognizer(Backend::DeepLearning);
    for i in 0..12 {
        rec.enroll("big", Some(pseudo_random(i, 128)), None, false);
    }
    for i in 0..4 {
        rec.enroll("mid", Some(pseudo_random(100 + i, 128)), None, false);
    }
    rec.enroll("solo", Some(pseudo_random(200, 128)), None, false);
    let before = rec.gallery().clone();

    let k = 4;
    assert_eq!(rec.prune(k), 1);
    for (name, embs) in rec.gallery().iter() {
        let prior = before.get(name).unwrap();
        assert!(embs.len() <= k.max(prior.len()));
        if prior.len() <= k {
            assert_eq!(embs, prior, "{name} should be untouched");
        } else {
            assert_eq!(embs.len(), k);
            assert!(embs.iter().all(|e| prior.contains(e)));
        }
    }
}

#[test]
fn retrain_abort_below_three() {
    let mut rec = memory_recognizer(Backend::DeepLearning);
    assert!(!rec.retrain());
    rec.enroll("a", Some(unit(128, 0)), None, true);
    rec.enroll("b", Some(unit(128, 1)), None, true);
    assert!(!rec.projector().is_trained());

    rec.enroll("c", Some(unit(128, 2)), None, true);
    assert!(rec.projector().is_trained());
}

#[test]
fn corrupt_file_starts_empty_and_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gallery.json");
    std::fs::write(&path, "{\"alice\": [[1, 2").unwrap();

    let cfg = Config::default().with_gallery_path(&path);
    let mut rec = Recognizer::new(&cfg, Box::new(JsonFileStore::new(&path)));
    assert!(rec.gallery().is_empty());

    rec.enroll("alice", Some(unit(128, 0)), None, false);
    let reread = JsonFileStore::new(&path).read().unwrap();
    assert_eq!(reread.count("alice"), 1);
}
