use mw_cache::{CacheError, SnapshotCache};
use mw_model::{BranchState, Catalog, CommitRef, PartitionedCatalog, ProjectSnapshot};

fn project(name: &str, branches: &[(&str, &str, f64)]) -> ProjectSnapshot {
    let mut p = ProjectSnapshot::new(name);
    for (b, id, ts) in branches {
        p.insert_branch(BranchState::new(*b, CommitRef::new(*id, *ts)));
    }
    p
}

/// Equality by project / branch / commit id / timestamp.
fn assert_same(a: &Catalog, b: &Catalog) {
    assert_eq!(a.len(), b.len());
    for pa in a.projects() {
        let pb = b.project(&pa.original_name).expect("project survives");
        assert_eq!(pa.branches.len(), pb.branches.len());
        for (name, ba) in &pa.branches {
            let bb = pb.branch(name).expect("branch survives");
            assert_eq!(ba.commit.id, bb.commit.id);
            assert_eq!(ba.commit.timestamp, bb.commit.timestamp);
        }
    }
}

fn sample_all() -> Catalog {
    [
        project(
            "deepin/dde-dock",
            &[
                ("master", "5b0c7c2f0e", 1_459_492_987.0),
                ("release/15.4", "a1b2c3d4e5", 1_459_000_000.5),
            ],
        ),
        project("private-tool", &[("develop", "ffff000011", 1_400_000_000.0)]),
    ]
    .into_iter()
    .collect()
}

#[test]
fn partitioned_catalog_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path().join("cache"));

    let all = sample_all();
    let public: Catalog = all
        .projects()
        .filter(|p| p.original_name != "private-tool")
        .cloned()
        .collect();
    let original = PartitionedCatalog::partitioned("Gerrit", all, public);

    let written = cache.write(&original).unwrap();
    assert_eq!(written.len(), 2);
    assert!(dir.path().join("cache/gerrit_all.json").exists());
    assert!(dir.path().join("cache/gerrit_public.json").exists());

    let loaded = cache.read("Gerrit").unwrap();
    assert!(loaded.is_partitioned());
    assert_same(&original.all, &loaded.all);
    assert_same(
        original.public.as_ref().unwrap(),
        loaded.public.as_ref().unwrap(),
    );
}

#[test]
fn single_catalog_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path());
    let original = PartitionedCatalog::single("Github", sample_all());

    cache.write(&original).unwrap();
    let loaded = cache.read("Github").unwrap();

    assert!(!loaded.is_partitioned());
    assert_eq!(loaded.source, "Github");
    assert_same(&original.all, &loaded.all);
}

#[test]
fn document_keys_are_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path());
    let catalog: Catalog = [
        project("zeta", &[("b", "2", 2.0), ("a", "1", 1.0)]),
        project("alpha", &[]),
    ]
    .into_iter()
    .collect();
    cache
        .write(&PartitionedCatalog::single("Gitlab", catalog))
        .unwrap();

    let text = std::fs::read_to_string(dir.path().join("gitlab.json")).unwrap();
    let alpha = text.find("\"alpha\"").unwrap();
    let zeta = text.find("\"zeta\"").unwrap();
    assert!(alpha < zeta);
    let a = text.find("\"a\": {").unwrap();
    let b = text.find("\"b\": {").unwrap();
    assert!(a < b);
}

#[test]
fn write_overwrites_previous_document() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path());

    cache
        .write(&PartitionedCatalog::single("Github", sample_all()))
        .unwrap();
    cache
        .write(&PartitionedCatalog::single("Github", Catalog::new()))
        .unwrap();

    let loaded = cache.read("Github").unwrap();
    assert!(loaded.all.is_empty());
}

#[test]
fn partitioned_cache_missing_public_half_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path());
    cache
        .write(&PartitionedCatalog::partitioned(
            "Gerrit",
            sample_all(),
            Catalog::new(),
        ))
        .unwrap();
    std::fs::remove_file(dir.path().join("gerrit_public.json")).unwrap();

    let err = cache.read("Gerrit").unwrap_err();
    assert!(matches!(err, CacheError::Incomplete { .. }));
}

#[test]
fn layout_change_replaces_the_previous_entry() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path());

    cache
        .write(&PartitionedCatalog::partitioned(
            "Gitlab",
            sample_all(),
            sample_all(),
        ))
        .unwrap();
    cache
        .write(&PartitionedCatalog::single("Gitlab", Catalog::new()))
        .unwrap();

    assert!(!dir.path().join("gitlab_all.json").exists());
    assert!(!dir.path().join("gitlab_public.json").exists());
    let loaded = cache.read("Gitlab").unwrap();
    assert!(!loaded.is_partitioned());
    assert!(loaded.all.is_empty());

    cache
        .write(&PartitionedCatalog::partitioned(
            "Gitlab",
            sample_all(),
            Catalog::new(),
        ))
        .unwrap();
    assert!(!dir.path().join("gitlab.json").exists());
    assert!(cache.read("Gitlab").unwrap().is_partitioned());
}
