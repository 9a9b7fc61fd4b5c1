use super::models::{NewMapping, StatisticEntry};
use super::*;
use tempfile::TempDir;

async fn store(dir: &TempDir) -> MirrorStore {
    MirrorStore::connect(dir.path().join("mirror.db"))
        .await
        .expect("can connect to mirror")
}

fn mapping(museum: &str, object_number: &str, work_types: &[&str]) -> NewMapping {
    NewMapping {
        point_id: crate::model::point_id(museum, object_number),
        museum: museum.to_string(),
        object_number: object_number.to_string(),
        work_types: work_types.iter().map(|s| s.to_string()).collect(),
    }
}

#[tokio::test]
async fn upsert_mapping_is_idempotent() {
    let dir = TempDir::new().expect("can create temp dir");
    let store = store(&dir).await;

    let first = mapping("cma", "1953.424", &["painting"]);
    store.upsert_mapping(&first).await.expect("can upsert");

    let updated = mapping("cma", "1953.424", &["painting", "print"]);
    store.upsert_mapping(&updated).await.expect("can upsert again");

    let rows = store
        .mappings_for_museum("cma")
        .await
        .expect("can load mappings");
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].decode_work_types().expect("valid work types"),
        vec!["painting", "print"]
    );
}

#[tokio::test]
async fn mapping_queries_are_scoped_to_museum() {
    let dir = TempDir::new().expect("can create temp dir");
    let store = store(&dir).await;

    store
        .upsert_mapping(&mapping("cma", "1", &["painting"]))
        .await
        .expect("can upsert");
    store
        .upsert_mapping(&mapping("smk", "KMS1", &["painting"]))
        .await
        .expect("can upsert");

    let ids = store
        .mapping_ids_for_museum("smk")
        .await
        .expect("can load ids");
    assert_eq!(ids, vec![crate::model::point_id("smk", "KMS1")]);
}

#[tokio::test]
async fn delete_mappings_reports_affected_rows() {
    let dir = TempDir::new().expect("can create temp dir");
    let store = store(&dir).await;

    for n in ["1", "2", "3"] {
        store
            .upsert_mapping(&mapping("cma", n, &["print"]))
            .await
            .expect("can upsert");
    }

    let deleted = store
        .delete_mappings(&[
            crate::model::point_id("cma", "1"),
            crate::model::point_id("cma", "3"),
            crate::model::point_id("cma", "missing"),
        ])
        .await
        .expect("can delete");
    assert_eq!(deleted, 2);

    let remaining = store
        .mapping_ids_for_museum("cma")
        .await
        .expect("can load ids");
    assert_eq!(remaining, vec![crate::model::point_id("cma", "2")]);
}

#[tokio::test]
async fn replace_statistics_swaps_complete_sets() {
    let dir = TempDir::new().expect("can create temp dir");
    let store = store(&dir).await;

    store
        .replace_statistics(
            "cma",
            &[
                StatisticEntry {
                    work_type: None,
                    count: 5,
                },
                StatisticEntry {
                    work_type: Some("painting".to_string()),
                    count: 3,
                },
                StatisticEntry {
                    work_type: Some("stale".to_string()),
                    count: 2,
                },
            ],
        )
        .await
        .expect("can write statistics");

    // Second recompute drops the stale facet entirely.
    store
        .replace_statistics(
            "cma",
            &[
                StatisticEntry {
                    work_type: None,
                    count: 4,
                },
                StatisticEntry {
                    work_type: Some("painting".to_string()),
                    count: 4,
                },
            ],
        )
        .await
        .expect("can rewrite statistics");

    let rows = store
        .statistics(Some("cma"))
        .await
        .expect("can read statistics");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].work_type, None);
    assert_eq!(rows[0].count, 4);
    assert_eq!(rows[1].work_type.as_deref(), Some("painting"));
}

#[tokio::test]
async fn schema_enforces_one_total_row_per_museum() {
    let dir = TempDir::new().expect("can create temp dir");
    let store = store(&dir).await;

    store
        .replace_statistics(
            "cma",
            &[StatisticEntry {
                work_type: None,
                count: 7,
            }],
        )
        .await
        .expect("can write statistics");

    // A second NULL-work-type row would slip past UNIQUE (museum,
    // work_type) since SQLite treats NULLs as distinct; the partial index
    // must reject it.
    let duplicate_total = sqlx::query(
        "INSERT INTO artwork_statistics (museum, work_type, count, last_updated)
         VALUES ('cma', NULL, 9, '2026-01-01T00:00:00Z')",
    )
    .execute(store.pool())
    .await;
    assert!(duplicate_total.is_err());

    let rows = store
        .statistics(Some("cma"))
        .await
        .expect("can read statistics");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].count, 7);
}

#[tokio::test]
async fn statistics_do_not_leak_across_museums() {
    let dir = TempDir::new().expect("can create temp dir");
    let store = store(&dir).await;

    store
        .replace_statistics(
            "cma",
            &[StatisticEntry {
                work_type: None,
                count: 7,
            }],
        )
        .await
        .expect("can write cma statistics");
    store
        .replace_statistics(
            "smk",
            &[StatisticEntry {
                work_type: None,
                count: 2,
            }],
        )
        .await
        .expect("can write smk statistics");

    // Rewriting one museum leaves the other untouched.
    store
        .replace_statistics("cma", &[])
        .await
        .expect("can clear cma statistics");

    let all = store.statistics(None).await.expect("can read statistics");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].museum, "smk");
    assert_eq!(all[0].count, 2);
}
