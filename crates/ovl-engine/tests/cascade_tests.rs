use ovl_engine::prelude::*;
use ovl_test_utils::{header, Harness};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_origin_update_reaches_pristine_counterparts_only() {
    let h = Harness::new();
    let origin = h.example();
    let (pristine_delta, custom_delta) = (h.example(), h.example());
    let ids = h.seed_headers(origin, &["Accept"]).await;

    let pristine = h.engine.headers.delta_list(pristine_delta, origin).await.unwrap()[0].id;
    let custom = h.engine.headers.delta_list(custom_delta, origin).await.unwrap()[0].id;
    h.engine
        .headers
        .delta_update(custom, KeyValuePatch::value("text/html"))
        .await
        .unwrap();

    let report = h
        .engine
        .headers
        .update(ids[0], KeyValuePatch::value("application/json"))
        .await
        .unwrap();
    assert_eq!(report.updated, vec![pristine]);
    assert_eq!(report.skipped, vec![custom]);

    let rows = h.engine.headers.delta_list(pristine_delta, origin).await.unwrap();
    assert_eq!(rows[0].fields.value, "application/json");
    assert_eq!(rows[0].source, Source::Origin);

    let rows = h.engine.headers.delta_list(custom_delta, origin).await.unwrap();
    assert_eq!(rows[0].fields.value, "text/html");
    assert_eq!(rows[0].source, Source::Mixed);
    assert_eq!(rows[0].origin.as_ref().unwrap().value, "application/json");
}

#[tokio::test]
async fn test_origin_update_without_counterparts_is_lazy() {
    let h = Harness::new();
    let origin = h.example();
    let ids = h.seed_headers(origin, &["a"]).await;

    let report = h
        .engine
        .headers
        .update(ids[0], KeyValuePatch::value("new"))
        .await
        .unwrap();
    assert_eq!(report.total(), 0);

    // A delta read afterwards copies the current origin values
    let rows = h.engine.headers.delta_list(h.example(), origin).await.unwrap();
    assert_eq!(rows[0].fields.value, "new");
}

#[tokio::test]
async fn test_origin_delete_removes_origin_and_mixed_counterparts() {
    let h = Harness::new();
    let origin = h.example();
    let (first, second) = (h.example(), h.example());
    let ids = h.seed_headers(origin, &["a", "b", "c"]).await;

    h.engine.headers.delta_list(first, origin).await.unwrap();
    let rows = h.engine.headers.delta_list(second, origin).await.unwrap();
    h.engine
        .headers
        .delta_update(rows[1].id, KeyValuePatch::value("custom"))
        .await
        .unwrap();
    let standalone = h
        .engine
        .headers
        .delta_create(second, None, None, header("X-Own", "1"))
        .await
        .unwrap();

    let report = h.engine.headers.delete(ids[1]).await.unwrap();
    assert_eq!(report.deleted.len(), 2);
    assert!(report.detached.is_empty());

    assert_eq!(h.header_keys(origin).await, vec!["a", "c"]);
    assert_eq!(h.header_keys(first).await, vec!["a", "c"]);
    assert_eq!(h.header_keys(second).await, vec!["a", "c", "X-Own"]);
    assert!(h.engine.headers.get(standalone).await.is_ok());

    h.engine.headers.verify_example(first).await.unwrap();
    h.engine.headers.verify_example(second).await.unwrap();
}

#[tokio::test]
async fn test_origin_delete_detaches_versioned_counterparts() {
    let h = Harness::new();
    let origin = h.example();
    let version = h.version_of(origin);
    let ids = h.seed_headers(origin, &["a", "b"]).await;

    let rows = h.engine.headers.delta_list(version, origin).await.unwrap();
    let report = h.engine.headers.delete(ids[0]).await.unwrap();
    assert_eq!(report.detached, vec![rows[0].id]);

    let kept = h.engine.headers.get(rows[0].id).await.unwrap();
    assert_eq!(kept.delta_parent_id, None);

    let rows = h.engine.headers.delta_list(version, origin).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].source, Source::Delta);
    assert_eq!(rows[0].origin, None);
}

#[tokio::test]
async fn test_versioned_counterparts_do_not_follow_origin_updates() {
    let h = Harness::new();
    let origin = h.example();
    let version = h.version_of(origin);
    let ids = h.seed_headers(origin, &["a"]).await;

    let row = h.engine.headers.delta_list(version, origin).await.unwrap()[0].id;
    let report = h
        .engine
        .headers
        .update(ids[0], KeyValuePatch::value("changed"))
        .await
        .unwrap();
    assert_eq!(report.skipped, vec![row]);
    assert_eq!(h.engine.headers.get(row).await.unwrap().fields.value, "v-a");
}

#[tokio::test]
async fn test_reset_restores_mixed_row_in_place() {
    let h = Harness::new();
    let origin = h.example();
    let delta = h.example();
    h.seed_headers(origin, &["a", "b"]).await;

    let rows = h.engine.headers.delta_list(delta, origin).await.unwrap();
    h.engine
        .headers
        .delta_move(delta, rows[0].id, rows[1].id, Position::After)
        .await
        .unwrap();
    h.engine
        .headers
        .delta_update(rows[0].id, KeyValuePatch::value("custom"))
        .await
        .unwrap();

    let reset = h.engine.headers.delta_reset(rows[0].id).await.unwrap();
    assert_eq!(reset.id, rows[0].id);
    assert_eq!(reset.fields.value, "v-a");

    let after = h.engine.headers.delta_list(delta, origin).await.unwrap();
    assert_eq!(after[1].id, rows[0].id);
    assert_eq!(after[1].source, Source::Origin);
    assert_eq!(h.header_keys(delta).await, vec!["b", "a"]);
}

#[tokio::test]
async fn test_reset_standalone_row_clears_fields() {
    let h = Harness::new();
    let delta = h.example();
    let id = h
        .engine
        .headers
        .delta_create(delta, None, None, header("X-Own", "1"))
        .await
        .unwrap();

    let reset = h.engine.headers.delta_reset(id).await.unwrap();
    assert_eq!(reset.fields, KeyValueFields::default());
    assert_eq!(h.engine.headers.list(delta).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_reset_linked_versioned_row_copies_ancestor() {
    let h = Harness::new();
    let origin = h.example();
    let version = h.version_of(origin);
    let ids = h.seed_headers(origin, &["a"]).await;

    let row = h.engine.headers.delta_list(version, origin).await.unwrap()[0].id;
    h.engine
        .headers
        .update(ids[0], KeyValuePatch::value("latest"))
        .await
        .unwrap();
    let reset = h.engine.headers.delta_reset(row).await.unwrap();
    assert_eq!(reset.fields.value, "latest");
    assert_eq!(reset.delta_parent_id, Some(ids[0]));
}

#[tokio::test]
async fn test_reset_unknown_row_is_not_found() {
    let h = Harness::new();
    let err = h.engine.headers.delta_reset(ItemId::new()).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::NotFound);
}

#[tokio::test]
async fn test_failed_counterpart_is_reported_without_rollback() {
    let h = Harness::new();
    let origin = h.example();
    let (healthy, broken) = (h.example(), h.example());
    let ids = h.seed_headers(origin, &["a"]).await;

    let ok_row = h.engine.headers.delta_list(healthy, origin).await.unwrap()[0].id;
    let bad_row = h.engine.headers.delta_list(broken, origin).await.unwrap()[0].id;
    h.store.fail_writes_to(bad_row);

    let err = h
        .engine
        .headers
        .update(ids[0], KeyValuePatch::value("new"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::Internal);
    let report = match err {
        OverlayError::CascadeIncomplete(report) => report,
        other => panic!("expected an incomplete cascade, got {other}"),
    };
    assert_eq!(report.updated, vec![ok_row]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, bad_row);

    // Neither the origin row nor the healthy counterpart was rolled back
    assert_eq!(h.engine.headers.get(ids[0]).await.unwrap().fields.value, "new");
    assert_eq!(h.engine.headers.get(ok_row).await.unwrap().fields.value, "new");
    assert_eq!(h.engine.headers.get(bad_row).await.unwrap().fields.value, "v-a");

    h.store.clear_failures();
}

#[tokio::test]
async fn test_cascade_respects_small_concurrency_limit() {
    let h = Harness::with_config(&EngineConfig::new().with_cascade_concurrency(1));
    let origin = h.example();
    let ids = h.seed_headers(origin, &["a"]).await;
    let deltas: Vec<_> = (0..5).map(|_| h.example()).collect();
    for delta in &deltas {
        h.engine.headers.delta_list(*delta, origin).await.unwrap();
    }

    let report = h.engine.headers.delete(ids[0]).await.unwrap();
    assert_eq!(report.deleted.len(), 5);
    for delta in &deltas {
        assert!(h.header_keys(*delta).await.is_empty());
    }
}

#[tokio::test]
async fn test_delete_unknown_row_is_not_found() {
    let h = Harness::new();
    let err = h.engine.headers.delete(ItemId::new()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_counterpart_missed_by_failed_cascade_catches_up() {
    let h = Harness::new();
    let origin = h.example();
    let delta = h.example();
    let ids = h.seed_headers(origin, &["a"]).await;

    let row = h.engine.headers.delta_list(delta, origin).await.unwrap()[0].id;
    h.store.fail_writes_to(row);
    let err = h
        .engine
        .headers
        .update(ids[0], KeyValuePatch::value("v2"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::Internal);
    h.store.clear_failures();

    // The missed row is stale but was never customized
    let rows = h.engine.headers.delta_list(delta, origin).await.unwrap();
    assert_eq!(rows[0].source, Source::Origin);
    assert_eq!(rows[0].fields.value, "v-a");

    let report = h
        .engine
        .headers
        .update(ids[0], KeyValuePatch::value("v3"))
        .await
        .unwrap();
    assert_eq!(report.updated, vec![row]);
    assert!(report.skipped.is_empty());

    let rows = h.engine.headers.delta_list(delta, origin).await.unwrap();
    assert_eq!(rows[0].source, Source::Origin);
    assert_eq!(rows[0].fields.value, "v3");
}

#[tokio::test]
async fn test_customization_equal_to_origin_value_is_kept() {
    let h = Harness::new();
    let origin = h.example();
    let delta = h.example();
    let ids = h.seed_headers(origin, &["a"]).await;

    let row = h.engine.headers.delta_list(delta, origin).await.unwrap()[0].id;
    let pinned = h
        .engine
        .headers
        .delta_update(row, KeyValuePatch::value("v-a"))
        .await
        .unwrap();
    assert!(pinned.overridden);
    let rows = h.engine.headers.delta_list(delta, origin).await.unwrap();
    assert_eq!(rows[0].source, Source::Mixed);

    let report = h
        .engine
        .headers
        .update(ids[0], KeyValuePatch::value("changed"))
        .await
        .unwrap();
    assert_eq!(report.skipped, vec![row]);
    assert_eq!(h.engine.headers.get(row).await.unwrap().fields.value, "v-a");
}

#[tokio::test]
async fn test_reset_lets_origin_updates_flow_again() {
    let h = Harness::new();
    let origin = h.example();
    let delta = h.example();
    let ids = h.seed_headers(origin, &["a"]).await;

    let row = h.engine.headers.delta_list(delta, origin).await.unwrap()[0].id;
    h.engine
        .headers
        .delta_update(row, KeyValuePatch::value("v-a"))
        .await
        .unwrap();
    let reset = h.engine.headers.delta_reset(row).await.unwrap();
    assert!(!reset.overridden);

    let report = h
        .engine
        .headers
        .update(ids[0], KeyValuePatch::value("next"))
        .await
        .unwrap();
    assert_eq!(report.updated, vec![row]);
    assert_eq!(h.engine.headers.get(row).await.unwrap().fields.value, "next");
}

#[tokio::test]
async fn test_reset_standalone_row_stays_patchable() {
    let h = Harness::new();
    let delta = h.example();
    let id = h
        .engine
        .headers
        .delta_create(delta, None, None, header("X-Own", "1"))
        .await
        .unwrap();
    h.engine.headers.delta_reset(id).await.unwrap();

    let patched = h
        .engine
        .headers
        .delta_update(id, KeyValuePatch::value("2"))
        .await
        .unwrap();
    assert_eq!(patched.fields.value, "2");
    assert!(patched.fields.key.is_empty());

    let renamed = h
        .engine
        .headers
        .delta_update(
            id,
            KeyValuePatch {
                key: Some("X-New".into()),
                ..KeyValuePatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.fields.key, "X-New");

    let err = h
        .engine
        .headers
        .delta_update(
            id,
            KeyValuePatch {
                key: Some(String::new()),
                ..KeyValuePatch::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::InvalidArgument);
}
