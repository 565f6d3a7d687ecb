//! Toggling and applying display flags end to end.

use display_toggle_console::{ApplyStatus, messages};
use display_toggle_core::{CategoryId, DisplayFlag, ProductId};
use display_toggle_integration_tests::{Collection, FakeVendor, TestContext};

#[tokio::test]
async fn test_toggle_back_sends_nothing() {
    let ctx = TestContext::start(FakeVendor::with_catalog(1, 3)).await;
    let mut session = ctx.session().await;
    session.load_catalog().await.unwrap();

    let id = ProductId::new("1001");
    assert!(session.toggle_product(&id, true).unwrap());
    assert!(!session.toggle_product(&id, false).unwrap());

    let report = session.apply_products().await;
    assert_eq!(report.status(), ApplyStatus::NoChanges);
    assert!(ctx.vendor.patches(Collection::Products).is_empty());
}

#[tokio::test]
async fn test_apply_updates_vendor_and_reconciles() {
    let ctx = TestContext::start(FakeVendor::with_catalog(1, 4)).await;
    let mut session = ctx.session().await;
    session.load_catalog().await.unwrap();

    // 1001 starts hidden, 1002 starts shown.
    session.toggle_product(&ProductId::new("1001"), true).unwrap();
    session.toggle_product(&ProductId::new("1002"), false).unwrap();
    assert_eq!(session.pending_changes().products, 2);

    let report = session.apply_products().await;

    assert_eq!(report.status(), ApplyStatus::Complete);
    assert_eq!(report.succeeded, vec!["1001", "1002"]);
    assert_eq!(
        ctx.vendor.patches(Collection::Products),
        vec![
            ("1001".to_string(), "1".to_string()),
            ("1002".to_string(), "0".to_string()),
        ]
    );
    assert_eq!(ctx.vendor.product_flag("1001").as_deref(), Some("1"));
    assert!(session.pending_changes().is_empty());

    // A fresh load agrees with what the session already shows.
    session.reload_products().await.unwrap();
    assert_eq!(
        session.products().get(&ProductId::new("1002")).unwrap().display_flag,
        DisplayFlag::Hidden
    );
}

#[tokio::test]
async fn test_partial_failure_keeps_rejected_dirty() {
    let vendor = FakeVendor::with_catalog(1, 3);
    vendor.lock("1002");
    let ctx = TestContext::start(vendor).await;
    let mut session = ctx.session().await;
    session.load_catalog().await.unwrap();

    for id in ["1001", "1002", "1003"] {
        session.toggle_product(&ProductId::new(id), true).unwrap();
    }
    // 1002 was already shown, so only two entities are dirty.
    assert_eq!(session.pending_changes().products, 2);
    session.toggle_product(&ProductId::new("1002"), false).unwrap();
    assert_eq!(session.pending_changes().products, 3);

    let report = session.apply_products().await;

    assert_eq!(report.status(), ApplyStatus::Partial);
    assert_eq!(report.succeeded, vec!["1001", "1003"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, "1002");
    assert_eq!(report.failed[0].error, "1002: 1002 is locked");

    assert_eq!(session.products().is_dirty(&ProductId::new("1001")), Some(false));
    assert_eq!(session.products().is_dirty(&ProductId::new("1002")), Some(true));
    assert_eq!(session.products().is_dirty(&ProductId::new("1003")), Some(false));
    assert_eq!(ctx.vendor.product_flag("1002").as_deref(), Some("1"));
}

#[tokio::test]
async fn test_category_apply() {
    let ctx = TestContext::start(FakeVendor::with_catalog(3, 0)).await;
    let mut session = ctx.session().await;
    session.load_catalog().await.unwrap();

    session.toggle_category(&CategoryId::new("3"), true).unwrap();
    let report = session.apply_categories().await;

    assert_eq!(report.status(), ApplyStatus::Complete);
    assert_eq!(ctx.vendor.category_flag("3").as_deref(), Some("1"));
    assert_eq!(
        ctx.vendor.patches(Collection::Categories),
        vec![("3".to_string(), "1".to_string())]
    );
}

#[tokio::test]
async fn test_revoked_token_ends_session() {
    let ctx = TestContext::start(FakeVendor::with_catalog(1, 2)).await;
    let mut session = ctx.session().await;
    session.load_catalog().await.unwrap();
    session.toggle_product(&ProductId::new("1001"), true).unwrap();
    session.toggle_product(&ProductId::new("1002"), false).unwrap();
    let token_calls = ctx.vendor.token_calls();
    ctx.vendor.revoke_tokens();

    let report = session.apply_products().await;

    // The first rejection logs out; the second item never reaches the vendor.
    assert_eq!(report.status(), ApplyStatus::Failed);
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed.iter().all(|f| f.error == messages::TOKEN_EXPIRED));
    assert_eq!(session.pending_changes().products, 2);
    assert!(ctx.vendor.patches(Collection::Products).is_empty());

    let tokens = session.api().tokens();
    assert!(!tokens.is_logged_in().await);
    assert!(tokens.stored_credentials().await.is_none());
    assert_eq!(ctx.vendor.token_calls(), token_calls);
}
