use super::*;
use crate::gateway::{GatewayResponse, ScriptedTransport};
use crate::identity::SessionStore;
use serde_json::Value;
use std::sync::Arc;

fn setup() -> (Arc<ScriptedTransport>, ComplaintService) {
    let t = Arc::new(ScriptedTransport::new());
    let store = SessionStore::in_memory();
    store.set_credential("tok-1");
    (t.clone(), ComplaintService::new(Gateway::new(t, store)))
}

fn complaint(id: u64, status: &str) -> Value {
    json!({"id": id, "text": "Projector broken", "status": status, "category": "Facilities", "created_at": "2025-10-01T08:00:00Z"})
}

#[tokio::test]
async fn detail_records_status_for_preflight() {
    let (t, svc) = setup();
    t.reply(Method::Get, "complaints/5/", GatewayResponse::success(200, Some(complaint(5, "RESOLVED"))));
    svc.get_detail(5).await.unwrap();
    assert_eq!(svc.cached_status(5), Some(Status::Resolved));

    let e = svc.transition_status(5, Status::InReview, None).await.unwrap_err();
    assert!(matches!(e, AppError::InvalidTransition { .. }));
    assert_eq!(t.calls_to(Method::Patch, "admin/complaints/5/status/"), 0);
}

#[tokio::test]
async fn transition_sends_status_and_comment() {
    let (t, svc) = setup();
    t.reply(Method::Get, "complaints/5/", GatewayResponse::success(200, Some(complaint(5, "IN_PROGRESS"))));
    t.reply(Method::Patch, "admin/complaints/5/status/", GatewayResponse::success(200, Some(complaint(5, "RESOLVED"))));
    svc.get_detail(5).await.unwrap();
    let c = svc.transition_status(5, Status::Resolved, Some(" fixed ")).await.unwrap();
    assert_eq!(c.status, Status::Resolved);
    assert_eq!(svc.cached_status(5), Some(Status::Resolved));
    let patch = t.calls().into_iter().find(|c| c.method == Method::Patch).unwrap();
    assert_eq!(patch.body, Some(Body::Json(json!({"status": "RESOLVED", "comment": "fixed"}))));
}

#[tokio::test]
async fn unknown_status_defers_to_server() {
    let (t, svc) = setup();
    t.reply(Method::Patch, "admin/complaints/9/status/", GatewayResponse::failure(400, Some(json!({"detail": "Invalid transition"}))));
    let e = svc.transition_status(9, Status::Closed, None).await.unwrap_err();
    assert!(matches!(e, AppError::Remote { .. }));
    assert_eq!(t.call_count(), 1);
}

#[tokio::test]
async fn detail_error_categories() {
    let (t, svc) = setup();
    t.reply(Method::Get, "complaints/404/", GatewayResponse::failure(404, Some(json!({"detail": "Not found."}))));
    t.reply(Method::Get, "complaints/3/", GatewayResponse::failure(403, None));
    assert!(matches!(svc.get_detail(404).await.unwrap_err(), AppError::NotFound { .. }));
    assert!(matches!(svc.get_detail(3).await.unwrap_err(), AppError::Forbidden { .. }));
    assert!(svc.gateway().session().get().is_authenticated());
    assert!(svc.get_detail(0).await.unwrap_err().is_local());
}

#[tokio::test]
async fn list_filters_client_side() {
    let (t, svc) = setup();
    let page = json!([
        {"id": 42, "text": "Charged twice", "status": "RESOLVED", "category": "Billing", "created_at": "2025-10-01T08:00:00Z"},
        {"id": 7, "text": "Late", "status": "RESOLVED", "created_at": "2025-10-02T08:00:00Z"}
    ]);
    t.reply(Method::Get, "admin/complaints/?page=1", GatewayResponse::success(200, Some(page)));
    let filter = ListFilter { status: Some(Status::Resolved), search: Some("42".into()) };
    let got = svc.list(ListScope::StaffQueue, &filter, 1).await.unwrap();
    assert_eq!(got.items.iter().map(|c| c.id).collect::<Vec<_>>(), vec![42]);
    assert_eq!(svc.cached_status(7), Some(Status::Resolved));
}

#[tokio::test]
async fn load_more_pages_until_exhausted() {
    let (t, svc) = setup();
    t.reply(Method::Get, "complaints/?page=1", GatewayResponse::success(200, Some(json!({"results": [complaint(1, "NEW")], "next": "p2"}))));
    t.reply(Method::Get, "complaints/?page=2", GatewayResponse::success(200, Some(json!({"results": [complaint(2, "NEW")], "next": null}))));
    let mut feed = ComplaintFeed::new(ListFilter::default());
    assert!(svc.load_more(ListScope::Own, &mut feed).await.unwrap());
    assert!(svc.load_more(ListScope::Own, &mut feed).await.unwrap());
    assert!(!svc.load_more(ListScope::Own, &mut feed).await.unwrap());
    assert_eq!(feed.len(), 2);
    assert_eq!(t.call_count(), 2);
}

#[tokio::test]
async fn feedback_and_responses() {
    let (t, svc) = setup();
    t.reply(Method::Get, "complaints/5/", GatewayResponse::success(200, Some(complaint(5, "IN_REVIEW"))));
    svc.get_detail(5).await.unwrap();
    let e = svc.submit_feedback(5, "thanks").await.unwrap_err();
    assert_eq!(e.code_str(), "feedback_not_open");
    assert!(svc.add_response(5, "   ").await.unwrap_err().is_local());

    let entry = json!({"id": 11, "complaint": 5, "action": "ADMIN_RESPONSE", "user_role": "ADMIN", "comment": "On it", "created_at": "2025-10-01T09:00:00Z"});
    t.reply(Method::Post, "admin/complaints/5/responses/", GatewayResponse::success(201, Some(entry)));
    let got = svc.add_response(5, "On it").await.unwrap();
    assert_eq!(got.action_label(), "Staff response");
    assert_eq!(t.call_count(), 2);
}

#[tokio::test]
async fn staff_cannot_create() {
    let (t, svc) = setup();
    svc.gateway().session().set_privileged_if_current("tok-1", true);
    let e = svc.create(&NewComplaint { text: "x".into(), category: None }).await.unwrap_err();
    assert!(matches!(e, AppError::Forbidden { .. }));
    assert_eq!(t.call_count(), 0);
}

#[tokio::test]
async fn client_creates_trimmed_complaint() {
    let (t, svc) = setup();
    assert!(svc.create(&NewComplaint { text: "  ".into(), category: None }).await.unwrap_err().is_local());
    t.reply(Method::Post, CREATE_PATH, GatewayResponse::success(201, Some(complaint(12, "NEW"))));
    let c = svc.create(&NewComplaint { text: " Projector broken ".into(), category: Some(" ".into()) }).await.unwrap();
    assert_eq!(c.id, 12);
    assert_eq!(t.calls()[0].body, Some(Body::Json(json!({"text": "Projector broken"}))));
}

#[tokio::test]
async fn status_cache_does_not_outlive_the_credential() {
    let (t, svc) = setup();
    t.reply(Method::Get, "complaints/5/", GatewayResponse::success(200, Some(complaint(5, "RESOLVED"))));
    svc.get_detail(5).await.unwrap();
    assert_eq!(svc.cached_status(5), Some(Status::Resolved));

    svc.gateway().session().set_credential("tok-2");
    assert_eq!(svc.cached_status(5), None);
    svc.gateway().session().set_credential("tok-1");
    assert_eq!(svc.cached_status(5), None);

    svc.gateway().session().clear_all();
    assert_eq!(svc.cached_status(5), None);
}

#[tokio::test]
async fn detail_arriving_after_a_switch_is_not_cached() {
    let (t, svc) = setup();
    let svc = Arc::new(svc);
    let gate = t.reply_gated(Method::Get, "complaints/5/", GatewayResponse::success(200, Some(complaint(5, "RESOLVED"))));
    let s = svc.clone();
    let task = tokio::spawn(async move { s.get_detail(5).await });
    while t.call_count() < 1 {
        tokio::task::yield_now().await;
    }
    svc.gateway().session().set_credential("tok-2");
    gate.release();
    task.await.unwrap().unwrap();
    assert_eq!(svc.cached_status(5), None);
}
