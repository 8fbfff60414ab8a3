//! HTTP-level integration tests for the claims server.
//!
//! The router runs against an in-memory store, so no database is needed.
//! Run with: cargo test -p claims-server --test http_integration

use std::sync::Arc;

use axum::body::Body;
use chrono::NaiveDate;
use claims_core::types::{ClaimStatus, NewClaim, NewClaimDetail};
use claims_core::{ClaimStore, MemoryStore};
use claims_server::middleware::jwt::JwtConfig;
use claims_server::router::build_router;
use http_body_util::BodyExt;
use hyper::{header, Request, StatusCode};
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use serde::Serialize;
use tower::ServiceExt;

// ── Test JWT helpers ───────────────────────────────────────────

const TEST_JWT_SECRET: &[u8] = b"test-secret-for-http-tests";

#[derive(Debug, Serialize)]
struct TestClaims {
    sub: String,
    exp: u64,
}

fn make_jwt(username: &str) -> String {
    let claims = TestClaims {
        sub: username.into(),
        exp: jsonwebtoken::get_current_timestamp() + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET),
    )
    .expect("failed to encode test JWT")
}

// ── Test app builder ───────────────────────────────────────────

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let claims = [
        (99999, "Test Patient", 100000, 50000, ClaimStatus::UnderReview, "Test Insurance"),
        (1, "Alice Brown", 20000, 20000, ClaimStatus::Paid, "Acme Health"),
        (2, "Bob Stone", 35000, 0, ClaimStatus::Denied, "Acme Health"),
    ];
    for (id, patient, billed, paid, status, insurer) in claims {
        store
            .insert_claim(NewClaim {
                id,
                patient_name: patient.into(),
                billed_amount: Decimal::new(billed, 2),
                paid_amount: Decimal::new(paid, 2),
                status,
                insurer_name: insurer.into(),
                discharge_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            })
            .await
            .unwrap();
    }
    store
        .insert_detail(
            99999,
            NewClaimDetail {
                denial_reason: Some("Test denial reason".into()),
                cpt_codes: "99201,99202,99203".into(),
            },
        )
        .await
        .unwrap();
    store
}

fn app(store: Arc<MemoryStore>) -> axum::Router {
    build_router(store, JwtConfig::from_secret(TEST_JWT_SECRET))
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_form(uri: &str, token: Option<&str>, htmx: bool, form: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    if htmx {
        builder = builder.header("HX-Request", "true");
    }
    builder.body(Body::from(form.to_string())).unwrap()
}

// ── Public views ───────────────────────────────────────────────

#[tokio::test]
async fn health_is_public() {
    let resp = app(seeded_store().await).oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn listing_applies_status_filter() {
    let resp = app(seeded_store().await)
        .oneshot(get("/?status=Under%20Review"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["view"], "claims/list");
    assert_eq!(json["fragment"], false);
    let context = &json["context"];
    assert_eq!(context["total_claims"], 1);
    assert_eq!(context["claims"][0]["id"], 99999);
    assert_eq!(context["claims"][0]["underpayment"], "500.00");
    assert_eq!(context["status_filter"], "Under Review");
    assert_eq!(context["filters_applied"], true);
}

#[tokio::test]
async fn repeated_query_key_uses_last_value() {
    let resp = app(seeded_store().await)
        .oneshot(get("/?status=Paid&status=Denied"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let context = &body_json(resp).await["context"];
    assert_eq!(context["status_filter"], "Denied");
    assert_eq!(context["total_claims"], 1);
    assert_eq!(context["claims"][0]["id"], 2);
    assert_eq!(context["messages"], serde_json::json!([]));
}

#[tokio::test]
async fn listing_search_and_fragment_mode() {
    let req = Request::builder()
        .uri("/?search=Test&per_page=1000")
        .header("HX-Request", "true")
        .body(Body::empty())
        .unwrap();
    let resp = app(seeded_store().await).oneshot(req).await.unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["view"], "claims/table_partial");
    assert_eq!(json["fragment"], true);
    assert_eq!(json["context"]["total_claims"], 1);
    assert_eq!(json["context"]["items_per_page"], 100);
}

#[tokio::test]
async fn listing_with_bad_amount_warns_and_still_lists() {
    let resp = app(seeded_store().await)
        .oneshot(get("/?min_amount=abc"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["context"]["total_claims"], 3);
    assert_eq!(json["context"]["messages"][0]["level"], "warning");
}

#[tokio::test]
async fn detail_resolves_derived_attributes() {
    let resp = app(seeded_store().await)
        .oneshot(get("/claim/99999/"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["view"], "claims/detail");
    let claim = &json["context"]["claim"];
    assert_eq!(claim["patient_id"], "P099999");
    assert_eq!(claim["is_flagged"], false);
    assert_eq!(
        json["context"]["cpt_codes"],
        serde_json::json!(["99201", "99202", "99203"])
    );
}

#[tokio::test]
async fn missing_claim_is_404() {
    let resp = app(seeded_store().await)
        .oneshot(get("/claim/999999/"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "claim 999999 not found");
}

// ── Authentication ─────────────────────────────────────────────

#[tokio::test]
async fn unauthenticated_flag_redirects_to_login() {
    let store = seeded_store().await;
    let resp = app(store.clone())
        .oneshot(post_form("/claim/99999/flag/", None, false, ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/accounts/login/?next=%2Fclaim%2F99999%2Fflag%2F"
    );
    assert!(store.flags_for_claim(99999).await.unwrap().is_empty());
}

#[tokio::test]
async fn unauthenticated_note_redirects_to_login() {
    let store = seeded_store().await;
    let resp = app(store.clone())
        .oneshot(post_form(
            "/claim/99999/note/",
            None,
            false,
            "content=hello&note_type=General",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/accounts/login/?next=%2Fclaim%2F99999%2Fnote%2F"
    );
    assert!(store.notes_for_claim(99999).await.unwrap().is_empty());
}

#[tokio::test]
async fn unauthenticated_dashboard_redirects_to_login() {
    let resp = app(seeded_store().await)
        .oneshot(get("/admin-dashboard/"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        resp.headers().get(header::LOCATION).unwrap(),
        "/accounts/login/?next=%2Fadmin-dashboard%2F"
    );
}

#[tokio::test]
async fn token_signed_with_other_secret_is_rejected() {
    let forged = encode(
        &Header::default(),
        &TestClaims {
            sub: "mallory".into(),
            exp: jsonwebtoken::get_current_timestamp() + 3600,
        },
        &EncodingKey::from_secret(b"wrong-secret"),
    )
    .unwrap();
    let req = Request::builder()
        .uri("/admin-dashboard/")
        .header(header::AUTHORIZATION, format!("Bearer {}", forged))
        .body(Body::empty())
        .unwrap();
    let resp = app(seeded_store().await).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
}

// ── Mutations ──────────────────────────────────────────────────

#[tokio::test]
async fn flagging_twice_keeps_one_flag() {
    let store = seeded_store().await;
    let token = make_jwt("testuser");

    let first = app(store.clone())
        .oneshot(post_form(
            "/claim/99999/flag/",
            Some(&token),
            false,
            "reason=Test+flag+reason",
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::SEE_OTHER);
    assert_eq!(first.headers().get(header::LOCATION).unwrap(), "/claim/99999/");
    assert_eq!(first.headers().get("x-message-level").unwrap(), "success");
    assert_eq!(
        first.headers().get("x-message").unwrap(),
        "Claim 99999 flagged for review!"
    );

    let second = app(store.clone())
        .oneshot(post_form("/claim/99999/flag/", Some(&token), false, ""))
        .await
        .unwrap();
    assert_eq!(second.headers().get("x-message-level").unwrap(), "info");
    assert_eq!(
        second.headers().get("x-message").unwrap(),
        "Claim 99999 already flagged by you."
    );

    let flags = store.flags_for_claim(99999).await.unwrap();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].flag.reason, "Test flag reason");
    assert_eq!(flags[0].flagged_by, "testuser");
}

#[tokio::test]
async fn fragment_flag_returns_status_partial() {
    let store = seeded_store().await;
    let resp = app(store)
        .oneshot(post_form(
            "/claim/99999/flag/",
            Some(&make_jwt("testuser")),
            true,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["view"], "claims/flag_status");
    assert_eq!(json["context"]["is_flagged"], true);
    assert_eq!(json["context"]["message"]["level"], "success");
}

#[tokio::test]
async fn flagging_unknown_claim_is_404() {
    let resp = app(seeded_store().await)
        .oneshot(post_form(
            "/claim/999999/flag/",
            Some(&make_jwt("testuser")),
            false,
            "",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_note_is_rejected_with_flash() {
    let store = seeded_store().await;
    let resp = app(store.clone())
        .oneshot(post_form(
            "/claim/99999/note/",
            Some(&make_jwt("testuser")),
            false,
            "content=+++",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers().get("x-message-level").unwrap(), "error");
    assert_eq!(
        resp.headers().get("x-message").unwrap(),
        "Note content cannot be empty."
    );
    assert!(store.notes_for_claim(99999).await.unwrap().is_empty());
}

#[tokio::test]
async fn fragment_note_returns_notes_partial() {
    let store = seeded_store().await;
    let resp = app(store.clone())
        .oneshot(post_form(
            "/claim/99999/note/",
            Some(&make_jwt("testuser")),
            true,
            "content=Test+note+content&note_type=Admin+Note",
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["view"], "claims/notes_partial");
    let notes = json["context"]["notes"].as_array().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["content"], "Test note content");
    assert_eq!(notes[0]["note_type"], "Admin Note");
    assert_eq!(notes[0]["author"], "testuser");
}

// ── Dashboard ──────────────────────────────────────────────────

#[tokio::test]
async fn dashboard_counts_distinct_flagged_claims() {
    let store = seeded_store().await;
    for user in ["alice", "bob"] {
        let resp = app(store.clone())
            .oneshot(post_form("/claim/99999/flag/", Some(&make_jwt(user)), false, ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    let req = Request::builder()
        .uri("/admin-dashboard/")
        .header(header::AUTHORIZATION, format!("Bearer {}", make_jwt("alice")))
        .body(Body::empty())
        .unwrap();
    let resp = app(store).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["view"], "claims/admin_dashboard");
    let report = &json["context"];
    assert_eq!(report["total_claims"], 3);
    assert_eq!(report["flagged_claims"], 1);
    assert_eq!(report["total_users"], 2);
    assert_eq!(report["recent_flags"].as_array().unwrap().len(), 2);
    assert_eq!(report["insurer_stats"][0]["insurer_name"], "Acme Health");
}
