//! End-to-end harvest scenarios (spec.md §8 S1-S6), driven against a stub
//! ESI server the way `pkodzis-hcpctl`'s `tests/` suite drives a stub TFE
//! server — here through the public library API rather than the compiled
//! binary, since this crate's CLI is a thin, non-interactive demo wrapper
//! with no CLI-level surface worth black-box testing (see DESIGN.md).

use std::sync::Arc;

use esi_knife::{document, MemoryStateStore, StateStore, Supervisor};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn stub_verify(server: &MockServer, character_id: i64, scopes: &str) {
    Mock::given(method("GET"))
        .and(path("/verify/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "CharacterID": character_id,
            "Scopes": scopes,
        })))
        .mount(server)
        .await;
}

async fn stub_roles(server: &MockServer, character_id: i64, roles: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/latest/characters/{}/roles/", character_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "roles": roles })))
        .mount(server)
        .await;
}

async fn stub_public_info(server: &MockServer, character_id: i64, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/latest/characters/{}/", character_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn stub_swagger(server: &MockServer, paths: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/latest/swagger.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "basePath": "/latest",
            "paths": paths,
        })))
        .mount(server)
        .await;
}

/// Stubs every listing endpoint C4 always probes with an empty body, so
/// scenarios that don't care about fan-out don't need to enumerate them.
async fn stub_empty_listings(server: &MockServer, character_id: i64) {
    for route in [
        "calendar",
        "contracts",
        "fittings",
        "mail/labels",
        "planets",
        "mail",
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/latest/characters/{}/{}/", character_id, route)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
    }
}

async fn run_harvest(server: &MockServer, run_id: &str, token: &str) -> serde_json::Value {
    let store = Arc::new(MemoryStateStore::new());
    let supervisor = Supervisor::new(store.clone(), server.uri());
    store.set(&format!("new.{}", run_id), token.to_string(), None).await;
    supervisor.process_new().await;
    document::read(store.as_ref(), run_id).await.unwrap().unwrap()
}

#[tokio::test]
async fn s1_basic_character() {
    let server = MockServer::start().await;
    stub_verify(&server, 90000001, "esi-location.read_location.v1").await;
    stub_roles(&server, 90000001, &[]).await;
    stub_public_info(&server, 90000001, json!({"corporation_id": 1000001})).await;
    stub_swagger(
        &server,
        json!({
            "/characters/{character_id}/location/": {
                "get": {"security": [{"evesso": ["esi-location.read_location.v1"]}]}
            },
            "/corporations/{corporation_id}/wallets/": {"get": {}}
        }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/latest/characters/90000001/location/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"solar_system_id": 30000142})))
        .mount(&server)
        .await;
    stub_empty_listings(&server, 90000001).await;

    let doc = run_harvest(&server, "s1", "token").await;

    let location_key = format!("{}/latest/characters/90000001/location/", server.uri());
    assert_eq!(doc[location_key], json!({"solar_system_id": 30000142}));
    assert!(!doc.as_object().unwrap().keys().any(|k| k.contains("/corporations/")));
}

#[tokio::test]
async fn s2_two_phase_fan_out() {
    let server = MockServer::start().await;
    stub_verify(&server, 90000002, "esi-mail.read_mail.v1").await;
    stub_roles(&server, 90000002, &[]).await;
    stub_public_info(&server, 90000002, json!({"corporation_id": 1000001})).await;
    stub_swagger(
        &server,
        json!({
            "/characters/{character_id}/mail/{mail_id}/": {
                "get": {"security": [{"evesso": ["esi-mail.read_mail.v1"]}]}
            }
        }),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/latest/characters/90000002/mail/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"mail_id": 42}, {"mail_id": 43}])))
        .mount(&server)
        .await;
    for route in ["calendar", "contracts", "fittings", "mail/labels", "planets"] {
        Mock::given(method("GET"))
            .and(path(format!("/latest/characters/90000002/{}/", route)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/latest/characters/90000002/mail/42/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"body": "x"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/latest/characters/90000002/mail/43/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"body": "x"})))
        .mount(&server)
        .await;

    let doc = run_harvest(&server, "s2", "token").await;

    let listing_key = format!("{}/latest/characters/90000002/mail/", server.uri());
    let mail_42_key = format!("{}/latest/characters/90000002/mail/42/", server.uri());
    let mail_43_key = format!("{}/latest/characters/90000002/mail/43/", server.uri());
    assert_eq!(doc[listing_key], json!([{"mail_id": 42}, {"mail_id": 43}]));
    assert_eq!(doc[mail_42_key], json!({"body": "x"}));
    assert_eq!(doc[mail_43_key], json!({"body": "x"}));
}

#[tokio::test]
async fn s3_pagination_merges_in_order() {
    let server = MockServer::start().await;
    stub_verify(&server, 90000003, "esi-wallet.read_character_wallet.v1").await;
    stub_roles(&server, 90000003, &[]).await;
    stub_public_info(&server, 90000003, json!({"corporation_id": 1000001})).await;
    stub_swagger(
        &server,
        json!({
            "/characters/{character_id}/wallet/journal/": {
                "get": {"security": [{"evesso": ["esi-wallet.read_character_wallet.v1"]}]}
            }
        }),
    )
    .await;
    stub_empty_listings(&server, 90000003).await;

    Mock::given(method("GET"))
        .and(path("/latest/characters/90000003/wallet/journal/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": 1}]))
                .insert_header("X-Pages", "2"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/latest/characters/90000003/wallet/journal/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 2}])))
        .mount(&server)
        .await;

    let doc = run_harvest(&server, "s3", "token").await;

    let key = format!("{}/latest/characters/90000003/wallet/journal/", server.uri());
    assert_eq!(doc[key], json!([{"id": 1}, {"id": 2}]));
}

#[tokio::test]
async fn s4_ignored_route_never_appears() {
    let server = MockServer::start().await;
    stub_verify(&server, 90000004, "esi-characters.read_opportunities.v1").await;
    stub_roles(&server, 90000004, &[]).await;
    stub_public_info(&server, 90000004, json!({"corporation_id": 1000001})).await;
    stub_swagger(
        &server,
        json!({
            "/characters/{character_id}/opportunities/": {
                "get": {"security": [{"evesso": ["esi-characters.read_opportunities.v1"]}]}
            }
        }),
    )
    .await;
    stub_empty_listings(&server, 90000004).await;

    let doc = run_harvest(&server, "s4", "token").await;

    assert!(!doc.as_object().unwrap().keys().any(|k| k.contains("/opportunities/")));
}

#[tokio::test]
async fn s5_corp_roles_gating() {
    let server = MockServer::start().await;
    stub_verify(&server, 90000005, "esi-corporations.read_structures.v1").await;
    stub_roles(&server, 90000005, &[]).await; // lacks Station_Manager
    stub_public_info(&server, 90000005, json!({"corporation_id": 98000001})).await;
    stub_swagger(
        &server,
        json!({
            "/corporations/{corporation_id}/structures/": {
                "get": {
                    "x-required-roles": ["Station_Manager"],
                    "security": [{"evesso": ["esi-corporations.read_structures.v1"]}]
                }
            }
        }),
    )
    .await;
    stub_empty_listings(&server, 90000005).await;
    Mock::given(method("GET"))
        .and(path("/corporation/98000001/mining/observers/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/corporations/98000001/contracts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/corporations/98000001/starbases/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/corporations/98000001/wallets/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let doc = run_harvest(&server, "s5", "token").await;

    assert!(!doc.as_object().unwrap().keys().any(|k| k.contains("/structures/")));
}

#[tokio::test]
async fn s6_name_resolution_annotates_result_tree() {
    let server = MockServer::start().await;
    stub_verify(&server, 90000006, "esi-location.read_location.v1").await;
    stub_roles(&server, 90000006, &[]).await;
    stub_public_info(&server, 90000006, json!({"corporation_id": 1000001})).await;
    stub_swagger(
        &server,
        json!({
            "/characters/{character_id}/location/": {
                "get": {"security": [{"evesso": ["esi-location.read_location.v1"]}]}
            }
        }),
    )
    .await;
    stub_empty_listings(&server, 90000006).await;
    Mock::given(method("GET"))
        .and(path("/latest/characters/90000006/location/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "corporation_id": 98000001,
            "nested": [{"type_id": 587}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/latest/universe/names/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 98000001, "name": "Corp", "category": "corporation"},
            {"id": 587, "name": "Rifter", "category": "inventory_type"},
        ])))
        .mount(&server)
        .await;

    let doc = run_harvest(&server, "s6", "token").await;

    let key = format!("{}/latest/characters/90000006/location/", server.uri());
    assert_eq!(
        doc[key],
        json!({
            "corporation_id": 98000001,
            "corporation_id_name": "Corp",
            "nested": [{"type_id": 587, "type_id_name": "Rifter"}]
        })
    );
}

/// Regression: `alliance_id` from the public character record must become a
/// known path param so alliance-rooted routes are planned, and the raw-ID
/// route `.*/alliances/<id>/corporations/$` gets list-of-object annotation.
#[tokio::test]
async fn s7_alliance_routed_raw_id_name_resolution() {
    let server = MockServer::start().await;
    stub_verify(&server, 90000007, "esi-location.read_location.v1").await;
    stub_roles(&server, 90000007, &[]).await;
    stub_public_info(
        &server,
        90000007,
        json!({"corporation_id": 1000001, "alliance_id": 99000001}),
    )
    .await;
    stub_swagger(
        &server,
        json!({
            "/alliances/{alliance_id}/corporations/": {"get": {}}
        }),
    )
    .await;
    stub_empty_listings(&server, 90000007).await;
    Mock::given(method("GET"))
        .and(path("/latest/alliances/99000001/corporations/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([98000001, 98000002])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/latest/universe/names/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 98000001, "name": "Corp One", "category": "corporation"},
        ])))
        .mount(&server)
        .await;

    let doc = run_harvest(&server, "s7", "token").await;

    let key = format!("{}/latest/alliances/99000001/corporations/", server.uri());
    assert_eq!(
        doc[key],
        json!([
            {"id": 98000001, "name": "Corp One"},
            {"id": 98000002},
        ])
    );
}
