use std::time::Duration;

use fixtures::handle_host::HandleHostFixture;
use fixtures::jwt;
use fixtures::pds::{PdsFixture, TokenLifetimes};
use fixtures::plc_directory::PlcDirectoryFixture;
use fixtures::spawn;
use serde_json::{json, Value};

async fn start_pds() -> (PdsFixture, String) {
    let pds = PdsFixture::new().with_account("fixture-user.test", "did:plc:abcdefg", "password");
    let addr = spawn(pds.router()).await.unwrap();
    (pds, format!("http://{addr}"))
}

async fn create_session(client: &reqwest::Client, base: &str, password: &str) -> reqwest::Response {
    client
        .post(format!("{base}/xrpc/com.atproto.server.createSession"))
        .json(&json!({ "identifier": "fixture-user.test", "password": password }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_create_session() {
    let (pds, base) = start_pds().await;
    let client = reqwest::Client::new();

    let response = create_session(&client, &base, "password").await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["did"], "did:plc:abcdefg");
    assert_eq!(body["handle"], "fixture-user.test");

    let access = jwt::claims(body["accessJwt"].as_str().unwrap()).unwrap();
    assert_eq!(access["scope"], jwt::ACCESS_SCOPE);
    assert!(access["exp"].as_i64().unwrap() > jwt::now());

    assert_eq!(pds.create_calls(), 1);
}

#[tokio::test]
async fn test_create_session_wrong_password() {
    let (_pds, base) = start_pds().await;
    let client = reqwest::Client::new();

    let response = create_session(&client, &base, "nope").await;
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "AuthenticationRequired");
}

#[tokio::test]
async fn test_refresh_session() {
    let (pds, base) = start_pds().await;
    let client = reqwest::Client::new();

    let body: Value = create_session(&client, &base, "password")
        .await
        .json()
        .await
        .unwrap();
    let refresh_jwt = body["refreshJwt"].as_str().unwrap();

    let response = client
        .post(format!("{base}/xrpc/com.atproto.server.refreshSession"))
        .bearer_auth(refresh_jwt)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let refreshed: Value = response.json().await.unwrap();
    assert_ne!(refreshed["accessJwt"], body["accessJwt"]);
    assert_eq!(pds.refresh_calls(), 1);
}

#[tokio::test]
async fn test_refresh_with_expired_token() {
    let (pds, base) = start_pds().await;
    let client = reqwest::Client::new();

    pds.set_lifetimes(TokenLifetimes {
        access_secs: -10,
        refresh_secs: -10,
    });
    let body: Value = create_session(&client, &base, "password")
        .await
        .json()
        .await
        .unwrap();

    let response = client
        .post(format!("{base}/xrpc/com.atproto.server.refreshSession"))
        .bearer_auth(body["refreshJwt"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let error: Value = response.json().await.unwrap();
    assert_eq!(error["error"], "ExpiredToken");
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let (_pds, base) = start_pds().await;
    let client = reqwest::Client::new();

    let body: Value = create_session(&client, &base, "password")
        .await
        .json()
        .await
        .unwrap();

    let response = client
        .post(format!("{base}/xrpc/com.atproto.server.refreshSession"))
        .bearer_auth(body["accessJwt"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let error: Value = response.json().await.unwrap();
    assert_eq!(error["error"], "InvalidToken");
}

#[tokio::test]
async fn test_plc_directory_serves_registered_dids() {
    let plc = PlcDirectoryFixture::new().with_account(
        "did:plc:abcdefg",
        "fixture-user.test",
        "http://localhost:3001",
    );
    let addr = spawn(plc.router()).await.unwrap();
    let client = reqwest::Client::new();

    let document: Value = client
        .get(format!("http://{addr}/did:plc:abcdefg"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(document["id"], "did:plc:abcdefg");
    assert_eq!(document["service"][0]["id"], "#atproto_pds");
    assert_eq!(
        document["service"][0]["serviceEndpoint"],
        "http://localhost:3001"
    );

    let missing = client
        .get(format!("http://{addr}/did:plc:unknown"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_handle_host_answers_by_host_header() {
    let host = HandleHostFixture::new().with_handle("fixture-user.test", "did:plc:abcdefg");
    let addr = spawn(host.router()).await.unwrap();

    let client = reqwest::Client::builder()
        .resolve("fixture-user.test", addr)
        .resolve("someone-else.test", addr)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let body = client
        .get("http://fixture-user.test/.well-known/atproto-did")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body.trim(), "did:plc:abcdefg");

    let missing = client
        .get("http://someone-else.test/.well-known/atproto-did")
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
}
