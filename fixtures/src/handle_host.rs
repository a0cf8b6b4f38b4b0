//! Stands in for the web servers behind handles and `did:web` domains.
//!
//! Requests are told apart by their `Host` header, so one listener can play
//! any number of domains when the client pins them to its address.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{header::HOST, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tracing::info;

#[derive(Clone, Default)]
pub struct HandleHostFixture {
    inner: Arc<Mutex<Domains>>,
}

#[derive(Default)]
struct Domains {
    atproto_dids: HashMap<String, String>,
    did_documents: HashMap<String, Value>,
}

impl HandleHostFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// `/.well-known/atproto-did` on `handle` answers with `did`.
    pub fn with_handle(self, handle: &str, did: &str) -> Self {
        if let Ok(mut domains) = self.inner.lock() {
            domains
                .atproto_dids
                .insert(handle.to_string(), did.to_string());
        }
        self
    }

    /// `/.well-known/did.json` on `domain` answers with `document`.
    pub fn with_did_document(self, domain: &str, document: Value) -> Self {
        if let Ok(mut domains) = self.inner.lock() {
            domains.did_documents.insert(domain.to_string(), document);
        }
        self
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/.well-known/atproto-did", get(atproto_did))
            .route("/.well-known/did.json", get(did_json))
            .with_state(self.clone())
    }
}

fn host(headers: &HeaderMap) -> Option<String> {
    let host = headers.get(HOST)?.to_str().ok()?;
    let domain = host.split(':').next()?;
    Some(domain.to_ascii_lowercase())
}

async fn atproto_did(State(fixture): State<HandleHostFixture>, headers: HeaderMap) -> Response {
    let did = host(&headers).and_then(|domain| {
        let domains = fixture.inner.lock().ok()?;
        domains.atproto_dids.get(&domain).cloned()
    });

    match did {
        Some(did) => {
            info!("HANDLE HOST: Serving {}", did);
            // Real hosts commonly append a newline.
            format!("{did}\n").into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn did_json(State(fixture): State<HandleHostFixture>, headers: HeaderMap) -> Response {
    let document = host(&headers).and_then(|domain| {
        let domains = fixture.inner.lock().ok()?;
        domains.did_documents.get(&domain).cloned()
    });

    match document {
        Some(document) => Json(document).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
