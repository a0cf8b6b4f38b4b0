use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, warn};

/// DID document naming `pds_url` as the account's `#atproto_pds` service.
pub fn did_document(did: &str, handle: &str, pds_url: &str) -> Value {
    json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "id": did,
        "alsoKnownAs": [format!("at://{handle}")],
        "verificationMethod": [
            {
                "id": format!("{did}#atproto"),
                "type": "Multikey",
                "controller": did,
                "publicKeyMultibase": "zQ3shXjHeiBuRCKmM36cuYnm7YEMzhGnCmCyW92sRJ9pribSF"
            }
        ],
        "service": [
            {
                "id": "#atproto_pds",
                "type": "AtprotoPersonalDataServer",
                "serviceEndpoint": pds_url
            }
        ]
    })
}

/// Serves `GET /{did}` for the DIDs it has been told about, 404 otherwise.
#[derive(Clone, Default)]
pub struct PlcDirectoryFixture {
    documents: Arc<Mutex<HashMap<String, Value>>>,
}

impl PlcDirectoryFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, did: &str, document: Value) -> Self {
        self.insert(did, document);
        self
    }

    pub fn with_account(self, did: &str, handle: &str, pds_url: &str) -> Self {
        self.with_document(did, did_document(did, handle, pds_url))
    }

    pub fn insert(&self, did: &str, document: Value) {
        if let Ok(mut documents) = self.documents.lock() {
            documents.insert(did.to_string(), document);
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/:did", get(resolve_did))
            .with_state(self.clone())
    }
}

async fn resolve_did(
    State(plc): State<PlcDirectoryFixture>,
    Path(did): Path<String>,
) -> Response {
    let document = plc
        .documents
        .lock()
        .ok()
        .and_then(|documents| documents.get(&did).cloned());

    match document {
        Some(document) => {
            info!("PLC DIRECTORY: Resolving DID: {}", did);
            Json(document).into_response()
        }
        None => {
            warn!("PLC DIRECTORY: Unknown DID: {}", did);
            (StatusCode::NOT_FOUND, format!("DID not registered: {did}")).into_response()
        }
    }
}
