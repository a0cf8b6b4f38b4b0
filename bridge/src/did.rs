use std::error::Error as StdError;
use std::sync::Arc;

use async_trait::async_trait;
use atrium_api::did_doc::DidDocument;
use hickory_resolver::TokioAsyncResolver;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::errors::ErrorKind;
use crate::state::ResolverConfig;

static HANDLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$").expect("valid handle regex")
});

static DID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^did:[a-z]+:[a-zA-Z0-9._:%-]+$").expect("valid DID regex"));

const MAX_HANDLE_LEN: usize = 253;
const PDS_SERVICE_SUFFIX: &str = "#atproto_pds";
const MAX_WELL_KNOWN_BYTES: usize = 2048;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid handle {0:?}")]
    InvalidHandle(String),
    #[error("invalid DID {0:?}")]
    InvalidDid(String),
    #[error("no DID found for handle {0}")]
    UserNotFound(String),
    #[error("no PDS found for {0}")]
    PdsNotFound(String),
    #[error("network error during identity resolution: {0}")]
    Network(#[from] reqwest::Error),
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::InvalidHandle(_) | ResolveError::InvalidDid(_) => ErrorKind::Validation,
            ResolveError::UserNotFound(_) | ResolveError::PdsNotFound(_) => ErrorKind::Resolution,
            ResolveError::Network(_) => ErrorKind::TransientNetwork,
        }
    }
}

/// Looks up TXT records. A trait so discovery can run against a fixed table
/// in tests.
#[async_trait]
pub trait DnsTxtResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Vec<String>, Box<dyn StdError + Send + Sync>>;
}

pub struct HickoryDnsTxtResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryDnsTxtResolver {
    pub fn from_system_conf() -> Result<Self, hickory_resolver::error::ResolveError> {
        Ok(Self {
            resolver: TokioAsyncResolver::tokio_from_system_conf()?,
        })
    }
}

#[async_trait]
impl DnsTxtResolver for HickoryDnsTxtResolver {
    async fn resolve(&self, query: &str) -> Result<Vec<String>, Box<dyn StdError + Send + Sync>> {
        let lookup = self.resolver.txt_lookup(query).await?;
        Ok(lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|chunk| String::from_utf8_lossy(chunk))
                    .collect::<String>()
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub handle: String,
    pub did: String,
    pub pds: String,
}

/// Lowercases and validates a handle, tolerating a leading `@`.
pub fn normalize_handle(handle: &str) -> Result<String, ResolveError> {
    let normalized = handle.trim().trim_start_matches('@').to_ascii_lowercase();
    if normalized.len() > MAX_HANDLE_LEN || !HANDLE_RE.is_match(&normalized) {
        return Err(ResolveError::InvalidHandle(handle.to_string()));
    }
    Ok(normalized)
}

pub fn is_valid_did(did: &str) -> bool {
    DID_RE.is_match(did)
}

/// Picks the PDS endpoint out of a DID document's service list.
pub fn pds_endpoint(document: &DidDocument) -> Option<String> {
    document
        .service
        .as_ref()?
        .iter()
        .find(|service| service.id.ends_with(PDS_SERVICE_SUFFIX))
        .map(|service| service.service_endpoint.trim_end_matches('/').to_string())
}

#[derive(Clone)]
pub struct IdentityResolver {
    http: reqwest::Client,
    dns: Arc<dyn DnsTxtResolver>,
    config: ResolverConfig,
}

impl IdentityResolver {
    pub fn new(http: reqwest::Client, dns: Arc<dyn DnsTxtResolver>, config: ResolverConfig) -> Self {
        Self { http, dns, config }
    }

    /// Handle → DID → PDS endpoint.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_handle(&self, handle: &str) -> Result<ResolvedIdentity, ResolveError> {
        let handle = normalize_handle(handle)?;

        let did = match self.did_from_well_known(&handle).await {
            Some(did) => did,
            None => match self.did_from_dns(&handle).await {
                Some(did) => did,
                None => {
                    info!("No DID found for handle {}", handle);
                    return Err(ResolveError::UserNotFound(handle));
                }
            },
        };

        let pds = self.resolve_did(&did).await?;
        info!("Resolved {} to {} on {}", handle, did, pds);

        Ok(ResolvedIdentity { handle, did, pds })
    }

    /// DID → PDS endpoint, via the PLC directory or did:web.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_did(&self, did: &str) -> Result<String, ResolveError> {
        if !is_valid_did(did) {
            return Err(ResolveError::InvalidDid(did.to_string()));
        }

        let Some(document_url) = self.document_url(did) else {
            warn!("Unsupported DID method for {}", did);
            return Err(ResolveError::PdsNotFound(did.to_string()));
        };
        debug!("Fetching DID document from {}", document_url);

        let response = self.http.get(&document_url).send().await?;
        if !response.status().is_success() {
            error!(
                "Failed to fetch DID document for {}: HTTP {}",
                did,
                response.status()
            );
            return Err(ResolveError::PdsNotFound(did.to_string()));
        }

        let body = response.text().await?;
        let document = match serde_json::from_str::<DidDocument>(&body) {
            Ok(document) => document,
            Err(e) => {
                error!("Failed to decode DID document for {}: {}", did, e);
                return Err(ResolveError::PdsNotFound(did.to_string()));
            }
        };

        pds_endpoint(&document).ok_or_else(|| ResolveError::PdsNotFound(did.to_string()))
    }

    fn document_url(&self, did: &str) -> Option<String> {
        let mut parts = did.splitn(3, ':');
        let (_, method, identifier) = (parts.next()?, parts.next()?, parts.next()?);

        match method {
            "plc" => Some(format!("{}/{}", self.config.plc_directory_url, did)),
            "web" => {
                // did:web:example.com%3A8080:path → "example.com:8080"
                let domain = identifier.split(':').next()?;
                let domain = urlencoding::decode(domain).ok()?;
                Some(format!(
                    "{}://{}/.well-known/did.json",
                    self.config.discovery_scheme, domain
                ))
            }
            _ => None,
        }
    }

    async fn did_from_well_known(&self, handle: &str) -> Option<String> {
        let url = format!(
            "{}://{}/.well-known/atproto-did",
            self.config.discovery_scheme, handle
        );

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Well-known lookup for {} failed: {}", handle, e);
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(
                "Well-known lookup for {} returned HTTP {}",
                handle,
                response.status()
            );
            return None;
        }

        let body = read_capped(response, MAX_WELL_KNOWN_BYTES).await?;
        let did = body.replace(['\r', '\n'], "");
        let did = did.trim();
        is_valid_did(did).then(|| did.to_string())
    }

    async fn did_from_dns(&self, handle: &str) -> Option<String> {
        let query = format!("_atproto.{handle}");
        let records = match self.dns.resolve(&query).await {
            Ok(records) => records,
            Err(e) => {
                debug!("TXT lookup for {} failed: {}", query, e);
                return None;
            }
        };

        records
            .iter()
            .filter_map(|record| record.strip_prefix("did="))
            .find(|did| is_valid_did(did))
            .map(str::to_string)
    }
}

/// Reads a response body, giving up once it exceeds `cap` bytes.
async fn read_capped(mut response: reqwest::Response, cap: usize) -> Option<String> {
    if response.content_length().is_some_and(|len| len > cap as u64) {
        debug!("Well-known body from {} is too large", response.url());
        return None;
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.ok()? {
        if body.len() + chunk.len() > cap {
            debug!("Well-known body from {} is too large", response.url());
            return None;
        }
        body.extend_from_slice(&chunk);
    }
    String::from_utf8(body).ok()
}
