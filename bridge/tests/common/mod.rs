#![allow(dead_code)]

use std::collections::HashMap;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use fixtures::handle_host::HandleHostFixture;
use fixtures::pds::PdsFixture;
use fixtures::plc_directory::{did_document, PlcDirectoryFixture};
use skybridge::did::{DnsTxtResolver, IdentityResolver};
use skybridge::state::ResolverConfig;
use skybridge::xrpc::XrpcClient;
use skybridge::{session::MemorySessionRepository, SessionStore};

pub const HANDLE: &str = "alice.example";
pub const DID: &str = "did:plc:alice";
pub const PASSWORD: &str = "hunter22";

pub const DNS_HANDLE: &str = "dns-only.example";
pub const DNS_DID: &str = "did:plc:dnsuser";

pub const WEB_DOMAIN: &str = "web-user.example";
pub const WEB_DID: &str = "did:web:web-user.example";

pub const NOBODY: &str = "nobody.example";

/// Its well-known endpoint answers with a DID far larger than any real one.
pub const OVERSIZED_HANDLE: &str = "oversized.example";

pub fn oversized_did() -> String {
    format!("did:plc:{}", "a".repeat(5000))
}

/// TXT records from a fixed table.
#[derive(Default)]
pub struct StaticDns {
    records: HashMap<String, Vec<String>>,
}

impl StaticDns {
    pub fn with(mut self, query: &str, records: &[&str]) -> Self {
        self.records.insert(
            query.to_string(),
            records.iter().map(|r| r.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl DnsTxtResolver for StaticDns {
    async fn resolve(&self, query: &str) -> Result<Vec<String>, Box<dyn StdError + Send + Sync>> {
        match self.records.get(query) {
            Some(records) => Ok(records.clone()),
            None => Err(format!("NXDOMAIN {query}").into()),
        }
    }
}

pub struct Harness {
    pub pds: PdsFixture,
    pub pds_url: String,
    pub plc: PlcDirectoryFixture,
    pub host_addr: SocketAddr,
    pub resolver: IdentityResolver,
    pub repository: Arc<MemorySessionRepository>,
    pub store: SessionStore,
}

/// One PDS, one PLC directory and one handle host, all on localhost.
///
/// `alice.example` resolves over HTTPS-style well-known lookup,
/// `dns-only.example` only through TXT records, and `web-user.example` is a
/// `did:web` account. `nobody.example` resolves nowhere, and
/// `oversized.example` serves a DID too large to accept.
pub async fn harness() -> Harness {
    let pds = PdsFixture::new()
        .with_account(HANDLE, DID, PASSWORD)
        .with_account(DNS_HANDLE, DNS_DID, PASSWORD);
    let pds_addr = fixtures::spawn(pds.router()).await.unwrap();
    let pds_url = format!("http://{pds_addr}");

    let plc = PlcDirectoryFixture::new()
        .with_account(DID, HANDLE, &pds_url)
        .with_account(DNS_DID, DNS_HANDLE, &pds_url);
    let plc_addr = fixtures::spawn(plc.router()).await.unwrap();

    let host = HandleHostFixture::new()
        .with_handle(HANDLE, DID)
        .with_handle(OVERSIZED_HANDLE, &oversized_did())
        .with_did_document(WEB_DOMAIN, did_document(WEB_DID, WEB_DOMAIN, &pds_url));
    let host_addr = fixtures::spawn(host.router()).await.unwrap();

    // Every handle domain lands on the handle host; unknown hosts 404 there.
    let http = reqwest::Client::builder()
        .resolve(HANDLE, host_addr)
        .resolve(DNS_HANDLE, host_addr)
        .resolve(WEB_DOMAIN, host_addr)
        .resolve(NOBODY, host_addr)
        .resolve(OVERSIZED_HANDLE, host_addr)
        .build()
        .unwrap();

    let dns = StaticDns::default()
        .with(
            &format!("_atproto.{DNS_HANDLE}"),
            &["v=spf1 -all", format!("did={DNS_DID}").as_str()],
        )
        .with(&format!("_atproto.{NOBODY}"), &["did=not a did"]);

    let resolver = IdentityResolver::new(
        http.clone(),
        Arc::new(dns),
        ResolverConfig {
            plc_directory_url: format!("http://{plc_addr}"),
            discovery_scheme: "http".to_string(),
        },
    );

    let repository = Arc::new(MemorySessionRepository::new());
    let store = SessionStore::new(resolver.clone(), XrpcClient::new(http), repository.clone());

    Harness {
        pds,
        pds_url,
        plc,
        host_addr,
        resolver,
        repository,
        store,
    }
}
