use clap::Parser;
use fixtures::pds::PdsFixture;
use fixtures::{env_or, run_server, FixtureArgs};
use tracing::info;

/// PDS (Personal Data Server) fixture server
#[derive(Parser, Debug)]
#[clap(name = "pds-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let handle = env_or("FIXTURE_HANDLE", "fixture-user.test");
    let did = env_or("FIXTURE_DID", "did:plc:abcdefg");
    let password = env_or("FIXTURE_PASSWORD", "password");
    info!("Serving account {} ({})", handle, did);

    let pds = PdsFixture::new().with_account(&handle, &did, &password);

    run_server(args.common, pds.router()).await
}
