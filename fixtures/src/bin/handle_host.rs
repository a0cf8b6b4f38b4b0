use clap::Parser;
use fixtures::handle_host::HandleHostFixture;
use fixtures::{env_or, run_server, FixtureArgs};

/// Serves `/.well-known/atproto-did` for one handle
#[derive(Parser, Debug)]
#[clap(name = "handle-host-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let handle = env_or("FIXTURE_HANDLE", "fixture-user.test");
    let did = env_or("FIXTURE_DID", "did:plc:abcdefg");

    let host = HandleHostFixture::new().with_handle(&handle, &did);

    run_server(args.common, host.router()).await
}
