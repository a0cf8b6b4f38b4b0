use clap::Parser;
use fixtures::plc_directory::PlcDirectoryFixture;
use fixtures::{env_or, require_env_var, run_server, FixtureArgs};

/// PLC Directory fixture server
#[derive(Parser, Debug)]
#[clap(name = "plc-directory-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Get URL of the PDS fixture
    let pds_url = require_env_var("PDS_URL", args.common.force, "http://localhost:3001")?;
    let handle = env_or("FIXTURE_HANDLE", "fixture-user.test");
    let did = env_or("FIXTURE_DID", "did:plc:abcdefg");

    let plc = PlcDirectoryFixture::new().with_account(&did, &handle, &pds_url);

    run_server(args.common, plc.router()).await
}
