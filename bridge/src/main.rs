use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};
use num_bigint::BigUint;
use tracing::info;

use skybridge::session::SessionError;
use skybridge::state::AppState;
use skybridge::telemetry::{setup_sentry, setup_tracing, shutdown_tracing};
use skybridge::{codec, encryption};

/// Operator tooling for the legacy-client bridge
#[derive(Parser, Debug)]
#[clap(name = "skybridge")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a handle to its DID and PDS
    Resolve { handle: String },
    /// Log in and print the opaque client token
    Login {
        handle: String,
        #[arg(long, env = "SKYBRIDGE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Resolve an opaque client token to a live session
    Session { token: String },
    /// Print a fresh 256-bit session key
    GenerateKey,
    /// Convert between TIDs and numbers
    Tid {
        #[clap(subcommand)]
        action: TidAction,
    },
    /// Convert between identifiers and compact integers
    Compact {
        #[clap(subcommand)]
        direction: Direction,
    },
}

#[derive(Subcommand, Debug)]
enum Direction {
    Encode { value: String },
    Decode { value: String },
}

#[derive(Subcommand, Debug)]
enum TidAction {
    Encode { value: String },
    Decode { value: String },
    /// Show the timestamp and clock id inside a TID
    Inspect { value: String },
    /// Mint a TID for the current time
    Now {
        #[arg(long, default_value = "0")]
        clock_id: u16,
    },
}

fn main() -> color_eyre::Result<()> {
    let _sentry_guard = setup_sentry();
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?
        .block_on(async { run(Cli::parse()).await })
}

async fn run(cli: Cli) -> color_eyre::Result<()> {
    setup_tracing("skybridge")?;

    let result = dispatch(cli.command).await;
    shutdown_tracing();
    result
}

async fn dispatch(command: Command) -> color_eyre::Result<()> {
    match command {
        Command::GenerateKey => println!("{}", encryption::generate_key()?),
        Command::Tid { action } => println!("{}", tid(action)?),
        Command::Compact { direction } => println!("{}", compact(direction)?),
        Command::Resolve { handle } => {
            let state = AppState::from_env().await?;
            let identity = state.resolver.resolve_handle(&handle).await?;
            println!("did: {}", identity.did);
            println!("pds: {}", identity.pds);
        }
        Command::Login { handle, password } => {
            let state = AppState::from_env().await?;
            let token = state
                .sessions()?
                .authenticate(&handle, &password)
                .await
                .map_err(classified)?;
            info!("Session created for {}", handle);
            println!("{token}");
        }
        Command::Session { token } => {
            let state = AppState::from_env().await?;
            let sessions = state.sessions()?;
            let live = sessions.resolve_session(&token).await.map_err(classified)?;
            let pds = sessions
                .service_endpoint(&live.did)
                .await
                .map_err(classified)?;
            println!("did: {}", live.did);
            println!("pds: {}", pds);
            println!("access expires at: {}", live.access_expires_at);
        }
    }

    Ok(())
}

fn classified(err: SessionError) -> color_eyre::Report {
    let kind = err.kind();
    color_eyre::Report::new(err).wrap_err(format!("session error ({kind})"))
}

fn tid(action: TidAction) -> color_eyre::Result<String> {
    match action {
        TidAction::Encode { value } => {
            let n = value
                .parse::<u64>()
                .wrap_err_with(|| format!("{value} is not a 64-bit number"))?;
            Ok(codec::number_to_tid(n)?)
        }
        TidAction::Decode { value } => Ok(codec::tid_to_number(&value)?.to_string()),
        TidAction::Inspect { value } => {
            let n = codec::tid_to_number(&value)?;
            let micros = codec::tid_timestamp(n);
            let at = chrono::DateTime::from_timestamp_micros(micros as i64)
                .ok_or_else(|| eyre!("{value} carries an out-of-range timestamp"))?;
            Ok(format!(
                "timestamp: {}\nclock id: {}",
                at.to_rfc3339(),
                codec::tid_clock_id(n)
            ))
        }
        TidAction::Now { clock_id } => {
            let micros = chrono::Utc::now().timestamp_micros();
            let micros = u64::try_from(micros).wrap_err("system clock is before the epoch")?;
            Ok(codec::number_to_tid(codec::tid_from_timestamp(micros, clock_id)?)?)
        }
    }
}

fn compact(direction: Direction) -> color_eyre::Result<String> {
    match direction {
        Direction::Encode { value } => Ok(codec::string_to_int(&value).to_string()),
        Direction::Decode { value } => {
            let n = value
                .parse::<BigUint>()
                .map_err(|e| eyre!("{} is not a decimal integer: {}", value, e))?;
            Ok(codec::int_to_string(&n))
        }
    }
}
