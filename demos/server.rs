use std::fs::OpenOptions;
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vcalc::event::TracingSink;
use vcalc::server::{serve, ServerContext};
use vcalc::users::UserDatabase;
use vcalc::vector::Limits;
use vcalc::{MAXIMUM_VECTORS, MAXIMUM_VECTOR_LENGTH};

// Server that authenticates clients against a user file and answers one batch per connection.
//
// The user file has one `login:password` per line.
// Connections are handled one at a time, a second client waits until the first is done.
// Set RUST_LOG=debug to also log successful connections.

#[derive(Parser)]
#[command(name = "vcalc-server", about = "Authenticated sum of squares server")]
struct Args {
    /// User database with one `login:password` per line
    #[arg(short = 'd', long = "database", default_value = "/etc/vcalc.conf")]
    database: PathBuf,

    /// File errors are appended to
    #[arg(short = 'l', long = "log", default_value = "/var/log/vcalc.log")]
    log: PathBuf,

    /// Port to listen on
    #[arg(short = 'p', long = "port", default_value_t = 33333)]
    port: u16,

    /// Largest number of vectors accepted in a batch
    #[arg(long, default_value_t = MAXIMUM_VECTORS)]
    max_vectors: u32,

    /// Largest number of elements accepted in a single vector
    #[arg(long, default_value_t = MAXIMUM_VECTOR_LENGTH)]
    max_vector_length: u32,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.log)
        .with_context(|| format!("unable to open log file '{}'", args.log.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(log))
        .with_ansi(false)
        .with_target(false)
        .init();

    let users = match UserDatabase::from_file(&args.database) {
        Ok(users) => users,
        Err(e) => {
            tracing::error!(critical = true, "{}", e);
            return Err(e.into());
        }
    };
    if users.is_empty() {
        tracing::warn!(critical = false, "user database contains no users");
    }

    let limits = Limits {
        max_vectors: args.max_vectors,
        max_vector_length: args.max_vector_length,
    };
    let ctx = ServerContext::new(users, TracingSink, limits);

    let address = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, args.port);
    let listener = TcpListener::bind(address)
        .with_context(|| format!("unable to start TCP server on {}", args.port))?;

    tracing::info!(
        %address,
        users = ctx.users().len(),
        max_vectors = limits.max_vectors,
        max_vector_length = limits.max_vector_length,
        "server started"
    );

    serve(&listener, &ctx);

    Ok(())
}
