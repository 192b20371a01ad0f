use std::net::{IpAddr, SocketAddr, TcpStream};

use anyhow::Context;
use clap::Parser;
use vcalc::client::ClientUser;
use vcalc::message::AuthGrammar;

// Client that authenticates with a server and prints the sum of squares of a few vectors.
//
// The vectors are fixed so the output can be checked by hand:
// [1, 2, 3] gives 14 and [0.5, -0.5] gives 0.5.

#[derive(Parser)]
#[command(name = "vcalc-client", about = "Sends a batch of vectors to a vcalc server")]
struct Args {
    /// Address of the server
    server_ip: IpAddr,

    /// Port of the server
    port: u16,

    /// Login to authenticate as
    login: String,

    /// Password for the login
    password: String,

    /// Send the legacy fixed offset auth message, which needs a 4 character login
    #[arg(long)]
    legacy: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let vectors = [vec![1.0_f32, 2.0, 3.0], vec![0.5, -0.5]];

    let grammar = if args.legacy {
        AuthGrammar::FixedOffset
    } else {
        AuthGrammar::Delimited
    };

    let address = SocketAddr::new(args.server_ip, args.port);
    let stream =
        TcpStream::connect(address).with_context(|| format!("unable to connect to {}", address))?;

    let user = ClientUser::new(args.login.as_str(), &args.password)?;
    println!("Salt: {}", user.claim().salt().as_str());

    let client = user
        .authenticate(stream, grammar)
        .context("authentication failed")?;
    println!("Authenticated");

    let results = client.compute(&vectors).context("batch failed")?;

    for (vector, result) in vectors.iter().zip(results) {
        println!("{:?} -> {}", vector, result);
    }

    Ok(())
}
