use clap::{Args, Subcommand};
use std::path::PathBuf;

use scopelink_bridge::DEFAULT_BASE_PATH;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod listen;
pub mod run;
pub mod send;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Host a bridge instance and print packets arriving from the peer.
    Run(RunArgs),
    /// Connect to a bridge's RX endpoint as the host application and send
    /// one packet.
    Send(SendArgs),
    /// Connect to a bridge's TX endpoint and print transmitted packets.
    Listen(ListenArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Bridge instance name; endpoint identities derive from it.
    pub name: String,
    /// Base path the channel identities are created under.
    #[arg(long, default_value = DEFAULT_BASE_PATH)]
    pub base_path: PathBuf,
    /// Enqueue one self-test packet after starting.
    #[arg(long)]
    pub test_packet: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Bridge instance name to connect to.
    pub name: String,
    /// Base path the channel identities live under.
    #[arg(long, default_value = DEFAULT_BASE_PATH)]
    pub base_path: PathBuf,
    /// Command field of the packet.
    #[arg(long, short = 'c', default_value = "1")]
    pub command: u16,
    /// Packet id field of the packet.
    #[arg(long, default_value = "0")]
    pub packet_id: u16,
    /// UTF-8 string payload.
    #[arg(long, conflicts_with = "hex")]
    pub data: Option<String>,
    /// Hex-encoded payload (e.g. "01 02 0A").
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Bridge instance name to connect to.
    pub name: String,
    /// Base path the channel identities live under.
    #[arg(long, default_value = DEFAULT_BASE_PATH)]
    pub base_path: PathBuf,
    /// Exit after receiving N packets.
    #[arg(long)]
    pub count: Option<usize>,
}
