//! Command line interface.

use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};

/// Calculator client and server speaking tracked RPC.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,

    /// Verbose mode (-v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub(crate) verbosity: u8,

    /// Use JSON format for log output.
    #[arg(long = "log.json", global = true)]
    pub(crate) json: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Run a calculator server.
    Serve(ServeArgs),
    /// Call a calculator server.
    Call(CallArgs),
    /// Run a three-hop chain in process and print what each hop saw.
    Chain,
}

#[derive(Debug, Args)]
pub(crate) struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:9090")]
    pub(crate) listen: SocketAddr,

    /// Name of this server.
    #[arg(long, default_value = "calculator")]
    pub(crate) name: String,

    /// Behave like a server that predates request tracking.
    #[arg(long)]
    pub(crate) legacy: bool,

    /// Forward every call to this calculator before answering.
    #[arg(long, value_name = "ADDR")]
    pub(crate) forward: Option<SocketAddr>,
}

#[derive(Debug, Args)]
pub(crate) struct CallArgs {
    /// Server address.
    #[arg(long, default_value = "127.0.0.1:9090")]
    pub(crate) addr: SocketAddr,

    /// Name this client reports in the handshake.
    #[arg(long)]
    pub(crate) name: Option<String>,

    /// Meta tag sent with every call.
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub(crate) meta: Vec<(String, String)>,

    /// First operand of `add`.
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub(crate) num1: i32,

    /// Second operand of `add`.
    #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
    pub(crate) num2: i32,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
