//! Trackwire demo binary.

mod calculator;
mod cli;
mod config;

use std::{collections::BTreeMap, net::SocketAddr, sync::Arc};

use clap::Parser;
use eyre::{Result, ensure};
use parking_lot::Mutex;
use tracing::info;
use trackwire_net_codec::Void;
use trackwire_net_tracker::{CallContext, Hooks, SimpleTracker, TrackerConfig};
use trackwire_observability::init_logging;
use trackwire_rpc::{TcpServer, connect};

use crate::{
    calculator::{AddArgs, AddResult, Calculator, Downstream, Observed},
    cli::{CallArgs, Cli, Command, ServeArgs},
    config::AppConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.logging = config.logging.with_verbosity(cli.verbosity);
    config.logging.json |= cli.json;
    init_logging(&config.logging)?;

    match cli.command {
        Command::Serve(args) => serve(args, config.tracker).await,
        Command::Call(args) => call(args, config.tracker).await,
        Command::Chain => chain(config.tracker).await,
    }
}

async fn serve(args: ServeArgs, tracker: TrackerConfig) -> Result<()> {
    let mut calculator = Calculator::new(&args.name);
    if let Some(addr) = args.forward {
        calculator = calculator.with_downstream(Downstream {
            addr,
            tracker: TrackerConfig {
                client: args.name.clone(),
                server: addr.to_string(),
                ..tracker.clone()
            },
        });
    }

    let mut server = TcpServer::bind(args.listen, Arc::new(calculator)).await?;
    if !args.legacy {
        let tracker = TrackerConfig {
            server: args.name.clone(),
            ..tracker
        };
        server = server.with_trackers(SimpleTracker::factory(tracker, Hooks::default()));
    }
    server.run().await?;
    Ok(())
}

async fn call(args: CallArgs, tracker: TrackerConfig) -> Result<()> {
    let client_name = args
        .name
        .or_else(|| (!tracker.client.is_empty()).then(|| tracker.client.clone()))
        .unwrap_or_else(|| "trackwire-cli".to_string());
    let tracker = TrackerConfig {
        client: client_name,
        server: args.addr.to_string(),
        ..tracker
    };
    let mut client = connect(
        args.addr,
        Arc::new(SimpleTracker::new(tracker, Hooks::default())),
    )
    .await?;

    let mut ctx = CallContext::new();
    ctx.merge_meta(args.meta);

    let _: Void = client.call_with(&ctx, "ping", &Void).await?;
    println!("ping ok (tracking: {})", client.tracker().version());

    let add = AddArgs {
        num1: args.num1,
        num2: args.num2,
    };
    let sum: AddResult = client.call_with(&ctx, "add", &add).await?;
    println!("add({}, {}) = {}", add.num1, add.num2, sum.success);
    Ok(())
}

/// Start a tracking calculator on an ephemeral loopback port.
async fn spawn_calculator(calculator: Calculator, tracker: TrackerConfig) -> Result<SocketAddr> {
    let server = TcpServer::bind("127.0.0.1:0", Arc::new(calculator))
        .await?
        .with_trackers(SimpleTracker::factory(tracker, Hooks::default()));
    let addr = server.local_addr()?;
    tokio::spawn(server.run());
    Ok(addr)
}

async fn chain(tracker: TrackerConfig) -> Result<()> {
    let journal = Arc::new(Mutex::new(Vec::<Observed>::new()));
    let config = |client: &str, server: &str| TrackerConfig {
        client: client.to_string(),
        server: server.to_string(),
        ..tracker.clone()
    };

    let c_addr = spawn_calculator(
        Calculator::new("server-C").with_journal(Arc::clone(&journal)),
        config("server-B", "server-C"),
    )
    .await?;
    let b_addr = spawn_calculator(
        Calculator::new("server-B")
            .with_journal(Arc::clone(&journal))
            .with_downstream(Downstream {
                addr: c_addr,
                tracker: config("server-B", "server-C"),
            }),
        config("server-A", "server-B"),
    )
    .await?;
    info!(%b_addr, %c_addr, "Chain ready");

    let mut client = connect(
        b_addr,
        Arc::new(SimpleTracker::new(config("server-A", "server-B"), Hooks::default())),
    )
    .await?;
    let ctx = CallContext::new().with_meta("server-A", "add");
    let sum: AddResult = client
        .call_with(&ctx, "add", &AddArgs { num1: 1, num2: 2 })
        .await?;
    println!("server-A: add(1, 2) = {}", sum.success);

    let journal = journal.lock().clone();
    for seen in &journal {
        let meta: BTreeMap<_, _> = seen.ctx.meta().iter().collect();
        println!(
            "{}: {} request_id={} seq={} meta={:?}",
            seen.server,
            seen.method,
            seen.ctx.request_id().unwrap_or("-"),
            seen.ctx.sequence().unwrap_or("-"),
            meta,
        );
    }

    let sequences: Vec<_> = journal.iter().map(|seen| seen.ctx.sequence()).collect();
    ensure!(
        sequences == [Some("1"), Some("1.2")],
        "unexpected sequences along the chain: {sequences:?}"
    );
    let request_id = journal.first().and_then(|seen| seen.ctx.request_id());
    ensure!(
        journal.iter().all(|seen| seen.ctx.request_id() == request_id),
        "request id changed along the chain"
    );
    Ok(())
}
