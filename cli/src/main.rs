//! chainstream CLI: follow NEAR contract events from the terminal.
//!
//! Usage:
//! ```bash
//! # Print every event usdt.tether-token.near emits from now on
//! chainstream watch --account usdt.tether-token.near
//!
//! # Only ft_transfer events, against testnet
//! chainstream watch --account token.testnet --event ft_transfer --network testnet
//!
//! # Scan a fixed range
//! chainstream history --account usdt.tether-token.near --from 120000000 --to 120000100
//!
//! # Parse EVENT_JSON log lines from stdin
//! echo 'EVENT_JSON:{"event":"ft_mint"}' | chainstream parse
//! ```
//!
//! The endpoint is taken from `--url`, then `NEAR_RPC_URL`, then `--network`
//! (default mainnet). Logs go to stderr and honour `RUST_LOG`.

use std::env;
use std::io::BufRead;
use std::process;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use tracing_subscriber::EnvFilter;

use chainstream_core::extractor::parse_event_line;
use chainstream_core::processor::{Network, ProcessorConfig};
use chainstream_near::{
    handler_fn, DispatchContext, EventRecord, HistoryQuery, NearJsonRpc, NearRpcClient, ProcessorBuilder,
};
use chainstream_rpc::{HttpClientConfig, HttpRpcClient};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    init_tracing();

    let result = match args[1].as_str() {
        "watch" => cmd_watch(&args[2..]).await,
        "history" => cmd_history(&args[2..]).await,
        "parse" => cmd_parse(),
        "info" => cmd_info(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("chainstream {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_usage() {
    println!("chainstream {}", env!("CARGO_PKG_VERSION"));
    println!("Follow NEAR contract events (NEP-297 EVENT_JSON logs)\n");
    println!("USAGE:");
    println!("    chainstream <COMMAND>\n");
    println!("COMMANDS:");
    println!("    watch     Stream events of an account until Ctrl-C");
    println!("    history   Scan a height range for events of an account");
    println!("    parse     Parse EVENT_JSON log lines from stdin");
    println!("    info      Show the endpoint's head and the effective config");
    println!("    version   Print version");
    println!("    help      Print this help\n");
    println!("ENDPOINT FLAGS (all commands but parse):");
    println!("    --url <URL>           RPC endpoint (or NEAR_RPC_URL)");
    println!("    --network <NAME>      mainnet | testnet  [default: mainnet]\n");
    println!("WATCH FLAGS:");
    println!("    --account <ID>        Contract account to watch  [required]");
    println!("    --event <NAME>        Only this event name");
    println!("    --poll-ms <MS>        Poll interval  [default: 1000]");
    println!("    --max-failures <N>    Consecutive status failures before giving up  [default: 10]\n");
    println!("HISTORY FLAGS:");
    println!("    --account <ID>        Contract account  [required]");
    println!("    --from <HEIGHT>       First height  [default: to - 999]");
    println!("    --to <HEIGHT>         Last height  [default: head]");
    println!("    --event <NAME>        Only this event name");
    println!("    --limit <N>           Max events  [default: 100]");
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn cmd_watch(args: &[String]) -> Result<()> {
    let account = parse_flag(args, "--account").ok_or_else(|| anyhow!("--account is required"))?;
    let event = parse_flag(args, "--event");

    let mut builder = ProcessorBuilder::from_config(endpoint_config(args)?);
    if let Some(ms) = parse_num::<u64>(args, "--poll-ms")? {
        builder = builder.poll_interval_ms(ms);
    }
    if let Some(n) = parse_num::<u32>(args, "--max-failures")? {
        builder = builder.max_consecutive_failures(n);
    }
    let processor = builder.build()?;

    let printer = handler_fn(|event, ctx| {
        println!("{}", event_line(event, ctx));
        Ok(())
    });
    match &event {
        Some(name) => processor.subscribe(account.as_str(), name.as_str(), printer),
        None => processor.subscribe_all(account.as_str(), printer),
    };

    processor.start(None).await?;
    tracing::info!(
        endpoint = %processor.endpoint(),
        %account,
        event = event.as_deref().unwrap_or("*"),
        "watching (Ctrl-C to stop)"
    );

    let outcome = tokio::select! {
        result = processor.join() => result,
        _ = tokio::signal::ctrl_c() => {
            processor.stop();
            Ok(())
        }
    };

    let stats = processor.stats();
    tracing::info!(
        heights = stats.heights_scanned,
        events = stats.events_dispatched,
        skipped = stats.skipped_items,
        "watch finished"
    );
    outcome.map_err(Into::into)
}

async fn cmd_history(args: &[String]) -> Result<()> {
    let account = parse_flag(args, "--account").ok_or_else(|| anyhow!("--account is required"))?;

    let mut query = HistoryQuery::new();
    if let Some(from) = parse_num::<u64>(args, "--from")? {
        query = query.from_block(from);
    }
    if let Some(to) = parse_num::<u64>(args, "--to")? {
        query = query.to_block(to);
    }
    if let Some(limit) = parse_num::<usize>(args, "--limit")? {
        query = query.limit(limit);
    }
    if let Some(name) = parse_flag(args, "--event") {
        query = query.event_name(name);
    }

    let processor = ProcessorBuilder::from_config(endpoint_config(args)?).build()?;
    let events = processor.query_history(&account, query).await?;
    for scanned in &events {
        println!("{}", event_line(&scanned.event, &scanned.context));
    }
    eprintln!("{} event(s)", events.len());
    Ok(())
}

fn cmd_parse() -> Result<()> {
    let stdin = std::io::stdin();
    let (mut found, mut malformed) = (0usize, 0usize);
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        match parse_event_line(line.trim_end()) {
            Ok(Some(record)) => {
                found += 1;
                println!("{}", serde_json::to_string(&record)?);
            }
            Ok(None) => {}
            Err(e) => {
                malformed += 1;
                eprintln!("{e}");
            }
        }
    }
    eprintln!("{found} event(s), {malformed} malformed");
    Ok(())
}

async fn cmd_info(args: &[String]) -> Result<()> {
    let config = endpoint_config(args)?;
    let http = HttpClientConfig {
        request_timeout_ms: config.request_timeout_ms,
        ..Default::default()
    };
    let client = NearJsonRpc::new(HttpRpcClient::new(&config.rpc_url, http)?);

    let start = std::time::Instant::now();
    let status = client.status().await?;
    let latency = start.elapsed();

    println!("Endpoint:     {}", client.endpoint());
    println!("Head height:  {}", status.head());
    if let Some(hash) = &status.sync_info.latest_block_hash {
        println!("Head hash:    {hash}");
    }
    println!("Latency:      {}ms", latency.as_millis());
    println!("Config:");
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Default config with the endpoint resolved from flags and environment.
fn endpoint_config(args: &[String]) -> Result<ProcessorConfig> {
    let network = match parse_flag(args, "--network") {
        Some(name) => Network::from_str(&name)?,
        None => Network::Mainnet,
    };
    let mut config = ProcessorConfig::for_network(network);
    if let Some(url) = parse_flag(args, "--url").or_else(|| env::var("NEAR_RPC_URL").ok()) {
        config.rpc_url = url;
    }
    config.validate()?;
    Ok(config)
}

fn event_line(event: &EventRecord, ctx: &DispatchContext) -> serde_json::Value {
    serde_json::json!({
        "block_height": ctx.block_height,
        "receipt_id": ctx.receipt_id,
        "contract_id": ctx.contract_id,
        "standard": event.standard,
        "version": event.version,
        "event": event.event,
        "data": event.data,
    })
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn parse_num<T: FromStr>(args: &[String], flag: &str) -> Result<Option<T>> {
    match parse_flag(args, flag) {
        Some(raw) => match raw.parse() {
            Ok(n) => Ok(Some(n)),
            Err(_) => bail!("{flag} expects a number, got {raw:?}"),
        },
        None => Ok(None),
    }
}
