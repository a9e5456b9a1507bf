//! Driver binary that exercises [`memcache_core::Client`] against a set of
//! configured servers and reports round-trip latency. Generalized from the
//! teacher's `t51server`, which was itself never more than a minimal binary
//! for poking at `t51core` — this keeps that role but points it at the
//! memcached client core instead of the ECS networking stack.

use clap::Parser;
use memcache_core::{Client, Config, Outcome, ServerSpec};
use std::time::Instant;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Exercise a memcache-compatible client against a set of servers and report latency.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Server addresses, e.g. `127.0.0.1:11211` or `/var/run/memcached.sock`. Repeat for
    /// multiple servers.
    #[arg(long = "server", required = true)]
    servers: Vec<String>,

    /// Key namespace prefix.
    #[arg(long, default_value = "")]
    namespace: String,

    /// Number of distinct keys to set then get.
    #[arg(long, default_value_t = 1000)]
    keys: usize,

    /// Value size in bytes for each stored key.
    #[arg(long, default_value_t = 100)]
    value_size: usize,

    /// Enable Ketama consistent hashing with this many points per unit weight (0 = legacy
    /// weighted selector).
    #[arg(long, default_value_t = 0)]
    ketama_points: u32,

    /// Per-batch I/O timeout in seconds (0 = unbounded).
    #[arg(long, default_value_t = 1.0)]
    io_timeout: f64,

    /// Run the whole key set as one multi-key batch instead of one call per key.
    #[arg(long)]
    batch: bool,
}

fn main() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .compact()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let cli = Cli::parse();

    let config = Config {
        servers: cli.servers.iter().map(|s| ServerSpec::Bare(s.clone())).collect(),
        namespace: cli.namespace.clone(),
        ketama_points: cli.ketama_points,
        io_timeout: cli.io_timeout,
        ..Config::default()
    };

    let mut client = match Client::new(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let keys: Vec<String> = (0..cli.keys).map(|i| format!("bench-{}", i)).collect();
    let value = vec![b'x'; cli.value_size];

    let set_started = Instant::now();
    let mut set_failures = 0usize;
    for key in &keys {
        if !matches!(client.set(key, &value, 0), Outcome::Ok(true)) {
            set_failures += 1;
        }
    }
    let set_elapsed = set_started.elapsed();

    let get_started = Instant::now();
    let mut get_misses = 0usize;
    let mut get_failures = 0usize;

    if cli.batch {
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        for outcome in client.get_multi::<Vec<u8>>(&refs) {
            match outcome {
                Outcome::Ok(_) => {}
                Outcome::Miss => get_misses += 1,
                Outcome::Err(_) => get_failures += 1,
            }
        }
    } else {
        for key in &keys {
            match client.get::<Vec<u8>>(key) {
                Outcome::Ok(_) => {}
                Outcome::Miss => get_misses += 1,
                Outcome::Err(_) => get_failures += 1,
            }
        }
    }
    let get_elapsed = get_started.elapsed();

    println!("servers:        {}", cli.servers.join(", "));
    println!("keys:           {}", cli.keys);
    println!("value size:     {} bytes", cli.value_size);
    println!(
        "set:            {:?} total, {:?}/op, {} failed",
        set_elapsed,
        set_elapsed / cli.keys.max(1) as u32,
        set_failures
    );
    println!(
        "get{}:           {:?} total, {:?}/op, {} miss, {} failed",
        if cli.batch { " (batched)" } else { "" },
        get_elapsed,
        get_elapsed / cli.keys.max(1) as u32,
        get_misses,
        get_failures
    );
}
