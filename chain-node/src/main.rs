use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chain_core::{address_from_private_key, Address, Amount, BlockCert, Network, Transaction};
use chain_db::MemoryDatabase;
use chain_node::{Blockchain, NodeConfig, StatelessTxValidator, StaticValidators, TxPool};

#[derive(Parser)]
#[command(author, version, about = "Single-node sortition chain devnet")]
struct Cli {
    /// TOML node configuration; defaults are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured network
    #[arg(long)]
    network: Option<Network>,

    /// Number of rounds to run
    #[arg(long, default_value_t = 10)]
    rounds: u64,

    /// Override the proposer threshold
    #[arg(long)]
    threshold: Option<f64>,

    /// Hex secp256k1 identity key; random when absent
    #[arg(long, env = "CHAIN_IDENTITY_KEY")]
    key: Option<String>,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn identity_key(hex_key: Option<&str>) -> Result<[u8; 32]> {
    if let Some(hex_key) = hex_key {
        let bytes = hex::decode(hex_key.trim_start_matches("0x")).context("identity key is not hex")?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow!("identity key must be 32 bytes"))?;
        address_from_private_key(&key).context("identity key is not a valid secp256k1 key")?;
        return Ok(key);
    }
    loop {
        let key: [u8; 32] = rand::random();
        if address_from_private_key(&key).is_ok() {
            return Ok(key);
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let mut config = match &cli.config {
        Some(path) => NodeConfig::load_from_file(path)?,
        None => NodeConfig::default(),
    };
    if let Some(network) = cli.network {
        config.network = network;
    }
    if let Some(threshold) = cli.threshold {
        config.consensus.proposer_threshold = threshold;
    }

    let key = identity_key(cli.key.as_deref())?;
    let pool = Arc::new(TxPool::default());
    let chain = Blockchain::new(
        config,
        Arc::new(MemoryDatabase::new()),
        pool.clone(),
        Arc::new(StaticValidators::default()),
        Arc::new(StatelessTxValidator),
    )?;
    chain.initialize_chain(&key)?;
    let coinbase = chain.coinbase().ok_or_else(|| anyhow!("node identity missing"))?;
    let sink = Address::new([0xde; 20]);

    for _ in 0..cli.rounds {
        let round = chain.round()?;

        // spend part of the earned rewards so blocks carry transactions
        let account = chain.account(&coinbase);
        if pool.is_empty() && !account.balance.is_zero() {
            let tx = Transaction::send(account.nonce + 1, sink, Amount::from_u64(1)).signed(&key)?;
            pool.add(tx)?;
        }

        let sortition = chain.proposer_sortition()?;
        let block = if sortition.eligible {
            chain.propose_block(&sortition.proof, &sortition.output)?
        } else {
            chain.generate_empty_block()?
        };
        let hash = block.hash()?;
        let empty = block.is_empty();
        chain.add_block(block)?;
        chain.write_final_consensus(
            &hash,
            &BlockCert {
                round,
                signatures: Vec::new(),
            },
        )?;

        info!(round, hash = %hash, empty, fraction = sortition.fraction, "Round finished");
    }

    info!(
        height = chain.round()? - 1,
        root = %chain.state_root()?,
        coinbase = %coinbase,
        balance = %chain.account(&coinbase).balance,
        "Devnet finished"
    );
    Ok(())
}
