//! Holder CLI for the veil vault.
//!
//! Run with:
//!   cargo run --bin veil -- --config veil.toml <command>

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::{Address, U256};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use veil_vault::adapters::ethereum::EthereumLedger;
use veil_vault::adapters::file_store::FileRecordStore;
use veil_vault::adapters::memory_ledger::{InMemoryLedger, LedgerParams};
use veil_vault::adapters::mock_prover::MockProver;
use veil_vault::adapters::snarkjs_prover::SnarkjsProver;
use veil_vault::config::{ConfigError, LedgerBackend, ProverBackend, VaultConfig};
use veil_vault::domain::amount::{parse_tokens, BASE_UNITS_PER_TOKEN};
use veil_vault::domain::commitment::Commitment;
use veil_vault::domain::credential::SignedCredential;
use veil_vault::issuer::{CredentialIssuer, IssuerError};
use veil_vault::ports::ledger::{Ledger, LedgerError};
use veil_vault::ports::prover::ProofService;
use veil_vault::vault::{VaultClient, VaultError, VaultSettings};

#[derive(Parser)]
#[command(name = "veil", about = "Private deposits with provable yield")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "./veil.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Issue a KYC credential and write it as JSON.
    Issue {
        #[arg(long)]
        holder: Address,
        /// ISO 3166-1 numeric country code.
        #[arg(long)]
        country: u16,
        #[arg(long)]
        accredited: bool,
        #[arg(long)]
        out: PathBuf,
    },
    #[command(flatten)]
    Vault(VaultCommand),
}

/// Commands that need a ledger, a prover and the record store.
#[derive(Subcommand)]
enum VaultCommand {
    /// Prove a stored credential satisfies the configured KYC policy.
    Kyc {
        #[arg(long)]
        credential: PathBuf,
        /// Where to write the proof bundle (JSON).
        #[arg(long)]
        out: PathBuf,
    },
    /// Deposit a token amount (decimal, e.g. "100" or "12.5").
    Deposit {
        #[arg(long)]
        amount: String,
    },
    /// Show the yield a deposit has accrued so far.
    Estimate {
        #[arg(long)]
        commitment: Commitment,
    },
    /// Claim accrued yield on a deposit.
    Claim {
        #[arg(long)]
        commitment: Commitment,
        #[arg(long)]
        recipient: Address,
    },
    /// List stored deposits with their ledger status.
    Status,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("issuer error: {0}")]
    Issuer(#[from] IssuerError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn missing(field: &str) -> CliError {
    CliError::Config(ConfigError::Validation(format!("{field} is required")))
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let command = match args.command {
        // Issuance needs neither ledger nor prover.
        Command::Issue {
            holder,
            country,
            accredited,
            out,
        } => {
            let signed = CredentialIssuer::default().issue(holder, country, accredited, unix_now())?;
            std::fs::write(&out, serde_json::to_vec_pretty(&signed)?)?;
            info!("Credential written to {}", out.display());
            info!("  issuer commitment: {}", signed.issuer_commitment.0);
            return Ok(());
        }
        Command::Vault(command) => command,
    };

    let config = VaultConfig::load(&args.config)?;
    let settings = VaultSettings {
        scaling: config.client.scaling,
        prove_timeout: Some(config.prover.timeout),
        allowed_country: config.client.allowed_country,
    };
    let store = FileRecordStore::new(&config.client.records_path);

    match (config.ledger.backend, config.prover.backend) {
        (LedgerBackend::Memory, backend) => {
            warn!("In-memory ledger: registrations last only for this process");
            let ledger = InMemoryLedger::new(LedgerParams {
                min_deposit: U256::from(config.ledger.min_deposit)
                    * BASE_UNITS_PER_TOKEN,
                max_deposit: U256::from(config.ledger.max_deposit)
                    * BASE_UNITS_PER_TOKEN,
                yield_rate_bps: config.ledger.yield_rate_bps,
            });
            with_prover(backend, &config, ledger, store, settings, command).await
        }
        (LedgerBackend::Ethereum, backend) => {
            let rpc_url = config.ledger.rpc_url.as_deref().ok_or_else(|| missing("ledger.rpc_url"))?;
            let private_key = config
                .ledger
                .private_key
                .as_deref()
                .ok_or_else(|| missing("ledger.private_key"))?;
            let vault = config
                .ledger
                .vault_address
                .ok_or_else(|| missing("ledger.vault_address"))?;
            let ledger = EthereumLedger::new(rpc_url, private_key, vault).await?;
            with_prover(backend, &config, ledger, store, settings, command).await
        }
    }
}

async fn with_prover<L: Ledger>(
    backend: ProverBackend,
    config: &VaultConfig,
    ledger: L,
    store: FileRecordStore,
    settings: VaultSettings,
    command: VaultCommand,
) -> Result<(), CliError> {
    match backend {
        ProverBackend::Mock => {
            warn!("Mock prover: proofs are not accepted by an on-chain verifier");
            run(VaultClient::new(ledger, MockProver::new(), store, settings), command).await
        }
        ProverBackend::Snarkjs => {
            let prover = SnarkjsProver::new(&config.prover.snarkjs, &config.prover.artifacts_dir);
            run(VaultClient::new(ledger, prover, store, settings), command).await
        }
    }
}

async fn run<L: Ledger, P: ProofService>(
    client: VaultClient<L, P, FileRecordStore>,
    command: VaultCommand,
) -> Result<(), CliError> {
    let now = unix_now();
    match command {
        VaultCommand::Kyc { credential, out } => {
            let signed: SignedCredential = serde_json::from_slice(&std::fs::read(&credential)?)?;
            let bundle = client.prove_kyc(&signed, now).await?;
            std::fs::write(&out, serde_json::to_vec_pretty(&bundle)?)?;
            info!("KYC proof written to {}", out.display());
        }
        VaultCommand::Deposit { amount } => {
            let base = parse_tokens(&amount).map_err(VaultError::from)?;
            let outcome = client.deposit(base, now).await?;
            if let Some(w) = outcome.warning {
                warn!("{} base units were not committed", w.truncated);
            }
            info!("Deposited {} tokens", outcome.record.balance_whole);
            info!("  commitment: {}", outcome.record.commitment);
            info!("  tx: {}", outcome.receipt.tx_hash);
            info!("  record saved to {}", client.store().path().display());
        }
        VaultCommand::Estimate { commitment } => {
            let est = client.estimate(commitment, now).await?;
            info!("Deposit {}", est.commitment);
            info!("  elapsed: {}s at {} bps", est.elapsed_secs, est.rate_bps);
            info!("  accrued: {} tokens (annual {})", est.accrued, est.annual);
        }
        VaultCommand::Claim {
            commitment,
            recipient,
        } => {
            let outcome = client.claim_yield(commitment, recipient, now).await?;
            info!("Claimed {} tokens to {recipient}", outcome.claim.claimed_yield);
            info!("  nullifier: {}", outcome.claim.nullifier);
            info!("  tx: {}", outcome.receipt.tx_hash);
        }
        VaultCommand::Status => {
            let rows = client.status(now).await?;
            if rows.is_empty() {
                info!("No deposits recorded");
            }
            for row in rows {
                info!(
                    "{}  {} tokens  deposited {}  registered={}  accrued={}",
                    row.record.commitment,
                    row.record.balance_whole,
                    row.record.deposit_timestamp,
                    row.registered,
                    row.accrued
                );
            }
        }
    }
    Ok(())
}
