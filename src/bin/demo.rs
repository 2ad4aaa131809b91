//! Veil Vault Protocol Demo
//!
//! Runs the credential, deposit and yield flows in-process against the
//! in-memory ledger and the mock prover. No circuits or chain required.
//!
//! Run with: `cargo run --bin demo`

use alloy::primitives::{Address, U256};

use veil_vault::adapters::memory_ledger::{InMemoryLedger, LedgerParams};
use veil_vault::adapters::memory_store::InMemoryRecordStore;
use veil_vault::adapters::mock_prover::MockProver;
use veil_vault::domain::amount::BASE_UNITS_PER_TOKEN;
use veil_vault::domain::yield_rule::SECONDS_PER_YEAR;
use veil_vault::issuer::{AllowedCountries, CredentialIssuer};
use veil_vault::ports::ledger::LedgerAdmin;
use veil_vault::vault::{VaultClient, VaultSettings};

const GENESIS: u64 = 1_700_000_000;

fn short(bytes: &[u8]) -> String {
    format!("0x{}...", &hex::encode(bytes)[..16])
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("=== Veil Vault: Private Deposits with Provable Yield ===");
    println!("=== Protocol Demo (mock prover, in-memory ledger) ===\n");

    let holder: Address = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb5".parse().unwrap();
    let client = VaultClient::new(
        InMemoryLedger::with_time(LedgerParams::default(), GENESIS),
        MockProver::new(),
        InMemoryRecordStore::new(),
        VaultSettings::default(),
    );

    scenario_kyc(&client, holder).await;
    println!("\n{}\n", "=".repeat(60));
    scenario_deposit_and_claim(&client, holder).await;

    println!("\n=== All scenarios completed successfully ===");
}

type DemoClient = VaultClient<InMemoryLedger, MockProver, InMemoryRecordStore>;

async fn scenario_kyc(client: &DemoClient, holder: Address) {
    println!("--- Scenario 1: KYC credential ---\n");

    let issuer = CredentialIssuer::default();
    let signed = issuer
        .issue(holder, AllowedCountries::USA, true, GENESIS)
        .unwrap();
    println!("[Issue] Credential for {holder}");
    println!("  country: {}", signed.credential.country_code);
    println!("  expiry:  {}", signed.credential.expiry);
    println!("  issuer commitment: {}", short(signed.issuer_commitment.0.as_slice()));

    let proof = client.prove_kyc(&signed, GENESIS + 60).await.unwrap();
    println!("[Prove] KYC proof with {} public signals", proof.public_signals.len());

    let expired = client.prove_kyc(&signed, signed.credential.expiry).await;
    println!("[Prove] At expiry: {}", expired.unwrap_err());
}

async fn scenario_deposit_and_claim(client: &DemoClient, holder: Address) {
    println!("--- Scenario 2: Deposit → accrue → claim ---\n");

    let amount = U256::from(100u64) * BASE_UNITS_PER_TOKEN;
    let deposit = client.deposit(amount, GENESIS).await.unwrap();
    let commitment = deposit.record.commitment;
    println!("[Deposit] 100 tokens");
    println!("  commitment: {}", short(commitment.as_bytes()));
    println!("  tx: {}", short(deposit.receipt.tx_hash.as_slice()));

    let dup = client
        .deposit_with_salt(amount, deposit.record.salt, GENESIS)
        .await
        .unwrap_err();
    println!("[Deposit] Same salt again: {dup} ({:?})", dup.kind());

    // Pool needs yield liquidity beyond the principal.
    client
        .ledger()
        .fund(U256::from(1_000u64) * BASE_UNITS_PER_TOKEN)
        .await;

    let one_year = GENESIS + SECONDS_PER_YEAR;
    let estimate = client.estimate(commitment, one_year).await.unwrap();
    println!(
        "\n[Estimate] After 1 year at {} bps: {} tokens",
        estimate.rate_bps, estimate.accrued
    );

    let claim = client.claim_yield(commitment, holder, one_year).await.unwrap();
    println!("[Claim] {} tokens to {holder}", claim.claim.claimed_yield);
    println!("  nullifier: {}", short(claim.claim.nullifier.as_bytes()));
    println!("  paid: {} base units", client.ledger().paid_to(holder).await);

    client.ledger().pause().await.unwrap();
    let paused = client
        .claim_yield(commitment, holder, one_year + 86_400)
        .await
        .unwrap_err();
    println!("\n[Pause] Claim while paused: {paused}");
    client.ledger().unpause().await.unwrap();

    println!("\n[Events]");
    for event in client.ledger().events().await {
        println!("  {event:?}");
    }
}
