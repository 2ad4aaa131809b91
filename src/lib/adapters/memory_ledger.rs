use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::amount::BASE_UNITS_PER_TOKEN;
use crate::domain::commitment::Commitment;
use crate::domain::nullifier::Nullifier;
use crate::domain::yield_rule::BPS_DENOMINATOR;
use crate::ports::ledger::{ConsumeClaim, Ledger, LedgerAdmin, LedgerError, LedgerEvent};
use crate::ports::TxReceipt;

/// Deployment parameters of a vault ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerParams {
    /// Base units
    pub min_deposit: U256,
    /// Base units
    pub max_deposit: U256,
    pub yield_rate_bps: u32,
}

impl Default for LedgerParams {
    /// 10 to 10000 tokens at 5% a year.
    fn default() -> Self {
        Self {
            min_deposit: U256::from(10u64) * BASE_UNITS_PER_TOKEN,
            max_deposit: U256::from(10_000u64) * BASE_UNITS_PER_TOKEN,
            yield_rate_bps: 500,
        }
    }
}

struct LedgerState {
    commitments: HashSet<Commitment>,
    nullifiers: HashSet<Nullifier>,
    paused: bool,
    yield_rate_bps: u32,
    /// Tokens held by the vault (deposits plus operator funding)
    pool: U256,
    payouts: HashMap<Address, U256>,
    events: Vec<LedgerEvent>,
    timestamp: u64,
    nonce: u64,
}

impl LedgerState {
    fn receipt(&mut self, tag: &[u8], key: B256) -> TxReceipt {
        self.nonce += 1;
        let mut preimage = Vec::with_capacity(tag.len() + 40);
        preimage.extend_from_slice(tag);
        preimage.extend_from_slice(key.as_slice());
        preimage.extend_from_slice(&self.nonce.to_be_bytes());
        TxReceipt {
            tx_hash: keccak256(&preimage),
            success: true,
        }
    }

    fn ensure_unpaused(&self) -> Result<(), LedgerError> {
        if self.paused {
            Err(LedgerError::Paused)
        } else {
            Ok(())
        }
    }
}

/// In-process ledger for simulation and tests.
///
/// All state sits behind one lock, so every check-and-set is atomic and
/// concurrent duplicates see exactly one winner. Proofs are accepted as given.
pub struct InMemoryLedger {
    params: LedgerParams,
    state: Mutex<LedgerState>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl InMemoryLedger {
    pub fn new(params: LedgerParams) -> Self {
        Self::with_time(params, unix_now())
    }

    /// Ledger whose block clock starts at `timestamp` and only moves when told.
    pub fn with_time(params: LedgerParams, timestamp: u64) -> Self {
        let state = LedgerState {
            commitments: HashSet::new(),
            nullifiers: HashSet::new(),
            paused: false,
            yield_rate_bps: params.yield_rate_bps,
            pool: U256::ZERO,
            payouts: HashMap::new(),
            events: Vec::new(),
            timestamp,
            nonce: 0,
        };
        Self {
            params,
            state: Mutex::new(state),
        }
    }

    pub fn params(&self) -> &LedgerParams {
        &self.params
    }

    /// Current block timestamp.
    pub async fn timestamp(&self) -> u64 {
        self.state.lock().await.timestamp
    }

    pub async fn advance_time(&self, seconds: u64) {
        let mut state = self.state.lock().await;
        state.timestamp = state.timestamp.saturating_add(seconds);
    }

    /// Add tokens to the pool without a commitment (operator funding for yield).
    pub async fn fund(&self, amount: U256) {
        let mut state = self.state.lock().await;
        state.pool += amount;
        info!(amount = %amount, pool = %state.pool, "Vault funded");
    }

    pub async fn vault_balance(&self) -> U256 {
        self.state.lock().await.pool
    }

    /// Total paid out to `recipient` so far.
    pub async fn paid_to(&self, recipient: Address) -> U256 {
        self.state
            .lock()
            .await
            .payouts
            .get(&recipient)
            .copied()
            .unwrap_or_default()
    }

    pub async fn events(&self) -> Vec<LedgerEvent> {
        self.state.lock().await.events.clone()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(LedgerParams::default())
    }
}

impl Ledger for InMemoryLedger {
    async fn is_commitment_used(&self, commitment: Commitment) -> Result<bool, LedgerError> {
        Ok(self.state.lock().await.commitments.contains(&commitment))
    }

    async fn is_nullifier_used(&self, nullifier: Nullifier) -> Result<bool, LedgerError> {
        Ok(self.state.lock().await.nullifiers.contains(&nullifier))
    }

    async fn register_deposit(
        &self,
        amount: U256,
        commitment: Commitment,
        _proof: &Bytes,
    ) -> Result<TxReceipt, LedgerError> {
        let mut state = self.state.lock().await;
        state.ensure_unpaused()?;

        if amount < self.params.min_deposit || amount > self.params.max_deposit {
            return Err(LedgerError::DepositOutOfRange {
                amount,
                min: self.params.min_deposit,
                max: self.params.max_deposit,
            });
        }
        if !state.commitments.insert(commitment) {
            warn!(%commitment, "Duplicate deposit commitment rejected");
            return Err(LedgerError::AlreadyExists(commitment));
        }

        state.pool += amount;
        let timestamp = state.timestamp;
        state.events.push(LedgerEvent::DepositCommitted {
            commitment,
            amount,
            timestamp,
        });
        info!(%commitment, amount = %amount, timestamp, "Deposit committed");
        Ok(state.receipt(b"deposit", commitment.0))
    }

    async fn consume_yield(&self, claim: &ConsumeClaim) -> Result<TxReceipt, LedgerError> {
        let mut state = self.state.lock().await;
        state.ensure_unpaused()?;

        if !state.commitments.contains(&claim.commitment) {
            return Err(LedgerError::NotRegistered(claim.commitment));
        }
        if state.nullifiers.contains(&claim.nullifier) {
            warn!(nullifier = %claim.nullifier, "Nullifier reuse rejected");
            return Err(LedgerError::AlreadyUsed(claim.nullifier));
        }
        if claim.amount > state.pool {
            return Err(LedgerError::InsufficientPool {
                requested: claim.amount,
                available: state.pool,
            });
        }

        state.nullifiers.insert(claim.nullifier);
        state.pool -= claim.amount;
        *state.payouts.entry(claim.recipient).or_default() += claim.amount;
        let timestamp = state.timestamp;
        state.events.push(LedgerEvent::YieldClaimed {
            nullifier: claim.nullifier,
            recipient: claim.recipient,
            amount: claim.amount,
            timestamp,
        });
        info!(
            nullifier = %claim.nullifier,
            recipient = %claim.recipient,
            amount = %claim.amount,
            "Yield claimed"
        );
        Ok(state.receipt(b"claim", claim.nullifier.0))
    }

    async fn yield_rate(&self) -> Result<u32, LedgerError> {
        Ok(self.state.lock().await.yield_rate_bps)
    }

    async fn is_paused(&self) -> Result<bool, LedgerError> {
        Ok(self.state.lock().await.paused)
    }
}

impl LedgerAdmin for InMemoryLedger {
    async fn pause(&self) -> Result<TxReceipt, LedgerError> {
        let mut state = self.state.lock().await;
        state.ensure_unpaused()?;
        state.paused = true;
        state.events.push(LedgerEvent::Paused);
        info!("Ledger paused");
        Ok(state.receipt(b"pause", B256::ZERO))
    }

    async fn unpause(&self) -> Result<TxReceipt, LedgerError> {
        let mut state = self.state.lock().await;
        if !state.paused {
            return Err(LedgerError::TransactionFailed("ledger is not paused".into()));
        }
        state.paused = false;
        state.events.push(LedgerEvent::Unpaused);
        info!("Ledger unpaused");
        Ok(state.receipt(b"unpause", B256::ZERO))
    }

    async fn set_yield_rate(&self, rate_bps: u32) -> Result<TxReceipt, LedgerError> {
        let mut state = self.state.lock().await;
        state.ensure_unpaused()?;
        if u64::from(rate_bps) > BPS_DENOMINATOR {
            return Err(LedgerError::InvalidRate(rate_bps));
        }
        let old = state.yield_rate_bps;
        state.yield_rate_bps = rate_bps;
        state.events.push(LedgerEvent::YieldRateUpdated { old, new: rate_bps });
        info!(old, new = rate_bps, "Yield rate updated");
        Ok(state.receipt(b"rate", B256::from(U256::from(rate_bps))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const T0: u64 = 1_700_000_000;

    fn tokens(n: u64) -> U256 {
        U256::from(n) * BASE_UNITS_PER_TOKEN
    }

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::with_time(LedgerParams::default(), T0)
    }

    fn claim(commitment: Commitment, nullifier: u8, amount: U256) -> ConsumeClaim {
        ConsumeClaim {
            commitment,
            nullifier: Nullifier(B256::repeat_byte(nullifier)),
            amount,
            recipient: Address::repeat_byte(0xAA),
            proof: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn register_then_duplicate_fails() {
        let ledger = ledger();
        let c = Commitment(B256::repeat_byte(0x01));

        assert!(!ledger.is_commitment_used(c).await.unwrap());
        ledger.register_deposit(tokens(100), c, &Bytes::new()).await.unwrap();
        assert!(ledger.is_commitment_used(c).await.unwrap());

        let err = ledger.register_deposit(tokens(100), c, &Bytes::new()).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists(x) if x == c));
        assert_eq!(ledger.vault_balance().await, tokens(100));
    }

    #[tokio::test]
    async fn deposit_bounds_enforced() {
        let ledger = ledger();
        let err = ledger
            .register_deposit(tokens(9), Commitment(B256::repeat_byte(0x01)), &Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DepositOutOfRange { .. }));
        let err = ledger
            .register_deposit(tokens(10_001), Commitment(B256::repeat_byte(0x02)), &Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DepositOutOfRange { .. }));
        ledger
            .register_deposit(tokens(10), Commitment(B256::repeat_byte(0x03)), &Bytes::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn consume_requires_registered_commitment() {
        let ledger = ledger();
        let err = ledger
            .consume_yield(&claim(Commitment(B256::repeat_byte(0x09)), 0x10, U256::from(1u64)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotRegistered(_)));
    }

    #[tokio::test]
    async fn nullifier_single_use() {
        let ledger = ledger();
        let c = Commitment(B256::repeat_byte(0x01));
        ledger.register_deposit(tokens(100), c, &Bytes::new()).await.unwrap();

        ledger.consume_yield(&claim(c, 0x10, tokens(5))).await.unwrap();
        let err = ledger.consume_yield(&claim(c, 0x10, tokens(5))).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyUsed(_)));

        assert_eq!(ledger.paid_to(Address::repeat_byte(0xAA)).await, tokens(5));
        assert_eq!(ledger.vault_balance().await, tokens(95));
    }

    #[tokio::test]
    async fn insufficient_pool_leaves_nullifier_unused() {
        let ledger = ledger();
        let c = Commitment(B256::repeat_byte(0x01));
        ledger.register_deposit(tokens(10), c, &Bytes::new()).await.unwrap();

        let err = ledger.consume_yield(&claim(c, 0x10, tokens(11))).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientPool { .. }));
        assert!(!ledger.is_nullifier_used(Nullifier(B256::repeat_byte(0x10))).await.unwrap());

        ledger.fund(tokens(1)).await;
        ledger.consume_yield(&claim(c, 0x10, tokens(11))).await.unwrap();
        assert_eq!(ledger.vault_balance().await, U256::ZERO);
    }

    #[tokio::test]
    async fn paused_ledger_fails_closed() {
        let ledger = ledger();
        let c = Commitment(B256::repeat_byte(0x01));
        ledger.register_deposit(tokens(100), c, &Bytes::new()).await.unwrap();
        ledger.pause().await.unwrap();

        let err = ledger
            .register_deposit(tokens(100), Commitment(B256::repeat_byte(0x02)), &Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Paused));
        let err = ledger.consume_yield(&claim(c, 0x10, tokens(1))).await.unwrap_err();
        assert!(matches!(err, LedgerError::Paused));
        assert!(matches!(ledger.set_yield_rate(100).await.unwrap_err(), LedgerError::Paused));
        assert!(matches!(ledger.pause().await.unwrap_err(), LedgerError::Paused));

        ledger.unpause().await.unwrap();
        ledger.consume_yield(&claim(c, 0x10, tokens(1))).await.unwrap();
    }

    #[tokio::test]
    async fn rate_update_emits_event() {
        let ledger = ledger();
        ledger.set_yield_rate(750).await.unwrap();
        assert_eq!(ledger.yield_rate().await.unwrap(), 750);
        assert!(matches!(
            ledger.set_yield_rate(10_001).await.unwrap_err(),
            LedgerError::InvalidRate(10_001)
        ));
        assert_eq!(
            ledger.events().await,
            vec![LedgerEvent::YieldRateUpdated { old: 500, new: 750 }]
        );
    }

    #[tokio::test]
    async fn events_carry_block_timestamp() {
        let ledger = ledger();
        let c = Commitment(B256::repeat_byte(0x01));
        ledger.register_deposit(tokens(100), c, &Bytes::new()).await.unwrap();
        ledger.advance_time(60).await;
        ledger.consume_yield(&claim(c, 0x10, U256::from(1u64))).await.unwrap();

        let events = ledger.events().await;
        assert!(matches!(events[0], LedgerEvent::DepositCommitted { timestamp, .. } if timestamp == T0));
        assert!(matches!(events[1], LedgerEvent::YieldClaimed { timestamp, .. } if timestamp == T0 + 60));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_registration_has_one_winner() {
        let ledger = Arc::new(ledger());
        let c = Commitment(B256::repeat_byte(0x42));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move {
                    ledger.register_deposit(tokens(50), c, &Bytes::new()).await
                })
            })
            .collect();

        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(e) => assert!(e.is_conflict()),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(ledger.vault_balance().await, tokens(50));
    }
}
