use std::time::Duration;

use alloy::primitives::{Address, U256};
use tracing::{debug, info, warn};

use crate::crypto::salt::random_salt;
use crate::domain::amount::{to_base_units, PrecisionLossWarning, ScalingPolicy};
use crate::domain::commitment::Commitment;
use crate::domain::credential::SignedCredential;
use crate::domain::error::ValidationError;
use crate::domain::inputs::{CircuitId, DepositInputs, InputSet, KycInputs, YieldInputs};
use crate::domain::proof::ProofBundle;
use crate::domain::record::DepositRecord;
use crate::domain::yield_rule::{annual_yield, YieldClaim};
use crate::ports::ledger::{ConsumeClaim, Ledger, LedgerError};
use crate::ports::prover::{ProofService, ProverError};
use crate::ports::store::{RecordStore, StoreError};
use crate::ports::TxReceipt;

/// How a caller should react to a failed vault operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fix the input; retrying unchanged fails the same way.
    Validation,
    /// The prover could not produce a valid proof. No ledger state changed.
    ProofGeneration,
    /// The commitment or nullifier is already taken. Never retried; a deposit
    /// can be reattempted with a fresh salt.
    Conflict,
    /// Retrying later may succeed.
    Transient,
    /// The holder's record store failed.
    Storage,
    /// A deposit was submitted but its outcome is unknown. The opening is
    /// kept; check `status` before depositing again.
    Unconfirmed,
}

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("prover error: {0}")]
    Prover(#[from] ProverError),

    #[error("proof for {circuit} did not verify")]
    InvalidProof { circuit: CircuitId },

    #[error("proof for {circuit} not ready after {after:?}")]
    ProofTimeout { circuit: CircuitId, after: Duration },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("deposit {commitment} unconfirmed, record kept: {source}")]
    Unconfirmed {
        commitment: Commitment,
        source: LedgerError,
    },
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::Validation(_) => ErrorKind::Validation,
            VaultError::Prover(_) | VaultError::InvalidProof { .. } => ErrorKind::ProofGeneration,
            VaultError::ProofTimeout { .. } => ErrorKind::Transient,
            VaultError::Ledger(e) if e.is_conflict() => ErrorKind::Conflict,
            VaultError::Ledger(e) if e.is_transient() => ErrorKind::Transient,
            VaultError::Ledger(_) => ErrorKind::Validation,
            VaultError::Store(_) => ErrorKind::Storage,
            VaultError::Unconfirmed { .. } => ErrorKind::Unconfirmed,
        }
    }
}

/// Holder-side policy knobs.
#[derive(Debug, Clone)]
pub struct VaultSettings {
    pub scaling: ScalingPolicy,
    /// Upper bound on one proof; `None` waits indefinitely.
    pub prove_timeout: Option<Duration>,
    /// Country the KYC circuit checks credentials against.
    pub allowed_country: u16,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            scaling: ScalingPolicy::default(),
            prove_timeout: None,
            allowed_country: crate::issuer::AllowedCountries::USA,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DepositOutcome {
    pub record: DepositRecord,
    pub receipt: TxReceipt,
    pub proof: ProofBundle,
    /// Set when the scaling policy floored the amount.
    pub warning: Option<PrecisionLossWarning>,
}

#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub claim: YieldClaim,
    /// Base units sent to the recipient
    pub payout: U256,
    pub receipt: TxReceipt,
    pub proof: ProofBundle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YieldEstimate {
    pub commitment: Commitment,
    /// Whole units claimable now
    pub accrued: U256,
    /// Whole units per full year at the current rate
    pub annual: U256,
    pub rate_bps: u32,
    pub elapsed_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RecordStatus {
    pub record: DepositRecord,
    pub registered: bool,
    pub accrued: U256,
}

/// Drives the holder side of the protocol: scale, commit, prove, submit.
///
/// Every request is validated before the prover is called, and the ledger is
/// only touched with a proof that already verified locally. Ledger conflicts
/// are reported, never retried.
pub struct VaultClient<L: Ledger, P: ProofService, S: RecordStore> {
    ledger: L,
    prover: P,
    store: S,
    settings: VaultSettings,
}

impl<L: Ledger, P: ProofService, S: RecordStore> VaultClient<L, P, S> {
    pub fn new(ledger: L, prover: P, store: S, settings: VaultSettings) -> Self {
        Self {
            ledger,
            prover,
            store,
            settings,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn prover(&self) -> &P {
        &self.prover
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    /// Deposit `amount` base units under a fresh salt.
    pub async fn deposit(&self, amount: U256, now: u64) -> Result<DepositOutcome, VaultError> {
        self.deposit_with_salt(amount, random_salt(), now).await
    }

    /// Deposit with a caller-chosen salt.
    ///
    /// The record is stored before the ledger call. It is dropped again only
    /// when the ledger definitively refuses; if the submission may have landed
    /// the record stays and the call fails with [`VaultError::Unconfirmed`].
    pub async fn deposit_with_salt(
        &self,
        amount: U256,
        salt: U256,
        now: u64,
    ) -> Result<DepositOutcome, VaultError> {
        if self.ledger.is_paused().await? {
            return Err(LedgerError::Paused.into());
        }

        let (whole, warning) = self.settings.scaling.apply(amount)?;
        let record = DepositRecord::new(whole, salt, now)?;
        let inputs = DepositInputs::from_record(&record)?;

        if self.ledger.is_commitment_used(record.commitment).await? {
            warn!(commitment = %record.commitment, "Commitment already registered");
            return Err(LedgerError::AlreadyExists(record.commitment).into());
        }

        let proof = self.prove(InputSet::Deposit(inputs)).await?;
        let calldata = proof.to_calldata()?;
        let committed_amount = to_base_units(whole)?;

        // Same-salt race: the other caller stored this opening first.
        self.store
            .save(record.clone())
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(c) => {
                    warn!(commitment = %c, "Deposit lost registration race");
                    VaultError::Ledger(LedgerError::AlreadyExists(c))
                }
                other => other.into(),
            })?;
        let receipt = match self
            .ledger
            .register_deposit(committed_amount, record.commitment, &calldata)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) if e.is_indeterminate() => {
                warn!(commitment = %record.commitment, error = %e, "Deposit outcome unknown, keeping record");
                return Err(VaultError::Unconfirmed {
                    commitment: record.commitment,
                    source: e,
                });
            }
            Err(e) => {
                if let Err(store_err) = self.store.remove(record.commitment).await {
                    warn!(commitment = %record.commitment, error = %store_err, "Failed to drop unregistered record");
                }
                if e.is_conflict() {
                    warn!(commitment = %record.commitment, "Deposit lost registration race");
                }
                return Err(e.into());
            }
        };

        info!(
            commitment = %record.commitment,
            whole = %whole,
            tx = %receipt.tx_hash,
            "Deposit registered"
        );
        Ok(DepositOutcome {
            record,
            receipt,
            proof,
            warning,
        })
    }

    /// Off-chain view of what a stored deposit has earned by `now`.
    pub async fn estimate(
        &self,
        commitment: Commitment,
        now: u64,
    ) -> Result<YieldEstimate, VaultError> {
        let record = self.store.get(commitment).await?;
        let rate_bps = self.ledger.yield_rate().await?;
        Ok(YieldEstimate {
            commitment,
            accrued: record.accrued(now, rate_bps)?,
            annual: annual_yield(record.balance_whole, rate_bps)?,
            rate_bps,
            elapsed_secs: now.saturating_sub(record.deposit_timestamp),
        })
    }

    /// Claim everything accrued on `commitment` up to `now` and pay it to
    /// `recipient`.
    ///
    /// Accrual always runs from the deposit time, and the nullifier only
    /// blocks a second claim at the same `now`. A later claim pays the
    /// earlier period again.
    pub async fn claim_yield(
        &self,
        commitment: Commitment,
        recipient: Address,
        now: u64,
    ) -> Result<ClaimOutcome, VaultError> {
        if self.ledger.is_paused().await? {
            return Err(LedgerError::Paused.into());
        }

        let record = self.store.get(commitment).await?;
        if !record.is_consistent() {
            return Err(ValidationError::CommitmentMismatch.into());
        }
        if !self.ledger.is_commitment_used(commitment).await? {
            return Err(LedgerError::NotRegistered(commitment).into());
        }

        let rate_bps = self.ledger.yield_rate().await?;
        let claim = record.claim(now, rate_bps)?;
        if claim.claimed_yield.is_zero() {
            return Err(ValidationError::NothingAccrued.into());
        }
        if self.ledger.is_nullifier_used(claim.nullifier).await? {
            warn!(nullifier = %claim.nullifier, "Nullifier already used");
            return Err(LedgerError::AlreadyUsed(claim.nullifier).into());
        }

        let inputs = YieldInputs::new(&record, &claim, rate_bps)?;
        let proof = self.prove(InputSet::Yield(inputs)).await?;
        let calldata = proof.to_calldata()?;
        let payout = to_base_units(claim.claimed_yield)?;

        let receipt = self
            .ledger
            .consume_yield(&ConsumeClaim {
                commitment,
                nullifier: claim.nullifier,
                amount: payout,
                recipient,
                proof: calldata,
            })
            .await
            .inspect_err(|e| {
                if e.is_conflict() {
                    warn!(nullifier = %claim.nullifier, "Claim lost consumption race");
                }
            })?;

        info!(
            %commitment,
            nullifier = %claim.nullifier,
            whole = %claim.claimed_yield,
            %recipient,
            "Yield claimed"
        );
        Ok(ClaimOutcome {
            claim,
            payout,
            receipt,
            proof,
        })
    }

    /// Prove a credential satisfies the configured KYC policy at `now`.
    pub async fn prove_kyc(
        &self,
        signed: &SignedCredential,
        now: u64,
    ) -> Result<ProofBundle, VaultError> {
        let inputs = KycInputs::new(signed, self.settings.allowed_country, now)?;
        self.prove(InputSet::Kyc(inputs)).await
    }

    /// Every stored deposit with its ledger status and accrued yield.
    pub async fn status(&self, now: u64) -> Result<Vec<RecordStatus>, VaultError> {
        let rate_bps = self.ledger.yield_rate().await?;
        let mut out = Vec::new();
        for record in self.store.list().await? {
            let registered = self.ledger.is_commitment_used(record.commitment).await?;
            let accrued = record.accrued(now, rate_bps)?;
            out.push(RecordStatus {
                record,
                registered,
                accrued,
            });
        }
        Ok(out)
    }

    async fn prove(&self, inputs: InputSet) -> Result<ProofBundle, VaultError> {
        let circuit = inputs.circuit();
        debug!(%circuit, "Requesting proof");

        let request = self.prover.full_prove(&inputs);
        let bundle = match self.settings.prove_timeout {
            Some(after) => tokio::time::timeout(after, request)
                .await
                .map_err(|_| VaultError::ProofTimeout { circuit, after })??,
            None => request.await?,
        };

        if bundle.public_signals != inputs.public_signals() {
            return Err(VaultError::InvalidProof { circuit });
        }
        if !self
            .prover
            .verify(circuit, &bundle.public_signals, &bundle.proof)
            .await?
        {
            return Err(VaultError::InvalidProof { circuit });
        }
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_ledger::{InMemoryLedger, LedgerParams};
    use crate::adapters::memory_store::InMemoryRecordStore;
    use crate::adapters::mock_prover::MockProver;
    use crate::domain::amount::BASE_UNITS_PER_TOKEN;
    use crate::domain::nullifier::Nullifier;
    use alloy::primitives::Bytes;

    const T0: u64 = 1_700_000_000;

    type Client = VaultClient<InMemoryLedger, MockProver, InMemoryRecordStore>;

    fn client(settings: VaultSettings) -> Client {
        VaultClient::new(
            InMemoryLedger::with_time(LedgerParams::default(), T0),
            MockProver::new(),
            InMemoryRecordStore::new(),
            settings,
        )
    }

    fn tokens(n: u64) -> U256 {
        U256::from(n) * BASE_UNITS_PER_TOKEN
    }

    #[tokio::test]
    async fn fractional_deposit_rejected_before_proving() {
        let client = client(VaultSettings::default());
        let err = client.deposit(tokens(100) + U256::from(1u64), T0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(client.prover().prove_calls(), 0);
    }

    #[tokio::test]
    async fn floor_policy_reports_truncation() {
        let client = client(VaultSettings {
            scaling: ScalingPolicy::Floor,
            ..VaultSettings::default()
        });
        let out = client
            .deposit(tokens(100) + U256::from(5u64), T0)
            .await
            .unwrap();
        assert_eq!(out.record.balance_whole, U256::from(100u64));
        assert_eq!(out.warning.unwrap().truncated, U256::from(5u64));
        assert_eq!(client.ledger().vault_balance().await, tokens(100));
    }

    #[tokio::test]
    async fn prover_failure_leaves_no_state() {
        let client = client(VaultSettings::default());
        client.prover().set_failing(true);
        let err = client.deposit(tokens(100), T0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProofGeneration);
        assert!(client.store().list().await.unwrap().is_empty());
        assert!(client.ledger().events().await.is_empty());
    }

    #[tokio::test]
    async fn ledger_refusal_drops_saved_record() {
        let client = client(VaultSettings::default());
        let err = client.deposit(tokens(5), T0).await.unwrap_err();
        assert!(matches!(
            err,
            VaultError::Ledger(LedgerError::DepositOutOfRange { .. })
        ));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(client.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_prover_times_out() {
        let client = VaultClient::new(
            InMemoryLedger::with_time(LedgerParams::default(), T0),
            MockProver::with_delay(Duration::from_millis(200)),
            InMemoryRecordStore::new(),
            VaultSettings {
                prove_timeout: Some(Duration::from_millis(10)),
                ..VaultSettings::default()
            },
        );
        let err = client.deposit(tokens(100), T0).await.unwrap_err();
        assert!(matches!(err, VaultError::ProofTimeout { .. }));
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(client.ledger().events().await.is_empty());
    }

    #[tokio::test]
    async fn claim_with_nothing_accrued_rejected() {
        let client = client(VaultSettings::default());
        let out = client.deposit(tokens(100), T0).await.unwrap();
        let err = client
            .claim_yield(out.record.commitment, Address::ZERO, T0 + 60)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Validation(ValidationError::NothingAccrued)
        ));
    }

    #[tokio::test]
    async fn estimate_reports_rate_and_annual() {
        let client = client(VaultSettings::default());
        let out = client.deposit(tokens(1_000), T0).await.unwrap();
        let est = client
            .estimate(out.record.commitment, T0 + 31_536_000 / 2)
            .await
            .unwrap();
        assert_eq!(est.rate_bps, 500);
        assert_eq!(est.annual, U256::from(50u64));
        assert_eq!(est.accrued, U256::from(25u64));
    }

    /// Applies every deposit, then reports the receipt as lost.
    struct LostReceiptLedger(InMemoryLedger);

    impl Ledger for LostReceiptLedger {
        async fn is_commitment_used(&self, commitment: Commitment) -> Result<bool, LedgerError> {
            self.0.is_commitment_used(commitment).await
        }

        async fn is_nullifier_used(&self, nullifier: Nullifier) -> Result<bool, LedgerError> {
            self.0.is_nullifier_used(nullifier).await
        }

        async fn register_deposit(
            &self,
            amount: U256,
            commitment: Commitment,
            proof: &Bytes,
        ) -> Result<TxReceipt, LedgerError> {
            self.0.register_deposit(amount, commitment, proof).await?;
            Err(LedgerError::TransactionFailed("receipt timeout".into()))
        }

        async fn consume_yield(&self, claim: &ConsumeClaim) -> Result<TxReceipt, LedgerError> {
            self.0.consume_yield(claim).await
        }

        async fn yield_rate(&self) -> Result<u32, LedgerError> {
            self.0.yield_rate().await
        }

        async fn is_paused(&self) -> Result<bool, LedgerError> {
            self.0.is_paused().await
        }
    }

    #[tokio::test]
    async fn lost_receipt_keeps_record_and_is_claimable() {
        let client = VaultClient::new(
            LostReceiptLedger(InMemoryLedger::with_time(LedgerParams::default(), T0)),
            MockProver::new(),
            InMemoryRecordStore::new(),
            VaultSettings::default(),
        );
        let err = client.deposit(tokens(100), T0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unconfirmed);
        let VaultError::Unconfirmed { commitment, .. } = err else {
            panic!("expected unconfirmed deposit, got {err:?}");
        };

        let status = client.status(T0).await.unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].record.commitment, commitment);
        assert!(status[0].registered);

        let claim = client
            .claim_yield(commitment, Address::ZERO, T0 + 31_536_000)
            .await
            .unwrap();
        assert_eq!(claim.claim.claimed_yield, U256::from(5u64));
    }

    #[test]
    fn ledger_error_kinds_follow_ledger_classification() {
        let transient = [
            LedgerError::Paused,
            LedgerError::InsufficientPool {
                requested: U256::from(2u64),
                available: U256::from(1u64),
            },
            LedgerError::Rpc("connection reset".into()),
            LedgerError::TransactionFailed("dropped".into()),
        ];
        for e in transient {
            assert!(e.is_transient());
            assert_eq!(VaultError::Ledger(e).kind(), ErrorKind::Transient);
        }

        let e = LedgerError::AlreadyExists(Commitment(Default::default()));
        assert!(!e.is_transient());
        assert_eq!(VaultError::Ledger(e).kind(), ErrorKind::Conflict);

        let e = LedgerError::InvalidRate(20_000);
        assert!(!e.is_transient() && !e.is_indeterminate());
        assert_eq!(VaultError::Ledger(e).kind(), ErrorKind::Validation);
    }
}
