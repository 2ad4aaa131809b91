use alloy::{
    contract::Error as ContractError,
    network::EthereumWallet,
    primitives::{Address, Bytes, U256},
    providers::{DynProvider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    sol,
};

use crate::{
    domain::{commitment::Commitment, nullifier::Nullifier},
    ports::{
        ledger::{ConsumeClaim, Ledger, LedgerAdmin, LedgerError},
        TxReceipt,
    },
};

sol! {
    #[sol(rpc)]
    interface IVeilVault {
        function commitments(bytes32 commitment) external view returns (bool);
        function nullifiers(bytes32 nullifier) external view returns (bool);
        function yieldRate() external view returns (uint256);
        function paused() external view returns (bool);
        function vaultBalance() external view returns (uint256);

        function deposit(uint256 amount, bytes32 commitment, bytes calldata proof) external;
        function claimYield(
            bytes32 commitment,
            bytes32 nullifier,
            uint256 amount,
            address recipient,
            bytes calldata proof
        ) external;

        function pause() external;
        function unpause() external;
        function setYieldRate(uint256 newRate) external;

        event DepositCommitted(bytes32 indexed commitment, uint256 amount, uint256 timestamp);
        event YieldClaimed(bytes32 indexed nullifier, address indexed recipient, uint256 amount, uint256 timestamp);
        event YieldRateUpdated(uint256 oldRate, uint256 newRate);

        error CommitmentAlreadyExists(bytes32 commitment);
        error CommitmentNotFound(bytes32 commitment);
        error NullifierAlreadyUsed(bytes32 nullifier);
        error DepositOutOfRange(uint256 amount, uint256 min, uint256 max);
        error InsufficientVaultBalance(uint256 requested, uint256 available);
        error InvalidYieldRate(uint256 rate);
        error EnforcedPause();
        error ExpectedPause();
        error OwnableUnauthorizedAccount(address account);
    }
}

use IVeilVault::IVeilVaultErrors;

/// Ethereum RPC adapter for the vault contract.
///
/// The contract verifies proofs, so calls that would revert are rejected during
/// gas estimation and surface as typed [`LedgerError`]s. Deposits assume the
/// token allowance for `amount` was already granted to the vault.
#[derive(Clone)]
pub struct EthereumLedger {
    provider: DynProvider,
    vault: Address,
}

impl EthereumLedger {
    pub async fn new(rpc_url: &str, private_key: &str, vault: Address) -> Result<Self, LedgerError> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| LedgerError::Rpc(format!("Invalid private key: {}", e)))?;
        let wallet = EthereumWallet::from(signer);
        let provider = DynProvider::new(
            ProviderBuilder::new().wallet(wallet).connect_http(
                rpc_url
                    .parse()
                    .map_err(|e| LedgerError::Rpc(format!("Invalid RPC URL: {}", e)))?,
            ),
        );

        Ok(Self { provider, vault })
    }

    pub async fn vault_balance(&self) -> Result<U256, LedgerError> {
        IVeilVault::new(self.vault, &self.provider)
            .vaultBalance()
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))
    }

    fn convert_receipt(receipt: &alloy::rpc::types::TransactionReceipt) -> TxReceipt {
        TxReceipt {
            tx_hash: receipt.transaction_hash,
            success: receipt.status(),
        }
    }
}

/// Map a failed send to the ledger's error, decoding contract reverts.
fn map_send_error(err: ContractError) -> LedgerError {
    match err.as_decoded_interface_error::<IVeilVaultErrors>() {
        Some(revert) => map_revert(revert),
        None => match err {
            ContractError::TransportError(e) => LedgerError::Rpc(e.to_string()),
            other => LedgerError::TransactionFailed(other.to_string()),
        },
    }
}

fn map_revert(revert: IVeilVaultErrors) -> LedgerError {
    match revert {
        IVeilVaultErrors::CommitmentAlreadyExists(e) => {
            LedgerError::AlreadyExists(Commitment(e.commitment))
        }
        IVeilVaultErrors::CommitmentNotFound(e) => {
            LedgerError::NotRegistered(Commitment(e.commitment))
        }
        IVeilVaultErrors::NullifierAlreadyUsed(e) => {
            LedgerError::AlreadyUsed(Nullifier(e.nullifier))
        }
        IVeilVaultErrors::DepositOutOfRange(e) => LedgerError::DepositOutOfRange {
            amount: e.amount,
            min: e.min,
            max: e.max,
        },
        IVeilVaultErrors::InsufficientVaultBalance(e) => LedgerError::InsufficientPool {
            requested: e.requested,
            available: e.available,
        },
        IVeilVaultErrors::InvalidYieldRate(e) => {
            LedgerError::InvalidRate(u32::try_from(e.rate).unwrap_or(u32::MAX))
        }
        IVeilVaultErrors::EnforcedPause(_) => LedgerError::Paused,
        IVeilVaultErrors::ExpectedPause(_) => {
            LedgerError::TransactionFailed("ledger is not paused".into())
        }
        IVeilVaultErrors::OwnableUnauthorizedAccount(_) => LedgerError::Unauthorized,
    }
}

macro_rules! send_and_confirm {
    ($call:expr, $name:literal) => {{
        let receipt = $call
            .send()
            .await
            .map_err(map_send_error)?
            .get_receipt()
            .await
            .map_err(|e| LedgerError::TransactionFailed(e.to_string()))?;

        if !receipt.status() {
            return Err(LedgerError::TransactionFailed(concat!($name, " reverted").into()));
        }

        Ok(Self::convert_receipt(&receipt))
    }};
}

impl Ledger for EthereumLedger {
    async fn is_commitment_used(&self, commitment: Commitment) -> Result<bool, LedgerError> {
        IVeilVault::new(self.vault, &self.provider)
            .commitments(commitment.0)
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))
    }

    async fn is_nullifier_used(&self, nullifier: Nullifier) -> Result<bool, LedgerError> {
        IVeilVault::new(self.vault, &self.provider)
            .nullifiers(nullifier.0)
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))
    }

    async fn register_deposit(
        &self,
        amount: U256,
        commitment: Commitment,
        proof: &Bytes,
    ) -> Result<TxReceipt, LedgerError> {
        let vault = IVeilVault::new(self.vault, &self.provider);
        send_and_confirm!(vault.deposit(amount, commitment.0, proof.clone()), "deposit")
    }

    async fn consume_yield(&self, claim: &ConsumeClaim) -> Result<TxReceipt, LedgerError> {
        let vault = IVeilVault::new(self.vault, &self.provider);
        send_and_confirm!(
            vault.claimYield(
                claim.commitment.0,
                claim.nullifier.0,
                claim.amount,
                claim.recipient,
                claim.proof.clone(),
            ),
            "claimYield"
        )
    }

    async fn yield_rate(&self) -> Result<u32, LedgerError> {
        let rate = IVeilVault::new(self.vault, &self.provider)
            .yieldRate()
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;
        u32::try_from(rate).map_err(|_| LedgerError::Rpc(format!("yield rate out of range: {rate}")))
    }

    async fn is_paused(&self) -> Result<bool, LedgerError> {
        IVeilVault::new(self.vault, &self.provider)
            .paused()
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))
    }
}

impl LedgerAdmin for EthereumLedger {
    async fn pause(&self) -> Result<TxReceipt, LedgerError> {
        let vault = IVeilVault::new(self.vault, &self.provider);
        send_and_confirm!(vault.pause(), "pause")
    }

    async fn unpause(&self) -> Result<TxReceipt, LedgerError> {
        let vault = IVeilVault::new(self.vault, &self.provider);
        send_and_confirm!(vault.unpause(), "unpause")
    }

    async fn set_yield_rate(&self, rate_bps: u32) -> Result<TxReceipt, LedgerError> {
        let vault = IVeilVault::new(self.vault, &self.provider);
        send_and_confirm!(vault.setYieldRate(U256::from(rate_bps)), "setYieldRate")
    }
}
