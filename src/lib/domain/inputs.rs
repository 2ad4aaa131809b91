//! Typed proof requests, one per circuit.
//!
//! Every request is validated when it is built, so anything that reaches the
//! prover already satisfies the circuit's constraints.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{B256, U256};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::commitment::Commitment;
use super::credential::{Credential, IssuerCommitment, SignedCredential};
use super::error::ValidationError;
use super::nullifier::Nullifier;
use super::proof::PublicSignals;
use super::record::DepositRecord;
use super::yield_rule::{accrue, YieldClaim};
use crate::crypto::poseidon::ensure_canonical;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitId {
    DepositCommitment,
    YieldClaim,
    KycSimple,
}

impl CircuitId {
    pub const ALL: [CircuitId; 3] = [
        CircuitId::DepositCommitment,
        CircuitId::YieldClaim,
        CircuitId::KycSimple,
    ];

    /// Artifact base name (`<name>.wasm`, `<name>_final.zkey`, `<name>_vkey.json`).
    pub fn name(&self) -> &'static str {
        match self {
            CircuitId::DepositCommitment => "deposit_commitment",
            CircuitId::YieldClaim => "yield_claim",
            CircuitId::KycSimple => "kyc_simple",
        }
    }

    /// Input keys in the order they are written to the witness file.
    pub fn input_keys(&self) -> &'static [&'static str] {
        match self {
            CircuitId::DepositCommitment => &["amount", "salt", "commitment"],
            CircuitId::YieldClaim => &[
                "depositAmount",
                "salt",
                "commitment",
                "nullifier",
                "depositTime",
                "currentTime",
                "yieldRate",
                "yieldAmount",
            ],
            CircuitId::KycSimple => &[
                "isKYCed",
                "countryCode",
                "isAccredited",
                "expiry",
                "userSecret",
                "credentialSalt",
                "allowedCountry",
                "currentTime",
                "issuerCommitment",
            ],
        }
    }

    /// Number of public signals the verifier expects.
    pub fn public_signal_count(&self) -> usize {
        match self {
            CircuitId::DepositCommitment => 1,
            CircuitId::YieldClaim => 6,
            CircuitId::KycSimple => 3,
        }
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CircuitId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CircuitId::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| ValidationError::Malformed {
                key: "circuit".into(),
                value: s.to_string(),
            })
    }
}

/// Named decimal-string inputs in witness order.
///
/// Serializes as a JSON object whose key order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CircuitInputs(pub Vec<(String, String)>);

impl CircuitInputs {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for CircuitInputs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CircuitInputs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct InputsVisitor;

        impl<'de> Visitor<'de> for InputsVisitor {
            type Value = CircuitInputs;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of circuit input names to decimal strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    entries.push((k, v));
                }
                Ok(CircuitInputs(entries))
            }
        }

        deserializer.deserialize_map(InputsVisitor)
    }
}

fn canonical(field: &'static str, value: U256) -> Result<U256, ValidationError> {
    ensure_canonical(value).map_err(|e| ValidationError::out_of_field(field, e))
}

// ── Deposit ──────────────────────────────────────────────────────────

/// Inputs for `deposit_commitment`: proves `commitment = Poseidon(amount, salt)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositInputs {
    /// Whole units (private)
    pub amount: U256,
    /// Private
    pub salt: U256,
    /// Public
    pub commitment: Commitment,
}

impl DepositInputs {
    pub fn new(balance_whole: U256, salt: U256) -> Result<Self, ValidationError> {
        let inputs = Self {
            amount: balance_whole,
            salt,
            commitment: Commitment::deposit(balance_whole, salt)?,
        };
        inputs.validate()?;
        Ok(inputs)
    }

    pub fn from_record(record: &DepositRecord) -> Result<Self, ValidationError> {
        let inputs = Self::new(record.balance_whole, record.salt)?;
        if inputs.commitment != record.commitment {
            return Err(ValidationError::CommitmentMismatch);
        }
        Ok(inputs)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.amount.is_zero() {
            return Err(ValidationError::EmptyDeposit);
        }
        canonical("amount", self.amount)?;
        canonical("salt", self.salt)?;
        if Commitment::deposit(self.amount, self.salt)? != self.commitment {
            return Err(ValidationError::CommitmentMismatch);
        }
        Ok(())
    }
}

// ── Yield ────────────────────────────────────────────────────────────

/// Inputs for `yield_claim`: proves knowledge of the commitment opening and that
/// `yieldAmount` follows the accrual rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YieldInputs {
    pub deposit_amount: U256,
    pub salt: U256,
    pub commitment: Commitment,
    pub nullifier: Nullifier,
    pub deposit_time: u64,
    pub current_time: u64,
    pub yield_rate: u32,
    pub yield_amount: U256,
}

impl YieldInputs {
    pub fn new(
        record: &DepositRecord,
        claim: &YieldClaim,
        rate_bps: u32,
    ) -> Result<Self, ValidationError> {
        if claim.commitment != record.commitment || claim.deposit_timestamp != record.deposit_timestamp
        {
            return Err(ValidationError::CommitmentMismatch);
        }
        claim.check(record.balance_whole, rate_bps)?;
        let inputs = Self {
            deposit_amount: record.balance_whole,
            salt: record.salt,
            commitment: claim.commitment,
            nullifier: claim.nullifier,
            deposit_time: claim.deposit_timestamp,
            current_time: claim.current_timestamp,
            yield_rate: rate_bps,
            yield_amount: claim.claimed_yield,
        };
        inputs.validate()?;
        Ok(inputs)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        canonical("depositAmount", self.deposit_amount)?;
        canonical("salt", self.salt)?;
        canonical("yieldAmount", self.yield_amount)?;
        if Commitment::deposit(self.deposit_amount, self.salt)? != self.commitment {
            return Err(ValidationError::CommitmentMismatch);
        }
        if self.commitment.nullifier(self.salt, self.current_time) != self.nullifier {
            return Err(ValidationError::NullifierMismatch);
        }
        if self.current_time < self.deposit_time {
            return Err(ValidationError::TimestampOrder {
                deposit: self.deposit_time,
                current: self.current_time,
            });
        }
        let expected = accrue(
            self.deposit_amount,
            self.deposit_time,
            self.current_time,
            self.yield_rate,
        )?;
        if expected != self.yield_amount {
            return Err(ValidationError::YieldMismatch {
                claimed: self.yield_amount,
                expected,
            });
        }
        Ok(())
    }
}

// ── KYC ──────────────────────────────────────────────────────────────

/// Inputs for `kyc_simple`: proves a live, KYC-approved credential for the
/// allowed country opens to the issuer's commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KycInputs {
    pub credential: Credential,
    pub allowed_country: u16,
    pub current_time: u64,
    pub issuer_commitment: IssuerCommitment,
}

impl KycInputs {
    pub fn new(
        signed: &SignedCredential,
        allowed_country: u16,
        now: u64,
    ) -> Result<Self, ValidationError> {
        let inputs = Self {
            credential: signed.credential.clone(),
            allowed_country,
            current_time: now,
            issuer_commitment: signed.issuer_commitment,
        };
        inputs.validate()?;
        Ok(inputs)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let c = &self.credential;
        if !c.is_kyced {
            return Err(ValidationError::NotKyced);
        }
        if c.is_expired(self.current_time) {
            return Err(ValidationError::CredentialExpired {
                expiry: c.expiry,
                now: self.current_time,
            });
        }
        if c.country_code != self.allowed_country {
            return Err(ValidationError::CountryMismatch {
                credential: c.country_code,
                allowed: self.allowed_country,
            });
        }
        canonical("userSecret", c.user_secret)?;
        canonical("credentialSalt", c.credential_salt)?;
        if c.issuer_commitment()? != self.issuer_commitment {
            return Err(ValidationError::IssuerCommitmentMismatch);
        }
        Ok(())
    }
}

// ── InputSet ─────────────────────────────────────────────────────────

/// A validated request for exactly one circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSet {
    Deposit(DepositInputs),
    Yield(YieldInputs),
    Kyc(KycInputs),
}

fn flag(b: bool) -> String {
    (if b { "1" } else { "0" }).to_string()
}

impl InputSet {
    pub fn circuit(&self) -> CircuitId {
        match self {
            InputSet::Deposit(_) => CircuitId::DepositCommitment,
            InputSet::Yield(_) => CircuitId::YieldClaim,
            InputSet::Kyc(_) => CircuitId::KycSimple,
        }
    }

    /// Witness inputs keyed by the circuit's signal names.
    pub fn to_signals(&self) -> CircuitInputs {
        let pairs: Vec<(&str, String)> = match self {
            InputSet::Deposit(d) => vec![
                ("amount", d.amount.to_string()),
                ("salt", d.salt.to_string()),
                ("commitment", d.commitment.to_field().to_string()),
            ],
            InputSet::Yield(y) => vec![
                ("depositAmount", y.deposit_amount.to_string()),
                ("salt", y.salt.to_string()),
                ("commitment", y.commitment.to_field().to_string()),
                ("nullifier", y.nullifier.to_field().to_string()),
                ("depositTime", y.deposit_time.to_string()),
                ("currentTime", y.current_time.to_string()),
                ("yieldRate", y.yield_rate.to_string()),
                ("yieldAmount", y.yield_amount.to_string()),
            ],
            InputSet::Kyc(k) => {
                let c = &k.credential;
                vec![
                    ("isKYCed", flag(c.is_kyced)),
                    ("countryCode", c.country_code.to_string()),
                    ("isAccredited", flag(c.is_accredited)),
                    ("expiry", c.expiry.to_string()),
                    ("userSecret", c.user_secret.to_string()),
                    ("credentialSalt", c.credential_salt.to_string()),
                    ("allowedCountry", k.allowed_country.to_string()),
                    ("currentTime", k.current_time.to_string()),
                    ("issuerCommitment", k.issuer_commitment.to_field().to_string()),
                ]
            }
        };
        CircuitInputs(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Public signals in the order the verifier checks them.
    pub fn public_signals(&self) -> PublicSignals {
        let signals = match self {
            InputSet::Deposit(d) => vec![d.commitment.to_field()],
            InputSet::Yield(y) => vec![
                y.commitment.to_field(),
                y.nullifier.to_field(),
                U256::from(y.deposit_time),
                U256::from(y.current_time),
                U256::from(y.yield_rate),
                y.yield_amount,
            ],
            InputSet::Kyc(k) => vec![
                U256::from(k.allowed_country),
                U256::from(k.current_time),
                k.issuer_commitment.to_field(),
            ],
        };
        PublicSignals(signals)
    }

    /// Parse and validate a witness map for `circuit`.
    ///
    /// Every key the circuit declares must be present; there are no defaults.
    pub fn from_signals(circuit: CircuitId, inputs: &CircuitInputs) -> Result<Self, ValidationError> {
        let expected = circuit.input_keys();
        if let Some(extra) = inputs.keys().find(|k| !expected.contains(k)) {
            return Err(ValidationError::UnexpectedInput(extra.to_string()));
        }
        let p = SignalReader(inputs);
        let set = match circuit {
            CircuitId::DepositCommitment => {
                let d = DepositInputs {
                    amount: p.field("amount")?,
                    salt: p.field("salt")?,
                    commitment: Commitment(B256::from(p.field("commitment")?)),
                };
                d.validate()?;
                InputSet::Deposit(d)
            }
            CircuitId::YieldClaim => {
                let y = YieldInputs {
                    deposit_amount: p.field("depositAmount")?,
                    salt: p.field("salt")?,
                    commitment: Commitment(B256::from(p.field("commitment")?)),
                    nullifier: Nullifier(B256::from(p.field("nullifier")?)),
                    deposit_time: p.int("depositTime")?,
                    current_time: p.int("currentTime")?,
                    yield_rate: p.int("yieldRate")?,
                    yield_amount: p.field("yieldAmount")?,
                };
                y.validate()?;
                InputSet::Yield(y)
            }
            CircuitId::KycSimple => {
                let k = KycInputs {
                    credential: Credential {
                        is_kyced: p.flag("isKYCed")?,
                        country_code: p.int("countryCode")?,
                        is_accredited: p.flag("isAccredited")?,
                        expiry: p.int("expiry")?,
                        user_secret: p.field("userSecret")?,
                        credential_salt: p.field("credentialSalt")?,
                    },
                    allowed_country: p.int("allowedCountry")?,
                    current_time: p.int("currentTime")?,
                    issuer_commitment: IssuerCommitment(B256::from(p.field("issuerCommitment")?)),
                };
                k.validate()?;
                InputSet::Kyc(k)
            }
        };
        Ok(set)
    }
}

struct SignalReader<'a>(&'a CircuitInputs);

impl SignalReader<'_> {
    fn raw(&self, key: &str) -> Result<&str, ValidationError> {
        self.0
            .get(key)
            .ok_or_else(|| ValidationError::MissingInput(key.to_string()))
    }

    fn malformed(key: &str, value: &str) -> ValidationError {
        ValidationError::Malformed {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    fn field(&self, key: &'static str) -> Result<U256, ValidationError> {
        let raw = self.raw(key)?;
        let value = U256::from_str_radix(raw, 10).map_err(|_| Self::malformed(key, raw))?;
        canonical(key, value)
    }

    fn int<T: TryFrom<U256>>(&self, key: &'static str) -> Result<T, ValidationError> {
        let raw = self.raw(key)?;
        let value = self.field(key)?;
        T::try_from(value).map_err(|_| Self::malformed(key, raw))
    }

    fn flag(&self, key: &'static str) -> Result<bool, ValidationError> {
        match self.raw(key)? {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(Self::malformed(key, other)),
        }
    }
}
