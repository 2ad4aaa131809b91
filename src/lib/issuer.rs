//! Hash-based KYC credential issuance.
//!
//! The issuer vouches for a credential by publishing
//! `Poseidon(credentialHash, salt)`; holders later prove knowledge of the
//! opening with the `kyc_simple` circuit.

use std::collections::BTreeMap;

use alloy::primitives::Address;
use rand::Rng;
use tracing::info;

use crate::crypto::salt::random_salt_with;
use crate::domain::credential::{generate_user_secret, Credential, SignedCredential};
use crate::domain::error::ValidationError;

/// Credentials are valid for 365 days from issuance.
pub const CREDENTIAL_VALIDITY_SECS: u64 = 365 * 24 * 60 * 60;

/// Jurisdictions the issuer serves, by ISO 3166-1 numeric code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedCountries(BTreeMap<u16, &'static str>);

impl AllowedCountries {
    pub const USA: u16 = 840;
    pub const UK: u16 = 826;
    pub const CANADA: u16 = 124;
    pub const GERMANY: u16 = 276;
    pub const FRANCE: u16 = 250;
    pub const JAPAN: u16 = 392;
    pub const SINGAPORE: u16 = 702;
    pub const SWITZERLAND: u16 = 756;

    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, code: u16, name: &'static str) -> Self {
        self.0.insert(code, name);
        self
    }

    pub fn contains(&self, code: u16) -> bool {
        self.0.contains_key(&code)
    }

    pub fn name(&self, code: u16) -> Option<&'static str> {
        self.0.get(&code).copied()
    }

    /// Look a country up by its registry name (case-insensitive).
    pub fn code(&self, name: &str) -> Option<u16> {
        self.0
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(code, _)| *code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &'static str)> + '_ {
        self.0.iter().map(|(c, n)| (*c, *n))
    }
}

impl Default for AllowedCountries {
    fn default() -> Self {
        Self::empty()
            .with(Self::USA, "USA")
            .with(Self::UK, "UK")
            .with(Self::CANADA, "CANADA")
            .with(Self::GERMANY, "GERMANY")
            .with(Self::FRANCE, "FRANCE")
            .with(Self::JAPAN, "JAPAN")
            .with(Self::SINGAPORE, "SINGAPORE")
            .with(Self::SWITZERLAND, "SWITZERLAND")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    #[error("country {0} is not served by this issuer")]
    CountryNotAllowed(u16),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub struct CredentialIssuer {
    allowed: AllowedCountries,
}

impl CredentialIssuer {
    pub fn new(allowed: AllowedCountries) -> Self {
        Self { allowed }
    }

    pub fn allowed_countries(&self) -> &AllowedCountries {
        &self.allowed
    }

    /// Issue a KYC-approved credential to `holder`, valid for one year from `now`.
    pub fn issue(
        &self,
        holder: Address,
        country_code: u16,
        is_accredited: bool,
        now: u64,
    ) -> Result<SignedCredential, IssuerError> {
        self.issue_with_rng(&mut rand::thread_rng(), holder, country_code, is_accredited, now)
    }

    /// [`issue`](Self::issue) with a caller-supplied salt source.
    pub fn issue_with_rng<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        holder: Address,
        country_code: u16,
        is_accredited: bool,
        now: u64,
    ) -> Result<SignedCredential, IssuerError> {
        if !self.allowed.contains(country_code) {
            return Err(IssuerError::CountryNotAllowed(country_code));
        }

        let credential = Credential {
            is_kyced: true,
            country_code,
            is_accredited,
            expiry: now.saturating_add(CREDENTIAL_VALIDITY_SECS),
            user_secret: generate_user_secret(holder),
            credential_salt: random_salt_with(rng),
        };
        let issuer_commitment = credential.issuer_commitment()?;
        info!(%holder, country_code, expiry = credential.expiry, "Credential issued");

        Ok(SignedCredential {
            credential,
            issuer_commitment,
        })
    }

    /// Whether `signed` opens to the commitment it carries.
    pub fn verify(&self, signed: &SignedCredential) -> bool {
        signed
            .credential
            .issuer_commitment()
            .map(|c| c == signed.issuer_commitment)
            .unwrap_or(false)
    }
}

impl Default for CredentialIssuer {
    fn default() -> Self {
        Self::new(AllowedCountries::default())
    }
}
