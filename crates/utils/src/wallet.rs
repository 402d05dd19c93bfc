use std::path::Path;

use anyhow::{Context, Result};
use ms_config::WalletConfig;
use ms_types::{keccak256, Address, BalanceProof};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, PublicKey, Secp256k1, SecretKey,
};
use thiserror::Error;

pub const SIGNATURE_LEN: usize = 65;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("invalid privkey hex: {0}")]
    InvalidHex(String),
    #[error("invalid privkey length {0}, expected 64 hex chars")]
    InvalidLength(usize),
    #[error("invalid secp256k1 key: {0}")]
    InvalidKey(#[from] secp256k1::Error),
    #[error("invalid signature length {0}")]
    InvalidSignature(usize),
}

/// Signing identity of the service.
pub struct Wallet {
    privkey: SecretKey,
    address: Address,
}

impl Wallet {
    pub fn from_privkey_bytes(privkey: &[u8; 32]) -> Result<Self, WalletError> {
        let privkey = SecretKey::from_slice(privkey)?;
        let address = secret_to_address(&privkey);
        Ok(Wallet { privkey, address })
    }

    /// Accepts `0x` prefixed or bare 32 bytes hex.
    pub fn from_privkey_hex(privkey: &str) -> Result<Self, WalletError> {
        let content = privkey.trim();
        let content = content.strip_prefix("0x").unwrap_or(content);
        if content.len() != 64 {
            return Err(WalletError::InvalidLength(content.len()));
        }
        let mut decoded = [0u8; 32];
        faster_hex::hex_decode(content.as_bytes(), &mut decoded)
            .map_err(|err| WalletError::InvalidHex(err.to_string()))?;
        Self::from_privkey_bytes(&decoded)
    }

    pub fn from_privkey_path(p: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(p)
            .with_context(|| format!("read wallet privkey {}", p.to_string_lossy()))?;
        let wallet = Self::from_privkey_hex(&content)?;
        Ok(wallet)
    }

    pub fn from_config(config: &WalletConfig) -> Result<Self> {
        Self::from_privkey_path(&config.privkey_path)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Recoverable signature `r || s || v`, `v` in {27, 28}.
    pub fn sign(&self, hash: &[u8; 32]) -> Result<[u8; SIGNATURE_LEN], WalletError> {
        let secp = Secp256k1::signing_only();
        let message = Message::from_slice(hash)?;
        let signature = secp.sign_ecdsa_recoverable(&message, &self.privkey);
        let (rec_id, data) = signature.serialize_compact();
        let mut inner = [0u8; SIGNATURE_LEN];
        inner[..64].copy_from_slice(&data);
        inner[64] = rec_id.to_i32() as u8 + 27;
        Ok(inner)
    }

    pub fn sign_balance_proof(&self, balance_proof: &mut BalanceProof) -> Result<(), WalletError> {
        let signature = self.sign(&balance_proof.message_hash())?;
        balance_proof.signature = signature.to_vec();
        Ok(())
    }
}

fn secret_to_address(privkey: &SecretKey) -> Address {
    let secp = Secp256k1::signing_only();
    let pubkey = PublicKey::from_secret_key(&secp, privkey);
    pubkey_to_address(&pubkey)
}

fn pubkey_to_address(pubkey: &PublicKey) -> Address {
    let hash = keccak256(&pubkey.serialize_uncompressed()[1..]);
    let mut inner = [0u8; 20];
    inner.copy_from_slice(&hash[12..]);
    Address::new(inner)
}

/// Derives the checksummed account address of a private key.
pub fn privkey_to_addr(privkey: &str) -> Result<Address, WalletError> {
    Wallet::from_privkey_hex(privkey).map(|wallet| wallet.address())
}

pub fn recover_signer(hash: &[u8; 32], signature: &[u8]) -> Result<Address, WalletError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(WalletError::InvalidSignature(signature.len()));
    }
    let v = signature[64];
    let rec_id = RecoveryId::from_i32(i32::from(if v >= 27 { v - 27 } else { v }))?;
    let signature = RecoverableSignature::from_compact(&signature[..64], rec_id)?;
    let message = Message::from_slice(hash)?;
    let pubkey = Secp256k1::verification_only().recover_ecdsa(&message, &signature)?;
    Ok(pubkey_to_address(&pubkey))
}
