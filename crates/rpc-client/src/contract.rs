//! ABI of the netting channel contract.
//!
//! Every channel is its own contract, so the channel id of an event is the
//! address that emitted it.

use ethabi::{Event, EventParam, Function, Param, ParamType, RawLog, StateMutability, Token};
use ms_types::{Address, BalanceProof, ChainEvent, ChannelId, OnchainBalanceProof, H256};
use once_cell::sync::Lazy;

use crate::{error::DecodeError, types::Log};

pub const EVENT_CHANNEL_CLOSED: &str = "ChannelClosed";
pub const EVENT_CHANNEL_SETTLED: &str = "ChannelSettled";
pub const EVENT_TRANSFER_UPDATED: &str = "TransferUpdated";

struct ChannelAbi {
    channel_closed: Event,
    channel_settled: Event,
    transfer_updated: Event,
    close: Function,
    update_transfer: Function,
}

static ABI: Lazy<ChannelAbi> = Lazy::new(|| ChannelAbi {
    channel_closed: event(
        EVENT_CHANNEL_CLOSED,
        &[
            ("closing_address", ParamType::Address),
            ("block_number", ParamType::Uint(256)),
        ],
    ),
    channel_settled: event(
        EVENT_CHANNEL_SETTLED,
        &[("block_number", ParamType::Uint(256))],
    ),
    transfer_updated: event(
        EVENT_TRANSFER_UPDATED,
        &[
            ("node_address", ParamType::Address),
            ("block_number", ParamType::Uint(256)),
        ],
    ),
    close: balance_proof_function("close"),
    update_transfer: balance_proof_function("updateTransfer"),
});

fn event(name: &str, inputs: &[(&str, ParamType)]) -> Event {
    Event {
        name: name.to_string(),
        inputs: inputs
            .iter()
            .map(|(name, kind)| EventParam {
                name: name.to_string(),
                kind: kind.clone(),
                indexed: false,
            })
            .collect(),
        anonymous: false,
    }
}

// (uint64 nonce, uint256 transferred_amount, bytes32 locksroot, bytes32 extra_hash, bytes signature)
#[allow(deprecated)]
fn balance_proof_function(name: &str) -> Function {
    let param = |name: &str, kind: ParamType| Param {
        name: name.to_string(),
        kind,
        internal_type: None,
    };
    Function {
        name: name.to_string(),
        inputs: vec![
            param("nonce", ParamType::Uint(64)),
            param("transferred_amount", ParamType::Uint(256)),
            param("locksroot", ParamType::FixedBytes(32)),
            param("extra_hash", ParamType::FixedBytes(32)),
            param("signature", ParamType::Bytes),
        ],
        outputs: vec![],
        constant: None,
        state_mutability: StateMutability::NonPayable,
    }
}

fn to_eth_hash(hash: &H256) -> ethabi::Hash {
    ethabi::Hash::from_slice(hash.as_bytes())
}

fn from_eth_hash(hash: &ethabi::Hash) -> H256 {
    H256(hash.0)
}

fn to_eth_address(address: &Address) -> ethabi::Address {
    ethabi::Address::from_slice(address.as_bytes())
}

/// Topics of every event the monitor subscribes to.
pub fn event_topics() -> Vec<H256> {
    vec![
        from_eth_hash(&ABI.channel_closed.signature()),
        from_eth_hash(&ABI.channel_settled.signature()),
        from_eth_hash(&ABI.transfer_updated.signature()),
    ]
}

fn take_address(log: &ethabi::Log, name: &'static str) -> Result<Address, DecodeError> {
    log.params
        .iter()
        .find(|p| p.name == name)
        .and_then(|p| p.value.clone().into_address())
        .map(|a| Address::new(a.0))
        .ok_or(DecodeError::MissingParam(name))
}

fn take_u64(log: &ethabi::Log, name: &'static str) -> Result<u64, DecodeError> {
    let value = log
        .params
        .iter()
        .find(|p| p.name == name)
        .and_then(|p| p.value.clone().into_uint())
        .ok_or(DecodeError::MissingParam(name))?;
    uint_to_u64(value, name)
}

fn uint_to_u64(value: ethabi::Uint, name: &'static str) -> Result<u64, DecodeError> {
    if value > ethabi::Uint::from(u64::MAX) {
        return Err(DecodeError::Overflow(name));
    }
    Ok(value.low_u64())
}

fn uint_to_u128(value: ethabi::Uint, name: &'static str) -> Result<u128, DecodeError> {
    if value.bits() > 128 {
        return Err(DecodeError::Overflow(name));
    }
    Ok(value.low_u128())
}

/// Decodes a channel event, `Ok(None)` for logs of other events.
pub fn decode_log(log: &Log) -> Result<Option<ChainEvent>, DecodeError> {
    let topic = match log.topics.first() {
        Some(topic) => to_eth_hash(topic),
        None => return Ok(None),
    };
    let channel_id = ChannelId(log.address);
    let raw = || RawLog {
        topics: log.topics.iter().map(to_eth_hash).collect(),
        data: log.data.clone(),
    };

    let event = if topic == ABI.channel_closed.signature() {
        let parsed = ABI.channel_closed.parse_log(raw())?;
        ChainEvent::ChannelClosed {
            channel_id,
            closing_participant: take_address(&parsed, "closing_address")?,
            block_number: take_u64(&parsed, "block_number")?,
            closing_proof: None,
        }
    } else if topic == ABI.channel_settled.signature() {
        let parsed = ABI.channel_settled.parse_log(raw())?;
        ChainEvent::ChannelSettled {
            channel_id,
            block_number: take_u64(&parsed, "block_number")?,
        }
    } else if topic == ABI.transfer_updated.signature() {
        let parsed = ABI.transfer_updated.parse_log(raw())?;
        ChainEvent::TransferUpdated {
            channel_id,
            node_address: take_address(&parsed, "node_address")?,
            block_number: take_u64(&parsed, "block_number")?,
        }
    } else {
        return Ok(None);
    };
    Ok(Some(event))
}

/// Topics and data of the log `event` is decoded from.
pub fn encode_event(event: &ChainEvent) -> (Vec<H256>, Vec<u8>) {
    let (abi_event, tokens) = match event {
        ChainEvent::ChannelClosed {
            closing_participant,
            block_number,
            ..
        } => (
            &ABI.channel_closed,
            vec![
                Token::Address(to_eth_address(closing_participant)),
                Token::Uint((*block_number).into()),
            ],
        ),
        ChainEvent::ChannelSettled { block_number, .. } => (
            &ABI.channel_settled,
            vec![Token::Uint((*block_number).into())],
        ),
        ChainEvent::TransferUpdated {
            node_address,
            block_number,
            ..
        } => (
            &ABI.transfer_updated,
            vec![
                Token::Address(to_eth_address(node_address)),
                Token::Uint((*block_number).into()),
            ],
        ),
    };
    (
        vec![from_eth_hash(&abi_event.signature())],
        ethabi::encode(&tokens),
    )
}

fn balance_proof_tokens(
    nonce: u64,
    transferred_amount: u128,
    locksroot: &H256,
    extra_hash: &H256,
    signature: &[u8],
) -> Vec<Token> {
    vec![
        Token::Uint(nonce.into()),
        Token::Uint(transferred_amount.into()),
        Token::FixedBytes(locksroot.as_bytes().to_vec()),
        Token::FixedBytes(extra_hash.as_bytes().to_vec()),
        Token::Bytes(signature.to_vec()),
    ]
}

pub fn encode_close(proof: &OnchainBalanceProof, signature: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let tokens = balance_proof_tokens(
        proof.nonce,
        proof.transferred_amount,
        &proof.locksroot,
        &proof.extra_hash,
        signature,
    );
    Ok(ABI.close.encode_input(&tokens)?)
}

/// Call data contesting a close with `balance_proof`.
pub fn encode_update_transfer(balance_proof: &BalanceProof) -> Result<Vec<u8>, DecodeError> {
    let tokens = balance_proof_tokens(
        balance_proof.nonce,
        balance_proof.transferred_amount,
        &balance_proof.locksroot,
        &balance_proof.extra_hash,
        &balance_proof.signature,
    );
    Ok(ABI.update_transfer.encode_input(&tokens)?)
}

/// Extracts the proof a `close` call submitted, `Ok(None)` for other calls.
pub fn decode_close_input(input: &[u8]) -> Result<Option<OnchainBalanceProof>, DecodeError> {
    if input.len() < 4 || input[..4] != ABI.close.short_signature() {
        return Ok(None);
    }
    decode_balance_proof_call(&ABI.close, &input[4..]).map(Some)
}

pub fn decode_update_transfer_input(
    input: &[u8],
) -> Result<Option<OnchainBalanceProof>, DecodeError> {
    if input.len() < 4 || input[..4] != ABI.update_transfer.short_signature() {
        return Ok(None);
    }
    decode_balance_proof_call(&ABI.update_transfer, &input[4..]).map(Some)
}

fn decode_balance_proof_call(
    function: &Function,
    data: &[u8],
) -> Result<OnchainBalanceProof, DecodeError> {
    let mut tokens = function.decode_input(data)?.into_iter();
    let mut next = |name: &'static str| tokens.next().ok_or(DecodeError::MissingParam(name));
    let nonce = next("nonce")?
        .into_uint()
        .ok_or(DecodeError::MissingParam("nonce"))?;
    let transferred_amount = next("transferred_amount")?
        .into_uint()
        .ok_or(DecodeError::MissingParam("transferred_amount"))?;
    let locksroot = next("locksroot")?
        .into_fixed_bytes()
        .ok_or(DecodeError::MissingParam("locksroot"))?;
    let extra_hash = next("extra_hash")?
        .into_fixed_bytes()
        .ok_or(DecodeError::MissingParam("extra_hash"))?;
    let to_h256 = |bytes: Vec<u8>, name: &'static str| {
        H256::from_slice(&bytes).map_err(|_| DecodeError::MissingParam(name))
    };
    Ok(OnchainBalanceProof {
        nonce: uint_to_u64(nonce, "nonce")?,
        transferred_amount: uint_to_u128(transferred_amount, "transferred_amount")?,
        locksroot: to_h256(locksroot, "locksroot")?,
        extra_hash: to_h256(extra_hash, "extra_hash")?,
    })
}
