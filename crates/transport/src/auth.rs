use ms_types::Message;
use ms_utils::wallet::recover_signer;

/// Checks that a balance proof is signed by one of its participants.
pub fn verify_message(message: &Message) -> Result<(), String> {
    match message {
        Message::BalanceProof(bp) => {
            let signer = recover_signer(&bp.message_hash(), &bp.signature)
                .map_err(|err| format!("bad signature: {}", err))?;
            if bp.is_participant(&signer) {
                Ok(())
            } else {
                Err(format!("signer {} is not a participant", signer))
            }
        }
        Message::FeeInfo(_) => Ok(()),
    }
}
