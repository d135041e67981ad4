//! Transaction data structures and operations

use crate::{merkle_root, Address, Amount, CoreError, CoreResult, Hash, Nonce};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Transaction signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl Signature {
    /// Create new signature
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Self { r, s, v }
    }

    /// Convert to bytes (65 bytes total)
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[0..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.v;
        bytes
    }

    /// Create from bytes
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() != 65 {
            return Err(CoreError::InvalidSignature);
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);
        let v = bytes[64];

        Ok(Self { r, s, v })
    }
}

/// Kind of state change a transaction requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, bincode::Encode)]
pub enum TxType {
    /// Move `amount` from the sender to `to`
    Send,
    /// Identity invitation; bookkeeping lives outside the state transition
    SendInvite,
    /// Mark the sender's identity as approved
    Approving,
}

/// Transaction data structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub struct Transaction {
    /// Sender's nonce after this transaction (current on-chain nonce + 1)
    pub nonce: Nonce,
    /// Transaction kind
    pub tx_type: TxType,
    /// Recipient address, required for `Send`
    pub to: Option<Address>,
    /// Value to transfer
    pub amount: Amount,
    /// Recoverable signature; the sender is never transmitted separately
    pub signature: Option<Signature>,
}

impl Transaction {
    /// Create a new unsigned transaction
    pub fn new(nonce: Nonce, tx_type: TxType, to: Option<Address>, amount: Amount) -> Self {
        Self {
            nonce,
            tx_type,
            to,
            amount,
            signature: None,
        }
    }

    /// Create a simple transfer transaction
    pub fn send(nonce: Nonce, to: Address, amount: Amount) -> Self {
        Self::new(nonce, TxType::Send, Some(to), amount)
    }

    /// Create an identity approval transaction
    pub fn approving(nonce: Nonce) -> Self {
        Self::new(nonce, TxType::Approving, None, Amount::zero())
    }

    /// Create an invitation transaction
    pub fn send_invite(nonce: Nonce, to: Address) -> Self {
        Self::new(nonce, TxType::SendInvite, Some(to), Amount::zero())
    }

    /// Encode transaction for hashing (without signature)
    pub fn encode_for_signing(&self) -> CoreResult<Vec<u8>> {
        let tx_data = TransactionForSigning {
            nonce: self.nonce,
            tx_type: self.tx_type,
            to: self.to,
            amount: self.amount.clone(),
        };

        bincode::encode_to_vec(&tx_data, bincode::config::standard())
            .map_err(|e| CoreError::Bincode(e.to_string()))
    }

    /// Calculate transaction hash (including signature)
    pub fn hash(&self) -> CoreResult<Hash> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoreError::Bincode(e.to_string()))?;
        let hash_bytes = Keccak256::digest(&encoded);
        Ok(Hash::from_slice(hash_bytes.as_slice()))
    }

    /// Calculate hash for signing (without signature)
    pub fn signing_hash(&self) -> CoreResult<Hash> {
        let encoded = self.encode_for_signing()?;
        let hash_bytes = Keccak256::digest(&encoded);
        Ok(Hash::from_slice(hash_bytes.as_slice()))
    }

    /// Sign the transaction with a secp256k1 private key
    pub fn sign(&mut self, private_key: &[u8]) -> CoreResult<()> {
        let signing_hash = self.signing_hash()?;

        let secp = secp256k1::Secp256k1::new();
        let secret_key = secret_key(private_key)?;

        let message = secp256k1::Message::from_digest(*signing_hash.as_bytes());
        let sig = secp.sign_ecdsa_recoverable(message, &secret_key);
        let (recovery_id, sig_bytes) = sig.serialize_compact();

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&sig_bytes[0..32]);
        s.copy_from_slice(&sig_bytes[32..64]);
        let v = i32::from(recovery_id) as u8;

        self.signature = Some(Signature::new(r, s, v));
        Ok(())
    }

    /// Builder-style signing, convenient when assembling batches
    pub fn signed(mut self, private_key: &[u8]) -> CoreResult<Self> {
        self.sign(private_key)?;
        Ok(self)
    }

    /// Get the sender address recovered from the signature
    pub fn sender(&self) -> CoreResult<Address> {
        let signature = self.signature.as_ref().ok_or(CoreError::InvalidSignature)?;
        let signing_hash = self.signing_hash()?;

        let secp = secp256k1::Secp256k1::new();
        let recovery_id = secp256k1::ecdsa::RecoveryId::try_from(i32::from(signature.v))
            .map_err(|_| CoreError::InvalidSignature)?;

        let mut sig_bytes = [0u8; 64];
        sig_bytes[0..32].copy_from_slice(&signature.r);
        sig_bytes[32..64].copy_from_slice(&signature.s);

        let recoverable_sig =
            secp256k1::ecdsa::RecoverableSignature::from_compact(&sig_bytes, recovery_id)
                .map_err(|_| CoreError::InvalidSignature)?;

        let message = secp256k1::Message::from_digest(*signing_hash.as_bytes());
        let public_key = secp
            .recover_ecdsa(message, &recoverable_sig)
            .map_err(|_| CoreError::InvalidSignature)?;

        // Skip the 0x04 tag of the uncompressed encoding
        let pubkey_bytes = public_key.serialize_uncompressed();
        Ok(Address::from_public_key(&pubkey_bytes[1..]))
    }

    /// Merkle commitment over the ordered transaction hashes
    pub fn derive_root(transactions: &[Transaction]) -> CoreResult<Hash> {
        let hashes = transactions
            .iter()
            .map(Transaction::hash)
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(merkle_root(&hashes))
    }
}

fn secret_key(private_key: &[u8]) -> CoreResult<secp256k1::SecretKey> {
    let bytes: [u8; 32] = private_key.try_into().map_err(|_| {
        CoreError::Crypto(format!(
            "secret key must be 32 bytes, got {}",
            private_key.len()
        ))
    })?;
    secp256k1::SecretKey::from_byte_array(bytes).map_err(|e| CoreError::Crypto(e.to_string()))
}

/// Address controlled by a secp256k1 private key
pub fn address_from_private_key(private_key: &[u8]) -> CoreResult<Address> {
    let secp = secp256k1::Secp256k1::new();
    let secret_key = secret_key(private_key)?;
    let public_key = secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
    Ok(Address::from_public_key(
        &public_key.serialize_uncompressed()[1..],
    ))
}

/// Helper struct for encoding transaction data for signing
#[derive(bincode::Encode)]
struct TransactionForSigning {
    nonce: Nonce,
    tx_type: TxType,
    to: Option<Address>,
    amount: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE_KEY: [u8; 32] = [0x11; 32];
    const BOB_KEY: [u8; 32] = [0x22; 32];

    fn bob() -> Address {
        address_from_private_key(&BOB_KEY).unwrap()
    }

    #[test]
    fn test_transaction_creation() {
        let tx = Transaction::send(1, bob(), Amount::from_u64(1000));

        assert_eq!(tx.nonce, 1);
        assert_eq!(tx.tx_type, TxType::Send);
        assert_eq!(tx.amount, Amount::from_u64(1000));
        assert_eq!(tx.to, Some(bob()));
        assert!(tx.signature.is_none());
    }

    #[test]
    fn test_transaction_hash_deterministic() {
        let tx = Transaction::send(1, bob(), Amount::from_u64(1000));
        assert_eq!(tx.hash().unwrap(), tx.hash().unwrap());

        let other = Transaction::send(2, bob(), Amount::from_u64(1000));
        assert_ne!(tx.hash().unwrap(), other.hash().unwrap());
    }

    #[test]
    fn test_sender_recovery() {
        let tx = Transaction::send(1, bob(), Amount::from_u64(5))
            .signed(&ALICE_KEY)
            .unwrap();
        let alice = address_from_private_key(&ALICE_KEY).unwrap();
        assert_eq!(tx.sender().unwrap(), alice);
    }

    #[test]
    fn test_unsigned_has_no_sender() {
        let tx = Transaction::approving(1);
        assert_eq!(tx.sender(), Err(CoreError::InvalidSignature));
    }

    #[test]
    fn test_tampered_transaction_changes_sender() {
        let mut tx = Transaction::send(1, bob(), Amount::from_u64(5))
            .signed(&ALICE_KEY)
            .unwrap();
        let alice = address_from_private_key(&ALICE_KEY).unwrap();
        tx.amount = Amount::from_u64(500);
        // Recovery over a different message yields some other key, or fails
        assert_ne!(tx.sender().ok(), Some(alice));
    }

    #[test]
    fn test_invalid_secret_keys() {
        assert!(matches!(
            address_from_private_key(&[7u8; 31]),
            Err(CoreError::Crypto(_))
        ));
        // zero is outside the curve order range
        assert!(matches!(
            address_from_private_key(&[0u8; 32]),
            Err(CoreError::Crypto(_))
        ));
        assert!(Transaction::approving(1).signed(&[1u8; 33]).is_err());
    }

    #[test]
    fn test_signature_bytes() {
        let tx = Transaction::approving(1).signed(&ALICE_KEY).unwrap();
        let sig = tx.signature.unwrap();
        let restored = Signature::from_bytes(&sig.to_bytes()).unwrap();
        assert_eq!(sig, restored);
        assert!(Signature::from_bytes(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_derive_root() {
        assert_eq!(Transaction::derive_root(&[]).unwrap(), Hash::zero());

        let a = Transaction::approving(1).signed(&ALICE_KEY).unwrap();
        let b = Transaction::send(1, bob(), Amount::from_u64(1))
            .signed(&BOB_KEY)
            .unwrap();
        let ab = Transaction::derive_root(&[a.clone(), b.clone()]).unwrap();
        let ba = Transaction::derive_root(&[b, a]).unwrap();
        assert_ne!(ab, ba);
    }
}
