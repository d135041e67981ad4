//! Proposer sortition and block seed derivation
//!
//! Both use the node's VRF key but over different messages:
//!
//! * proposer eligibility: `parent_seed || PROPOSER_ROLE || parent_height + 1`
//! * block seed: `parent_seed || height || block_hash`
//!
//! They are kept as separate functions so the two message domains can never
//! be mixed up by a caller.

use crate::vrf::{VrfKeypair, VrfOutput, VrfProof, VrfPublicKey};
use crate::{ConsensusError, ConsensusResult};
use chain_core::{BlockNumber, Hash, Seed};
use malachite::Natural;
use tracing::debug;

/// Role tag of the block proposer in sortition messages
pub const PROPOSER_ROLE: u8 = 0x1;

/// Bits of precision kept when turning a VRF output into a fraction
const FRACTION_BITS: u64 = 53;

/// Message for proposer sortition in the round after `parent_height`
pub fn proposer_message(parent_seed: &Seed, parent_height: BlockNumber) -> Vec<u8> {
    let mut message = Vec::with_capacity(Seed::LENGTH + 1 + 8);
    message.extend_from_slice(parent_seed.as_bytes());
    message.push(PROPOSER_ROLE);
    message.extend_from_slice(&(parent_height + 1).to_be_bytes());
    message
}

/// Message the seed of a block at `height` with hash `block_hash` is
/// evaluated over
pub fn block_seed_message(parent_seed: &Seed, height: BlockNumber, block_hash: &Hash) -> Vec<u8> {
    let mut message = Vec::with_capacity(Seed::LENGTH + 8 + 32);
    message.extend_from_slice(parent_seed.as_bytes());
    message.extend_from_slice(&height.to_be_bytes());
    message.extend_from_slice(block_hash.as_bytes());
    message
}

fn natural_from_bytes(bytes: &[u8]) -> Natural {
    let mut value = Natural::from(0u32);
    for byte in bytes {
        value *= Natural::from(256u32);
        value += Natural::from(*byte);
    }
    value
}

/// `output / (2^256 - 1)` as a fraction in `[0, 1]`.
///
/// The quotient is truncated to 53 bits with integer arithmetic before the
/// conversion to `f64`, so every node computes the same value.
pub fn output_fraction(output: &VrfOutput) -> f64 {
    let value = natural_from_bytes(output.as_bytes());
    let one = Natural::from(1u32);
    let max = (Natural::from(1u32) << 256u64) - &one;
    let scaled = (value << FRACTION_BITS) / max;
    // scaled <= 2^53, which always fits
    let numerator = u64::try_from(&scaled).unwrap_or(1u64 << FRACTION_BITS);
    numerator as f64 / (1u64 << FRACTION_BITS) as f64
}

/// Outcome of evaluating proposer sortition
#[derive(Debug, Clone, PartialEq)]
pub struct SortitionResult {
    pub eligible: bool,
    pub output: Hash,
    pub proof: Vec<u8>,
    pub fraction: f64,
}

/// Sortition evaluator holding the node's VRF key
#[derive(Debug, Clone)]
pub struct Sortition {
    keypair: VrfKeypair,
    proposer_threshold: f64,
}

impl Sortition {
    pub fn new(keypair: VrfKeypair, proposer_threshold: f64) -> Self {
        Self {
            keypair,
            proposer_threshold,
        }
    }

    pub fn public_key(&self) -> VrfPublicKey {
        self.keypair.public()
    }

    pub fn threshold(&self) -> f64 {
        self.proposer_threshold
    }

    /// Evaluate proposer eligibility for the round after the given parent
    pub fn proposer(&self, parent_seed: &Seed, parent_height: BlockNumber) -> SortitionResult {
        let message = proposer_message(parent_seed, parent_height);
        let (output, proof) = self.keypair.evaluate(&message);
        let fraction = output_fraction(&output);
        let eligible = fraction >= self.proposer_threshold;
        debug!(
            round = parent_height + 1,
            fraction, eligible, "Evaluated proposer sortition"
        );
        SortitionResult {
            eligible,
            output: Hash::new(output.0),
            proof: proof.to_bytes(),
            fraction,
        }
    }

    /// Evaluate the seed of a block whose hash is already fixed
    pub fn block_seed(
        &self,
        parent_seed: &Seed,
        height: BlockNumber,
        block_hash: &Hash,
    ) -> (Seed, Vec<u8>) {
        let message = block_seed_message(parent_seed, height, block_hash);
        let (output, proof) = self.keypair.evaluate(&message);
        (Seed::new(output.0), proof.to_bytes())
    }
}

/// Check that `proof` proves `output` as the proposer sortition of
/// `public_key` for the round after the parent, and that it meets
/// `threshold`.
pub fn verify_proposer(
    public_key: &[u8],
    parent_seed: &Seed,
    parent_height: BlockNumber,
    output: &Hash,
    proof: &[u8],
    threshold: f64,
) -> ConsensusResult<()> {
    let public_key = VrfPublicKey::from_bytes(public_key)?;
    let proof = VrfProof::from_bytes(proof)?;
    let message = proposer_message(parent_seed, parent_height);
    let proven = public_key.verify(&message, &proof)?;

    if proven.as_bytes() != output.as_bytes() {
        return Err(ConsensusError::VerificationFailed);
    }

    let fraction = output_fraction(&proven);
    if fraction < threshold {
        return Err(ConsensusError::NotEligible {
            fraction,
            threshold,
        });
    }
    Ok(())
}

/// Check a block's claimed seed against its proof under the proposer key
pub fn verify_block_seed(
    public_key: &[u8],
    parent_seed: &Seed,
    height: BlockNumber,
    block_hash: &Hash,
    claimed: &Seed,
    proof: &[u8],
) -> ConsensusResult<()> {
    if claimed.is_zero() {
        return Err(ConsensusError::InvalidSeed("seed is all zero".to_string()));
    }
    if proof.is_empty() {
        return Err(ConsensusError::InvalidSeed("seed proof is empty".to_string()));
    }

    let public_key = VrfPublicKey::from_bytes(public_key)?;
    let proof = VrfProof::from_bytes(proof)?;
    let message = block_seed_message(parent_seed, height, block_hash);
    let proven = public_key.verify(&message, &proof)?;

    if proven.as_bytes() != claimed.as_bytes() {
        return Err(ConsensusError::InvalidSeed(format!(
            "claimed {} but proof yields 0x{}",
            claimed,
            hex::encode(proven.as_bytes())
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sortition(threshold: f64) -> Sortition {
        let keypair = VrfKeypair::from_secret_bytes(&[9u8; 32]).unwrap();
        Sortition::new(keypair, threshold)
    }

    #[test]
    fn test_message_layouts() {
        let seed = Seed::new([1u8; 32]);
        let proposer = proposer_message(&seed, 4);
        assert_eq!(proposer.len(), 41);
        assert_eq!(proposer[32], PROPOSER_ROLE);
        assert_eq!(&proposer[33..], &5u64.to_be_bytes());

        let block = block_seed_message(&seed, 5, &Hash::new([2u8; 32]));
        assert_eq!(block.len(), 72);
        assert_eq!(&block[32..40], &5u64.to_be_bytes());
        assert_eq!(&block[40..], &[2u8; 32]);
    }

    #[test]
    fn test_output_fraction_bounds() {
        assert_eq!(output_fraction(&VrfOutput([0u8; 32])), 0.0);
        assert_eq!(output_fraction(&VrfOutput([0xffu8; 32])), 1.0);

        let mut half = [0u8; 32];
        half[0] = 0x80;
        let fraction = output_fraction(&VrfOutput(half));
        assert!((fraction - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_zero_always_eligible() {
        let result = sortition(0.0).proposer(&Seed::new([3u8; 32]), 10);
        assert!(result.eligible);
        assert!(result.fraction >= 0.0 && result.fraction <= 1.0);
    }

    #[test]
    fn test_threshold_above_one_never_eligible() {
        let result = sortition(1.1).proposer(&Seed::new([3u8; 32]), 10);
        assert!(!result.eligible);
    }

    #[test]
    fn test_verify_proposer_roundtrip() {
        let s = sortition(0.0);
        let seed = Seed::new([3u8; 32]);
        let result = s.proposer(&seed, 10);
        let pk = s.public_key().to_bytes();

        verify_proposer(&pk, &seed, 10, &result.output, &result.proof, 0.0).unwrap();

        // wrong round
        assert!(verify_proposer(&pk, &seed, 11, &result.output, &result.proof, 0.0).is_err());
        // wrong output
        assert_eq!(
            verify_proposer(&pk, &seed, 10, &Hash::zero(), &result.proof, 0.0),
            Err(ConsensusError::VerificationFailed)
        );
        // threshold not met
        assert!(matches!(
            verify_proposer(&pk, &seed, 10, &result.output, &result.proof, 1.1),
            Err(ConsensusError::NotEligible { .. })
        ));
    }

    #[test]
    fn test_proposer_and_seed_domains_differ() {
        let s = sortition(0.0);
        let seed = Seed::new([3u8; 32]);
        let proposer = s.proposer(&seed, 10);
        let pk = s.public_key().to_bytes();

        // A proposer proof must not pass as a block seed proof
        let as_seed = Seed::new(*proposer.output.as_bytes());
        assert!(verify_block_seed(&pk, &seed, 11, &Hash::zero(), &as_seed, &proposer.proof).is_err());
    }

    #[test]
    fn test_block_seed_roundtrip_and_rejections() {
        let s = sortition(0.5);
        let parent_seed = Seed::new([3u8; 32]);
        let block_hash = Hash::new([8u8; 32]);
        let (seed, proof) = s.block_seed(&parent_seed, 7, &block_hash);
        let pk = s.public_key().to_bytes();

        verify_block_seed(&pk, &parent_seed, 7, &block_hash, &seed, &proof).unwrap();

        // zero seed
        assert!(matches!(
            verify_block_seed(&pk, &parent_seed, 7, &block_hash, &Seed::default(), &proof),
            Err(ConsensusError::InvalidSeed(_))
        ));
        // empty proof
        assert!(matches!(
            verify_block_seed(&pk, &parent_seed, 7, &block_hash, &seed, &[]),
            Err(ConsensusError::InvalidSeed(_))
        ));
        // other block hash
        assert!(
            verify_block_seed(&pk, &parent_seed, 7, &Hash::zero(), &seed, &proof).is_err()
        );
        // bad key
        assert!(matches!(
            verify_block_seed(&[1, 2, 3], &parent_seed, 7, &block_hash, &seed, &proof),
            Err(ConsensusError::InvalidPublicKey(_))
        ));
        // mutated seed
        let mut bytes = *seed.as_bytes();
        bytes[0] ^= 0x80;
        assert!(matches!(
            verify_block_seed(&pk, &parent_seed, 7, &block_hash, &Seed::new(bytes), &proof),
            Err(ConsensusError::InvalidSeed(_))
        ));
    }
}
