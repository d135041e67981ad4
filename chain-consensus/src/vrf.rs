//! VRF (Verifiable Random Function) over the Ristretto group
//!
//! ECVRF construction: the message is hashed to a group element `H`, the
//! output point is `Gamma = x·H`, and a Chaum-Pedersen proof `(c, s)` shows
//! that `log_B(Y) == log_H(Gamma)` for the public key `Y = x·B`. The output
//! bytes are a hash of `Gamma`, so they are unique for a (key, message) pair
//! and verifiable with the public key alone.

use crate::{ConsensusError, ConsensusResult};
use blake3::Hasher;
use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT,
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
    traits::IsIdentity,
};
use serde::{Deserialize, Serialize};

const HASH_TO_POINT_DOMAIN: &[u8] = b"chain.vrf.hash_to_point";
const NONCE_DOMAIN: &[u8] = b"chain.vrf.nonce";
const CHALLENGE_DOMAIN: &[u8] = b"chain.vrf.challenge";
const OUTPUT_DOMAIN: &[u8] = b"chain.vrf.output";

/// VRF output: 32 pseudorandom bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VrfOutput(pub [u8; 32]);

impl VrfOutput {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// VRF proof: `Gamma || c || s`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfProof {
    gamma: [u8; 32],
    c: [u8; 32],
    s: [u8; 32],
}

impl VrfProof {
    pub const LENGTH: usize = 96;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::LENGTH);
        bytes.extend_from_slice(&self.gamma);
        bytes.extend_from_slice(&self.c);
        bytes.extend_from_slice(&self.s);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> ConsensusResult<Self> {
        if bytes.len() != Self::LENGTH {
            return Err(ConsensusError::MalformedProof(format!(
                "expected {} bytes, got {}",
                Self::LENGTH,
                bytes.len()
            )));
        }
        let mut gamma = [0u8; 32];
        let mut c = [0u8; 32];
        let mut s = [0u8; 32];
        gamma.copy_from_slice(&bytes[0..32]);
        c.copy_from_slice(&bytes[32..64]);
        s.copy_from_slice(&bytes[64..96]);
        Ok(Self { gamma, c, s })
    }
}

/// VRF key pair for evaluation
#[derive(Clone)]
pub struct VrfKeypair {
    /// Private scalar
    secret: Scalar,
    /// Public point
    public: RistrettoPoint,
}

impl std::fmt::Debug for VrfKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VrfKeypair")
            .field("public", &hex::encode(self.public.compress().as_bytes()))
            .finish_non_exhaustive()
    }
}

impl VrfKeypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        loop {
            let secret_bytes: [u8; 32] = rand::random();
            if let Ok(keypair) = Self::from_secret_bytes(&secret_bytes) {
                return keypair;
            }
        }
    }

    /// Derive a keypair from 32 bytes of secret key material
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> ConsensusResult<Self> {
        let secret = Scalar::from_bytes_mod_order(*bytes);
        if secret == Scalar::ZERO {
            return Err(ConsensusError::InvalidSecretKey(
                "secret scalar reduces to zero".to_string(),
            ));
        }
        let public = secret * RISTRETTO_BASEPOINT_POINT;

        Ok(Self { secret, public })
    }

    /// Get public key
    pub fn public(&self) -> VrfPublicKey {
        VrfPublicKey {
            point: self.public,
        }
    }

    /// Evaluate the VRF on `message`, returning the output and its proof
    pub fn evaluate(&self, message: &[u8]) -> (VrfOutput, VrfProof) {
        let public_bytes = self.public.compress().to_bytes();
        let h = hash_to_point(&public_bytes, message);
        let gamma = self.secret * h;

        let k = nonce(&self.secret, &h);
        let u = k * RISTRETTO_BASEPOINT_POINT;
        let v = k * h;

        let c = challenge(&public_bytes, &h, &gamma, &u, &v);
        let s = k + c * self.secret;

        let gamma_bytes = gamma.compress().to_bytes();
        let proof = VrfProof {
            gamma: gamma_bytes,
            c: c.to_bytes(),
            s: s.to_bytes(),
        };
        (output_from_gamma(&gamma_bytes), proof)
    }
}

/// VRF public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VrfPublicKey {
    point: RistrettoPoint,
}

impl VrfPublicKey {
    /// Serialize public key
    pub fn to_bytes(&self) -> [u8; 32] {
        self.point.compress().to_bytes()
    }

    /// Parse a public key, rejecting wrong lengths, non-canonical encodings
    /// and the identity element.
    pub fn from_bytes(bytes: &[u8]) -> ConsensusResult<Self> {
        let compressed = CompressedRistretto::from_slice(bytes).map_err(|_| {
            ConsensusError::InvalidPublicKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;

        let point = compressed.decompress().ok_or_else(|| {
            ConsensusError::InvalidPublicKey("Failed to decompress point".to_string())
        })?;

        if point.is_identity() {
            return Err(ConsensusError::InvalidPublicKey(
                "identity point".to_string(),
            ));
        }

        Ok(Self { point })
    }

    /// Verify `proof` for `message` and return the proven output
    pub fn verify(&self, message: &[u8], proof: &VrfProof) -> ConsensusResult<VrfOutput> {
        let gamma = CompressedRistretto(proof.gamma)
            .decompress()
            .ok_or_else(|| ConsensusError::MalformedProof("invalid gamma point".to_string()))?;
        let c = canonical_scalar(proof.c, "challenge")?;
        let s = canonical_scalar(proof.s, "response")?;

        let public_bytes = self.to_bytes();
        let h = hash_to_point(&public_bytes, message);

        // s·B - c·Y == k·B and s·H - c·Gamma == k·H for an honest proof
        let u = s * RISTRETTO_BASEPOINT_POINT - c * self.point;
        let v = s * h - c * gamma;

        if challenge(&public_bytes, &h, &gamma, &u, &v) != c {
            return Err(ConsensusError::VerificationFailed);
        }

        Ok(output_from_gamma(&proof.gamma))
    }
}

fn canonical_scalar(bytes: [u8; 32], what: &str) -> ConsensusResult<Scalar> {
    Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
        .ok_or_else(|| ConsensusError::MalformedProof(format!("non-canonical {}", what)))
}

fn wide_hash(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    let mut wide = [0u8; 64];
    hasher.finalize_xof().fill(&mut wide);
    wide
}

fn hash_to_point(public: &[u8; 32], message: &[u8]) -> RistrettoPoint {
    let wide = wide_hash(&[HASH_TO_POINT_DOMAIN, public, message]);
    RistrettoPoint::from_uniform_bytes(&wide)
}

fn nonce(secret: &Scalar, h: &RistrettoPoint) -> Scalar {
    let wide = wide_hash(&[NONCE_DOMAIN, secret.as_bytes(), h.compress().as_bytes()]);
    Scalar::from_bytes_mod_order_wide(&wide)
}

fn challenge(
    public: &[u8; 32],
    h: &RistrettoPoint,
    gamma: &RistrettoPoint,
    u: &RistrettoPoint,
    v: &RistrettoPoint,
) -> Scalar {
    let wide = wide_hash(&[
        CHALLENGE_DOMAIN,
        public,
        h.compress().as_bytes(),
        gamma.compress().as_bytes(),
        u.compress().as_bytes(),
        v.compress().as_bytes(),
    ]);
    Scalar::from_bytes_mod_order_wide(&wide)
}

fn output_from_gamma(gamma: &[u8; 32]) -> VrfOutput {
    let mut hasher = Hasher::new();
    hasher.update(OUTPUT_DOMAIN);
    hasher.update(gamma);
    VrfOutput(*hasher.finalize().as_bytes())
}
