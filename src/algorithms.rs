//! KEXINIT name lists and algorithm selection (spec.md §4.4).
//!
//! The teacher (`packet/types.rs`) modeled each algorithm family as a
//! closed Rust enum with a fallback `Unknown(String)` variant and a
//! `serde`-integrated name <-> variant mapping (`impl_name_enum!`). That
//! serde hookup doesn't survive the jump off pre-1.0 serde, but the shape —
//! closed enum, `as_str`/`FromStr`, one macro per family — is kept
//! verbatim.

use std::fmt;

use crate::error::{HandshakeError, Result};
use crate::wire::{Reader, WireResult, Writer};

macro_rules! impl_name_enum {
    ($ty:ident { $($variant:ident => $name:expr),* $(,)? }) => {
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $ty {
            $($variant),*
        }

        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $name),*
                }
            }

            pub fn from_name(s: &str) -> Option<$ty> {
                match s {
                    $($name => Some($ty::$variant)),*,
                    _ => None
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    }
}

impl_name_enum!(KexAlgorithm {
    DiffieHellmanGroup14Sha256 => "diffie-hellman-group14-sha256",
    DiffieHellmanGroup1Sha1 => "diffie-hellman-group1-sha1",
});

impl_name_enum!(HostKeyAlgorithm {
    SshRsa => "ssh-rsa",
    SshEd25519 => "ssh-ed25519",
});

impl_name_enum!(CipherAlgorithm {
    Aes256Ctr => "aes256-ctr",
    Aes128Ctr => "aes128-ctr",
});

impl_name_enum!(MacAlgorithm {
    HmacSha256 => "hmac-sha2-256",
});

/// The ten name-lists plus cookie that make up an `SSH_MSG_KEXINIT` payload
/// (spec.md §3, §4.4). Kept as plain `Vec<String>` (rather than parsed
/// enums) because the wire format allows algorithm names this crate
/// doesn't recognize — negotiation must still see them to compute a
/// correct first-common-match.
#[derive(Debug, Clone)]
pub struct KexInitLists {
    pub cookie: [u8; 16],
    pub kex_algorithms: Vec<String>,
    pub server_host_key_algorithms: Vec<String>,
    pub encryption_algorithms_client_to_server: Vec<String>,
    pub encryption_algorithms_server_to_client: Vec<String>,
    pub mac_algorithms_client_to_server: Vec<String>,
    pub mac_algorithms_server_to_client: Vec<String>,
    pub compression_algorithms_client_to_server: Vec<String>,
    pub compression_algorithms_server_to_client: Vec<String>,
    pub languages_client_to_server: Vec<String>,
    pub languages_server_to_client: Vec<String>,
    pub first_kex_packet_follows: bool,
    pub reserved: u32,
}

impl KexInitLists {
    /// Serializes the body following the `SSH_MSG_KEXINIT` message code
    /// (cookie onward), matching `buffer_add_*` use in spec.md §4.3.
    pub fn write_body(&self, w: &mut Writer) {
        w.add_raw(&self.cookie);
        w.add_name_list(&as_str_refs(&self.kex_algorithms));
        w.add_name_list(&as_str_refs(&self.server_host_key_algorithms));
        w.add_name_list(&as_str_refs(&self.encryption_algorithms_client_to_server));
        w.add_name_list(&as_str_refs(&self.encryption_algorithms_server_to_client));
        w.add_name_list(&as_str_refs(&self.mac_algorithms_client_to_server));
        w.add_name_list(&as_str_refs(&self.mac_algorithms_server_to_client));
        w.add_name_list(&as_str_refs(&self.compression_algorithms_client_to_server));
        w.add_name_list(&as_str_refs(&self.compression_algorithms_server_to_client));
        w.add_name_list(&as_str_refs(&self.languages_client_to_server));
        w.add_name_list(&as_str_refs(&self.languages_server_to_client));
        w.add_bool(self.first_kex_packet_follows);
        w.add_u32(self.reserved);
    }

    /// Parses the body following the message code byte (spec.md §4.4 step
    /// 1: "parse cookie (16 bytes) and ten name-lists").
    pub fn parse_body(r: &mut Reader) -> WireResult<KexInitLists> {
        let cookie_bytes = r.get_raw(16)?;
        let mut cookie = [0u8; 16];
        cookie.copy_from_slice(cookie_bytes);
        Ok(KexInitLists {
            cookie,
            kex_algorithms: r.get_name_list()?,
            server_host_key_algorithms: r.get_name_list()?,
            encryption_algorithms_client_to_server: r.get_name_list()?,
            encryption_algorithms_server_to_client: r.get_name_list()?,
            mac_algorithms_client_to_server: r.get_name_list()?,
            mac_algorithms_server_to_client: r.get_name_list()?,
            compression_algorithms_client_to_server: r.get_name_list()?,
            compression_algorithms_server_to_client: r.get_name_list()?,
            languages_client_to_server: r.get_name_list()?,
            languages_server_to_client: r.get_name_list()?,
            first_kex_packet_follows: r.get_bool()?,
            reserved: r.get_u32()?,
        })
    }
}

fn as_str_refs(v: &[String]) -> Vec<&str> {
    v.iter().map(|s| s.as_str()).collect()
}

/// The client's supported algorithms in preference order. Generalizes the
/// single hardcoded `AlgorithmNegotiation` literal in the teacher's
/// `src/bin/client.rs` into something callers can customize (spec.md §4.4
/// step 2, `list_local_kex`).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub kex: Vec<KexAlgorithm>,
    pub host_key: Vec<HostKeyAlgorithm>,
    pub cipher: Vec<CipherAlgorithm>,
    pub mac: Vec<MacAlgorithm>,
    pub allow_v1: bool,
    pub allow_v2: bool,
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            kex: vec![KexAlgorithm::DiffieHellmanGroup14Sha256, KexAlgorithm::DiffieHellmanGroup1Sha1],
            host_key: vec![HostKeyAlgorithm::SshEd25519, HostKeyAlgorithm::SshRsa],
            cipher: vec![CipherAlgorithm::Aes256Ctr, CipherAlgorithm::Aes128Ctr],
            mac: vec![MacAlgorithm::HmacSha256],
            allow_v1: false,
            allow_v2: true,
        }
    }
}

impl ClientConfig {
    /// Builds the `SSH_MSG_KEXINIT` name lists this client will send
    /// (spec.md §4.4 step 2). `cookie` must be 16 bytes of fresh
    /// randomness, generated by the caller with the configured RNG.
    pub fn to_kexinit_lists(&self, cookie: [u8; 16]) -> KexInitLists {
        let names = |v: &[&'static str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        KexInitLists {
            cookie,
            kex_algorithms: names(&self.kex.iter().map(|a| a.as_str()).collect::<Vec<_>>()),
            server_host_key_algorithms: names(&self.host_key.iter().map(|a| a.as_str()).collect::<Vec<_>>()),
            encryption_algorithms_client_to_server: names(&self.cipher.iter().map(|a| a.as_str()).collect::<Vec<_>>()),
            encryption_algorithms_server_to_client: names(&self.cipher.iter().map(|a| a.as_str()).collect::<Vec<_>>()),
            mac_algorithms_client_to_server: names(&self.mac.iter().map(|a| a.as_str()).collect::<Vec<_>>()),
            mac_algorithms_server_to_client: names(&self.mac.iter().map(|a| a.as_str()).collect::<Vec<_>>()),
            compression_algorithms_client_to_server: vec!["none".to_string()],
            compression_algorithms_server_to_client: vec!["none".to_string()],
            languages_client_to_server: Vec::new(),
            languages_server_to_client: Vec::new(),
            first_kex_packet_follows: false,
            reserved: 0,
        }
    }
}

/// The outcome of `choose_algorithms` (spec.md §4.4 step 3): one pick per
/// algorithm family.
#[derive(Debug, Clone)]
pub struct NegotiatedAlgorithms {
    pub kex: KexAlgorithm,
    pub host_key: HostKeyAlgorithm,
    pub cipher_client_to_server: CipherAlgorithm,
    pub cipher_server_to_client: CipherAlgorithm,
    pub mac_client_to_server: MacAlgorithm,
    pub mac_server_to_client: MacAlgorithm,
}

/// Picks the first client-preferred algorithm that also appears in the
/// server's list. Absence of any intersection is fatal (spec.md §4.4 step
/// 3). Deterministic given identical inputs (spec.md §8, "Algorithm
/// selection is stable").
fn first_match<T: Copy>(
    client_pref: &[T],
    server_list: &[String],
    as_str: impl Fn(T) -> &'static str,
    family: &'static str,
) -> Result<T> {
    for candidate in client_pref {
        let name = as_str(*candidate);
        if server_list.iter().any(|s| s == name) {
            return Ok(*candidate);
        }
    }
    Err(HandshakeError::NoCommonAlgorithm(family))
}

pub fn choose_algorithms(local: &ClientConfig, server: &KexInitLists) -> Result<NegotiatedAlgorithms> {
    Ok(NegotiatedAlgorithms {
        kex: first_match(&local.kex, &server.kex_algorithms, KexAlgorithm::as_str, "kex")?,
        host_key: first_match(&local.host_key, &server.server_host_key_algorithms, HostKeyAlgorithm::as_str, "host-key")?,
        cipher_client_to_server: first_match(
            &local.cipher,
            &server.encryption_algorithms_client_to_server,
            CipherAlgorithm::as_str,
            "cipher-c2s",
        )?,
        cipher_server_to_client: first_match(
            &local.cipher,
            &server.encryption_algorithms_server_to_client,
            CipherAlgorithm::as_str,
            "cipher-s2c",
        )?,
        mac_client_to_server: first_match(&local.mac, &server.mac_algorithms_client_to_server, MacAlgorithm::as_str, "mac-c2s")?,
        mac_server_to_client: first_match(&local.mac, &server.mac_algorithms_server_to_client, MacAlgorithm::as_str, "mac-s2c")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_lists(kex: &[&str]) -> KexInitLists {
        KexInitLists {
            cookie: [0u8; 16],
            kex_algorithms: kex.iter().map(|s| s.to_string()).collect(),
            server_host_key_algorithms: vec!["ssh-rsa".into()],
            encryption_algorithms_client_to_server: vec!["aes256-ctr".into()],
            encryption_algorithms_server_to_client: vec!["aes256-ctr".into()],
            mac_algorithms_client_to_server: vec!["hmac-sha2-256".into()],
            mac_algorithms_server_to_client: vec!["hmac-sha2-256".into()],
            compression_algorithms_client_to_server: vec!["none".into()],
            compression_algorithms_server_to_client: vec!["none".into()],
            languages_client_to_server: vec![],
            languages_server_to_client: vec![],
            first_kex_packet_follows: false,
            reserved: 0,
        }
    }

    #[test]
    fn picks_first_common_algorithm() {
        let local = ClientConfig::default();
        let server = server_lists(&["diffie-hellman-group1-sha1", "diffie-hellman-group14-sha256"]);
        let chosen = choose_algorithms(&local, &server).unwrap();
        // client prefers group14 first; it's present, so it wins even
        // though group1 appears earlier in the server's list.
        assert_eq!(chosen.kex, KexAlgorithm::DiffieHellmanGroup14Sha256);
    }

    #[test]
    fn no_intersection_is_fatal() {
        let local = ClientConfig::default();
        let server = server_lists(&["diffie-hellman-group-exchange-sha256"]);
        assert!(matches!(choose_algorithms(&local, &server), Err(HandshakeError::NoCommonAlgorithm("kex"))));
    }

    #[test]
    fn selection_is_deterministic() {
        let local = ClientConfig::default();
        let server = server_lists(&["diffie-hellman-group1-sha1", "diffie-hellman-group14-sha256"]);
        let a = choose_algorithms(&local, &server).unwrap();
        let b = choose_algorithms(&local, &server).unwrap();
        assert_eq!(a.kex, b.kex);
    }
}
