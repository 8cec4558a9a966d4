//! Client-side SSH transport handshake core: banner negotiation, KEXINIT
//! algorithm negotiation, Diffie-Hellman key exchange, and the crossover to
//! an encrypted, service-accepted transport ready for user authentication.
//!
//! The teacher (`kimhyunkang/rssh`) built this on `futures` 0.1 and
//! `tokio-core`, both long unmaintained; this crate keeps the teacher's
//! module boundaries (`packet` -> [`wire`], `handshake` -> [`banner`] +
//! [`algorithms`] + [`dh`] + [`session`], `transport` -> [`wire::packet`])
//! but drives them from the explicit callback-driven state machine spec.md
//! §2 describes rather than a `Future` chain, so any reactor (`mio`,
//! `tokio`, a plain blocking loop) can drive it.

pub mod algorithms;
pub mod banner;
pub mod crypto;
pub mod dh;
pub mod error;
pub mod session;
pub mod socket;
pub mod wire;

pub use error::{HandshakeError, Result};
pub use session::{DhState, Session, State};

/// `SSH_MSG_DISCONNECT` (RFC 4253 §11.1).
pub const SSH_MSG_DISCONNECT: u8 = 1;
/// `SSH_MSG_SERVICE_REQUEST` (RFC 4253 §10).
pub const SSH_MSG_SERVICE_REQUEST: u8 = 5;
/// `SSH_MSG_SERVICE_ACCEPT` (RFC 4253 §10).
pub const SSH_MSG_SERVICE_ACCEPT: u8 = 6;
/// `SSH_MSG_KEXINIT` (RFC 4253 §7.1).
pub const SSH_MSG_KEXINIT: u8 = 20;
/// `SSH_MSG_NEWKEYS` (RFC 4253 §7.3).
pub const SSH_MSG_NEWKEYS: u8 = 21;
/// `SSH_MSG_KEXDH_INIT` (RFC 4253 §8).
pub const SSH_MSG_KEXDH_INIT: u8 = 30;
/// `SSH_MSG_KEXDH_REPLY` (RFC 4253 §8).
pub const SSH_MSG_KEXDH_REPLY: u8 = 31;

/// `SSH2_DISCONNECT_BY_APPLICATION` (RFC 4253 §11.1), used by
/// [`Session::disconnect`].
pub const SSH2_DISCONNECT_BY_APPLICATION: u32 = 11;

/// A static string identifying this implementation, analogous to libssh's
/// `ssh_copyright()` (spec.md §6, "User-facing operations").
pub fn copyright() -> &'static str {
    concat!(
        env!("CARGO_PKG_NAME"),
        " ",
        env!("CARGO_PKG_VERSION"),
        ": client-side SSH transport handshake core"
    )
}
