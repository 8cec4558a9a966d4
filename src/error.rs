use std::io;

/// Errors that can terminate a handshake. Every variant is fatal: per
/// spec.md's fail-fast policy there is no in-handshake retry, so producing
/// one of these always drives the `Session` into `State::Error`.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("Connection failed: {0}")]
    ConnectFailed(io::Error),

    #[error("Socket error: {0}")]
    SocketError(io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Receiving banner: too large banner")]
    BannerTooLarge,

    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    #[error("No version of SSH protocol usable")]
    NoUsableVersion,

    #[error("invalid algorithm negotiation: {0}")]
    InvalidAlgorithmNegotiation(String),

    #[error("no common algorithm for {0}")]
    NoCommonAlgorithm(&'static str),

    #[error("invalid KEX reply: {0}")]
    InvalidKexReply(String),

    #[error("key exchange failed: {0}")]
    KexFailed(String),

    #[error("server host key signature verification failed")]
    ServerKeyNotVerified,

    #[error("unexpected message code {0}, expected {1}")]
    UnexpectedMessage(u8, u8),

    #[error("service request for {0:?} was denied")]
    ServiceDenied(String),

    #[error("operation invalid in current state: {0}")]
    InvalidState(&'static str),

    #[error("advance() was re-entered while already running")]
    Reentrant,

    #[error("malformed packet: {0}")]
    Wire(#[from] crate::wire::WireError),
}

pub type Result<T> = std::result::Result<T, HandshakeError>;
