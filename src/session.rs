//! The Session state machine (spec.md §2-§4, §7): the single `advance`-style
//! re-entrant driver the transport, banner negotiator and DH handshake
//! compose into. Grounded in the teacher's `handshake.rs` `ClientKeyExchange`
//! (an explicit `poll`-driven enum of sub-states); this rework keeps the
//! same "one state knows how to produce the next" shape but drives it from
//! the `Socket` callbacks spec.md §4.1 specifies instead of a `Future`.

use log::{debug, trace, warn};
use rand::RngCore;

use crate::algorithms::{choose_algorithms, ClientConfig, KexInitLists, NegotiatedAlgorithms};
use crate::banner::{self, BannerDecoder};
use crate::crypto::{self, CryptoContext, CryptoPair, SessionCrypto};
use crate::dh::{self, DhGroup, Secret};
use crate::error::{HandshakeError, Result};
use crate::socket::{BlockingTcpSocket, ConnectStatus, Socket};
use crate::wire::{packet, Reader, Writer};
use crate::{
    SSH2_DISCONNECT_BY_APPLICATION, SSH_MSG_DISCONNECT, SSH_MSG_KEXDH_INIT, SSH_MSG_KEXDH_REPLY, SSH_MSG_KEXINIT,
    SSH_MSG_NEWKEYS, SSH_MSG_SERVICE_ACCEPT, SSH_MSG_SERVICE_REQUEST,
};

/// spec.md §3: `state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    None,
    Connecting,
    SocketConnected,
    BannerReceived,
    InitialKex,
    Authenticating,
    Error,
}

/// spec.md §3: `dh_state`. Advances monotonically within one handshake
/// (spec.md §8's "Monotonicity" property); `Session` never assigns a
/// variant earlier in this list once a later one has been reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DhState {
    Init,
    InitToSend,
    InitSent,
    NewkeysToSend,
    NewkeysSent,
    Finished,
}

/// Active decoder for `on_data` (spec.md §4.1: "Only ONE decoder is active
/// at a time"). `Cleartext` and `Encrypted` share a [`packet::PacketReader`]
/// implementation; which one is used just determines whether a
/// [`CryptoContext`] is threaded through `feed`.
enum Decoder {
    Banner(BannerDecoder),
    Packet(packet::PacketReader),
}

/// The transient Diffie-Hellman material spec.md §3 calls `dh_params`.
/// Dropped (and `x`/`k` zeroized) as soon as the handshake either finishes
/// or fails (spec.md §5, §8: "no DH temporary is retained").
struct DhParams {
    group: DhGroup,
    x: Secret,
    e: Vec<u8>,
    f: Vec<u8>,
    k: Option<Secret>,
    host_pubkey_blob: Vec<u8>,
    server_signature: Vec<u8>,
}

/// User-supplied progress/exception hooks (spec.md §3 "callbacks", §6
/// "Progress callback"). The teacher's C-derived ancestor threads an opaque
/// `void *userdata` through these; in Rust a capturing closure plays that
/// role instead, so no separate userdata slot is needed.
#[derive(Default)]
pub struct Callbacks {
    pub on_progress: Option<Box<dyn FnMut(f64)>>,
    pub on_error: Option<Box<dyn FnMut(&HandshakeError)>>,
}

impl Callbacks {
    fn progress(&mut self, value: f64) {
        if let Some(cb) = self.on_progress.as_mut() {
            cb(value);
        }
    }

    fn error(&mut self, e: &HandshakeError) {
        if let Some(cb) = self.on_error.as_mut() {
            cb(e);
        }
    }
}

/// The root entity (spec.md §3). Generic over the socket abstraction so
/// that any non-blocking reactor can drive it; [`connect`] below wires up
/// the one reference [`BlockingTcpSocket`] implementation for callers (and
/// this crate's own tests) who don't have a reactor of their own.
pub struct Session<S: Socket> {
    socket: S,
    decoder: Decoder,

    state: State,
    dh_state: DhState,
    version: Option<u8>,

    peer_banner: Vec<u8>,
    self_banner: Vec<u8>,
    peer_vendor_version: Option<(u32, u32)>,

    config: ClientConfig,
    client_kex: Option<KexInitLists>,
    server_kex: Option<KexInitLists>,
    negotiated: Option<NegotiatedAlgorithms>,

    dh_params: Option<DhParams>,
    session_id: Option<Vec<u8>>,
    server_kexinit_raw: Option<Vec<u8>>,

    current_crypto: CryptoPair,

    // RFC 4253 §6.4: each direction's packet sequence number counts every
    // packet since the version banner (including the cleartext KEXINIT /
    // KEXDH_INIT / NEWKEYS ones) and never resets at the NEWKEYS boundary,
    // so it lives here rather than inside `CryptoContext`, which is
    // rebuilt fresh at every key exchange.
    tx_seq_no: u32,
    rx_seq_no: u32,

    issue_banner: Option<String>,

    alive: bool,
    connected: bool,
    advancing: bool,

    callbacks: Callbacks,
    error_message: Option<String>,
}

impl<S: Socket> Session<S> {
    /// Constructs a fresh, unconnected session (spec.md §3 "Lifecycles:
    /// Session is created by the caller").
    pub fn new(socket: S, config: ClientConfig) -> Session<S> {
        Session {
            socket,
            decoder: Decoder::Banner(BannerDecoder::new()),
            state: State::None,
            dh_state: DhState::Init,
            version: None,
            peer_banner: Vec::new(),
            self_banner: Vec::new(),
            peer_vendor_version: None,
            config,
            client_kex: None,
            server_kex: None,
            negotiated: None,
            dh_params: None,
            session_id: None,
            server_kexinit_raw: None,
            current_crypto: CryptoPair::new(),
            tx_seq_no: 0,
            rx_seq_no: 0,
            issue_banner: None,
            alive: false,
            connected: false,
            advancing: false,
            callbacks: Callbacks::default(),
            error_message: None,
        }
    }

    pub fn set_callbacks(&mut self, callbacks: Callbacks) {
        self.callbacks = callbacks;
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn dh_state(&self) -> DhState {
        self.dh_state
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn session_id(&self) -> Option<&[u8]> {
        self.session_id.as_deref()
    }

    /// `get_issue_banner` (spec.md §6): the post-auth banner set by the
    /// (out-of-scope) higher layer; `None` before it is set.
    pub fn get_issue_banner(&self) -> Option<&str> {
        self.issue_banner.as_deref()
    }

    pub fn set_issue_banner(&mut self, banner: String) {
        self.issue_banner = Some(banner);
    }

    /// `get_openssh_version` (spec.md §6): packed as `major * 1000 + minor`,
    /// or 0 if the peer never identified as OpenSSH.
    pub fn get_openssh_version(&self) -> u32 {
        self.peer_vendor_version.map(|(major, minor)| major * 1000 + minor).unwrap_or(0)
    }

    fn enter_error(&mut self, err: HandshakeError) -> HandshakeError {
        warn!("session entering ERROR: {}", err);
        self.state = State::Error;
        self.error_message = Some(err.to_string());
        self.alive = false;
        self.zeroize_dh_params();
        self.callbacks.error(&err);
        err
    }

    fn zeroize_dh_params(&mut self) {
        self.dh_params = None;
    }

    /// spec.md §4.1 `on_connected`.
    pub fn on_connected(&mut self, status: ConnectStatus) -> Result<()> {
        match status {
            ConnectStatus::Ok => {
                self.state = State::SocketConnected;
                self.alive = true;
                trace!("socket connected");
                Ok(())
            }
            ConnectStatus::Fail(e) => Err(self.enter_error(HandshakeError::ConnectFailed(e))),
        }
    }

    /// spec.md §4.1 `on_exception`.
    pub fn on_exception(&mut self, err: std::io::Error) {
        let _ = self.enter_error(HandshakeError::SocketError(err));
    }

    /// spec.md §4.1 `on_data`: feeds bytes to whichever decoder is active
    /// and returns the number of bytes consumed. Drives as many completed
    /// protocol steps as the data allows in one call (spec.md §9: "a single
    /// call ... advances as far as it can"), guarded against re-entry
    /// (spec.md §9 Design Notes).
    pub fn on_data(&mut self, data: &[u8]) -> Result<usize> {
        if self.advancing {
            return Err(HandshakeError::Reentrant);
        }
        self.advancing = true;
        let result = self.on_data_inner(data);
        self.advancing = false;
        result.map_err(|e| self.enter_error(e))
    }

    fn on_data_inner(&mut self, data: &[u8]) -> Result<usize> {
        let mut consumed_total = 0;
        let mut cursor = data;

        loop {
            match &mut self.decoder {
                Decoder::Banner(_) => {
                    if cursor.is_empty() {
                        break;
                    }
                    let (consumed, banner) = match &mut self.decoder {
                        Decoder::Banner(dec) => dec.feed(cursor)?,
                        Decoder::Packet(_) => unreachable!(),
                    };
                    consumed_total += consumed;
                    cursor = &cursor[consumed..];
                    if let Some(banner) = banner {
                        self.handle_banner_received(banner)?;
                    }
                }
                Decoder::Packet(_) => {
                    let payload = self.feed_packet(cursor)?;
                    consumed_total += cursor.len();
                    cursor = &[];
                    if let Some(payload) = payload {
                        self.handle_packet(payload)?;
                        loop {
                            match self.feed_packet(&[])? {
                                Some(p) => self.handle_packet(p)?,
                                None => break,
                            }
                        }
                    }
                    break;
                }
            }
        }

        Ok(consumed_total)
    }

    fn feed_packet(&mut self, data: &[u8]) -> Result<Option<Vec<u8>>> {
        let seq = self.rx_seq_no;
        let reader = match &mut self.decoder {
            Decoder::Packet(r) => r,
            Decoder::Banner(_) => unreachable!("feed_packet before banner phase completed"),
        };
        let crypto = self.current_crypto.current.as_mut().map(|sc| &mut sc.rx);
        let payload = reader.feed(data, seq, crypto)?;
        if payload.is_some() {
            self.rx_seq_no = self.rx_seq_no.wrapping_add(1);
        }
        Ok(payload)
    }

    fn write_packet(&mut self, payload: &[u8]) {
        let seq = self.tx_seq_no;
        self.tx_seq_no = self.tx_seq_no.wrapping_add(1);
        let crypto = self.current_crypto.current.as_mut().map(|sc| &mut sc.tx);
        let bytes = packet::encode(payload, seq, crypto);
        self.socket.write_queued(&bytes);
    }

    fn flush(&mut self) -> Result<()> {
        self.socket.blocking_flush().map_err(HandshakeError::Io)
    }

    // --- Banner Negotiator (spec.md §4.2) ---

    fn handle_banner_received(&mut self, banner: Vec<u8>) -> Result<()> {
        debug!("received banner: {:?}", String::from_utf8_lossy(&banner));
        self.peer_banner = banner.clone();
        self.state = State::BannerReceived;
        self.callbacks.progress(0.4);

        let dialect = banner::analyze(&banner)?;
        self.peer_vendor_version = banner::parse_openssh_vendor(&banner);
        let version = banner::choose_version(dialect, self.config.allow_v1, self.config.allow_v2)?;
        self.version = Some(version);

        let tag = format!("SSH-{}.0-ssh_handshake_{}", version, env!("CARGO_PKG_VERSION"));
        self.self_banner = format!("{}\r\n", tag).into_bytes();
        self.socket.write_queued(&self.self_banner);
        self.flush()?;
        self.callbacks.progress(0.5);

        self.decoder = Decoder::Packet(packet::PacketReader::new());

        if version == 2 {
            self.state = State::InitialKex;
            self.send_client_kex()?;
        } else {
            // spec.md §4.4: "a distinct (and simpler) handshake runs ... The
            // present spec does not detail v1 further", and §4.5's Design
            // Notes call the v1 path out of scope beyond version selection.
            self.state = State::Authenticating;
            self.callbacks.progress(1.0);
        }

        Ok(())
    }

    // --- Initial KEX (spec.md §4.4) ---

    fn send_client_kex(&mut self) -> Result<()> {
        let mut cookie = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut cookie);
        let lists = self.config.to_kexinit_lists(cookie);

        let mut w = Writer::new();
        w.add_u8(SSH_MSG_KEXINIT);
        lists.write_body(&mut w);
        self.write_packet(w.as_slice());
        self.client_kex = Some(lists);
        self.flush()?;
        trace!("sent SSH_MSG_KEXINIT");
        Ok(())
    }

    fn handle_kexinit(&mut self, payload: Vec<u8>) -> Result<()> {
        let mut r = Reader::new(&payload);
        let server_kex = KexInitLists::parse_body(&mut r)?;

        let mut server_kexinit_payload = Vec::with_capacity(1 + payload.len());
        server_kexinit_payload.push(SSH_MSG_KEXINIT);
        server_kexinit_payload.extend_from_slice(&payload);

        let negotiated = choose_algorithms(&self.config, &server_kex)?;
        debug!("negotiated algorithms: kex={}, host_key={}", negotiated.kex, negotiated.host_key);
        self.server_kex = Some(server_kex);
        self.negotiated = Some(negotiated);
        self.callbacks.progress(0.6);

        self.server_kexinit_raw = Some(server_kexinit_payload);
        self.start_dh_init()
    }

    // --- DH Handshake sub-state machine (spec.md §4.5) ---

    fn start_dh_init(&mut self) -> Result<()> {
        let negotiated = self.negotiated.as_ref().expect("negotiated set before DH starts");
        let group = DhGroup::for_kex_algorithm(negotiated.kex);
        let keypair = group.generate_keypair(&mut rand::thread_rng());
        // Stored in the same padded-mpint-content form `f` is stored in
        // (see handle_kexdh_reply), since both feed `crypto::exchange_hash`
        // which adds its own length prefix.
        let e = crate::wire::pad_mpint(&keypair.e.to_bytes_be());

        let mut w = Writer::new();
        w.add_u8(SSH_MSG_KEXDH_INIT);
        w.add_mpint(&keypair.e);
        self.write_packet(w.as_slice());

        self.dh_params = Some(DhParams {
            group,
            x: keypair.x,
            e,
            f: Vec::new(),
            k: None,
            host_pubkey_blob: Vec::new(),
            server_signature: Vec::new(),
        });
        self.dh_state = DhState::InitToSend;
        self.callbacks.progress(0.8);

        self.flush()?;
        self.dh_state = DhState::InitSent;
        trace!("sent SSH_MSG_KEXDH_INIT, waiting for SSH_MSG_KEXDH_REPLY");
        Ok(())
    }

    fn handle_kexdh_reply(&mut self, payload: Vec<u8>) -> Result<()> {
        let mut r = Reader::new(&payload);
        let host_pubkey_blob = r.get_ssh_string().map_err(|_| HandshakeError::InvalidKexReply("truncated KEXDH_REPLY".into()))?.to_vec();
        let f_mpint = r.get_mpint().map_err(|_| HandshakeError::InvalidKexReply("truncated KEXDH_REPLY".into()))?;
        let signature_blob = r.get_ssh_string().map_err(|_| HandshakeError::InvalidKexReply("truncated KEXDH_REPLY".into()))?.to_vec();

        let f_bytes = crate::wire::pad_mpint(&f_mpint.to_bytes_be());
        // Pull everything `params` (a `&mut self.dh_params` borrow) is
        // needed for out into locals before calling any `&self` method
        // below, so that borrow ends here instead of staying live across
        // them.
        let (e_bytes, k, k_mpint) = {
            let params = self.dh_params.as_mut().ok_or_else(|| HandshakeError::InvalidState("no DH params pending"))?;
            let k = params.group.shared_secret(&params.x, &f_mpint);
            let k_mpint = dh::k_as_mpint_string(&k);
            (params.e.clone(), k, k_mpint)
        };

        let host_key = dh::parse_host_key_blob(&host_pubkey_blob)?;

        let v_c = String::from_utf8_lossy(&self.self_banner_trimmed()).into_owned();
        let v_s = String::from_utf8_lossy(&self.peer_banner).into_owned();
        let i_c = self.client_kex_raw()?;
        let i_s = self.server_kexinit_raw.clone().ok_or(HandshakeError::InvalidState("no server KEXINIT recorded"))?;

        let hash_alg = crypto::HashAlg::for_kex_algorithm(self.negotiated.as_ref().expect("negotiated set").kex);
        let h = crypto::exchange_hash(hash_alg, &v_c, &v_s, &i_c, &i_s, &host_pubkey_blob, &e_bytes, &f_bytes, &k_mpint);

        // spec.md §9 Open Questions: verify the host signature immediately
        // after computing `k`, before any crypto-switch preparation, rather
        // than just before the pointer swap as the source did — the more
        // conservative of the two orderings spec.md flags.
        dh::verify_signature(&host_key, &signature_blob, &h)?;

        let session_id = self.session_id.clone().unwrap_or_else(|| h.clone());
        if self.session_id.is_none() {
            self.session_id = Some(session_id.clone());
        }

        let negotiated = self.negotiated.as_ref().expect("negotiated set").clone();
        let iv_len = crate::crypto::CipherState::block_size(negotiated.cipher_client_to_server);
        let enc_len_c2s = crate::crypto::CipherState::key_len(negotiated.cipher_client_to_server);
        let enc_len_s2c = crate::crypto::CipherState::key_len(negotiated.cipher_server_to_client);
        let mac_len_c2s = crate::crypto::MacState::key_len(negotiated.mac_client_to_server);
        let mac_len_s2c = crate::crypto::MacState::key_len(negotiated.mac_server_to_client);
        let enc_len = enc_len_c2s.max(enc_len_s2c);
        let mac_len = mac_len_c2s.max(mac_len_s2c);

        let derived = crypto::derive_all_keys(hash_alg, &k_mpint, &h, &session_id, iv_len, enc_len, mac_len);

        let tx = CryptoContext::new(
            negotiated.cipher_client_to_server,
            negotiated.mac_client_to_server,
            &derived.iv_c2s,
            derived.enc_c2s[..enc_len_c2s].to_vec(),
            derived.integ_c2s[..mac_len_c2s].to_vec(),
        )?;
        let rx = CryptoContext::new(
            negotiated.cipher_server_to_client,
            negotiated.mac_server_to_client,
            &derived.iv_s2c,
            derived.enc_s2c[..enc_len_s2c].to_vec(),
            derived.integ_s2c[..mac_len_s2c].to_vec(),
        )?;
        self.current_crypto.next = Some(SessionCrypto { tx, rx });

        if let Some(params) = self.dh_params.as_mut() {
            params.f = f_bytes;
            params.k = Some(Secret::from_biguint(k));
            params.host_pubkey_blob = host_pubkey_blob;
            params.server_signature = signature_blob;
        }

        let mut w = Writer::new();
        w.add_u8(SSH_MSG_NEWKEYS);
        self.write_packet(w.as_slice());
        self.dh_state = DhState::NewkeysToSend;
        self.flush()?;
        self.dh_state = DhState::NewkeysSent;
        trace!("sent SSH_MSG_NEWKEYS, waiting for peer SSH_MSG_NEWKEYS");
        Ok(())
    }

    fn handle_peer_newkeys(&mut self) -> Result<()> {
        // The atomic rotation spec.md §9 requires: one call, not two
        // independent assignments.
        self.current_crypto.rotate();
        self.dh_state = DhState::Finished;
        self.zeroize_dh_params();
        debug!("NEWKEYS boundary crossed, session_id established");
        self.send_service_request()
    }

    // --- Service Request (spec.md §4.6) ---

    fn send_service_request(&mut self) -> Result<()> {
        let mut w = Writer::new();
        w.add_u8(SSH_MSG_SERVICE_REQUEST);
        w.add_ssh_string(b"ssh-userauth");
        self.write_packet(w.as_slice());
        self.flush()?;
        trace!("sent SSH_MSG_SERVICE_REQUEST(ssh-userauth)");
        Ok(())
    }

    fn handle_service_accept(&mut self, payload: Vec<u8>) -> Result<()> {
        let mut r = Reader::new(&payload);
        let name = r.get_ssh_string().map_err(|_| HandshakeError::InvalidState("truncated SERVICE_ACCEPT"))?;
        if name != b"ssh-userauth" {
            return Err(HandshakeError::ServiceDenied(String::from_utf8_lossy(name).into_owned()));
        }
        self.state = State::Authenticating;
        self.connected = true;
        self.callbacks.progress(1.0);
        debug!("handshake complete, state=AUTHENTICATING");
        Ok(())
    }

    // --- Packet routing ---

    fn handle_packet(&mut self, payload: Vec<u8>) -> Result<()> {
        if payload.is_empty() {
            return Err(HandshakeError::InvalidState("empty packet payload"));
        }
        let code = payload[0];
        let body = payload[1..].to_vec();

        match (self.state, self.dh_state, code) {
            (State::InitialKex, DhState::Init, SSH_MSG_KEXINIT) => self.handle_kexinit(body),
            (State::InitialKex, DhState::InitSent, SSH_MSG_KEXDH_REPLY) => self.handle_kexdh_reply(body),
            (State::InitialKex, DhState::NewkeysSent, SSH_MSG_NEWKEYS) => self.handle_peer_newkeys(),
            (State::InitialKex, DhState::Finished, SSH_MSG_SERVICE_ACCEPT) => self.handle_service_accept(body),
            (_, _, SSH_MSG_DISCONNECT) => Err(HandshakeError::InvalidState("peer sent SSH_MSG_DISCONNECT")),
            _ => Err(HandshakeError::UnexpectedMessage(code, expected_code(self.dh_state))),
        }
    }

    fn self_banner_trimmed(&self) -> Vec<u8> {
        let mut v = self.self_banner.clone();
        if v.last() == Some(&b'\n') {
            v.pop();
        }
        if v.last() == Some(&b'\r') {
            v.pop();
        }
        v
    }

    fn client_kex_raw(&self) -> Result<Vec<u8>> {
        let lists = self.client_kex.as_ref().ok_or(HandshakeError::InvalidState("client KEXINIT not sent yet"))?;
        let mut w = Writer::new();
        lists.write_body(&mut w);
        let mut out = Vec::with_capacity(1 + w.len());
        out.push(SSH_MSG_KEXINIT);
        out.extend_from_slice(w.as_slice());
        Ok(out)
    }

    /// `disconnect` (spec.md §4.8).
    pub fn disconnect(&mut self) {
        if self.socket.is_open() {
            let mut w = Writer::new();
            w.add_u8(SSH_MSG_DISCONNECT);
            w.add_u32(SSH2_DISCONNECT_BY_APPLICATION);
            w.add_ssh_string(b"Bye Bye");
            w.add_ssh_string(b"");
            self.write_packet(w.as_slice());
            let _ = self.flush();
            self.socket.close();
        }
        self.alive = false;
    }
}

fn expected_code(dh_state: DhState) -> u8 {
    match dh_state {
        DhState::Init => SSH_MSG_KEXINIT,
        DhState::InitSent => SSH_MSG_KEXDH_REPLY,
        DhState::NewkeysSent => SSH_MSG_NEWKEYS,
        DhState::Finished => SSH_MSG_SERVICE_ACCEPT,
        DhState::InitToSend | DhState::NewkeysToSend => 0,
    }
}

/// `connect` (spec.md §4.7): a synchronous orchestrator over the one
/// reference [`BlockingTcpSocket`], used by this crate's tests and demo
/// binaries. Production callers driving their own reactor should construct
/// `Session` directly and feed the `on_*` callbacks from their event loop
/// instead.
pub fn connect(addr: &str, config: ClientConfig, callbacks: Callbacks) -> Result<Session<BlockingTcpSocket>> {
    let mut session = Session::new(
        BlockingTcpSocket::connect(addr).map_err(HandshakeError::ConnectFailed)?,
        config,
    );
    session.set_callbacks(callbacks);
    session.state = State::Connecting;
    session.callbacks.progress(0.2);

    session.on_connected(ConnectStatus::Ok)?;

    let mut buf = [0u8; 4096];
    while !matches!(session.state, State::Error | State::Authenticating) {
        let n = session.socket.read_some(&mut buf).map_err(HandshakeError::SocketError)?;
        if n == 0 {
            return Err(session.enter_error(HandshakeError::SocketError(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "peer closed connection during handshake",
            ))));
        }
        session.on_data(&buf[..n])?;
    }

    if session.state == State::Authenticating {
        Ok(session)
    } else {
        Err(HandshakeError::InvalidState("connect() ended outside AUTHENTICATING or ERROR"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dh_state_is_monotonic_by_ordinal() {
        assert!(DhState::Init < DhState::InitToSend);
        assert!(DhState::InitToSend < DhState::InitSent);
        assert!(DhState::InitSent < DhState::NewkeysToSend);
        assert!(DhState::NewkeysToSend < DhState::NewkeysSent);
        assert!(DhState::NewkeysSent < DhState::Finished);
    }

    #[test]
    fn expected_code_matches_dh_table() {
        assert_eq!(expected_code(DhState::Init), SSH_MSG_KEXINIT);
        assert_eq!(expected_code(DhState::InitSent), SSH_MSG_KEXDH_REPLY);
        assert_eq!(expected_code(DhState::NewkeysSent), SSH_MSG_NEWKEYS);
        assert_eq!(expected_code(DhState::Finished), SSH_MSG_SERVICE_ACCEPT);
    }
}
