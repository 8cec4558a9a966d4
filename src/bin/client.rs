//! Demo client: drives a real handshake against a listening SSH peer using
//! the blocking reference [`Socket`] and the synchronous [`connect`]
//! orchestrator (spec.md §4.7). Mirrors the teacher's `src/bin/client.rs`,
//! which drove the same handshake steps by hand over a `futures` chain;
//! here a single `connect()` call drives the whole state machine.

use std::env;

use ssh_handshake::algorithms::ClientConfig;
use ssh_handshake::session::{connect, Callbacks};

fn main() {
    env_logger::init();

    let addr = env::args().nth(1).unwrap_or_else(|| "127.0.0.1:22".to_string());
    println!("connecting to {}", addr);

    let callbacks = Callbacks {
        on_progress: Some(Box::new(|p| println!("progress: {:.1}", p))),
        on_error: Some(Box::new(|e| eprintln!("handshake error: {}", e))),
    };

    match connect(&addr, ClientConfig::default(), callbacks) {
        Ok(session) => {
            println!("handshake complete, state = {:?}", session.state());
            println!("session id = {}", hex(session.session_id().unwrap_or(&[])));
            println!("peer OpenSSH version = {:#06x}", session.get_openssh_version());
        }
        Err(e) => {
            eprintln!("connect failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
