//! Test-fixture peer: NOT a server-side SSH handshake implementation (that
//! is an explicit Non-goal, spec.md §1). This just emits a canned
//! identification banner and logs whatever the connecting client sends, so
//! `src/bin/client.rs` (or a human with `nc`) has something to point at
//! when a real `sshd` isn't handy. Mirrors the teacher's `src/bin/server.rs`
//! test rig, which had the same "accept one connection, print what
//! happened" shape.

use std::env;
use std::io::{Read, Write};
use std::net::TcpListener;

fn main() {
    env_logger::init();

    let addr = env::args().nth(1).unwrap_or_else(|| "0.0.0.0:2022".to_string());
    let listener = TcpListener::bind(&addr).expect("bind");
    println!("listening on {}", addr);

    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(s) => s,
            Err(e) => {
                eprintln!("accept error: {}", e);
                continue;
            }
        };
        let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| "?".into());
        println!("connection from {}", peer);

        if let Err(e) = stream.write_all(b"SSH-2.0-ssh_handshake_test_fixture\r\n") {
            eprintln!("write banner: {}", e);
            continue;
        }

        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    println!("{} closed the connection", peer);
                    break;
                }
                Ok(n) => println!("{}: received {} bytes: {:02x?}", peer, n, &buf[..n]),
                Err(e) => {
                    eprintln!("{}: read error: {}", peer, e);
                    break;
                }
            }
        }
    }
}
