use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use hlld_client::{Accuracy, CreateOptions, HlldClient, HlldConfig, HlldError};

fn spawn_server(
    connections: usize,
    handler: fn(usize, &mut BufReader<TcpStream>, &mut TcpStream),
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    thread::spawn(move || {
        for idx in 0..connections {
            let (mut stream, _) = listener.accept().expect("accept");
            let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            handler(idx, &mut reader, &mut stream);
        }
    });

    addr
}

fn read_command(reader: &mut BufReader<TcpStream>) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            Some(line)
        }
    }
}

fn write_line(stream: &mut TcpStream, line: &str) {
    let _ = stream.write_all(line.as_bytes());
    let _ = stream.write_all(b"\n");
    let _ = stream.flush();
}

fn client_with_addr(addr: String) -> HlldClient {
    let config = HlldConfig {
        server: addr,
        timeout: Some(Duration::from_secs(2)),
        attempts: 3,
        hash_keys: false,
    };
    HlldClient::with_config(config).expect("client")
}

#[test]
fn create_set_sends_options_and_accepts_done() {
    let addr = spawn_server(1, |_, reader, stream| {
        let command = read_command(reader).expect("command");
        assert_eq!(command, "create users precision=12 in_memory=1");
        write_line(stream, "Done");
    });

    let client = client_with_addr(addr);
    let options = CreateOptions {
        accuracy: Some(Accuracy::Precision(12)),
        in_memory: true,
    };
    let set = client.create_set_with("users", &options).expect("create");
    assert_eq!(set.name(), "users");
}

#[test]
fn create_set_accepts_existing() {
    let addr = spawn_server(1, |_, reader, stream| {
        let command = read_command(reader).expect("command");
        assert_eq!(command, "create users");
        write_line(stream, "Exists");
    });

    let client = client_with_addr(addr);
    let set = client.create_set("users").expect("existing set is fine");
    assert_eq!(set.name(), "users");
}

#[test]
fn create_set_surfaces_unexpected_status() {
    let addr = spawn_server(1, |_, reader, stream| {
        let _ = read_command(reader).expect("command");
        write_line(stream, "Internal Error");
    });

    let client = client_with_addr(addr);
    let err = client
        .create_set("users")
        .err()
        .expect("unexpected status should fail");
    match err {
        HlldError::Server(text) => assert_eq!(text, "Internal Error"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn set_operations_follow_the_wire_grammar() {
    let addr = spawn_server(1, |_, reader, stream| {
        let mut commands = Vec::new();
        for _ in 0..6 {
            commands.push(read_command(reader).expect("command"));
            write_line(stream, "Done");
        }
        assert_eq!(
            commands,
            vec![
                "s users alice",
                "b users bob carol",
                "flush users",
                "close users",
                "clear users",
                "drop users",
            ]
        );
    });

    let client = client_with_addr(addr);
    let set = client.get_set("users");
    set.add("alice").expect("add");
    set.bulk(&["bob", "carol"]).expect("bulk");
    set.flush().expect("flush");
    set.close().expect("close");
    set.clear().expect("clear");
    set.delete().expect("delete");
}

#[test]
fn info_parses_typed_stats() {
    let addr = spawn_server(1, |_, reader, stream| {
        // Serve two info exchanges on the same connection.
        for _ in 0..2 {
            let command = read_command(reader).expect("command");
            assert_eq!(command, "info users");
            write_line(stream, "START");
            write_line(stream, "eps 0.02");
            write_line(stream, "precision 12");
            write_line(stream, "bytes 3280");
            write_line(stream, "size 1999");
            write_line(stream, "END");
        }
    });

    let client = client_with_addr(addr);
    let set = client.get_set("users");

    let info = set.info().expect("info");
    assert_eq!(info.eps, 0.02);
    assert_eq!(info.precision, 12);
    assert_eq!(info.bytes, 3280);
    assert_eq!(info.size, 1999);

    assert_eq!(set.size().expect("size"), 1999);
}

#[test]
fn list_sets_parses_each_line() {
    let addr = spawn_server(1, |_, reader, stream| {
        let command = read_command(reader).expect("command");
        assert_eq!(command, "list");
        write_line(stream, "START");
        write_line(stream, "users 0.02 12 3280 1999");
        write_line(stream, "events 0.01 14 16400 0");
        write_line(stream, "END");
    });

    let client = client_with_addr(addr);
    let sets = client.list_sets().expect("list");

    assert_eq!(sets.len(), 2);
    let users = &sets["users"];
    assert_eq!(users.size, 1999);
    assert_eq!(users.bytes, 3280);
    let events = &sets["events"];
    assert_eq!(events.eps, 0.01);
    assert_eq!(events.precision, 14);
}

#[test]
fn global_flush_sends_bare_flush() {
    let addr = spawn_server(1, |_, reader, stream| {
        let command = read_command(reader).expect("command");
        assert_eq!(command, "flush");
        write_line(stream, "Done");
    });

    let client = client_with_addr(addr);
    client.flush().expect("flush");
}

#[test]
fn hashed_keys_reach_the_wire_hashed() {
    let addr = spawn_server(1, |_, reader, stream| {
        let command = read_command(reader).expect("command");
        // SHA-1 of "abc".
        assert_eq!(command, "s users a9993e364706816aba3e25717850c26c9cd0d89d");
        write_line(stream, "Done");
    });

    let config = HlldConfig {
        server: addr,
        timeout: Some(Duration::from_secs(2)),
        attempts: 3,
        hash_keys: true,
    };
    let client = HlldClient::with_config(config).expect("client");
    client.get_set("users").add("abc").expect("add");
}

#[test]
fn invalid_address_fails_at_construction() {
    let config = HlldConfig {
        server: "localhost:4553:udp".to_string(),
        ..HlldConfig::default()
    };
    let err = HlldClient::with_config(config)
        .err()
        .expect("malformed address should be rejected");
    match err {
        HlldError::InvalidAddress(addr) => assert_eq!(addr, "localhost:4553:udp"),
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(HlldClient::connect("").is_err());
}
