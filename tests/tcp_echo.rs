//! End-to-end TCP echo scenario (spec.md §8 scenario 1).

use std::thread;

use netstream::{Address, Config};

fn init() {
    netstream::module_initialize(&Config::default());
}

#[test]
fn echo_round_trips_317_bytes_across_a_flush_boundary() {
    init();

    let listener = netstream::tcp_socket_create().unwrap();
    let loopback = Address::parse("127.0.0.1:0").unwrap();
    assert!(netstream::socket_bind(listener, &loopback));
    assert!(netstream::tcp_socket_listen(listener));
    let local = netstream::socket_address_local(listener).unwrap();

    let server = thread::spawn(move || {
        let accepted = netstream::tcp_socket_accept(listener, 0).expect("client should connect");
        let stream = netstream::socket_stream(accepted).unwrap();
        let mut echoed = 0usize;
        let mut buf = [0u8; 4096];
        while echoed < 317 {
            let n = stream.read(&mut buf);
            if n == 0 {
                break;
            }
            let mut sent = 0;
            while sent < n {
                sent += stream.write(&buf[sent..n]);
            }
            stream.flush();
            echoed += n;
        }
        netstream::socket_free(accepted);
        netstream::socket_free(listener);
        echoed
    });

    let client = netstream::tcp_socket_create().unwrap();
    assert!(netstream::socket_connect(client, &local, 5000));
    assert_eq!(
        netstream::socket_state(client),
        netstream::SocketState::Connected
    );
    let stream = netstream::socket_stream(client).unwrap();

    let payload: Vec<u8> = (0..317u32).map(|i| (i % 256) as u8).collect();
    // 127 + 180 = 307, then flush, then the final 10 bytes and a second
    // flush so every byte actually reaches the wire before we read back.
    assert_eq!(stream.write(&payload[..127]), 127);
    assert_eq!(stream.write(&payload[127..307]), 180);
    assert!(stream.flush());
    assert_eq!(stream.write(&payload[307..317]), 10);
    assert!(stream.flush());

    let mut received = vec![0u8; 317];
    let mut got = 0;
    while got < 317 {
        let n = stream.read(&mut received[got..]);
        assert!(n > 0, "server hung up early at {got}/317");
        got += n;
    }
    assert_eq!(received, payload);

    assert_eq!(server.join().unwrap(), 317);

    stream.close();
    assert_eq!(
        netstream::socket_state(client),
        netstream::SocketState::Disconnected
    );
    netstream::socket_free(client);
}

#[test]
fn accept_with_zero_timeout_waits_for_a_client_then_blocks_no_longer() {
    init();

    let listener = netstream::tcp_socket_create().unwrap();
    let loopback = Address::parse("127.0.0.1:0").unwrap();
    assert!(netstream::socket_bind(listener, &loopback));
    assert!(netstream::tcp_socket_listen(listener));
    let local = netstream::socket_address_local(listener).unwrap();

    let server = thread::spawn(move || netstream::tcp_socket_accept(listener, 0));

    let client = netstream::tcp_socket_create().unwrap();
    assert!(netstream::socket_connect(client, &local, 5000));

    let accepted = server.join().unwrap().expect("accept should succeed");
    assert_eq!(
        netstream::socket_address_remote(accepted),
        netstream::socket_address_local(client)
    );

    netstream::socket_free(accepted);
    netstream::socket_free(client);
    netstream::socket_free(listener);
}
