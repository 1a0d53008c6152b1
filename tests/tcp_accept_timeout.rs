//! Accept-timeout scenario (spec.md §8 scenario 2): no client connects, the
//! listener must return within roughly `timeout_ms` and remain `Listening`.

use std::time::Instant;

use netstream::{Address, Config, SocketState};

#[test]
fn accept_times_out_without_a_client() {
    netstream::module_initialize(&Config::default());

    let listener = netstream::tcp_socket_create().unwrap();
    let loopback = Address::parse("127.0.0.1:0").unwrap();
    assert!(netstream::socket_bind(listener, &loopback));
    assert!(netstream::tcp_socket_listen(listener));

    let started = Instant::now();
    let accepted = netstream::tcp_socket_accept(listener, 100);
    let elapsed = started.elapsed();

    assert!(accepted.is_none());
    // Generous bound: the contract only promises "never longer than
    // timeout_ms within scheduler resolution", not a tight upper bound.
    assert!(elapsed.as_millis() < 2000, "accept blocked far longer than its timeout");
    assert_eq!(netstream::socket_state(listener), SocketState::Listening);

    netstream::socket_free(listener);
}
