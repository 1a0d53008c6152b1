//! Hangup-event scenario (spec.md §8 scenario 5).

use std::thread;
use std::time::Duration;

use netstream::{Address, Config, EventId};

#[test]
fn client_close_eventually_posts_a_hangup_for_the_accepted_handle() {
    netstream::module_initialize(&Config::default());

    let listener = netstream::tcp_socket_create().unwrap();
    let loopback = Address::parse("127.0.0.1:0").unwrap();
    assert!(netstream::socket_bind(listener, &loopback));
    assert!(netstream::tcp_socket_listen(listener));
    let local = netstream::socket_address_local(listener).unwrap();

    let server = thread::spawn(move || netstream::tcp_socket_accept(listener, 0).unwrap());

    let client = netstream::tcp_socket_create().unwrap();
    assert!(netstream::socket_connect(client, &local, 5000));
    let accepted = server.join().unwrap();

    netstream::socket_close(client);
    netstream::socket_free(client);

    // The server side only observes the hangup once it tries to read past
    // what the peer sent; a background reader drives that.
    let reader = thread::spawn(move || {
        let stream = netstream::socket_stream(accepted).unwrap();
        let mut buf = [0u8; 16];
        stream.read(&mut buf)
    });
    assert_eq!(reader.join().unwrap(), 0, "read past a closed peer must return 0");

    let events = netstream::event_stream();
    let mut saw_hangup_for_accepted = false;
    for _ in 0..50 {
        if let Some(event) = events.next() {
            if event.id == EventId::Hangup && netstream::event_socket(&event) == accepted {
                saw_hangup_for_accepted = true;
                break;
            }
        } else {
            thread::sleep(Duration::from_millis(10));
        }
    }
    assert!(saw_hangup_for_accepted, "expected a Hangup event for the accepted handle");

    netstream::socket_free(accepted);
    netstream::socket_free(listener);
}
