//! Unconnected-UDP datagram mirror scenario (spec.md §8 scenario 4): one
//! server and several clients exchange fixed-size datagrams via
//! `sendto`/`recvfrom`, never calling `connect`.

use std::thread;

use netstream::{Address, Config};

const CLIENTS: usize = 4;
const ITERATIONS: usize = 32; // reduced from the spec's 512 to keep this fast
const PAYLOAD: usize = 973;

#[test]
fn each_client_gets_back_a_reply_from_its_own_target() {
    netstream::module_initialize(&Config::default());

    let server = netstream::udp_socket_create().unwrap();
    let loopback = Address::parse("127.0.0.1:0").unwrap();
    assert!(netstream::socket_bind(server, &loopback));
    let server_addr = netstream::socket_address_local(server).unwrap();

    let server_thread = thread::spawn(move || {
        for _ in 0..(CLIENTS * ITERATIONS) {
            let (datagram, origin) = netstream::udp_socket_recvfrom(server).unwrap();
            assert_eq!(datagram.len(), PAYLOAD);
            netstream::udp_socket_sendto(server, &datagram, &origin).unwrap();
        }
        netstream::socket_free(server);
    });

    let clients: Vec<_> = (0..CLIENTS)
        .map(|id| {
            thread::spawn(move || {
                let client = netstream::udp_socket_create().unwrap();
                assert!(netstream::socket_bind(client, &Address::parse("127.0.0.1:0").unwrap()));
                let target = server_addr;
                for i in 0..ITERATIONS {
                    let datagram = vec![(id * ITERATIONS + i) as u8; PAYLOAD];
                    let sent = netstream::udp_socket_sendto(client, &datagram, &target).unwrap();
                    assert_eq!(sent, PAYLOAD);
                    let (reply, peer) = netstream::udp_socket_recvfrom(client).unwrap();
                    assert_eq!(reply.len(), PAYLOAD);
                    assert_eq!(peer, target);
                }
                netstream::socket_free(client);
            })
        })
        .collect();

    for c in clients {
        c.join().unwrap();
    }
    server_thread.join().unwrap();
}
