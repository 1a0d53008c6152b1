//! UDP-as-stream scenario (spec.md §8 scenario 3): two UDP sockets, each
//! `connect`-ed to the other, exchange fixed-size chunks through the same
//! buffered [`netstream::Stream`] contract TCP uses.

use netstream::{Address, Config};

#[test]
fn connected_udp_pair_preserves_byte_counts_across_flush_boundaries() {
    netstream::module_initialize(&Config::default());

    let a = netstream::udp_socket_create().unwrap();
    let b = netstream::udp_socket_create().unwrap();
    let loopback = Address::parse("127.0.0.1:0").unwrap();
    assert!(netstream::socket_bind(a, &loopback));
    assert!(netstream::socket_bind(b, &loopback));
    let addr_a = netstream::socket_address_local(a).unwrap();
    let addr_b = netstream::socket_address_local(b).unwrap();

    assert!(netstream::socket_connect(a, &addr_b, 1000));
    assert!(netstream::socket_connect(b, &addr_a, 1000));

    let stream_a = netstream::socket_stream(a).unwrap();
    let stream_b = netstream::socket_stream(b).unwrap();

    // Reduced from the spec's 512 iterations to keep the test fast; the
    // per-iteration shape (127 + 180 + 10 bytes, flush after 307, then
    // read 235 + 82) is unchanged.
    for i in 0..16u32 {
        let payload: Vec<u8> = (0..317u32).map(|n| ((i + n) % 256) as u8).collect();
        assert_eq!(stream_a.write(&payload[..127]), 127);
        assert_eq!(stream_a.write(&payload[127..307]), 180);
        assert!(stream_a.flush());
        assert_eq!(stream_a.write(&payload[307..317]), 10);
        assert!(stream_a.flush());

        let mut received = vec![0u8; 317];
        let mut got = 0;
        while got < 235 {
            let n = stream_b.read(&mut received[got..235]);
            assert!(n > 0, "peer hung up mid-datagram at iteration {i}");
            got += n;
        }
        while got < 317 {
            let n = stream_b.read(&mut received[got..317]);
            assert!(n > 0, "peer hung up mid-datagram at iteration {i}");
            got += n;
        }
        assert_eq!(received, payload, "reordering or corruption at iteration {i}");
    }

    netstream::socket_free(a);
    netstream::socket_free(b);
}
