//! Handle-reuse scenario (spec.md §8 scenario 6).

use netstream::Config;

#[test]
fn freed_handle_never_resolves_and_a_new_one_differs() {
    netstream::module_initialize(&Config::default());

    let old = netstream::tcp_socket_create().unwrap();
    netstream::socket_free(old);
    assert!(!netstream::socket_is_socket(old));

    let fresh = netstream::tcp_socket_create().unwrap();
    assert!(netstream::socket_is_socket(fresh));
    assert_ne!(old, fresh);

    netstream::socket_free(fresh);
    assert!(!netstream::socket_is_socket(fresh));
}
