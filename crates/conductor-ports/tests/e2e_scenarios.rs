//! Cross-module end-to-end scenario for `PortAllocator`.

use conductor_ports::PortAllocator;

/// E6: base 19000; allocate("a"), allocate("b") yield two distinct ports
/// >= 19000; release("a") frees exactly its port; the next allocate may
/// reuse it since the scan cursor resets to the freed, lower port.
#[test]
fn e6_port_allocator_allocates_releases_and_reuses() {
    let allocator = PortAllocator::new(19000, []);

    let a = allocator.allocate("a").unwrap();
    let b = allocator.allocate("b").unwrap();
    assert_ne!(a, b);
    assert!(a >= 19000);
    assert!(b >= 19000);

    let freed = allocator.release("a");
    assert_eq!(freed, vec![a]);
    assert!(allocator.allocated_for("a").is_empty());

    let c = allocator.allocate("c").unwrap();
    assert_eq!(c, a);
}
