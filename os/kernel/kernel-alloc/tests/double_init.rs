//! The allocator stack is brought up exactly once.

mod common;

use kernel_alloc::memory;

#[test]
#[should_panic(expected = "memory already initialized")]
fn second_init_is_fatal() {
    let high = common::leak_high_memory(1);
    unsafe { memory::init_at(&high.boot, high.start, high.start) };
    assert!(memory::is_initialized());

    let other = common::leak_high_memory(1);
    unsafe { memory::init_at(&other.boot, other.start, other.start) };
}
