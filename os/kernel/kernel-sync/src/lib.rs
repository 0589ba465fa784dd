//! # Kernel synchronization primitives
//!
//! The memory core runs on a single CPU without a scheduler. Its state needs
//! no lock, only a guarantee that it is never re-entered from an interrupt
//! handler while mutated. [`NonReentrant`] turns such a re-entry into a
//! reported error instead of silent corruption.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod non_reentrant;

pub use non_reentrant::{NonReentrant, NonReentrantGuard, Reentered};
