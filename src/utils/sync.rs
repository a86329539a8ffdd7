//! Synchronization primitives shared by the threading layer.
//!
//! Locks and condition variables come from `parking_lot`; atomics and `Arc`
//! from `std`.
pub use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

pub use parking_lot::{Condvar, Mutex};
