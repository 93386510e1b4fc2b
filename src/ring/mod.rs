//! Consistent-hashing ring
//!
//! Maps site keys onto connected crawler tokens so that ownership is stable
//! as nodes join and leave: a membership change only reassigns the slice of
//! sites adjacent to the affected vnode points.

mod hasher;

pub use hasher::{RingHasher, RingPoint, DEFAULT_VNODES};
