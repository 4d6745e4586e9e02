//! Client-side synchronization of one shared list.
//!
//! # Responsibility
//! - Own the local, eventually consistent copy of a bound list document.
//! - Gate every mutation on edit capability before touching the store.
//! - Apply remote snapshots wholesale, in arrival order.
//!
//! # Invariants
//! - The latest remote snapshot always replaces local optimistic state.
//! - No snapshot is applied after `detach`.

pub mod selection;
pub mod synchronizer;
