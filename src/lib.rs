//! An order-statistic ordered map for Rust, backed by a left-leaning
//! red-black tree.
//!
//! This crate provides [`OSLlrbMap`], a sorted associative container in the
//! style of the standard library's `BTreeMap` with additional O(log n)
//! order-statistic operations:
//!
//! - [`get_by_rank`](OSLlrbMap::get_by_rank) - Get the entry at a given sorted position
//! - [`rank_of`](OSLlrbMap::rank_of) - Get the sorted position of a key
//! - [`range_by_rank`](OSLlrbMap::range_by_rank) - Extract the ascending keys between two ranks
//! - Indexing by [`Rank`] - e.g., `map[Rank(0)]` for the first element
//!
//! # Example
//!
//! ```
//! use llrb_tree::{OSLlrbMap, Rank};
//!
//! let mut scores = OSLlrbMap::new();
//! scores.insert("Alice", 100);
//! scores.insert("Bob", 85);
//! scores.insert("Carol", 92);
//!
//! // Standard map operations work as expected
//! assert_eq!(scores.get(&"Bob"), Some(&85));
//! assert_eq!(scores.len(), 3);
//!
//! // Order-statistic operations (O(log n))
//! // Get the median (rank 1 = second element in sorted order)
//! let (name, score) = scores.get_by_rank(1).unwrap();
//! assert_eq!(*name, "Bob"); // Keys are sorted alphabetically
//!
//! // Count the keys strictly before "Carol"
//! assert_eq!(scores.rank_of(&"Carol"), 2);
//!
//! // Index by rank
//! assert_eq!(scores[Rank(0)], 100); // Alice's score (first alphabetically)
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - Only requires `alloc`, no standard library dependency
//! - **Worst-case balanced** - Tree height never exceeds `2 * log2(n + 1)`
//! - **O(log n) rank operations** - Efficient order-statistic queries via subtree size augmentation
//! - **Arena storage** - Nodes live in a contiguous pool indexed by compact handles
//!
//! # Implementation
//!
//! The map is a left-leaning red-black tree (LLRB): a binary search tree in
//! which red links may only lean left, making it a direct encoding of a
//! 2-3 tree. Insertion pushes red links up with a single bottom-up fixup;
//! deletion pushes a red link down ahead of the descent so the recursion
//! never removes a node across an empty black link. Every node caches the
//! size of its subtree, which drives the rank and select queries without
//! any extra traversal state.
//!
//! Nodes are stored in an arena and connected by index handles rather than
//! owning pointers, so child links are half the size of a `Box`-based tree
//! on 64-bit targets and freed slots are recycled in place.

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod order_statistic;
mod raw;

pub mod osllrb_map;

pub use order_statistic::Rank;
pub use osllrb_map::OSLlrbMap;
