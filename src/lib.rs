//! A manually counted shared pointer for single-threaded code.
//!
//! `Shared<T>` keeps one heap allocated value alive for as long as any handle
//! refers to it. Handles alias the value through a shared, non-atomic count
//! cell: copying a handle bumps the count, dropping one lowers it, and the
//! handle that brings it to zero frees both the value and the cell.
//!
//! Unlike `Rc`, handles can be empty, mutation through one handle is visible
//! through every alias, and sharing is broken up only on request with
//! `Shared::detach`, which gives the calling handle its own deep copy.
//!
//! ```
//! use sharedref::{Error, Shared};
//!
//! # fn main() -> Result<(), Error> {
//! let mut a = Shared::new(String::from("Rudy"))?;
//! let b = a.clone();
//! assert_eq!(a.ref_count(), 2);
//!
//! a.write()?.push_str(" Orre");
//! assert_eq!(*b.read()?, "Rudy Orre");
//!
//! assert!(a.detach()?);
//! a.write()?.clear();
//! assert_eq!((a.ref_count(), b.ref_count()), (1, 1));
//! assert_eq!(*b.read()?, "Rudy Orre");
//! # Ok(())
//! # }
//! ```
//!
//! Every fallible allocation reports `Error::AllocationFailed` instead of
//! aborting, and leaves no handle half-built.

pub(crate) mod allocator;
pub mod axioms;
pub(crate) mod counter;
pub mod error;
pub mod pointers;
pub mod stats;

pub use axioms::Axioms;
pub use error::{Access, Allocation, Error, Result};
pub use pointers::{Reading, Shared, Writing};
#[cfg(feature = "global")]
pub use stats::get_global_stats;
pub use stats::{get_stats, Stats};

#[cfg(any(test, feature = "fault-injection"))]
pub use allocator::injection;
