//! In-process backend for the financial statement store.
//!
//! Records and every index live behind a single lock, so each write and its
//! index maintenance become visible to readers at once. Nothing is persisted;
//! use it for tests and throwaway deployments.

mod index;
mod store;

pub use store::MemoryStore;

#[cfg(test)]
mod tests;
