//! Purpose: Shared library crate backing the `memoport` binary and tests.
//! Exports: `core` (titles, pages, validation, errors), `upstream` (note-service client).
//! Role: Internal library; the HTTP surface lives in the binary crate.
//! Invariants: Core modules are pure; all network I/O is confined to `upstream`.
pub mod core;
pub mod upstream;
