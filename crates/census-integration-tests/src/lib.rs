//! End-to-end scenarios for the census protocol stack.
//!
//! The actual tests live in `tests/`; this crate only exists to anchor
//! them in the workspace.
