//! Test-only scaffolding, compiled only under `cfg(test)` via `lib.rs`.

pub mod mocks;
