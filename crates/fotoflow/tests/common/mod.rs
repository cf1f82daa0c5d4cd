//! Shared test utilities for fotoflow integration tests.
//!
//! `TestHarness` wires a fresh in-memory database, a temp-dir object store
//! and the recording calendar sink into a full engine instance per test.

pub mod harness;

pub use harness::TestHarness;
