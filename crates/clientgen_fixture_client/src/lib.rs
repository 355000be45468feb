//! Clients generated at build time from the `clientgen` test descriptors.
//!
//! `token_lite`, `vault` and `registry` are mounted from `OUT_DIR`, so this
//! crate compiling is itself the check that the emitted code builds.

include!(concat!(env!("OUT_DIR"), "/clients.rs"));
