//! Serverbound play-state packet builders, generated at build time from
//! `protocol/serverbound.mbm`. Each builder returns `(wire id, payload)`
//! ready for the transport's send routine.

#[allow(unused_imports, unused_variables, unused_mut, dead_code, clippy::all)]
mod generated {
    include!(concat!(env!("OUT_DIR"), "/serverbound.rs"));
}

pub use generated::*;
