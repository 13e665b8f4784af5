#![allow(clippy::too_many_arguments)]

//! counsel-engine - decision counsel over a permissioned doctrine store.
//!
//! Ingests doctrine texts into per-domain vector indices, routes
//! decision queries through quick/normal/war deliberation modes, and
//! runs a debate of permissioned "ministers" whose positions a
//! tribunal can veto, delay, or escalate. Every counseled decision is
//! appended to an INSERT-only ledger; outcomes recorded against it
//! feed pattern detection and bounded calibration of posture for the
//! next decision.
//!
//! # Architecture
//!
//! ```text
//! ingest::pipeline -> vector_store (per-domain, ACL-partitioned)
//!                              |
//!                      retriever (minister ACL)
//!                              |
//!                      synthesizer (LLM + deterministic post-processing)
//!                              |
//!                    debate (conflict detection + tribunal)
//!                              |
//!                 war (constraint gate / council / book bias / speech filter)
//!                              |
//!                    ledger (events/outcomes/overrides, append-only)
//!                              |
//!                  patterns -> calibration (feeds back into the next decision)
//! ```

pub mod book_registry;
pub mod calibration;
pub mod config;
pub mod context;
pub mod debate;
pub mod domain;
pub mod embed;
pub mod error;
pub mod hash;
pub mod ingest;
pub mod ledger;
pub mod llm;
pub mod minister;
pub mod patterns;
pub mod retriever;
pub mod router;
pub mod synthesizer;
pub mod types;
pub mod vector_store;
pub mod war;

pub use context::Context;
pub use types::*;
