//! Domain types for the mutation server protocol (MSP).
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies: the protocol schema (positions, mutants, request/response
//! params), validated server settings, and the mutant path tree. Everything
//! here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod location;
mod mutant;
mod params;
mod settings;
mod tree;

pub use location::{Location, LocationOrderError, Position};
pub use mutant::{DiscoveredMutant, MutantPayload, MutantResult, MutantStatus};
pub use params::{
    ConfigureParams, ConfigureResult, DiscoverParams, DiscoverResult, DiscoveredFile, FileRange,
    MutantResultFile, MutantTarget, MutationTestParams, MutationTestResult, MutationTestTarget,
    ServerLocation,
};
pub use settings::{ServerSettings, ServerSettingsError};
pub use tree::{MutantTree, NodeId};
