//! Transport to the simulation service: signed-URL upload, job-status
//! polling and result download.

pub mod client;
pub mod control;
pub mod poll;

pub use client::TransportClient;
pub use control::{ControlPlaneClient, SignedEndpoints};
pub use poll::{
    HttpStatusSource, PollConfig, PollOutcome, Poller, ResultDescriptor, StatusResponse,
    StatusSource,
};
