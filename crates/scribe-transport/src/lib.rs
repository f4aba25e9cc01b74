//! Job and control channels between the gateway and the transcription worker.
//!
//! Two logical transports:
//! - **job channel**: request/reply. The gateway owns one multiplexed [`JobClient`];
//!   each request carries its task id, and replies are routed back to the waiting
//!   monitor by the [`Demux`]. The worker drains a single shared inbox of [`Inbound`] jobs.
//! - **control channel**: broadcast. The worker publishes [`ControlFrame`]s through a
//!   [`Publisher`]; the gateway keeps one shared subscription and fans frames out to
//!   every monitor through a [`ControlFeed`].
//!
//! Both come in an in-memory flavour ([`inmem`]) and, behind the `tcp` feature, a
//! newline-delimited JSON flavour over TCP ([`tcp`]).

mod error;
pub use error::TransportError;

mod frame;
pub use frame::{ControlFrame, JobReply, JobRequest, TERMINATE, decode, encode};

mod demux;
pub use demux::{Demux, LinkRoutes};

mod job;
pub use job::{Dialer, Inbound, JobClient, ReplySink, ReplyStream};

mod control;
pub use control::{ControlFeed, Publisher};

mod config;
pub use config::TransportConfig;

pub mod inmem;

#[cfg(feature = "tcp")]
pub mod tcp;
