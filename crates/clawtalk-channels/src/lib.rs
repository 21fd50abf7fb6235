//! ClawTalk Channels
//!
//! The Slack adapter: signature verification, the HTTP event proxy that
//! Slack calls, the ingress pipeline that keeps dedup/routing/Talk history
//! honest, and outbound delivery. `clawtalk-core` owns no transport; this
//! crate is the only thing that speaks Slack's wire formats.

#![forbid(unsafe_code)]

pub mod error;
pub mod slack;

pub use error::{Error, Result};
pub use slack::{
    routes, IngressOutcome, ProxyState, SlackAccount, SlackChannelsConfig, SlackIngress,
    SlackSenderImpl,
};
