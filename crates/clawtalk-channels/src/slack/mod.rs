//! Slack adapter: signature verification, the HTTP event proxy, inbound
//! routing/dedup, and outbound delivery via slack-morphism.

mod config;
mod forward;
mod ingress;
mod proxy;
mod sender;
mod signature;
mod types;

pub use config::{SlackAccount, SlackChannelsConfig};
pub use ingress::{IngressOutcome, SlackIngress};
pub use proxy::{routes, ProxyState};
pub use sender::SlackSenderImpl;
pub use signature::verify as verify_signature;
