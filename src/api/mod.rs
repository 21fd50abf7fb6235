//! Gateway-owned HTTP surface. The Slack webhook itself is mounted
//! separately from `clawtalk-channels`; this module carries only the
//! operational endpoints the gateway owns directly.

pub mod health;

use axum::Router;

/// Routes owned by the `clawtalk` binary, merged with the Slack adapter's
/// router in `server::init::run`.
pub fn routes() -> Router {
    Router::new().merge(health::routes())
}
