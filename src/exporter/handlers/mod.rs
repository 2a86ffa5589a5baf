mod cardinality;
mod health;
mod metrics;
mod webhook;

pub use cardinality::cardinality;
pub use health::{HealthState, health};
pub use metrics::metrics;
pub use webhook::{WebhookState, webhook};
