//! Service-discovery event source (C10): an external-facing add/update/
//! remove event stream that the gateway coordinator (C5) subscribes to
//! (spec §4.1 "Service", §9 redesign note: polling adapter replaces the
//! Kubernetes informer from the source, since this gateway runs outside a
//! cluster by default).

mod polling;
mod service;

pub use polling::PollingDiscoverySource;
pub use service::Service;

use std::future::Future;
use std::pin::Pin;

/// Async callback invoked on a discovery event. Boxed the same way route
/// pipelines are (`router::route::SharedPipeline`) to keep the trait object
/// free of `async-trait`.
pub type DiscoveryCallback =
    std::sync::Arc<dyn Fn(DiscoveryEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    Add(Service),
    Update { old: Service, new: Service },
    Remove(Service),
}

/// A source of discovery events. Implementations call the registered
/// callback whenever a service is added, updated, or removed.
pub trait DiscoverySource: Send + Sync {
    fn on_event(&mut self, callback: DiscoveryCallback);

    /// Start emitting events; returns once the source is running (it keeps
    /// emitting in the background — e.g. a spawned polling task).
    fn start(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
