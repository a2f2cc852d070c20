//! Gateway coordinator (C5): owns the handler registry and middleware
//! list, maps discovery events to `DynamicRouter` add/remove calls via the
//! endpoint planner (C4), and composes each endpoint's pipeline (spec §4.5).

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::discovery::Service;
use crate::planner::{plan, Endpoint};
use crate::router::{DynamicRouter, RouteId, RouterError, SharedPipeline};

/// Builds the terminal handler for one endpoint (e.g. reverse-proxy,
/// publisher). Registered under `handlerType` (spec §4.5 "registry").
pub type HandlerFactory = Arc<dyn Fn(&Endpoint) -> SharedPipeline + Send + Sync>;

/// Wraps a pipeline with one cross-cutting concern, given the endpoint so
/// it can read its own `filters[code]` options (spec §4.5).
pub type MiddlewareFactory = Arc<dyn Fn(SharedPipeline, &Endpoint) -> SharedPipeline + Send + Sync>;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("service.resource must not be empty")]
    EmptyResource,
    #[error("no handler registered for handlerType {0:?}")]
    UnknownHandlerType(String),
    #[error(transparent)]
    Router(#[from] RouterError),
}

/// Serializes `addService`/`removeService`/`updateService` per service uid
/// so concurrent discovery events for the same service never race on the
/// `ServiceRoutes` index (an Open Question resolved in favor of one mutex
/// per uid rather than a single global lock).
struct UidLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UidLocks {
    fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, uid: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(uid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

pub struct GatewayCoordinator {
    config: GatewayConfig,
    router: Arc<DynamicRouter>,
    handlers: HashMap<String, HandlerFactory>,
    middlewares: Vec<(String, MiddlewareFactory)>,
    service_routes: Mutex<HashMap<String, Vec<RouteId>>>,
    uid_locks: UidLocks,
}

impl GatewayCoordinator {
    pub fn new(config: GatewayConfig, router: Arc<DynamicRouter>) -> Self {
        Self {
            config,
            router,
            handlers: HashMap::new(),
            middlewares: Vec::new(),
            service_routes: Mutex::new(HashMap::new()),
            uid_locks: UidLocks::new(),
        }
    }

    /// Offline setup: register a terminal handler factory under `handlerType`.
    /// Must be called before discovery starts (spec §4.5).
    pub fn register_handler(&mut self, handler_type: impl Into<String>, factory: HandlerFactory) {
        self.handlers.insert(handler_type.into(), factory);
    }

    /// Offline setup: append a middleware, in the order it should see the
    /// request relative to previously registered middlewares
    /// (`middlewares[0]` sees the request first, spec §4.5).
    pub fn use_middleware(&mut self, code: impl Into<String>, factory: MiddlewareFactory) {
        self.middlewares.push((code.into(), factory));
    }

    fn compose_pipeline(&self, endpoint: &Endpoint) -> Result<SharedPipeline, CoordinatorError> {
        let terminal_factory = self
            .handlers
            .get(&endpoint.handler_type)
            .ok_or_else(|| CoordinatorError::UnknownHandlerType(endpoint.handler_type.clone()))?;

        let mut pipeline = (terminal_factory)(endpoint);
        // Apply in reverse registration order so middlewares[0] wraps
        // outermost and therefore sees the request first.
        for (_, factory) in self.middlewares.iter().rev() {
            pipeline = (factory)(pipeline, endpoint);
        }
        Ok(pipeline)
    }

    async fn add_routes_for(&self, service: &Service) -> Result<Vec<RouteId>, CoordinatorError> {
        let endpoints = plan(&self.config, service);
        let mut ids = Vec::with_capacity(endpoints.len());

        for endpoint in &endpoints {
            let pipeline = self.compose_pipeline(endpoint)?;
            // `path` is matched against the request's full segment list
            // (`matcher::CompiledMatcher::matches`), so it must carry the
            // `pathPrefix` segments too — a bare `downstream_path` like
            // `/add_offer/{id}` can never match a 3-segment request path
            // such as `/offers2/add_offer/555`.
            let path = if endpoint.downstream_path.is_empty() {
                String::new()
            } else {
                crate::planner::join(&endpoint.downstream_path_prefix, &endpoint.downstream_path)
            };
            match self
                .router
                .add_route(
                    path,
                    endpoint.downstream_path_prefix.clone(),
                    endpoint.methods.clone(),
                    pipeline,
                    endpoint.timeout,
                )
                .await
            {
                Ok(id) => ids.push(id),
                Err(RouterError::DuplicateRoute { path_prefix, path }) => {
                    // Spec §7: dropped for this endpoint only; siblings proceed.
                    warn!(
                        service = %service.resource,
                        %path_prefix,
                        %path,
                        "duplicate route, dropping this endpoint"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        Ok(ids)
    }

    async fn remove_routes_for(&self, uid: &str) {
        let removed = {
            let mut routes = self.service_routes.lock().await;
            routes.remove(uid)
        };
        if let Some(ids) = removed {
            for id in ids {
                self.router.remove_route(id).await;
            }
        }
    }

    pub async fn add_service(&self, service: Service) -> Result<(), CoordinatorError> {
        if service.resource.is_empty() {
            return Err(CoordinatorError::EmptyResource);
        }

        let guard = self.uid_locks.lock_for(&service.uid).await;
        let _permit = guard.lock().await;

        let ids = self.add_routes_for(&service).await?;
        self.service_routes
            .lock()
            .await
            .insert(service.uid.clone(), ids);
        info!(service = %service.resource, uid = %service.uid, "service added");
        Ok(())
    }

    pub async fn update_service(
        &self,
        old: Service,
        new: Service,
    ) -> Result<(), CoordinatorError> {
        if new.resource.is_empty() {
            return Err(CoordinatorError::EmptyResource);
        }

        let guard = self.uid_locks.lock_for(&old.uid).await;
        let _permit = guard.lock().await;

        self.remove_routes_for(&old.uid).await;
        let ids = self.add_routes_for(&new).await?;
        self.service_routes
            .lock()
            .await
            .insert(new.uid.clone(), ids);
        info!(service = %new.resource, uid = %new.uid, "service updated");
        Ok(())
    }

    pub async fn remove_service(&self, service: Service) {
        let guard = self.uid_locks.lock_for(&service.uid).await;
        let _permit = guard.lock().await;

        self.remove_routes_for(&service.uid).await;
        info!(service = %service.resource, uid = %service.uid, "service removed");
    }
}
