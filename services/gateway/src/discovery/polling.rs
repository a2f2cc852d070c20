//! **[ADDED]** Default discovery source: periodically fetches a JSON array
//! of `Service` records from a configured URL and diffs it against the
//! previous snapshot by `uid`, emitting add/update/remove events — a
//! polling stand-in for the source's Kubernetes informer (spec §9).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, warn};

use super::{DiscoveryCallback, DiscoveryEvent, DiscoverySource, Service};

pub struct PollingDiscoverySource {
    url: String,
    interval: Duration,
    client: reqwest::Client,
    callback: Mutex<Option<DiscoveryCallback>>,
    known: Mutex<HashMap<String, Service>>,
}

impl PollingDiscoverySource {
    pub fn new(url: String, interval: Duration, client: reqwest::Client) -> Self {
        Self {
            url,
            interval,
            client,
            callback: Mutex::new(None),
            known: Mutex::new(HashMap::new()),
        }
    }

    async fn poll_once(&self) {
        let fetched = match self.client.get(&self.url).send().await {
            Ok(response) => match response.json::<Vec<Service>>().await {
                Ok(services) => services,
                Err(err) => {
                    error!(%err, url = %self.url, "discovery: invalid response body");
                    return;
                }
            },
            Err(err) => {
                error!(%err, url = %self.url, "discovery: poll request failed");
                return;
            }
        };

        let callback = self.callback.lock().await.clone();
        let Some(callback) = callback else {
            warn!("discovery: poll completed before a callback was registered, dropping events");
            return;
        };

        let mut known = self.known.lock().await;
        let mut seen = std::collections::HashSet::new();

        for service in &fetched {
            seen.insert(service.uid.clone());
            match known.get(&service.uid) {
                None => {
                    (callback)(DiscoveryEvent::Add(service.clone())).await;
                }
                Some(existing) if existing != service => {
                    (callback)(DiscoveryEvent::Update {
                        old: existing.clone(),
                        new: service.clone(),
                    })
                    .await;
                }
                Some(_) => {}
            }
            known.insert(service.uid.clone(), service.clone());
        }

        let removed: Vec<String> = known
            .keys()
            .filter(|uid| !seen.contains(*uid))
            .cloned()
            .collect();
        for uid in removed {
            if let Some(service) = known.remove(&uid) {
                (callback)(DiscoveryEvent::Remove(service)).await;
            }
        }
    }
}

impl DiscoverySource for PollingDiscoverySource {
    fn on_event(&mut self, callback: DiscoveryCallback) {
        // `try_lock` is safe here: `on_event` is only called during offline
        // setup, before `start` spawns any polling task.
        if let Ok(mut guard) = self.callback.try_lock() {
            *guard = Some(callback);
        }
    }

    fn start(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                self.poll_once().await;
            }
        })
    }
}
