//! Scripted [`HttpTransport`] for unit tests.

use crate::error::CheckError;
use crate::protocols::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

type Scripted = Result<HttpResponse, CheckError>;

struct Route {
    prefix: String,
    queue: VecDeque<Scripted>,
}

/// Answers requests from per-URL-prefix queues. The last queued answer for a
/// prefix repeats forever; unmatched URLs fail with a network error.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    latency: Duration,
    log: Mutex<Vec<(HttpRequest, Instant)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every request takes `latency` (virtual time under a paused clock).
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub(crate) fn route(&self, prefix: &str, response: HttpResponse) {
        self.route_result(prefix, Ok(response));
    }

    pub(crate) fn route_result(&self, prefix: &str, result: Scripted) {
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|r| r.prefix == prefix) {
            Some(route) => route.queue.push_back(result),
            None => routes.push(Route {
                prefix: prefix.to_string(),
                queue: VecDeque::from([result]),
            }),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }

    /// Start instants of requests whose URL begins with `prefix`.
    pub(crate) fn starts(&self, prefix: &str) -> Vec<Instant> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r.url.starts_with(prefix))
            .map(|(_, at)| *at)
            .collect()
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_for(&self, url: &str) -> Scripted {
        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .filter(|r| url.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len());

        match route {
            Some(route) if route.queue.len() > 1 => route.queue.pop_front().unwrap(),
            Some(route) => route.queue.front().cloned().unwrap(),
            None => Err(CheckError::network(format!("no scripted route for {}", url))),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, CheckError> {
        let url = request.url.clone();
        self.log.lock().unwrap().push((request, Instant::now()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.next_for(&url)
    }
}

/// Build a TLD -> URLs mapping from `(tld, url)` pairs.
pub(crate) fn services(pairs: &[(&str, &str)]) -> BTreeMap<String, Vec<String>> {
    pairs
        .iter()
        .map(|(tld, url)| (tld.to_string(), vec![url.to_string()]))
        .collect()
}
