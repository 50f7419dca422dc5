//! Last-known connectivity state
//!
//! The host platform (or a periodic reachability check) reports reachability through
//! [`ConnectivityMonitor::set_online`]. Observers subscribe to the watch
//! channel; the refresh scheduler turns offline to online edges into
//! reconnect triggers.

use reqwest::Method;
use siteauth_core::Connectivity;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::http::HttpClient;

pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        Self { state: watch::channel(initially_online).0 }
    }

    /// Record the current reachability.
    ///
    /// Returns `true` when this call moved the state from offline to online.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.state.send_replace(online);
        if previous != online {
            info!(online, "Connectivity changed");
        }
        !previous && online
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Check `url` and record the result. Any HTTP response, including an
    /// error status, counts as reachable.
    pub async fn check_reachability(&self, client: &HttpClient, url: &str) -> bool {
        let online = match client.send(client.request(Method::HEAD, url)).await {
            Ok(response) => {
                debug!(status = %response.status(), "Connectivity check answered");
                true
            }
            Err(err) => {
                debug!(error = %err, "Connectivity check failed");
                false
            }
        };
        self.set_online(online);
        online
    }
}

impl Connectivity for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        *self.state.borrow()
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn reports_only_offline_to_online_edges() {
        let monitor = ConnectivityMonitor::new(true);

        assert!(!monitor.set_online(true));
        assert!(!monitor.set_online(false));
        assert!(!monitor.is_online());
        assert!(monitor.set_online(true));
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let monitor = ConnectivityMonitor::new(false);
        let mut rx = monitor.subscribe();

        monitor.set_online(true);

        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn reachability_check_treats_any_response_as_online() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD")).respond_with(ResponseTemplate::new(404)).mount(&server).await;
        let monitor = ConnectivityMonitor::new(false);
        let client = HttpClient::builder().build().unwrap();

        assert!(monitor.check_reachability(&client, &server.uri()).await);
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn reachability_check_marks_unreachable_host_offline() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let monitor = ConnectivityMonitor::new(true);
        let client = HttpClient::builder().build().unwrap();

        assert!(!monitor.check_reachability(&client, &format!("http://{addr}")).await);
        assert!(!monitor.is_online());
    }
}
