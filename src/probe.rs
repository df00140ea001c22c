use std::time::Duration;

use tracing::debug;

/// Status reported when the request never got a response.
pub const UNREACHABLE: u16 = 0;

/// Issues the post-deployment HTTP check.
pub trait Probe {
    /// GET `url` and return the response status, or
    /// [`UNREACHABLE`] on any transport failure.
    fn status(&self, url: &str, timeout: Duration) -> u16;
}

/// Probe backed by a blocking `reqwest` client.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpProbe;

impl HttpProbe {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Probe for HttpProbe {
    fn status(&self, url: &str, timeout: Duration) -> u16 {
        let client = match reqwest::blocking::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                debug!("cannot build HTTP client: {e}");
                return UNREACHABLE;
            }
        };

        match client.get(url).send() {
            Ok(response) => response.status().as_u16(),
            Err(e) => {
                debug!("GET {url} failed: {e}");
                UNREACHABLE
            }
        }
    }
}

/// Only an exact 200 counts as a healthy deployment.
#[must_use]
pub const fn is_healthy(status: u16) -> bool {
    status == 200
}
