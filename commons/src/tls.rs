//! Shared TLS trust pool for driver HTTP clients (§5).
//!
//! One `reqwest::Client` is shared by every source's driver unless that
//! source configures its own CA bundle, in which case a dedicated client
//! carrying the server-wide trust pool plus that source's extra
//! certificate(s) is built and cached.

use failure::{Fallible, ResultExt};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

fn load_certificates(path: &str) -> Fallible<Vec<reqwest::Certificate>> {
    let pem = std::fs::read_to_string(path)
        .with_context(|_| format!("failed to read CA bundle '{}'", path))?;
    let mut certs = Vec::new();
    let mut block = String::new();
    let mut in_block = false;
    for line in pem.lines() {
        if line.contains("-----BEGIN CERTIFICATE-----") {
            in_block = true;
            block.clear();
        }
        if in_block {
            block.push_str(line);
            block.push('\n');
        }
        if line.contains("-----END CERTIFICATE-----") {
            in_block = false;
            let cert = reqwest::Certificate::from_pem(block.as_bytes())
                .with_context(|_| format!("invalid certificate in bundle '{}'", path))?;
            certs.push(cert);
        }
    }
    Ok(certs)
}

/// The server-wide shared TLS trust pool, built once at startup from an
/// optional colon-separated list of PEM bundle paths.
pub struct TlsPool {
    base_certs: Vec<reqwest::Certificate>,
    timeout: Duration,
    shared_client: reqwest::Client,
    custom_clients: RwLock<HashMap<String, reqwest::Client>>,
}

impl TlsPool {
    pub fn new(trust_bundle_paths: Option<&str>, timeout: Duration) -> Fallible<Self> {
        let mut base_certs = Vec::new();
        if let Some(paths) = trust_bundle_paths {
            for path in paths.split(':').filter(|p| !p.is_empty()) {
                base_certs.extend(load_certificates(path)?);
            }
        }
        let shared_client = Self::build_client(&base_certs, timeout)?;
        Ok(TlsPool {
            base_certs,
            timeout,
            shared_client,
            custom_clients: RwLock::new(HashMap::new()),
        })
    }

    fn build_client(certs: &[reqwest::Certificate], timeout: Duration) -> Fallible<reqwest::Client> {
        let mut builder = reqwest::ClientBuilder::new()
            .pool_idle_timeout(Some(Duration::from_secs(10)))
            .timeout(timeout);
        for cert in certs {
            builder = builder.add_root_certificate(cert.clone());
        }
        builder.build().context("failed to build HTTP client").map_err(Into::into)
    }

    /// The client to use for a source: the shared pool's client, unless
    /// the source supplies its own CA path, in which case a client
    /// carrying the base pool plus that CA is built once and cached (§5).
    pub fn client_for(&self, custom_ca_path: Option<&str>) -> Fallible<reqwest::Client> {
        let path = match custom_ca_path {
            None => return Ok(self.shared_client.clone()),
            Some(p) => p,
        };
        if let Some(cached) = self.custom_clients.read().expect("lock poisoned").get(path) {
            return Ok(cached.clone());
        }
        let mut certs = self.base_certs.clone();
        certs.extend(load_certificates(path)?);
        let client = Self::build_client(&certs, self.timeout)?;
        self.custom_clients
            .write()
            .expect("lock poisoned")
            .insert(path.to_string(), client.clone());
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_pool_with_no_bundle_builds_a_plain_client() {
        let pool = TlsPool::new(None, Duration::from_secs(5)).unwrap();
        assert!(pool.client_for(None).is_ok());
    }
}
