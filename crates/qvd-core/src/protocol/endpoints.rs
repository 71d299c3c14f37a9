//! Broker endpoint URLs.
//!
//! All broker requests live under `https://<host>:<port>/qvd/`.  The base URL
//! is derived once from host and port; the list and connect URLs are built
//! from it.

use thiserror::Error;
use url::{Host, Url};

use crate::domain::vm::VmId;
use crate::protocol::connect::ConnectOverrides;

/// Default broker HTTPS port.
pub const DEFAULT_PORT: u16 = 8443;

/// Path segment (relative to the base URL) of the VM-listing endpoint.
pub const LIST_OF_VM_PATH: &str = "list_of_vm";

/// Path segment (relative to the base URL) of the connect endpoint.
pub const CONNECT_TO_VM_PATH: &str = "connect_to_vm";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("broker host must not be empty")]
    EmptyHost,

    #[error("broker port must be between 1 and 65535")]
    InvalidPort,

    #[error("invalid broker address {host:?}: {reason}")]
    InvalidHost { host: String, reason: String },
}

/// Address of one broker, with its derived base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    host: String,
    port: u16,
    base_url: Url,
}

impl BrokerEndpoint {
    /// # Errors
    ///
    /// Returns [`EndpointError`] if the host is empty or cannot form a URL,
    /// or if the port is `0`.
    pub fn new(host: &str, port: u16) -> Result<Self, EndpointError> {
        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }
        if port == 0 {
            return Err(EndpointError::InvalidPort);
        }

        // Bare IPv6 literals need brackets inside a URL authority.
        let bracketed = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        let authority = format!("{bracketed}:{port}");
        let base_url = Url::parse(&format!("https://{authority}/qvd/")).map_err(|e| {
            EndpointError::InvalidHost {
                host: host.to_string(),
                reason: e.to_string(),
            }
        })?;

        // A host such as "example.com/evil" would silently move the path.
        if base_url.path() != "/qvd/" {
            return Err(EndpointError::InvalidHost {
                host: host.to_string(),
                reason: "host must not contain a path".to_string(),
            });
        }

        // "user@evil.example" parses as userinfo and would send the
        // credentials to a different host.
        if host.contains('@')
            || !base_url.username().is_empty()
            || base_url.password().is_some()
        {
            return Err(EndpointError::InvalidHost {
                host: host.to_string(),
                reason: "host must not contain user information".to_string(),
            });
        }
        // IP literals are normalised by the parser, so only names are compared.
        let names_given_host = match base_url.host() {
            Some(Host::Domain(parsed)) => parsed.eq_ignore_ascii_case(host),
            Some(Host::Ipv4(_) | Host::Ipv6(_)) => true,
            None => false,
        };
        if !names_given_host {
            return Err(EndpointError::InvalidHost {
                host: host.to_string(),
                reason: "host does not name a single server".to_string(),
            });
        }

        Ok(Self {
            host: host.to_string(),
            port,
            base_url,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `https://<host>:<port>/qvd/`
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `<base>/list_of_vm`
    pub fn list_of_vm_url(&self) -> Url {
        self.join(LIST_OF_VM_PATH)
    }

    /// `<base>/connect_to_vm?id=<id>` plus one query parameter per override
    /// that is set.
    pub fn connect_to_vm_url(&self, id: VmId, overrides: &ConnectOverrides) -> Url {
        let mut url = self.join(CONNECT_TO_VM_PATH);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("id", &id.to_string());
            for (key, value) in overrides.query_pairs() {
                query.append_pair(key, &value);
            }
        }
        url
    }

    fn join(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        // https URLs always have a path, so this never fails.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(path);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::Geometry;

    fn id(raw: u32) -> VmId {
        VmId::new(raw).unwrap()
    }

    #[test]
    fn test_base_url_is_derived_from_host_and_port() {
        let ep = BrokerEndpoint::new("qvd.example.com", 8443).unwrap();
        assert_eq!(ep.base_url().as_str(), "https://qvd.example.com:8443/qvd/");
    }

    #[test]
    fn test_list_of_vm_url() {
        let ep = BrokerEndpoint::new("qvd.example.com", 8443).unwrap();
        assert_eq!(
            ep.list_of_vm_url().as_str(),
            "https://qvd.example.com:8443/qvd/list_of_vm"
        );
    }

    #[test]
    fn test_connect_url_without_overrides_has_only_id() {
        let ep = BrokerEndpoint::new("qvd.example.com", 8443).unwrap();
        let url = ep.connect_to_vm_url(id(7), &ConnectOverrides::default());
        assert_eq!(url.as_str(), "https://qvd.example.com:8443/qvd/connect_to_vm?id=7");
    }

    #[test]
    fn test_connect_url_carries_overrides_encoded() {
        // Arrange
        let ep = BrokerEndpoint::new("broker", 443).unwrap();
        let overrides = ConnectOverrides {
            geometry: Some("1024x768".parse::<Geometry>().unwrap()),
            fullscreen: true,
            display: Some(":0.0".to_string()),
            home: Some("/home/a b".to_string()),
        };

        // Act
        let url = ep.connect_to_vm_url(id(1), &overrides);

        // Assert
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("id".to_string(), "1".to_string()),
                ("qvd.client.geometry".to_string(), "1024x768".to_string()),
                ("qvd.client.fullscreen".to_string(), "1".to_string()),
                ("qvd.client.display".to_string(), ":0.0".to_string()),
                ("qvd.client.home".to_string(), "/home/a b".to_string()),
            ]
        );
    }

    #[test]
    fn test_ipv6_host_is_bracketed() {
        let ep = BrokerEndpoint::new("::1", 8443).unwrap();
        assert_eq!(ep.base_url().as_str(), "https://[::1]:8443/qvd/");
    }

    #[test]
    fn test_rejects_empty_host_and_zero_port() {
        assert_eq!(BrokerEndpoint::new("", 8443), Err(EndpointError::EmptyHost));
        assert_eq!(BrokerEndpoint::new("h", 0), Err(EndpointError::InvalidPort));
    }

    #[test]
    fn test_rejects_host_with_path_or_spaces() {
        assert!(matches!(
            BrokerEndpoint::new("example.com/evil", 8443),
            Err(EndpointError::InvalidHost { .. })
        ));
        assert!(matches!(
            BrokerEndpoint::new("bad host", 8443),
            Err(EndpointError::InvalidHost { .. })
        ));
    }

    #[test]
    fn test_rejects_host_with_user_information() {
        for host in [
            "mallory@evil.example",
            "user:pw@evil.example",
            "@evil.example",
            "@10.0.0.1",
        ] {
            assert!(
                matches!(
                    BrokerEndpoint::new(host, 8443),
                    Err(EndpointError::InvalidHost { .. })
                ),
                "{host} should be rejected"
            );
        }
    }

    #[test]
    fn test_accepts_mixed_case_and_bracketed_hosts() {
        let ep = BrokerEndpoint::new("QVD.Example.com", 8443).unwrap();
        assert_eq!(ep.base_url().host_str(), Some("qvd.example.com"));
        assert_eq!(ep.host(), "QVD.Example.com");

        let ep = BrokerEndpoint::new("[::1]", 8443).unwrap();
        assert_eq!(ep.base_url().as_str(), "https://[::1]:8443/qvd/");

        let ep = BrokerEndpoint::new("0:0:0:0:0:0:0:1", 8443).unwrap();
        assert_eq!(ep.base_url().as_str(), "https://[::1]:8443/qvd/");
    }
}
