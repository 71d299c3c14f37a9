//! Protocol module: everything that turns broker bytes into domain types and
//! back.

pub mod buffer;
pub mod catalog;
pub mod connect;
pub mod credentials;
pub mod endpoints;

pub use buffer::{BufferError, ResponseBuffer};
pub use catalog::{parse_vm_list, CatalogError};
pub use connect::{ConnectOverrides, ConnectParamsError, ConnectionParams};
pub use credentials::{build_auth_header, AuthHeader, CredentialError};
pub use endpoints::{BrokerEndpoint, EndpointError};
