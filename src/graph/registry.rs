//! API name to graph lookup.
//!
//! # Responsibilities
//! - Validate addresses (non-empty, unique names and URLs)
//! - Assemble each API's graph from hook and configured stages
//! - Track which APIs accept pre-serialized payload envelopes (proxy APIs)
//! - Resolve API names at request time
//!
//! # Design Decisions
//! - Names are trimmed before use; an empty name is a configuration error
//! - An unresolvable error address is dropped with a warning, it never
//!   blocks startup
//! - `HashMap` lookup, no ordering requirement between APIs

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::config::schema::{AddressConfig, GraphConfig, HooksConfig};
use crate::error::InletError;
use crate::graph::address::{Address, Graph};

/// Fatal graph configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("address name could not be empty")]
    EmptyAddressName,

    #[error("address already exist, name: {0}")]
    DuplicateAddress(String),

    #[error("address url is empty, name: {0}")]
    EmptyAddressUrl(String),

    #[error("api name could not be empty")]
    EmptyApiName,

    #[error("api graph already exist, api: {0}")]
    DuplicateApi(String),

    #[error("address of {address} not exist, api: {api}")]
    UndefinedAddress { api: String, address: String },

    #[error("hook address of {0} not exist")]
    UndefinedHookAddress(String),
}

/// Immutable mapping from API name to graph.
#[derive(Debug, Clone, Default)]
pub struct GraphRegistry {
    graphs: HashMap<String, Graph>,
    proxies: HashSet<String>,
}

impl GraphRegistry {
    /// Build the registry from configuration.
    pub fn build(
        addresses: &[AddressConfig],
        graphs: &[GraphConfig],
        hooks: &HooksConfig,
    ) -> Result<Self, GraphError> {
        let mut by_name: HashMap<String, Address> = HashMap::with_capacity(addresses.len());
        for config in addresses {
            let name = config.name.trim();
            if name.is_empty() {
                return Err(GraphError::EmptyAddressName);
            }
            if by_name.contains_key(name) {
                return Err(GraphError::DuplicateAddress(name.to_string()));
            }
            let url = config.url.trim();
            if url.is_empty() {
                return Err(GraphError::EmptyAddressUrl(name.to_string()));
            }
            by_name.insert(
                name.to_string(),
                Address::new(name, config.kind.trim(), url),
            );
        }

        let lookup_hooks = |names: &[String]| -> Result<Vec<Address>, GraphError> {
            names
                .iter()
                .map(|n| {
                    by_name
                        .get(n.trim())
                        .cloned()
                        .ok_or_else(|| GraphError::UndefinedHookAddress(n.trim().to_string()))
                })
                .collect()
        };
        let before = lookup_hooks(&hooks.before)?;
        let after = lookup_hooks(&hooks.after)?;

        let mut registry = Self::default();
        for config in graphs {
            let api = config.api.trim();
            if api.is_empty() {
                return Err(GraphError::EmptyApiName);
            }
            if registry.graphs.contains_key(api) {
                return Err(GraphError::DuplicateApi(api.to_string()));
            }

            let mut stages = Vec::with_capacity(config.graph.len());
            for name in &config.graph {
                match by_name.get(name.trim()) {
                    Some(addr) => stages.push(addr.clone()),
                    None => {
                        return Err(GraphError::UndefinedAddress {
                            api: api.to_string(),
                            address: name.trim().to_string(),
                        })
                    }
                }
            }

            let mut graph = Graph::new();
            graph
                .add_stages(before.iter().cloned())
                .add_stages(stages)
                .add_stages(after.iter().cloned());

            let error_name = config.error_address_name.trim();
            if !error_name.is_empty() {
                match by_name.get(error_name) {
                    Some(addr) => {
                        graph.set_error_address(addr.clone());
                    }
                    None => {
                        tracing::warn!(api = %api, address = %error_name, "Error address not found, ignored");
                    }
                }
            }

            if config.is_proxy {
                registry.proxies.insert(api.to_string());
            }
            registry.graphs.insert(api.to_string(), graph);
        }

        tracing::debug!(
            addresses = by_name.len(),
            apis = registry.graphs.len(),
            proxies = registry.proxies.len(),
            "Graph registry built"
        );

        Ok(registry)
    }

    /// Look up the graph for an API name.
    pub fn resolve(&self, api: &str) -> Result<&Graph, InletError> {
        self.graphs.get(api).ok_or_else(|| InletError::UnknownApi {
            api: api.to_string(),
        })
    }

    /// Register or replace a graph. Startup-time use only.
    pub fn set(&mut self, api: impl Into<String>, graph: Graph) -> &mut Self {
        self.graphs.insert(api.into(), graph);
        self
    }

    /// Flag or unflag an API as taking payload envelopes. Startup-time use only.
    pub fn set_proxy(&mut self, api: impl Into<String>, is_proxy: bool) -> &mut Self {
        let api = api.into();
        if is_proxy {
            self.proxies.insert(api);
        } else {
            self.proxies.remove(&api);
        }
        self
    }

    pub fn is_proxy(&self, api: &str) -> bool {
        self.proxies.contains(api)
    }

    pub fn contains(&self, api: &str) -> bool {
        self.graphs.contains_key(api)
    }

    /// Registered API names, unordered.
    pub fn api_names(&self) -> impl Iterator<Item = &str> {
        self.graphs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}
