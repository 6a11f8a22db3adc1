//! The `/.well-known/402.json` discovery manifest.
//!
//! Servers publish what they charge for at a well-known path so tooling can
//! price a resource before touching it. Two endpoint layouts exist in the
//! wild: a list of `{path, method, amount, asset}` objects and a map from
//! path to `{method, price, currency, description}`. Both are accepted.
//!
//! Discovery is informational; the retry path never consults it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Path of the discovery manifest relative to an origin.
pub const WELL_KNOWN_PATH: &str = "/.well-known/402.json";

/// A server's published payment parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryManifest {
    /// Human-readable service name.
    #[serde(default)]
    pub name: Option<String>,
    /// Protocol identifier, e.g. `"x402-bch-v2"`.
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Merchant address payments go to.
    #[serde(default)]
    pub address: Option<String>,
    /// Default asset for endpoints that do not name one.
    #[serde(default)]
    pub asset: Option<String>,
    /// Single network the service accepts.
    #[serde(default)]
    pub network: Option<String>,
    /// Networks the service accepts.
    #[serde(default)]
    pub networks: Vec<String>,
    /// Priced endpoints.
    #[serde(default)]
    pub endpoints: Endpoints,
    /// When the manifest was generated (ISO 8601, as sent).
    #[serde(default)]
    pub discovery_date: Option<String>,
}

/// Endpoint listing in either published layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Endpoints {
    /// `[{"path": "/data", "method": "GET", "amount": 546, "asset": "bch"}]`
    List(Vec<Endpoint>),
    /// `{"/api": {"method": "ANY", "price": 546, "currency": "sats"}}`
    Catalog(BTreeMap<String, CatalogEntry>),
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

/// One entry of a list-style endpoint listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Request path.
    pub path: String,
    /// HTTP method, or `"ANY"`.
    #[serde(default = "any_method")]
    pub method: String,
    /// Price in the smallest unit.
    pub amount: u64,
    /// Asset label.
    #[serde(default)]
    pub asset: Option<String>,
}

/// One entry of a catalog-style endpoint listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// HTTP method, or `"ANY"`.
    #[serde(default = "any_method")]
    pub method: String,
    /// Price in the smallest unit.
    pub price: u64,
    /// Currency label.
    #[serde(default)]
    pub currency: Option<String>,
    /// What the endpoint provides.
    #[serde(default)]
    pub description: Option<String>,
}

fn any_method() -> String {
    "ANY".to_owned()
}

/// A priced endpoint, independent of the layout it was published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedEndpoint<'a> {
    /// Request path.
    pub path: &'a str,
    /// HTTP method, or `"ANY"`.
    pub method: &'a str,
    /// Price in the smallest unit.
    pub amount: u64,
    /// Asset or currency label.
    pub asset: Option<&'a str>,
}

impl PricedEndpoint<'_> {
    fn accepts(&self, method: &str) -> bool {
        self.method.eq_ignore_ascii_case("ANY") || self.method.eq_ignore_ascii_case(method)
    }
}

impl DiscoveryManifest {
    /// Every priced endpoint in the manifest.
    #[must_use]
    pub fn endpoints(&self) -> Vec<PricedEndpoint<'_>> {
        match &self.endpoints {
            Endpoints::List(list) => list
                .iter()
                .map(|e| PricedEndpoint {
                    path: &e.path,
                    method: &e.method,
                    amount: e.amount,
                    asset: e.asset.as_deref().or(self.asset.as_deref()),
                })
                .collect(),
            Endpoints::Catalog(map) => map
                .iter()
                .map(|(path, e)| PricedEndpoint {
                    path: path.as_str(),
                    method: &e.method,
                    amount: e.price,
                    asset: e.currency.as_deref().or(self.asset.as_deref()),
                })
                .collect(),
        }
    }

    /// Looks up the price of `method path`.
    #[must_use]
    pub fn price_of(&self, method: &str, path: &str) -> Option<PricedEndpoint<'_>> {
        self.endpoints()
            .into_iter()
            .find(|e| e.path == path && e.accepts(method))
    }

    /// Networks the service accepts, merging `network` and `networks`.
    #[must_use]
    pub fn accepted_networks(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.networks.iter().map(String::as_str).collect();
        if let Some(network) = self.network.as_deref() {
            if !out.contains(&network) {
                out.push(network);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_layout() {
        let manifest: DiscoveryManifest = serde_json::from_str(
            r#"{
                "name": "CashApi",
                "protocol_version": "x402-bch-v2",
                "asset": "bch",
                "network": "chipnet",
                "endpoints": [
                    {"path": "/analyze", "method": "POST", "amount": 546, "asset": "bch"},
                    {"path": "/data", "method": "GET", "amount": 546}
                ],
                "address": "bitcoincash:qpm2",
                "discovery_date": "2026-01-01T00:00:00.000Z"
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.endpoints().len(), 2);
        let data = manifest.price_of("get", "/data").unwrap();
        assert_eq!(data.amount, 546);
        assert_eq!(data.asset, Some("bch"));
        assert!(manifest.price_of("POST", "/data").is_none());
        assert_eq!(manifest.accepted_networks(), vec!["chipnet"]);
    }

    #[test]
    fn test_catalog_layout() {
        let manifest: DiscoveryManifest = serde_json::from_str(
            r#"{
                "name": "CashApi Service",
                "protocol_version": "x402-v2",
                "endpoints": {
                    "/api": {"method": "ANY", "price": 1000, "currency": "sats",
                             "description": "Protected API Access"}
                },
                "networks": ["mainnet"]
            }"#,
        )
        .unwrap();
        let api = manifest.price_of("DELETE", "/api").unwrap();
        assert_eq!(api.amount, 1000);
        assert_eq!(api.asset, Some("sats"));
        assert_eq!(manifest.accepted_networks(), vec!["mainnet"]);
    }

    #[test]
    fn test_empty_manifest() {
        let manifest: DiscoveryManifest = serde_json::from_str("{}").unwrap();
        assert!(manifest.endpoints().is_empty());
        assert!(manifest.accepted_networks().is_empty());
    }
}
