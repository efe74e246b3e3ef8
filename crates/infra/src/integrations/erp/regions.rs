//! Data-centre routing for the ERP.
//!
//! Each region has its own OAuth host and API host. The table is built once
//! from configuration and injected wherever a URL is needed.

use std::collections::HashMap;

use orderbridge_domain::{CommerceError, ErpConfig, ErpRegion, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEndpoints {
    /// OAuth host, e.g. `https://accounts.zoho.eu`
    pub accounts_url: String,
    /// API base including the version path
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct RegionTable {
    endpoints: HashMap<ErpRegion, RegionEndpoints>,
    default_region: ErpRegion,
}

fn builtin(region: ErpRegion) -> (&'static str, &'static str) {
    match region {
        ErpRegion::Us => ("https://accounts.zoho.com", "https://www.zohoapis.com/inventory/v1"),
        ErpRegion::Eu => ("https://accounts.zoho.eu", "https://www.zohoapis.eu/inventory/v1"),
        ErpRegion::In => ("https://accounts.zoho.in", "https://www.zohoapis.in/inventory/v1"),
        ErpRegion::Au => {
            ("https://accounts.zoho.com.au", "https://www.zohoapis.com.au/inventory/v1")
        }
        ErpRegion::Jp => ("https://accounts.zoho.jp", "https://www.zohoapis.jp/inventory/v1"),
        ErpRegion::Ca => ("https://accounts.zohocloud.ca", "https://www.zohoapis.ca/inventory/v1"),
        ErpRegion::Cn => {
            ("https://accounts.zoho.com.cn", "https://www.zohoapis.com.cn/inventory/v1")
        }
        ErpRegion::Sa => ("https://accounts.zoho.sa", "https://www.zohoapis.sa/inventory/v1"),
    }
}

impl RegionTable {
    /// Built-in hosts for every region, with the configured overrides
    /// applied to all of them.
    pub fn from_config(config: &ErpConfig) -> Self {
        let endpoints = ErpRegion::ALL
            .iter()
            .map(|&region| {
                let (accounts, api) = builtin(region);
                let entry = RegionEndpoints {
                    accounts_url: config
                        .accounts_url_override
                        .clone()
                        .unwrap_or_else(|| accounts.to_string()),
                    api_url: config.api_url_override.clone().unwrap_or_else(|| api.to_string()),
                };
                (region, entry)
            })
            .collect();

        Self { endpoints, default_region: config.default_region }
    }

    /// Route every region to the same hosts. Used by tests against a mock
    /// server.
    pub fn single(accounts_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        let entry = RegionEndpoints { accounts_url: accounts_url.into(), api_url: api_url.into() };
        let endpoints = ErpRegion::ALL.iter().map(|&region| (region, entry.clone())).collect();
        Self { endpoints, default_region: ErpRegion::Us }
    }

    pub fn default_region(&self) -> ErpRegion {
        self.default_region
    }

    pub fn endpoints(&self, region: ErpRegion) -> Result<&RegionEndpoints> {
        self.endpoints
            .get(&region)
            .ok_or_else(|| CommerceError::Config(format!("no endpoints for region {region}")))
    }

    /// Resolve the `location` value the ERP appends to its OAuth redirect.
    ///
    /// Absent or blank falls back to the default region; anything
    /// unrecognised is `unsupported_region`.
    pub fn resolve(&self, location: Option<&str>) -> Result<ErpRegion> {
        match location.map(str::trim).filter(|value| !value.is_empty()) {
            None => Ok(self.default_region),
            Some(value) => ErpRegion::from_location(value).ok_or_else(|| {
                CommerceError::Validation(format!("unsupported_region: {value}"))
            }),
        }
    }
}
