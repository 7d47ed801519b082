//! Share links — demo configuration carried in a URL query parameter.
//!
//! DESIGN
//! ======
//! `<origin>/demo/<product_id>?config=<json>&collapsed=true`. The config is
//! plain JSON in the `config` parameter; decoding is lenient: a missing or
//! malformed parameter leaves the default configuration in effect, and
//! fields absent from the JSON take their defaults.

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("URL cannot carry a path: {0}")]
    CannotBeABase(String),
    #[error("config serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

// =============================================================================
// DEMO CONFIG
// =============================================================================

/// Configurator state a visitor can share.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DemoConfig {
    pub branding: Branding,
    pub modules: Modules,
    pub insights: Insights,
    pub privacy: Privacy,
    pub ui: UiOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Branding {
    pub primary_color: String,
    pub secondary_color: String,
    pub app_name: String,
    pub bank_name: String,
    pub logo: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            primary_color: "#f26522".into(),
            secondary_color: "#ffffff".into(),
            app_name: "iFinance".into(),
            bank_name: "ICICI Bank".into(),
            logo: "/icici-logo.png".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Modules {
    pub banking: bool,
    pub investments: bool,
}

impl Default for Modules {
    fn default() -> Self {
        Self { banking: true, investments: true }
    }
}

/// Which preview cards are shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct Insights {
    // Overview
    pub show_summary_card: bool,
    pub show_cross_sell_banner: bool,
    pub show_linked_accounts: bool,
    pub show_bank_accounts: bool,
    pub show_stocks: bool,
    #[serde(rename = "showETF")]
    pub show_etf: bool,
    pub show_mutual_funds: bool,
    // Banking
    pub show_banking_summary: bool,
    pub show_bank_accounts_list: bool,
    pub show_transactions_list: bool,
    pub spending_categories: bool,
    pub income_expenses: bool,
    pub top_transactions: bool,
    // Investments
    pub show_investment_summary: bool,
    pub show_investment_bifurcation: bool,
    pub asset_allocation: bool,
}

impl Default for Insights {
    fn default() -> Self {
        Self {
            show_summary_card: true,
            show_cross_sell_banner: true,
            show_linked_accounts: true,
            show_bank_accounts: true,
            show_stocks: true,
            show_etf: true,
            show_mutual_funds: true,
            show_banking_summary: true,
            show_bank_accounts_list: true,
            show_transactions_list: true,
            spending_categories: true,
            income_expenses: true,
            top_transactions: true,
            show_investment_summary: true,
            show_investment_bifurcation: true,
            asset_allocation: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Privacy {
    pub hide_numbers: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiOptions {
    pub dark_mode: bool,
    #[serde(rename = "usePrebuiltUI")]
    pub use_prebuilt_ui: bool,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self { dark_mode: false, use_prebuilt_ui: true }
    }
}

// =============================================================================
// LINK CODEC
// =============================================================================

/// What a decoded share link asks the demo page to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedDemo {
    pub product_id: Option<String>,
    pub config: DemoConfig,
    pub collapsed: bool,
}

/// Build the shareable demo link for `product_id` under `origin`.
///
/// # Errors
///
/// Returns [`ShareError`] if `origin` is not an absolute base URL or the
/// config cannot be serialized.
pub fn share_link(origin: &str, product_id: &str, config: &DemoConfig) -> Result<Url, ShareError> {
    let mut url = Url::parse(origin)?;
    url.path_segments_mut()
        .map_err(|()| ShareError::CannotBeABase(origin.to_string()))?
        .clear()
        .push("demo")
        .push(product_id);
    let json = serde_json::to_string(config)?;
    url.query_pairs_mut()
        .clear()
        .append_pair("config", &json)
        .append_pair("collapsed", "true");
    Ok(url)
}

/// Decode a share link. Only an unparsable URL is an error; a bad `config`
/// parameter falls back to [`DemoConfig::default`].
///
/// # Errors
///
/// Returns [`ShareError::InvalidUrl`] if `link` is not a URL.
pub fn decode_share_link(link: &str) -> Result<SharedDemo, ShareError> {
    let url = Url::parse(link)?;

    let mut config_param = None;
    let mut collapsed = false;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "config" => config_param = Some(value.into_owned()),
            "collapsed" => collapsed = value == "true",
            _ => {}
        }
    }

    let product_id = url.path_segments().and_then(|mut segments| {
        match (segments.next(), segments.next()) {
            (Some("demo"), Some(id)) if !id.is_empty() => Some(id.to_string()),
            _ => None,
        }
    });

    Ok(SharedDemo { product_id, config: decode_config_param(config_param.as_deref()), collapsed })
}

/// Parse an already-unescaped `config` value.
#[must_use]
pub fn decode_config_param(raw: Option<&str>) -> DemoConfig {
    let Some(raw) = raw else {
        return DemoConfig::default();
    };
    match serde_json::from_str(raw) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "failed to parse config from share link; using defaults");
            DemoConfig::default()
        }
    }
}

#[cfg(test)]
#[path = "share_test.rs"]
mod tests;
