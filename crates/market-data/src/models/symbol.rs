//! Provider-agnostic instrument codes.
//!
//! Upstreams disagree on how an A-share code is spelled: `sh600519`,
//! `600519.SH`, `SH600519`, or the bare `600519`. Cache keys and adapter
//! calls always use the bare code.

use serde::{Deserialize, Serialize};

const EXCHANGE_TAGS: [&str; 3] = ["SH", "SZ", "BJ"];

/// Strip exchange prefixes/suffixes and surrounding whitespace.
///
/// Codes that do not carry a known exchange tag are only trimmed and
/// upper-cased, so non A-share identifiers pass through untouched.
pub fn normalize_symbol(raw: &str) -> String {
    let upper = raw.trim().to_ascii_uppercase();

    if let Some((code, tag)) = upper.rsplit_once('.') {
        if EXCHANGE_TAGS.contains(&tag) && !code.is_empty() {
            return code.to_string();
        }
    }

    for tag in EXCHANGE_TAGS {
        if let Some(code) = upper.strip_prefix(tag) {
            if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) {
                return code.to_string();
            }
        }
    }

    upper
}

/// Listing board, which decides the daily price-limit band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Board {
    /// Shanghai / Shenzhen main boards.
    Main,
    /// Shenzhen ChiNext (300xxx, 301xxx).
    ChiNext,
    /// Shanghai STAR market (688xxx, 689xxx).
    Star,
    /// Beijing Stock Exchange (4xxxxx, 8xxxxx, 920xxx).
    Beijing,
    /// Anything that is not a six-digit A-share code.
    Unknown,
}

impl Board {
    /// Classify a normalized code.
    pub fn from_code(code: &str) -> Self {
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Self::Unknown;
        }

        match &code[..3] {
            "300" | "301" => Self::ChiNext,
            "688" | "689" => Self::Star,
            "920" => Self::Beijing,
            _ => match &code[..1] {
                "4" | "8" => Self::Beijing,
                "0" | "6" => Self::Main,
                _ => Self::Unknown,
            },
        }
    }

    /// Whether the board trades with the wider 20% band.
    pub fn is_growth(&self) -> bool {
        matches!(self, Self::ChiNext | Self::Star)
    }
}
