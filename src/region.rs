//! Regions and the static per-region lookup data.
//!
//! A region is a closed set of variants. Everything keyed by region (account
//! ids, target allow-lists) is loaded once from configuration and never
//! looked up by raw string.

use regex::{NoExpand, Regex, RegexBuilder};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ExporterError, Result};

/// Geographic grouping of upstream sub-accounts.
///
/// The derived `Ord` is the poll order. Serialized as its label value so it
/// can key maps in every config format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Emea,
    Na,
    Oceania,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Emea, Region::Na, Region::Oceania];

    /// Label value used in every exported series.
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Emea => "EMEA",
            Region::Na => "NA",
            Region::Oceania => "OCEANIA",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ExporterError;

    fn from_str(s: &str) -> Result<Self> {
        Region::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ExporterError::Configuration(format!("unknown region '{}'", s)))
    }
}

impl Serialize for Region {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Upstream account and target allow-list for one region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionConfig {
    /// Upstream sub-account id queried for this region.
    #[serde(alias = "customer_id")]
    pub account_id: u64,

    /// Target-name substrings; a target is kept if any entry is contained in
    /// its name (case-insensitive).
    #[serde(default, alias = "filters")]
    pub targets: Vec<String>,
}

/// Case-insensitive rewrite applied to target names before export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AliasRule {
    pub from: String,
    pub to: String,
}

/// Built-in region table.
pub fn default_regions() -> BTreeMap<Region, RegionConfig> {
    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    let mut map = BTreeMap::new();
    map.insert(
        Region::Emea,
        RegionConfig {
            account_id: 24333,
            targets: targets(&[
                "Investor Centre Responsive - Site Check",
                "Investor Centre Responsive - Performance",
                "UK Investor Centre Responsive - Core Functionality Test",
                "UK Issuer Online - Site Check",
                "UK Issuer Online - Advanced Search",
                "UK Issuer Online Core Functionality",
                "EquatePlus",
                "PING",
                "UK Proxy Vote - Performance",
                "Sphere",
                "Global Viewpoint",
                "Summit",
            ]),
        },
    );
    map.insert(
        Region::Na,
        RegionConfig {
            account_id: 24332,
            targets: targets(&[
                "CGS GEMS",
                "NA_Issuer_Online_Holder",
                "Equateplus",
                "InvestorVote",
                "Sphere",
                "Investor Center",
                "NOC ServiceNow Test Environment",
            ]),
        },
    );
    map.insert(
        Region::Oceania,
        RegionConfig {
            account_id: 24334,
            targets: targets(&[
                "EquatePlus",
                "IssuerAU_V3.16 - After Hours",
                "IssuerAU_V3.16 - Core Hours",
                "IssuerNZ - Monitored from NZ_V2.6 - After Hours",
                "IssuerNZ - Monitored from NZ_V2.6 - Core Hours",
                "IC3 Registration AU_V5.0 - Core Hours",
                "InvestorVote",
                "GEMS",
            ]),
        },
    );
    map
}

pub fn default_deny_substrings() -> Vec<String> {
    vec!["UAT".to_string()]
}

pub fn default_aliases() -> Vec<AliasRule> {
    vec![AliasRule {
        from: "Investor Center".to_string(),
        to: "Investor Centre".to_string(),
    }]
}

/// Compiled name filtering and alias rewriting shared by all regions.
#[derive(Debug, Clone)]
pub struct TargetFilter {
    deny: Vec<String>,
    aliases: Vec<(Regex, String)>,
}

impl TargetFilter {
    pub fn new(deny: &[String], aliases: &[AliasRule]) -> Result<Self> {
        let aliases = aliases
            .iter()
            .map(|rule| {
                if rule.from.trim().is_empty() {
                    return Err(ExporterError::Configuration(
                        "alias rule with empty 'from' pattern".into(),
                    ));
                }
                let re = RegexBuilder::new(&regex::escape(&rule.from))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        ExporterError::Configuration(format!(
                            "invalid alias rule '{}': {}",
                            rule.from, e
                        ))
                    })?;
                Ok((re, rule.to.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            deny: deny.iter().filter(|d| !d.is_empty()).cloned().collect(),
            aliases,
        })
    }

    /// Deny markers are matched case-sensitively.
    pub fn is_denied(&self, name: &str) -> bool {
        self.deny.iter().any(|marker| name.contains(marker.as_str()))
    }

    /// True when at least one allow-list entry is contained in `name`,
    /// ignoring case.
    pub fn is_allowed(name: &str, allow: &[String]) -> bool {
        let name = name.to_lowercase();
        allow
            .iter()
            .filter(|entry| !entry.is_empty())
            .any(|entry| name.contains(&entry.to_lowercase()))
    }

    pub fn accepts(&self, name: &str, allow: &[String]) -> bool {
        !name.trim().is_empty() && !self.is_denied(name) && Self::is_allowed(name, allow)
    }

    /// Applies every alias rule in order, then trims.
    pub fn canonical_name(&self, name: &str) -> String {
        let mut out = name.to_string();
        for (re, to) in &self.aliases {
            out = re.replace_all(&out, NoExpand(to)).into_owned();
        }
        out.trim().to_string()
    }
}

impl Default for TargetFilter {
    fn default() -> Self {
        // Built-in rules are static literals and always compile.
        Self::new(&default_deny_substrings(), &default_aliases()).unwrap_or(Self {
            deny: default_deny_substrings(),
            aliases: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_region_parse_and_display() {
        assert_eq!("emea".parse::<Region>().unwrap(), Region::Emea);
        assert_eq!(" NA ".parse::<Region>().unwrap(), Region::Na);
        assert_eq!(Region::Oceania.to_string(), "OCEANIA");
        assert!("APAC".parse::<Region>().is_err());
    }

    #[test]
    fn test_region_poll_order_is_stable() {
        let keys: Vec<Region> = default_regions().keys().copied().collect();
        assert_eq!(keys, vec![Region::Emea, Region::Na, Region::Oceania]);
    }

    #[test]
    fn test_allow_list_is_case_insensitive_substring() {
        let list = allow(&["Sphere", "GEMS"]);
        assert!(TargetFilter::is_allowed("sphere - login journey", &list));
        assert!(TargetFilter::is_allowed("CGS gems portal", &list));
        assert!(!TargetFilter::is_allowed("Summit", &list));
    }

    #[test]
    fn test_uat_marker_is_never_accepted() {
        let filter = TargetFilter::default();
        let list = allow(&["Sphere"]);
        assert!(!filter.accepts("Sphere UAT", &list));
        assert!(filter.accepts("Sphere Production", &list));
    }

    #[test]
    fn test_empty_name_rejected() {
        let filter = TargetFilter::default();
        assert!(!filter.accepts("   ", &allow(&[""])));
    }

    #[test]
    fn test_alias_rewrites_case_insensitively_and_trims() {
        let filter = TargetFilter::default();
        assert_eq!(
            filter.canonical_name("  investor center - Login "),
            "Investor Centre - Login"
        );
        assert_eq!(filter.canonical_name("Sphere"), "Sphere");
    }

    #[test]
    fn test_alias_with_regex_metacharacters_is_literal() {
        let filter = TargetFilter::new(
            &[],
            &[AliasRule {
                from: "V3.16 (AU)".into(),
                to: "V3 AU".into(),
            }],
        )
        .unwrap();
        assert_eq!(filter.canonical_name("Issuer V3.16 (AU)"), "Issuer V3 AU");
        assert_eq!(filter.canonical_name("Issuer V3x16 (AU)"), "Issuer V3x16 (AU)");
    }

    #[test]
    fn test_empty_alias_pattern_rejected() {
        let err = TargetFilter::new(
            &[],
            &[AliasRule {
                from: " ".into(),
                to: "x".into(),
            }],
        )
        .unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }
}
