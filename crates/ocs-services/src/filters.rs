//! In-memory filter service
//!
//! Evaluates filter IDs against an event. An ID is either an inline rule
//! (`*string:~*req.Account:1001|1002`) or the name of a tenant-scoped profile
//! whose rules must all pass.

use async_trait::async_trait;
use ocs_core::{
    config::FilterProfileConfig,
    decimal::parse_decimal,
    models::{EventContext, OPTS_PATH_PREFIX, REQ_PATH_PREFIX},
    traits::FilterService,
    OcsError, OcsResult,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, instrument};

const INLINE_PREFIX: char = '*';
const VALUES_SEP: char = '|';
const NOT_PREFIX: &str = "*not";

/// Predicate applied by an inline rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    /// Field equals one of the values
    String,
    /// Field starts with one of the values
    Prefix,
    /// Field ends with one of the values
    Suffix,
    /// Field is present and not null
    Exists,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterKind {
    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "*string" => Some(FilterKind::String),
            "*prefix" => Some(FilterKind::Prefix),
            "*suffix" => Some(FilterKind::Suffix),
            "*exists" => Some(FilterKind::Exists),
            "*gt" => Some(FilterKind::Gt),
            "*gte" => Some(FilterKind::Gte),
            "*lt" => Some(FilterKind::Lt),
            "*lte" => Some(FilterKind::Lte),
            _ => None,
        }
    }

    fn is_comparison(&self) -> bool {
        matches!(
            self,
            FilterKind::Gt | FilterKind::Gte | FilterKind::Lt | FilterKind::Lte
        )
    }

    fn tag(&self) -> &'static str {
        match self {
            FilterKind::String => "string",
            FilterKind::Prefix => "prefix",
            FilterKind::Suffix => "suffix",
            FilterKind::Exists => "exists",
            FilterKind::Gt => "gt",
            FilterKind::Gte => "gte",
            FilterKind::Lt => "lt",
            FilterKind::Lte => "lte",
        }
    }
}

/// One parsed inline rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    kind: FilterKind,
    negated: bool,
    element: String,
    values: Vec<String>,
    thresholds: Vec<Decimal>,
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let not = if self.negated { "not" } else { "" };
        write!(
            f,
            "*{}{}:{}:{}",
            not,
            self.kind.tag(),
            self.element,
            self.values.join("|")
        )
    }
}

impl FilterRule {
    /// Parse an inline rule of the form `*type:element:value1|value2`
    ///
    /// Comparison rules (`*gt`, `*gte`, `*lt`, `*lte`) need decimal values;
    /// the `*not` prefix is accepted for `*string`, `*prefix`, `*suffix` and
    /// `*exists`.
    pub fn parse(rule: &str) -> OcsResult<Self> {
        let invalid = |reason: &str| OcsError::InvalidFilter(format!("{}: {}", rule, reason));

        let mut parts = rule.splitn(3, ':');
        let tag = parts.next().unwrap_or_default();
        let element = parts.next().unwrap_or_default();
        let values = parts.next().unwrap_or_default();

        let (negated, kind) = match tag.strip_prefix(NOT_PREFIX) {
            Some(rest) => (true, FilterKind::parse(&format!("*{}", rest))),
            None => (false, FilterKind::parse(tag)),
        };
        let kind = kind.ok_or_else(|| invalid("unknown filter type"))?;
        if negated && kind.is_comparison() {
            return Err(invalid("comparison filters cannot be negated"));
        }

        if !element.starts_with(REQ_PATH_PREFIX) && !element.starts_with(OPTS_PATH_PREFIX) {
            return Err(invalid("element must start with ~*req. or ~*opts."));
        }

        let values: Vec<String> = values
            .split(VALUES_SEP)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        if values.is_empty() && kind != FilterKind::Exists {
            return Err(invalid("missing values"));
        }

        let thresholds = if kind.is_comparison() {
            values
                .iter()
                .map(|v| parse_decimal(v).map_err(|e| invalid(&e.to_string())))
                .collect::<OcsResult<Vec<_>>>()?
        } else {
            Vec::new()
        };

        Ok(Self {
            kind,
            negated,
            element: element.to_string(),
            values,
            thresholds,
        })
    }

    /// Evaluate the rule against an event
    ///
    /// A rule with several values passes when any of them matches.
    pub fn pass(&self, event: &EventContext) -> OcsResult<bool> {
        let field = event.field_as_string(&self.element);

        let matched = match (&self.kind, field) {
            (FilterKind::Exists, field) => field.is_some(),
            (_, None) => false,
            (FilterKind::String, Some(field)) => self.values.iter().any(|v| *v == field),
            (FilterKind::Prefix, Some(field)) => {
                self.values.iter().any(|v| field.starts_with(v.as_str()))
            }
            (FilterKind::Suffix, Some(field)) => {
                self.values.iter().any(|v| field.ends_with(v.as_str()))
            }
            (kind, Some(field)) => {
                let field = parse_decimal(&field).map_err(|_| {
                    OcsError::InvalidFilter(format!(
                        "{}: field value <{}> is not a number",
                        self, field
                    ))
                })?;
                self.thresholds.iter().any(|threshold| match kind {
                    FilterKind::Gt => field > *threshold,
                    FilterKind::Gte => field >= *threshold,
                    FilterKind::Lt => field < *threshold,
                    _ => field <= *threshold,
                })
            }
        };

        Ok(matched != self.negated)
    }
}

/// Filter service backed by an in-process profile table
#[derive(Debug, Default)]
pub struct InMemoryFilterService {
    profiles: RwLock<HashMap<(String, String), Vec<FilterRule>>>,
}

impl InMemoryFilterService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the service from configured profiles
    ///
    /// Profiles without a tenant are registered under `default_tenant`.
    pub fn from_config(default_tenant: &str, profiles: &[FilterProfileConfig]) -> OcsResult<Self> {
        let service = Self::new();
        for profile in profiles {
            let tenant = profile.tenant.as_deref().unwrap_or(default_tenant);
            service.set_profile(tenant, &profile.id, profile.rules.as_slice())?;
        }
        Ok(service)
    }

    /// Register or replace a named profile
    pub fn set_profile<S: AsRef<str>>(&self, tenant: &str, id: &str, rules: &[S]) -> OcsResult<()> {
        let rules = rules
            .iter()
            .map(|rule| FilterRule::parse(rule.as_ref()))
            .collect::<OcsResult<Vec<_>>>()?;

        debug!("Registering filter profile {}:{} ({} rules)", tenant, id, rules.len());

        self.profiles
            .write()
            .insert((tenant.to_string(), id.to_string()), rules);
        Ok(())
    }

    pub fn with_profile<S: AsRef<str>>(
        self,
        tenant: &str,
        id: &str,
        rules: &[S],
    ) -> OcsResult<Self> {
        self.set_profile(tenant, id, rules)?;
        Ok(self)
    }

    fn pass_one(&self, tenant: &str, filter_id: &str, event: &EventContext) -> OcsResult<bool> {
        if filter_id.starts_with(INLINE_PREFIX) {
            return FilterRule::parse(filter_id)?.pass(event);
        }

        let profiles = self.profiles.read();
        let rules = profiles
            .get(&(tenant.to_string(), filter_id.to_string()))
            .ok_or_else(|| OcsError::FilterNotFound(format!("{}:{}", tenant, filter_id)))?;

        for rule in rules {
            if !rule.pass(event)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl FilterService for InMemoryFilterService {
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn pass(
        &self,
        tenant: &str,
        filter_ids: &[String],
        event: &EventContext,
    ) -> OcsResult<bool> {
        for filter_id in filter_ids {
            if !self.pass_one(tenant, filter_id, event)? {
                debug!("Filter {} did not pass", filter_id);
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event() -> EventContext {
        EventContext::new("ocs.local")
            .with_field("Account", "1001")
            .with_field("Destination", "+4986517174963")
            .with_field("Usage", 90)
            .with_field("Subject", json!(null))
            .with_opt("*context", "charging")
    }

    fn passes(rule: &str, ev: &EventContext) -> bool {
        FilterRule::parse(rule).unwrap().pass(ev).unwrap()
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_string_rules() {
        let ev = event();
        assert!(passes("*string:~*req.Account:1001", &ev));
        assert!(passes("*string:~*req.Account:1002|1001", &ev));
        assert!(!passes("*string:~*req.Account:1002", &ev));
        assert!(passes("*notstring:~*req.Account:1002", &ev));
        assert!(passes("*string:~*opts.*context:charging", &ev));
    }

    #[test]
    fn test_prefix_suffix_rules() {
        let ev = event();
        assert!(passes("*prefix:~*req.Destination:+49", &ev));
        assert!(!passes("*notprefix:~*req.Destination:+4986", &ev));
        assert!(passes("*suffix:~*req.Destination:963", &ev));
        assert!(!passes("*prefix:~*req.Missing:+49", &ev));
    }

    #[test]
    fn test_exists_rules() {
        let ev = event();
        assert!(passes("*exists:~*req.Account:", &ev));
        assert!(passes("*notexists:~*req.Subject", &ev));
        assert!(!passes("*exists:~*req.Missing:", &ev));
    }

    #[test]
    fn test_comparison_rules() {
        let ev = event();
        assert!(passes("*gt:~*req.Usage:60", &ev));
        assert!(passes("*gte:~*req.Usage:90", &ev));
        assert!(!passes("*lt:~*req.Usage:90", &ev));
        assert!(passes("*lte:~*req.Usage:90.0", &ev));

        let err = FilterRule::parse("*gt:~*req.Account:1x").unwrap_err();
        assert_eq!(err.error_code(), "invalid_filter");

        let err = FilterRule::parse("*gt:~*opts.*context:10")
            .unwrap()
            .pass(&ev)
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_filter");
    }

    #[test]
    fn test_parse_errors() {
        for rule in [
            "*regex:~*req.Account:1001",
            "*string:Account:1001",
            "*string:~*req.Account",
            "*notgt:~*req.Usage:10",
        ] {
            assert!(FilterRule::parse(rule).is_err(), "{rule} should be rejected");
        }
    }

    #[test]
    fn test_display() {
        let rule = FilterRule::parse("*notstring:~*req.Account:1001|1002").unwrap();
        assert_eq!(rule.to_string(), "*notstring:~*req.Account:1001|1002");
    }

    #[tokio::test]
    async fn test_empty_ids_pass() {
        let service = InMemoryFilterService::new();
        assert!(service.pass("ocs.local", &[], &event()).await.unwrap());
    }

    #[tokio::test]
    async fn test_named_profiles() {
        let service = InMemoryFilterService::new()
            .with_profile(
                "ocs.local",
                "FLTR_ACNT_1001",
                &["*string:~*req.Account:1001", "*gte:~*req.Usage:60"],
            )
            .unwrap();

        let ev = event();
        assert!(service
            .pass("ocs.local", &ids(&["FLTR_ACNT_1001"]), &ev)
            .await
            .unwrap());
        assert!(!service
            .pass(
                "ocs.local",
                &ids(&["FLTR_ACNT_1001", "*string:~*req.Account:1002"]),
                &ev
            )
            .await
            .unwrap());

        let err = service
            .pass("other.tenant", &ids(&["FLTR_ACNT_1001"]), &ev)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "filter_not_found");
    }

    #[tokio::test]
    async fn test_from_config() {
        let profiles = vec![
            FilterProfileConfig {
                tenant: None,
                id: "FLTR_VOICE".to_string(),
                rules: vec!["*string:~*req.ToR:*voice".to_string()],
            },
            FilterProfileConfig {
                tenant: Some("tenant.b".to_string()),
                id: "FLTR_VOICE".to_string(),
                rules: vec!["*string:~*req.ToR:*sms".to_string()],
            },
        ];
        let service = InMemoryFilterService::from_config("ocs.local", &profiles).unwrap();

        let ev = EventContext::new("ocs.local").with_field("ToR", "*voice");
        assert!(service.pass("ocs.local", &ids(&["FLTR_VOICE"]), &ev).await.unwrap());
        assert!(!service.pass("tenant.b", &ids(&["FLTR_VOICE"]), &ev).await.unwrap());
    }
}
