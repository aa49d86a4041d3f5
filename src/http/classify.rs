//! HTTP request classification.
//!
//! # Responsibilities
//! - Turn a verb and URL into a stable operation label for logs and metrics
//! - Recognise hierarchical resource paths (`.../providers/{ns}/{type}/{name}`)
//! - Derive labels for generic REST paths from their trailing segments
//!
//! # Design Decisions
//! - Pure function of (verb, url) over immutable config; no state
//! - Never errors: unmatched paths fall back to the trimmed URL, malformed
//!   input to the literal string
//! - A resource type is either the final segment (collection) or the one
//!   before it (instance); deeper paths are left unclassified

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::config::ClassifierConfig;
use crate::http::trim::Target;

const LIFECYCLE_SUFFIX: &str = "SubscriptionLifeCycleNotification";
const ITEM_SUFFIX: &str = "Item";
const UNCLASSIFIED_LABEL: &str = "unclassified";

/// How a label was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// GET on a resource collection.
    List,
    /// GET on a single resource.
    Read,
    /// Any other verb on a known resource type.
    Resource,
    /// Subscription life-cycle notification.
    Lifecycle,
    /// Action on a resource.
    Action,
    /// Generic item operation.
    Item,
    /// No classification; label is the trimmed URL.
    Unclassified,
    /// Input could not be parsed; label is the literal input.
    Malformed,
}

/// Canonical verb + resource label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedOperation {
    pub verb: String,
    pub label: String,
    pub kind: OperationKind,
}

impl ClassifiedOperation {
    /// Label safe to use as a metric dimension. Unclassified and malformed
    /// labels carry raw URLs, so they collapse to one value per verb.
    pub fn metric_label(&self) -> String {
        match self.kind {
            OperationKind::Unclassified | OperationKind::Malformed => {
                format!("{} {}", self.verb, UNCLASSIFIED_LABEL)
            }
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for ClassifiedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.label)
    }
}

/// Maps HTTP verb + path to a canonical operation label.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    config: Arc<ClassifierConfig>,
    resource_types: HashSet<String>,
    markers: HashSet<String>,
}

impl Default for RequestClassifier {
    fn default() -> Self {
        Self::new(Arc::new(ClassifierConfig::default()))
    }
}

impl RequestClassifier {
    pub fn new(config: Arc<ClassifierConfig>) -> Self {
        let resource_types = config.resource_types.iter().map(|t| t.to_lowercase()).collect();
        let markers = config.hierarchical_markers.iter().map(|m| m.to_lowercase()).collect();
        Self {
            config,
            resource_types,
            markers,
        }
    }

    /// Classify a request given its verb and absolute URL or origin-form path.
    pub fn classify(&self, verb: &str, target: &str) -> ClassifiedOperation {
        let verb = verb.to_ascii_uppercase();

        let (url, trimmed) = match parse_target(target) {
            Some(parsed) => parsed,
            None => {
                return ClassifiedOperation {
                    verb,
                    label: target.to_string(),
                    kind: OperationKind::Malformed,
                }
            }
        };

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let classified = if self.is_hierarchical(&segments) {
            self.classify_resource(&verb, &segments)
        } else {
            self.classify_generic(&segments)
        };

        match classified {
            Some((label, kind)) => ClassifiedOperation { verb, label, kind },
            None => ClassifiedOperation {
                verb,
                label: trimmed,
                kind: OperationKind::Unclassified,
            },
        }
    }

    fn is_hierarchical(&self, segments: &[&str]) -> bool {
        segments
            .iter()
            .any(|s| self.markers.contains(&s.to_lowercase()))
    }

    fn classify_resource(&self, verb: &str, segments: &[&str]) -> Option<(String, OperationKind)> {
        let last = segments.len().checked_sub(1)?;
        let (index, resource_type) = segments
            .iter()
            .enumerate()
            .rev()
            .take(2)
            .map(|(i, s)| (i, normalize_segment(s)))
            .find(|(_, s)| self.resource_types.contains(s))?;

        if verb != "GET" {
            return Some((resource_type, OperationKind::Resource));
        }
        if index == last {
            Some((format!("{} - LIST", resource_type), OperationKind::List))
        } else {
            Some((format!("{} - READ", resource_type), OperationKind::Read))
        }
    }

    fn classify_generic(&self, segments: &[&str]) -> Option<(String, OperationKind)> {
        let n = segments.len();
        let last = *segments.last()?;

        if last.eq_ignore_ascii_case(&self.config.lifecycle_marker) {
            let owner = segments.get(n.checked_sub(2)?)?;
            return Some((
                format!("{}{}", singularize(owner), LIFECYCLE_SUFFIX),
                OperationKind::Lifecycle,
            ));
        }

        let prefix = self.config.action_prefix.as_str();
        if let Some(action) = last.strip_prefix(prefix).filter(|a| !a.is_empty()) {
            let owner = segments.get(n.checked_sub(3)?)?;
            return Some((
                format!("{}{}", singularize(owner), capitalize(action)),
                OperationKind::Action,
            ));
        }

        let owner = segments.get(n.checked_sub(2)?)?;
        Some((format!("{}{}", singularize(owner), ITEM_SUFFIX), OperationKind::Item))
    }
}

/// Parse the target and compute its trimmed form.
fn parse_target(target: &str) -> Option<(Url, String)> {
    let parsed = Target::parse(target)?;
    let trimmed = parsed.trimmed();
    Some((parsed.url().clone(), trimmed))
}

/// Lower-case and cut at the first `?` or `/`.
fn normalize_segment(segment: &str) -> String {
    let end = segment.find(['?', '/']).unwrap_or(segment.len());
    segment[..end].to_lowercase()
}

/// Strip one trailing `s` when the word is longer than one character.
pub fn singularize(word: &str) -> &str {
    if word.len() > 1 {
        word.strip_suffix('s').unwrap_or(word)
    } else {
        word
    }
}

/// Upper-case the first character.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARM: &str = "https://management.azure.com";

    fn classify(verb: &str, target: &str) -> String {
        RequestClassifier::default().classify(verb, target).to_string()
    }

    #[test]
    fn test_resource_list_and_read() {
        assert_eq!(
            classify("GET", &format!("{ARM}/subscriptions/sub_id/resourceGroups?api-version=version")),
            "GET resourcegroups - LIST"
        );
        assert_eq!(
            classify("GET", &format!("{ARM}/subscriptions/sub_id/resourceGroups/rg1")),
            "GET resourcegroups - READ"
        );
        assert_eq!(
            classify(
                "GET",
                &format!("{ARM}/subscriptions/s/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/acct?api-version=v")
            ),
            "GET storageaccounts - READ"
        );
    }

    #[test]
    fn test_multiple_query_parameters() {
        assert_eq!(
            classify(
                "GET",
                &format!("{ARM}/subscriptions/s/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts?api-version=v&param1=value1")
            ),
            "GET storageaccounts - LIST"
        );
    }

    #[test]
    fn test_non_get_has_no_operation_type() {
        let label = classify(
            "post",
            &format!("{ARM}/subscriptions/s/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts?api-version=v"),
        );
        assert_eq!(label, "POST storageaccounts");
    }

    #[test]
    fn test_unknown_resource_type_falls_back_to_trimmed_url() {
        let url = format!(
            "{ARM}/subscriptions/sub_id/customResourceGroup/resource_name/providers/Microsoft.Storage/customResource/resource_name?api-version=version&x=1"
        );
        let op = RequestClassifier::default().classify("GET", &url);
        assert_eq!(op.kind, OperationKind::Unclassified);
        assert_eq!(
            op.to_string(),
            format!("GET {ARM}/subscriptions/sub_id/customResourceGroup/resource_name/providers/Microsoft.Storage/customResource/resource_name?api-version=version")
        );
    }

    #[test]
    fn test_misplaced_query_is_logged_verbatim() {
        let url = format!(
            "{ARM}/subscriptions/sub_id/resourceGroups/rg_name/providers/Microsoft.Storage/storageAccounts/account_name/api-version=version"
        );
        assert_eq!(classify("GET", &url), format!("GET {url}"));
    }

    #[test]
    fn test_malformed_input_is_kept_literally() {
        let op = RequestClassifier::default().classify("GET", "::not a url::");
        assert_eq!(op.kind, OperationKind::Malformed);
        assert_eq!(op.to_string(), "GET ::not a url::");
    }

    #[test]
    fn test_generic_rest_labels() {
        assert_eq!(classify("GET", "https://api.example.com/v1/users/42"), "GET userItem");
        assert_eq!(classify("DELETE", "/v1/orders/7?force=true"), "DELETE orderItem");
        assert_eq!(
            classify("POST", "/hooks/tenants/lifecycleNotifications"),
            "POST tenantSubscriptionLifeCycleNotification"
        );
        assert_eq!(classify("POST", "/v1/clusters/c1/action-restart"), "POST clusterRestart");
    }

    #[test]
    fn test_generic_rest_too_short_falls_back() {
        assert_eq!(classify("GET", "/health?probe=1"), "GET /health");
        assert_eq!(classify("POST", "/c1/action-restart"), "POST /c1/action-restart");
        assert_eq!(classify("GET", "https://example.com/"), "GET https://example.com/");
    }

    #[test]
    fn test_bare_action_prefix_is_an_item() {
        assert_eq!(classify("POST", "/v1/jobs/action-"), "POST jobItem");
    }

    #[test]
    fn test_metric_label_drops_raw_urls() {
        let classifier = RequestClassifier::default();
        let first = classifier.classify("GET", "https://h/subscriptions/s1/customThing/abc123?x=1");
        let second = classifier.classify("get", "https://h/subscriptions/s2/customThing/def456");
        assert_eq!(first.kind, OperationKind::Unclassified);
        assert_ne!(first.to_string(), second.to_string());
        assert_eq!(first.metric_label(), "GET unclassified");
        assert_eq!(second.metric_label(), "GET unclassified");

        let malformed = classifier.classify("PUT", "::not a url::");
        assert_eq!(malformed.metric_label(), "PUT unclassified");

        let list = classifier.classify("GET", "https://h/subscriptions/s/resourceGroups?api-version=1");
        assert_eq!(list.metric_label(), list.to_string());
    }

    #[test]
    fn test_deterministic() {
        let classifier = RequestClassifier::default();
        let url = format!("{ARM}/subscriptions/s/resourceGroups/rg");
        assert_eq!(classifier.classify("GET", &url), classifier.classify("GET", &url));
    }

    #[test]
    fn test_singularize_and_capitalize() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("s"), "s");
        assert_eq!(singularize("status"), "statu");
        assert_eq!(singularize("data"), "data");
        assert_eq!(capitalize("restart"), "Restart");
        assert_eq!(capitalize(""), "");
    }
}
