//! Filter chain resolution.
//!
//! # Responsibilities
//! - Select the filters that apply to a request, in execution order
//! - Apply dispatcher filtering to every mapping
//! - Collapse repeated selections of the same filter
//!
//! # Design Decisions
//! - Two passes over the mappings: URL mappings first, servlet-name mappings
//!   second, each in configured order. A servlet-name mapping listed before a
//!   URL mapping still runs after it.
//! - No sorting by specificity
//! - Pure function: no state, no I/O, no allocation beyond the result

use crate::routing::dispatcher::DispatcherType;
use crate::routing::mapping::FilterMapping;
use crate::routing::matcher::{matches_servlet, matches_url};

/// Resolve the ordered, de-duplicated filter names for a request.
///
/// `request_path` is absent for named dispatches; `servlet_name` is absent
/// when no servlet has been selected. Either absence simply prevents the
/// corresponding predicate form from matching.
pub fn resolve(
    mappings: &[FilterMapping],
    dispatcher: DispatcherType,
    request_path: Option<&str>,
    servlet_name: Option<&str>,
) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::new();

    let by_path = mappings
        .iter()
        .filter(|m| m.applies_to(dispatcher))
        .filter(|m| matches_url(m, request_path));
    let by_name = mappings
        .iter()
        .filter(|m| m.applies_to(dispatcher))
        .filter(|m| matches_servlet(m, servlet_name));

    for mapping in by_path.chain(by_name) {
        if !resolved.iter().any(|name| *name == mapping.filter_name) {
            resolved.push(mapping.filter_name.clone());
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::dispatcher::DispatcherMask;

    fn url(name: &str, pattern: &str) -> FilterMapping {
        FilterMapping::new(name, DispatcherMask::REQUEST).with_url_pattern(pattern)
    }

    fn servlet(name: &str, servlet: &str) -> FilterMapping {
        FilterMapping::new(name, DispatcherMask::REQUEST).with_servlet_name(servlet)
    }

    #[test]
    fn test_empty_mappings() {
        let resolved = resolve(&[], DispatcherType::Request, Some("/x"), Some("S"));
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_logger_then_auth() {
        let mappings = vec![url("Logger", "/*"), servlet("Auth", "AdminServlet")];
        let resolved = resolve(&mappings, DispatcherType::Request, Some("/admin"), Some("AdminServlet"));
        assert_eq!(resolved, vec!["Logger", "Auth"]);
    }

    #[test]
    fn test_path_mappings_precede_name_mappings() {
        let mappings = vec![
            servlet("ByName", "Main"),
            url("ByPathA", "/app/*"),
            servlet("ByName2", "*"),
            url("ByPathB", "*.do"),
        ];
        let resolved = resolve(&mappings, DispatcherType::Request, Some("/app/run.do"), Some("Main"));
        assert_eq!(resolved, vec!["ByPathA", "ByPathB", "ByName", "ByName2"]);
    }

    #[test]
    fn test_duplicate_selection_kept_at_first_occurrence() {
        let mappings = vec![
            url("A", "/*"),
            url("B", "/x"),
            url("A", "/x"),
            servlet("B", "S"),
            servlet("C", "S"),
        ];
        let resolved = resolve(&mappings, DispatcherType::Request, Some("/x"), Some("S"));
        assert_eq!(resolved, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_dispatcher_excluded_mapping_never_contributes() {
        let forward_only = FilterMapping::new("F", DispatcherMask::FORWARD)
            .match_all_urls()
            .match_all_servlets();
        let mappings = vec![forward_only];
        for dispatcher in DispatcherType::ALL {
            let resolved = resolve(&mappings, dispatcher, Some("/x"), Some("S"));
            if dispatcher == DispatcherType::Forward {
                assert_eq!(resolved, vec!["F"]);
            } else {
                assert!(resolved.is_empty(), "{dispatcher} should not select F");
            }
        }
    }

    #[test]
    fn test_named_dispatch_without_path() {
        let mappings = vec![
            url("PathOnly", "/*"),
            FilterMapping::new("Everything", DispatcherMask::REQUEST).match_all_urls(),
            servlet("Named", "S"),
        ];
        let resolved = resolve(&mappings, DispatcherType::Request, None, Some("S"));
        assert_eq!(resolved, vec!["Everything", "Named"]);
    }

    #[test]
    fn test_mapping_without_predicates_never_matches() {
        let mappings = vec![FilterMapping::new("Empty", DispatcherMask::REQUEST)];
        let resolved = resolve(&mappings, DispatcherType::Request, Some("/x"), Some("S"));
        assert!(resolved.is_empty());
    }
}
