// ── Service registry ──
//
// Known service names plus the current selection. Pure state: it never
// connects anything itself. The client consults it before every call and
// hands the selected name to the connection manager.

use crate::error::CoreError;
use crate::model::ServiceEndpoint;

#[derive(Debug, Default, Clone)]
pub struct ServiceRegistry {
    known: Vec<String>,
    selected: Option<String>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the known set. Duplicates collapse to their first occurrence.
    ///
    /// Keeps the current selection if it is still known, otherwise selects
    /// the first entry. Returns `false` when the list is empty, leaving
    /// nothing selected.
    pub fn initialize<I, S>(&mut self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known.clear();
        for name in names {
            let name = name.into();
            if !name.is_empty() && !self.known.contains(&name) {
                self.known.push(name);
            }
        }

        let still_valid = self
            .selected
            .as_ref()
            .is_some_and(|s| self.known.contains(s));
        if !still_valid {
            self.selected = self.known.first().cloned();
        }
        self.selected.is_some()
    }

    /// Switch the selection. Returns `true` if it changed.
    ///
    /// Selecting the current endpoint is a no-op, and so is selecting the
    /// default placeholder while something is already selected. The
    /// placeholder with nothing selected is `NoServiceSelected`.
    pub fn select(&mut self, endpoint: &ServiceEndpoint) -> Result<bool, CoreError> {
        if self.selected.as_deref() == Some(endpoint.name.as_str()) {
            return Ok(false);
        }
        if endpoint.is_default() {
            return match self.selected {
                Some(_) => Ok(false),
                None => Err(CoreError::NoServiceSelected),
            };
        }
        if !self.contains(&endpoint.name) {
            return Err(CoreError::UnknownEndpoint {
                name: endpoint.name.clone(),
            });
        }
        self.selected = Some(endpoint.name.clone());
        Ok(true)
    }

    /// Reject `name` if it is already known.
    pub fn check_new(&self, name: &str) -> Result<(), CoreError> {
        if name.is_empty() {
            return Err(CoreError::invalid("service name is empty"));
        }
        if self.contains(name) {
            return Err(CoreError::DuplicateEndpoint { name: name.into() });
        }
        Ok(())
    }

    /// Insert a freshly verified endpoint at the front and select it.
    pub fn insert_selected(&mut self, name: &str) -> ServiceEndpoint {
        self.known.retain(|n| n != name);
        self.known.insert(0, name.to_owned());
        self.selected = Some(name.to_owned());
        ServiceEndpoint::new(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.known.iter().any(|n| n == name)
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Known names in preference order (most recently added first).
    pub fn names(&self) -> &[String] {
        &self.known
    }

    /// Known endpoints sorted by name.
    pub fn list(&self) -> Vec<ServiceEndpoint> {
        let mut endpoints: Vec<_> = self.known.iter().map(ServiceEndpoint::new).collect();
        endpoints.sort();
        endpoints
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn names(registry: &ServiceRegistry) -> Vec<String> {
        registry.list().into_iter().map(|e| e.name).collect()
    }

    #[test]
    fn initialize_selects_first_and_lists_sorted() {
        let mut registry = ServiceRegistry::new();
        assert!(registry.initialize(["svcB", "svcA", "svcB"]));
        assert_eq!(registry.selected(), Some("svcB"));
        assert_eq!(names(&registry), vec!["svcA", "svcB"]);
    }

    #[test]
    fn initialize_keeps_valid_selection() {
        let mut registry = ServiceRegistry::new();
        registry.initialize(["a", "b"]);
        registry.select(&ServiceEndpoint::new("b")).unwrap();

        registry.initialize(["c", "b"]);
        assert_eq!(registry.selected(), Some("b"));

        registry.initialize(["c", "d"]);
        assert_eq!(registry.selected(), Some("c"));
    }

    #[test]
    fn initialize_with_nothing_clears_selection() {
        let mut registry = ServiceRegistry::new();
        registry.initialize(["a"]);
        assert!(!registry.initialize(Vec::<String>::new()));
        assert_eq!(registry.selected(), None);
        assert!(registry.list().is_empty());
    }

    #[test]
    fn select_same_or_default_is_noop() {
        let mut registry = ServiceRegistry::new();
        registry.initialize(["a", "b"]);

        assert!(!registry.select(&ServiceEndpoint::new("a")).unwrap());
        assert!(!registry.select(&ServiceEndpoint::default_endpoint()).unwrap());
        assert!(registry.select(&ServiceEndpoint::new("b")).unwrap());
        assert_eq!(registry.selected(), Some("b"));
    }

    #[test]
    fn default_with_nothing_selected_is_an_error() {
        let mut registry = ServiceRegistry::new();
        let err = registry.select(&ServiceEndpoint::default_endpoint()).unwrap_err();
        assert!(matches!(err, CoreError::NoServiceSelected));
    }

    #[test]
    fn select_unknown_is_rejected() {
        let mut registry = ServiceRegistry::new();
        registry.initialize(["a"]);
        let err = registry.select(&ServiceEndpoint::new("zzz")).unwrap_err();
        assert!(matches!(err, CoreError::UnknownEndpoint { .. }));
        assert_eq!(registry.selected(), Some("a"));
    }

    #[test]
    fn duplicate_is_rejected_without_change() {
        let mut registry = ServiceRegistry::new();
        registry.initialize(["a", "b"]);
        let before = names(&registry);

        let err = registry.check_new("b").unwrap_err();
        assert!(matches!(err, CoreError::DuplicateEndpoint { .. }));
        assert_eq!(names(&registry), before);
        assert_eq!(registry.selected(), Some("a"));
    }

    #[test]
    fn insert_selected_goes_to_front() {
        let mut registry = ServiceRegistry::new();
        registry.initialize(["a", "b"]);
        let endpoint = registry.insert_selected("c");

        assert_eq!(endpoint.name, "c");
        assert_eq!(registry.names(), ["c", "a", "b"]);
        assert_eq!(registry.selected(), Some("c"));
    }
}
