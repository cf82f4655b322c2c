use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::descriptor::FunctionDescriptor;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("function '{0}' is registered twice")]
    DuplicateName(String),
}

/// Ordered set of functions with unique names.
///
/// Iteration follows registration order, which is also the order the server
/// lists tools in.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    functions: Vec<Arc<FunctionDescriptor>>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors<I>(descriptors: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = FunctionDescriptor>,
    {
        let mut catalog = Self::new();
        for descriptor in descriptors {
            catalog.register(descriptor)?;
        }
        Ok(catalog)
    }

    /// The built-in math library.
    pub fn standard() -> Result<Self, CatalogError> {
        Self::from_descriptors(crate::library::all())
    }

    pub fn register(&mut self, descriptor: FunctionDescriptor) -> Result<(), CatalogError> {
        if self.index.contains_key(descriptor.name()) {
            return Err(CatalogError::DuplicateName(descriptor.name().to_string()));
        }
        self.index
            .insert(descriptor.name().to_string(), self.functions.len());
        self.functions.push(Arc::new(descriptor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FunctionDescriptor>> {
        self.index.get(name).map(|&i| &self.functions[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<FunctionDescriptor>> {
        self.functions.iter()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Distinct domains in first-seen order.
    pub fn domains(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for f in &self.functions {
            if !seen.contains(&f.domain()) {
                seen.push(f.domain());
            }
        }
        seen
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for f in &self.functions {
            if !seen.contains(&f.category()) {
                seen.push(f.category());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, domain: &str) -> FunctionDescriptor {
        FunctionDescriptor::builder(name, domain).build()
    }

    #[test]
    fn test_register_preserves_order() {
        let catalog = Catalog::from_descriptors([
            descriptor("b", "x"),
            descriptor("a", "y"),
            descriptor("c", "x"),
        ])
        .unwrap();
        let names: Vec<&str> = catalog.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(catalog.domains(), vec!["x", "y"]);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = Catalog::from_descriptors([descriptor("a", "x"), descriptor("a", "y")]).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateName("a".into()));
    }

    #[test]
    fn test_lookup() {
        let catalog = Catalog::from_descriptors([descriptor("a", "x")]).unwrap();
        assert!(catalog.contains("a"));
        assert_eq!(catalog.get("a").unwrap().domain(), "x");
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_standard_catalog_builds() {
        let catalog = Catalog::standard().unwrap();
        assert!(catalog.contains("is_prime"));
        assert_eq!(catalog.domains(), vec!["arithmetic", "number_theory", "trigonometry"]);
    }
}
