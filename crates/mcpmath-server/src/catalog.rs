//! Catalog Filtering
//!
//! Derives the set of functions a server exposes from the full catalog and
//! the resolved configuration.
//!
//! # Architecture
//!
//! Filtering runs in three independent stages, each over one axis:
//! - **domain**: whitelist keeps only listed domains, otherwise the blacklist
//!   drops listed domains
//! - **category**: same rule over categories
//! - **function**: same rule over function names
//!
//! A function is exposed when it survives every stage. Source order is
//! preserved and the result is immutable; reconfiguration builds a new one.
//!
//! # Example
//!
//! ```
//! use mcpmath_functions::Catalog;
//! use mcpmath_server::catalog::CatalogFilter;
//! use mcpmath_server::config::ServerConfig;
//!
//! let mut config = ServerConfig::default();
//! config.domain_whitelist = vec!["trigonometry".into()];
//!
//! let exposed = CatalogFilter::from_config(&config).apply(&Catalog::standard().unwrap());
//! assert!(exposed.iter().all(|f| f.domain() == "trigonometry"));
//! ```

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

use mcpmath_functions::{Catalog, FunctionDescriptor};

use crate::config::ServerConfig;

/// Whitelist/blacklist pair for one axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxisFilter {
    whitelist: HashSet<String>,
    blacklist: HashSet<String>,
}

impl AxisFilter {
    pub fn new(whitelist: &[String], blacklist: &[String]) -> Self {
        Self {
            whitelist: whitelist.iter().cloned().collect(),
            blacklist: blacklist.iter().cloned().collect(),
        }
    }

    /// A non-empty whitelist is authoritative; the blacklist is then ignored.
    pub fn admits(&self, value: &str) -> bool {
        if !self.whitelist.is_empty() {
            self.whitelist.contains(value)
        } else {
            !self.blacklist.contains(value)
        }
    }

    pub fn is_active(&self) -> bool {
        !self.whitelist.is_empty() || !self.blacklist.is_empty()
    }
}

/// The three filter stages taken from a [`ServerConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    pub domains: AxisFilter,
    pub categories: AxisFilter,
    pub functions: AxisFilter,
}

impl CatalogFilter {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            domains: AxisFilter::new(&config.domain_whitelist, &config.domain_blacklist),
            categories: AxisFilter::new(&config.category_whitelist, &config.category_blacklist),
            functions: AxisFilter::new(&config.function_whitelist, &config.function_blacklist),
        }
    }

    pub fn is_active(&self) -> bool {
        self.domains.is_active() || self.categories.is_active() || self.functions.is_active()
    }

    pub fn admits(&self, function: &FunctionDescriptor) -> bool {
        self.domains.admits(function.domain())
            && self.categories.admits(function.category())
            && self.functions.admits(function.name())
    }

    /// Builds the exposed catalog.
    ///
    /// An empty result is logged as a warning, never returned as an error.
    pub fn apply(&self, catalog: &Catalog) -> ExposedCatalog {
        let functions: Vec<Arc<FunctionDescriptor>> = catalog
            .iter()
            .filter(|f| self.admits(f))
            .cloned()
            .collect();

        let stats = FilterStats::compute(catalog, &functions, self.is_active());
        if functions.is_empty() {
            warn!(
                total_available = stats.total_available,
                "Filtering left no functions exposed"
            );
        }
        ExposedCatalog::new(functions, stats)
    }
}

/// Counts describing what filtering did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub total_available: usize,
    pub total_exposed: usize,
    pub domains_available: BTreeMap<String, usize>,
    pub domains_exposed: BTreeMap<String, usize>,
    pub filtering_active: bool,
}

impl FilterStats {
    fn compute(catalog: &Catalog, exposed: &[Arc<FunctionDescriptor>], active: bool) -> Self {
        let mut domains_available = BTreeMap::new();
        for f in catalog.iter() {
            *domains_available.entry(f.domain().to_string()).or_insert(0) += 1;
        }
        let mut domains_exposed = BTreeMap::new();
        for f in exposed {
            *domains_exposed.entry(f.domain().to_string()).or_insert(0) += 1;
        }
        Self {
            total_available: catalog.len(),
            total_exposed: exposed.len(),
            domains_available,
            domains_exposed,
            filtering_active: active,
        }
    }
}

/// Immutable name → descriptor view served to clients.
#[derive(Debug, Clone, Default)]
pub struct ExposedCatalog {
    functions: Vec<Arc<FunctionDescriptor>>,
    index: HashMap<String, usize>,
    stats: FilterStats,
}

impl ExposedCatalog {
    fn new(functions: Vec<Arc<FunctionDescriptor>>, stats: FilterStats) -> Self {
        let index = functions
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name().to_string(), i))
            .collect();
        Self {
            functions,
            index,
            stats,
        }
    }

    /// Exposes a whole catalog unfiltered.
    pub fn unfiltered(catalog: &Catalog) -> Self {
        CatalogFilter::default().apply(catalog)
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

    /// Exposed domains in source order.
    pub fn domains(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for f in &self.functions {
            if !seen.contains(&f.domain()) {
                seen.push(f.domain());
            }
        }
        seen
    }

    /// Exposed function names grouped by domain.
    pub fn by_domain(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for f in &self.functions {
            grouped.entry(f.domain()).or_default().push(f.name());
        }
        grouped
    }

    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }
}
