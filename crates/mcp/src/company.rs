// Company registry: named Odoo connection profiles, read-only after startup

use odoo_client::{CompanyProfile, OdooError, OdooResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of company profiles, keeping declaration order.
#[derive(Debug, Default)]
pub struct CompanyRegistry {
    profiles: Vec<Arc<CompanyProfile>>,
    index: HashMap<String, usize>,
}

impl CompanyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile. Names must be unique.
    pub fn register(&mut self, profile: CompanyProfile) -> OdooResult<()> {
        if self.index.contains_key(&profile.name) {
            return Err(OdooError::Config(format!(
                "company '{}' is already registered",
                profile.name
            )));
        }

        self.index.insert(profile.name.clone(), self.profiles.len());
        self.profiles.push(Arc::new(profile));
        Ok(())
    }

    /// Look up a profile by company name.
    pub fn resolve(&self, name: &str) -> OdooResult<Arc<CompanyProfile>> {
        self.index
            .get(name)
            .map(|&idx| self.profiles[idx].clone())
            .ok_or_else(|| OdooError::CompanyNotFound {
                name: name.to_string(),
                available: self.names(),
            })
    }

    /// Company names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.name.clone()).collect()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Arc<CompanyProfile>> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
