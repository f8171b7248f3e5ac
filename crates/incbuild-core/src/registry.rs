//! Build-session registry of evaluated modules
//!
//! The orchestrator owns one `ModuleRegistry` per build session and hands it
//! to every evaluation. Modules are evaluated in dependency order, so by the
//! time a module is checked, each of its dependencies that was evaluated in
//! this session already has an entry. Lookups of modules that were never
//! evaluated simply miss; a miss does not make the dependent stale.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::identity::ModuleIdentifier;
use crate::staleness::Verdict;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("module {0} was already evaluated in this build session")]
    AlreadyRecorded(ModuleIdentifier),
}

/// A module evaluated during the current build session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    identifier: ModuleIdentifier,
    verdict: Verdict,
}

impl Module {
    pub fn identifier(&self) -> &ModuleIdentifier {
        &self.identifier
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    pub fn is_stale(&self) -> bool {
        self.verdict.is_stale()
    }
}

#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: FxHashMap<ModuleIdentifier, Module>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, identifier: &ModuleIdentifier) -> Option<&Module> {
        self.modules.get(identifier)
    }

    /// Record the verdict of a module
    ///
    /// Each module is recorded once per session; a second record is rejected
    /// and the first entry is kept.
    pub fn record(
        &mut self,
        identifier: ModuleIdentifier,
        verdict: Verdict,
    ) -> Result<&Module, RegistryError> {
        use std::collections::hash_map::Entry;

        match self.modules.entry(identifier) {
            Entry::Occupied(entry) => Err(RegistryError::AlreadyRecorded(entry.key().clone())),
            Entry::Vacant(entry) => {
                let identifier = entry.key().clone();
                Ok(entry.insert(Module {
                    identifier,
                    verdict,
                }))
            }
        }
    }

    /// First dependency, in the given order, recorded as stale
    pub fn first_stale_dependency<'a>(
        &self,
        dependencies: &'a [ModuleIdentifier],
    ) -> Option<&'a ModuleIdentifier> {
        dependencies
            .iter()
            .find(|dependency| self.lookup(dependency).is_some_and(Module::is_stale))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Identifiers of every module recorded stale so far
    pub fn stale_modules(&self) -> impl Iterator<Item = &ModuleIdentifier> {
        self.modules
            .values()
            .filter(|module| module.is_stale())
            .map(Module::identifier)
    }
}
