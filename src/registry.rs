//! Process-wide pass registry.
//!
//! Passes are looked up by their stable name. The registry is populated
//! explicitly: [`initialize_pass_registry`] installs the built-in passes and
//! [`teardown_pass_registry`] drops every entry again. Lookups before
//! initialization fail with [`RegistryError::NotInitialized`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use derive_more::{Display, Error};
use parking_lot::RwLock;
use tracing::debug;

use crate::pass::Pass;
use crate::passes::{DcePass, FoldPass, LoopInfoPass, VerifierPass};

/// Creates a fresh instance of a registered pass.
pub type PassConstructor = fn() -> Box<dyn Pass>;

/// A registry entry.
#[derive(Clone, Copy, Debug)]
pub struct PassInfo {
    pub name: &'static str,
    pub description: &'static str,
    constructor: PassConstructor,
}

impl PassInfo {
    pub fn new(name: &'static str, description: &'static str, constructor: PassConstructor) -> Self {
        Self {
            name,
            description,
            constructor,
        }
    }

    pub fn create(&self) -> Box<dyn Pass> {
        (self.constructor)()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
pub enum RegistryError {
    #[display("pass registry is not initialized")]
    NotInitialized,
    #[display("pass `{_0}` is already registered")]
    Duplicate(#[error(not(source))] &'static str),
    #[display("no pass named `{_0}`")]
    Unknown(#[error(not(source))] String),
}

/// `None` until initialized. Sorted by name for stable listings.
static REGISTRY: LazyLock<RwLock<Option<BTreeMap<&'static str, PassInfo>>>> =
    LazyLock::new(|| RwLock::new(None));

fn builtin_passes() -> [PassInfo; 4] {
    [
        PassInfo::new(VerifierPass::NAME, VerifierPass::DESCRIPTION, || {
            Box::new(VerifierPass)
        }),
        PassInfo::new(DcePass::NAME, DcePass::DESCRIPTION, || {
            Box::new(DcePass::default())
        }),
        PassInfo::new(FoldPass::NAME, FoldPass::DESCRIPTION, || {
            Box::new(FoldPass::default())
        }),
        PassInfo::new(LoopInfoPass::NAME, LoopInfoPass::DESCRIPTION, || {
            Box::new(LoopInfoPass::default())
        }),
    ]
}

/// Create the registry with the built-in passes. Does nothing when it
/// already exists.
pub fn initialize_pass_registry() {
    let mut registry = REGISTRY.write();
    if registry.is_some() {
        return;
    }
    let passes: BTreeMap<_, _> = builtin_passes()
        .into_iter()
        .map(|info| (info.name, info))
        .collect();
    debug!(count = passes.len(), "pass registry initialized");
    *registry = Some(passes);
}

/// Drop the registry and every registered pass.
pub fn teardown_pass_registry() {
    if REGISTRY.write().take().is_some() {
        debug!("pass registry torn down");
    }
}

pub fn register_pass(info: PassInfo) -> Result<(), RegistryError> {
    let mut registry = REGISTRY.write();
    let passes = registry.as_mut().ok_or(RegistryError::NotInitialized)?;
    if passes.contains_key(info.name) {
        return Err(RegistryError::Duplicate(info.name));
    }
    debug!(name = info.name, "registered pass");
    passes.insert(info.name, info);
    Ok(())
}

/// Instantiate the pass registered under `name`.
pub fn create_pass(name: &str) -> Result<Box<dyn Pass>, RegistryError> {
    let registry = REGISTRY.read();
    let passes = registry.as_ref().ok_or(RegistryError::NotInitialized)?;
    passes
        .get(name)
        .map(PassInfo::create)
        .ok_or_else(|| RegistryError::Unknown(name.to_owned()))
}

/// All registered passes ordered by name. Empty when uninitialized.
pub fn registered_passes() -> Vec<PassInfo> {
    REGISTRY
        .read()
        .as_ref()
        .map(|passes| passes.values().copied().collect())
        .unwrap_or_default()
}
