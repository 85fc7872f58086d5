//! Patch manager: installs replacements at patch sites and restores the original
//! state in LIFO order.
//!
//! Each [`PatchEntry`] records what a site held before (or that it held nothing)
//! so restoration puts back exactly that: the same attribute, override or factory,
//! or its absence.

use crate::domain::errors::{FailureCollector, MockError, MockResult};
use crate::domain::function::Function;
use crate::domain::object::{Attr, ObjectRef};
use crate::domain::registry::MockTarget;
use crate::domain::value::Value;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Where a replacement lives.
#[derive(Debug, Clone)]
pub enum PatchSite {
    /// The container's own attribute table.
    Slot,
    /// The per-instance override table of the instance's class.
    InstanceOverride { class: ObjectRef },
    /// The construction hook of a class.
    Factory,
}

impl PatchSite {
    fn name(&self) -> &'static str {
        match self {
            PatchSite::Slot => "attribute",
            PatchSite::InstanceOverride { .. } => "instance override",
            PatchSite::Factory => "constructor",
        }
    }

    fn same_as(&self, other: &PatchSite) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Content of a patch site.
#[derive(Debug, Clone)]
pub enum SiteContent {
    Attr(Attr),
    Value(Value),
    Factory(Function),
}

/// Which entry point installed a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    Callable,
    Attribute,
    Constructor,
}

#[derive(Debug, Clone)]
pub struct PatchEntry {
    pub target: MockTarget,
    pub site: PatchSite,
    pub kind: PatchKind,
    /// `None` when the site was empty before patching.
    pub original: Option<SiteContent>,
    pub installed: SiteContent,
}

fn site_error(target: &MockTarget, site: &PatchSite) -> MockError {
    MockError::InvalidUsage(format!("{target}: invalid {} patch site", site.name()))
}

fn read_site(target: &MockTarget, site: &PatchSite) -> MockResult<Option<SiteContent>> {
    let container = target.container();
    match site {
        PatchSite::Slot => Ok(container.own_attr(target.attribute()).map(SiteContent::Attr)),
        PatchSite::InstanceOverride { class } => {
            if !class.is_class() {
                return Err(site_error(target, site));
            }
            Ok(class
                .instance_override(container.id(), target.attribute())
                .map(SiteContent::Value))
        }
        PatchSite::Factory => {
            if !container.is_class() {
                return Err(site_error(target, site));
            }
            Ok(container.factory().map(SiteContent::Factory))
        }
    }
}

fn write_site(target: &MockTarget, site: &PatchSite, content: Option<SiteContent>) -> MockResult<()> {
    let container = target.container();
    let name = target.attribute();
    match (site, content) {
        (PatchSite::Slot, Some(SiteContent::Attr(attr))) => {
            container.set_own_attr(name, attr);
        }
        (PatchSite::Slot, None) => {
            container.remove_own_attr(name);
        }
        (PatchSite::InstanceOverride { class }, Some(SiteContent::Value(value))) => {
            class.set_instance_override(container.id(), name, value);
        }
        (PatchSite::InstanceOverride { class }, None) => {
            class.remove_instance_override(container.id(), name);
        }
        (PatchSite::Factory, Some(SiteContent::Factory(f))) => {
            container.set_factory(Some(f));
        }
        (PatchSite::Factory, None) => {
            container.set_factory(None);
        }
        _ => return Err(site_error(target, site)),
    }
    Ok(())
}

/// Active patches of one session.
#[derive(Default)]
pub struct PatchManager {
    entries: Mutex<Vec<PatchEntry>>,
}

impl PatchManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `replacement` at `site` of `target`.
    ///
    /// Fails if the same site of the same target is already patched.
    pub fn patch(
        &self,
        target: &MockTarget,
        site: PatchSite,
        kind: PatchKind,
        replacement: SiteContent,
    ) -> MockResult<PatchEntry> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries
            .iter()
            .find(|e| e.target == *target && e.site.same_as(&site))
        {
            return Err(MockError::InvalidUsage(format!(
                "{target}: this {} is already patched ({:?}) and can not be patched twice",
                site.name(),
                existing.kind
            )));
        }
        let original = read_site(target, &site)?;
        write_site(target, &site, Some(replacement.clone()))?;
        debug!(patch_target = %target, site = site.name(), existed = original.is_some(), "patched");
        let entry = PatchEntry {
            target: target.clone(),
            site,
            kind,
            original,
            installed: replacement,
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    /// Installs a construction hook on `class`.
    pub fn patch_factory(&self, target: &MockTarget, factory: Function) -> MockResult<PatchEntry> {
        self.patch(target, PatchSite::Factory, PatchKind::Constructor, SiteContent::Factory(factory))
    }

    /// The kind of patch active on `target`, if any.
    pub fn patched_kind(&self, target: &MockTarget) -> Option<PatchKind> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.target == *target)
            .map(|e| e.kind)
    }

    /// Swaps the installed content of an existing patch, keeping its original.
    pub fn replace(&self, target: &MockTarget, replacement: SiteContent) -> MockResult<()> {
        let mut entries = self.entries.lock();
        let entry = entries
            .iter_mut()
            .rev()
            .find(|e| e.target == *target)
            .ok_or_else(|| MockError::InvalidUsage(format!("{target} is not patched")))?;
        write_site(target, &entry.site, Some(replacement.clone()))?;
        entry.installed = replacement;
        debug!(patch_target = %target, "patch replaced");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Restores every patch, newest first. Every entry is attempted; failures are
    /// reported together afterwards.
    pub fn unpatch_all(&self) -> MockResult<()> {
        let entries = std::mem::take(&mut *self.entries.lock());
        let mut failures = FailureCollector::new();
        for entry in entries.into_iter().rev() {
            match write_site(&entry.target, &entry.site, entry.original) {
                Ok(()) => debug!(patch_target = %entry.target, site = entry.site.name(), "restored"),
                Err(e) => {
                    warn!(patch_target = %entry.target, error = %e, "failed to restore patch");
                    failures.push(e);
                }
            }
        }
        failures.into_result()
    }
}

impl Drop for PatchManager {
    fn drop(&mut self) {
        if !self.entries.get_mut().is_empty() {
            warn!("patch manager dropped with active patches; restoring");
            if let Err(e) = self.unpatch_all() {
                warn!(error = %e, "restoring patches on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::domain::object::ClassBuilder;
    use crate::domain::value::CallArgs;

    #[test]
    fn test_round_trip_restores_identical_value() {
        let ns = ObjectRef::namespace("config");
        let original = Function::new("load", |_: &CallArgs| Ok(Value::Int(1)));
        ns.set_attr("load", original.clone()).unwrap();
        let manager = PatchManager::new();
        let target = MockTarget::new(&ns, "load");
        manager
            .patch(&target, PatchSite::Slot, PatchKind::Attribute, SiteContent::Attr(Attr::Data(Value::Int(2))))
            .unwrap();
        assert_eq!(ns.get_attr("load").unwrap(), Value::Int(2));
        manager.unpatch_all().unwrap();
        assert_eq!(ns.get_attr("load").unwrap(), Value::Function(original));
    }

    #[test]
    fn test_missing_attribute_is_absent_after_restore() {
        let ns = ObjectRef::namespace("config");
        let manager = PatchManager::new();
        let target = MockTarget::new(&ns, "fresh");
        manager
            .patch(&target, PatchSite::Slot, PatchKind::Attribute, SiteContent::Attr(Attr::Data(Value::Int(2))))
            .unwrap();
        assert!(ns.has_attr("fresh"));
        manager.unpatch_all().unwrap();
        assert!(!ns.has_attr("fresh"));
    }

    #[test]
    fn test_double_patch_is_rejected_and_replace_keeps_original() {
        let ns = ObjectRef::namespace("config");
        ns.set_attr("level", 1).unwrap();
        let manager = PatchManager::new();
        let target = MockTarget::new(&ns, "level");
        let content = |v: i64| SiteContent::Attr(Attr::Data(Value::Int(v)));
        manager.patch(&target, PatchSite::Slot, PatchKind::Attribute, content(2)).unwrap();
        assert!(manager.patch(&target, PatchSite::Slot, PatchKind::Attribute, content(3)).is_err());
        manager.replace(&target, content(3)).unwrap();
        assert_eq!(ns.get_attr("level").unwrap(), Value::Int(3));
        manager.unpatch_all().unwrap();
        assert_eq!(ns.get_attr("level").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_lifo_restoration_of_layered_patches() {
        let class = ClassBuilder::new("Service").data("mode", "prod").build();
        let manager = PatchManager::new();
        let slot = MockTarget::new(&class, "mode");
        manager
            .patch(&slot, PatchSite::Slot, PatchKind::Attribute, SiteContent::Attr(Attr::Data("test".into())))
            .unwrap();
        let ctor = MockTarget::new(&class, "__new__");
        manager
            .patch_factory(&ctor, Function::new("fake", |_: &CallArgs| Ok(Value::None)))
            .unwrap();
        assert_eq!(class.instantiate(&args![]).unwrap(), Value::None);
        assert_eq!(manager.len(), 2);
        manager.unpatch_all().unwrap();
        assert!(manager.is_empty());
        assert!(class.factory().is_none());
        assert_eq!(class.get_attr("mode").unwrap(), Value::from("prod"));
    }

    #[test]
    fn test_drop_restores() {
        let ns = ObjectRef::namespace("config");
        {
            let manager = PatchManager::new();
            manager
                .patch(
                    &MockTarget::new(&ns, "tmp"),
                    PatchSite::Slot,
                    PatchKind::Attribute,
                    SiteContent::Attr(Attr::Data(Value::None)),
                )
                .unwrap();
        }
        assert!(!ns.has_attr("tmp"));
    }
}
