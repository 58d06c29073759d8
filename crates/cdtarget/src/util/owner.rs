use std::collections::BTreeSet;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use crate::util::errors::{Result, StdError};

/// Registry of the resource types that are allowed to own child objects.
///
/// Built once at start-up and handed to the reconciler through its context.
#[derive(Clone, Debug, Default)]
pub struct OwnerRegistry {
    kinds: BTreeSet<(String, String)>,
}

impl OwnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<K: Resource<DynamicType = ()>>(mut self) -> Self {
        self.kinds
            .insert((K::api_version(&()).into_owned(), K::kind(&()).into_owned()));
        self
    }

    pub fn is_registered<K: Resource<DynamicType = ()>>(&self) -> bool {
        self.kinds
            .contains(&(K::api_version(&()).into_owned(), K::kind(&()).into_owned()))
    }

    /// Controller owner reference pointing at `owner`.
    pub fn owner_reference<K: Resource<DynamicType = ()>>(&self, owner: &K) -> Result<OwnerReference> {
        if !self.is_registered::<K>() {
            return Err(StdError::SchemeError(format!(
                "{}/{} is not registered as an owner type",
                K::api_version(&()),
                K::kind(&())
            ))
            .into());
        }

        owner.controller_owner_ref(&()).ok_or_else(|| {
            StdError::MetadataMissing(format!("{} has no uid to be referenced by", owner.name_any())).into()
        })
    }

    /// Marks `owner` as the controller of `child` so the child is garbage collected with it.
    pub fn set_controller_reference<K, C>(&self, owner: &K, child: &mut C) -> Result<()>
    where
        K: Resource<DynamicType = ()>,
        C: Resource,
    {
        let oref = self.owner_reference(owner)?;
        let refs = child.meta_mut().owner_references.get_or_insert_with(Vec::new);
        refs.retain(|existing| existing.uid != oref.uid && existing.controller != Some(true));
        refs.push(oref);
        Ok(())
    }
}
