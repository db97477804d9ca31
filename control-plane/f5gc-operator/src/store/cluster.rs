use async_trait::async_trait;
use kube::{
    Client,
    api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams},
};
use tracing::debug;

use super::{Managed, ObjectKey, ResourceStore, StoreError, key_for};

/// [`ResourceStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    field_manager: String,
}

impl KubeStore {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api<K: Managed>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            dry_run: false,
            field_manager: Some(self.field_manager.clone()),
        }
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

fn is_status(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == code)
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get<K: Managed>(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<K>, StoreError> {
        Ok(self.api::<K>(&key.namespace).get_opt(&key.name).await?)
    }

    async fn create<K: Managed>(&self, obj: &K) -> Result<K, StoreError> {
        let key = key_for(obj)?;
        self.api::<K>(&key.namespace)
            .create(&self.post_params(), obj)
            .await
            .map_err(|e| {
                if is_status(&e, 409) {
                    StoreError::already_exists::<K>(&key)
                } else {
                    e.into()
                }
            })
    }

    async fn replace<K: Managed>(&self, obj: &K) -> Result<K, StoreError> {
        let key = key_for(obj)?;
        self.api::<K>(&key.namespace)
            .replace(&key.name, &self.post_params(), obj)
            .await
            .map_err(|e| {
                if is_status(&e, 409) {
                    StoreError::conflict::<K>(&key)
                } else if is_status(&e, 404) {
                    StoreError::not_found::<K>(&key)
                } else {
                    e.into()
                }
            })
    }

    async fn list<K: Managed>(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<K>, StoreError> {
        let lp = ListParams::default().labels(selector);
        Ok(self.api::<K>(namespace).list(&lp).await?.items)
    }

    async fn delete_collection<K: Managed>(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<(), StoreError> {
        let lp = ListParams::default().labels(selector);
        let res = self
            .api::<K>(namespace)
            .delete_collection(&DeleteParams::foreground(), &lp)
            .await?;
        debug!(
            kind = %K::kind(&()),
            %namespace,
            %selector,
            pending = res.is_left(),
            "delete_collection issued"
        );
        Ok(())
    }

    async fn delete<K: Managed>(&self, key: &ObjectKey) -> Result<(), StoreError> {
        match self
            .api::<K>(&key.namespace)
            .delete(&key.name, &DeleteParams::foreground())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_status(&e, 404) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn patch_merge<K: Managed>(
        &self,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<K, StoreError> {
        self.api::<K>(&key.namespace)
            .patch(&key.name, &self.patch_params(), &Patch::Merge(patch))
            .await
            .map_err(|e| {
                if is_status(&e, 404) {
                    StoreError::not_found::<K>(key)
                } else {
                    e.into()
                }
            })
    }

    async fn patch_status<K: Managed>(
        &self,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<K, StoreError> {
        self.api::<K>(&key.namespace)
            .patch_status(&key.name, &self.patch_params(), &Patch::Merge(patch))
            .await
            .map_err(|e| {
                if is_status(&e, 404) {
                    StoreError::not_found::<K>(key)
                } else {
                    e.into()
                }
            })
    }
}
