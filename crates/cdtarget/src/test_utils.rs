//! An in-memory Kubernetes API server for driving the reconciler in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context as TaskContext, Poll};

use http::{Request, Response};
use kube::client::Body;
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tower::Service;

use crate::api::v1alpha1::cdtarget::CDTarget;
use crate::controllers::cdtarget_controller::Context;
use crate::util::config::OperatorConfig;
use crate::util::metrics::Metrics;
use crate::util::owner::OwnerRegistry;

#[derive(Default)]
struct Store {
    /// Objects keyed by their item path, e.g. `/api/v1/namespaces/ns/secrets/name`
    objects: BTreeMap<String, Value>,
    /// Status codes forced for (method, path)
    failures: HashMap<(String, String), u16>,
    requests: Vec<(String, String)>,
    version: u64,
}

impl Store {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn stamp(&mut self, object: &mut Value) {
        if object["metadata"]["uid"].is_null() {
            object["metadata"]["uid"] = json!(format!("uid-{}", self.version + 1));
        }
        object["metadata"]["resourceVersion"] = json!(self.next_version());
    }

    fn handle(&mut self, method: &str, path: &str, body: Option<Value>) -> (u16, Value) {
        self.requests.push((method.to_string(), path.to_string()));

        if let Some(code) = self.failures.get(&(method.to_string(), path.to_string())) {
            return status(*code, &format!("injected failure for {method} {path}"));
        }

        let (item, subresource) = match path.strip_suffix("/status") {
            Some(item) => (item.to_string(), true),
            None => (path.to_string(), false),
        };

        match (method, body) {
            ("GET", _) => match self.objects.get(&item) {
                Some(object) => (200, object.clone()),
                None => status(404, &format!("{item} not found")),
            },
            ("POST", Some(mut object)) => {
                let Some(name) = object["metadata"]["name"].as_str().map(str::to_string) else {
                    return status(422, "metadata.name is required");
                };
                let key = format!("{path}/{name}");
                if self.objects.contains_key(&key) {
                    return status(409, &format!("{key} already exists"));
                }
                self.stamp(&mut object);
                self.objects.insert(key, object.clone());
                (201, object)
            }
            ("PUT" | "PATCH", Some(object)) if subresource => {
                let version = self.next_version();
                match self.objects.get_mut(&item) {
                    Some(existing) => {
                        existing["status"] = object["status"].clone();
                        existing["metadata"]["resourceVersion"] = json!(version);
                        (200, existing.clone())
                    }
                    None => status(404, &format!("{item} not found")),
                }
            }
            ("PUT", Some(mut object)) => {
                let Some(existing) = self.objects.get(&item) else {
                    return status(404, &format!("{item} not found"));
                };
                let current = &existing["metadata"]["resourceVersion"];
                let given = &object["metadata"]["resourceVersion"];
                if !given.is_null() && given != current {
                    return status(409, &format!("{item} has been modified"));
                }
                object["metadata"]["uid"] = existing["metadata"]["uid"].clone();
                if let Some(status) = existing.get("status") {
                    object["status"] = status.clone();
                }
                self.stamp(&mut object);
                self.objects.insert(item, object.clone());
                (200, object)
            }
            ("DELETE", _) => match self.objects.remove(&item) {
                Some(object) => (200, object),
                None => status(404, &format!("{item} not found")),
            },
            _ => status(405, &format!("{method} {path} is not supported")),
        }
    }
}

fn status(code: u16, message: &str) -> (u16, Value) {
    let reason = match code {
        404 => "NotFound",
        409 => "Conflict",
        422 => "Invalid",
        403 => "Forbidden",
        _ => "InternalError",
    };
    (
        code,
        json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": code
        }),
    )
}

/// Fake API server backed by a path keyed object store.
#[derive(Clone, Default)]
pub struct ApiServer {
    store: Arc<Mutex<Store>>,
}

impl ApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    pub fn path<K: Resource<DynamicType = ()>>(namespace: &str, name: &str) -> String {
        format!("{}/{}", K::url_path(&(), Some(namespace)), name)
    }

    /// Stores `object` as if it had been created by someone else.
    pub fn insert<K: Resource<DynamicType = ()> + Serialize>(&self, object: &K) {
        let namespace = object.meta().namespace.clone().unwrap_or_default();
        let name = object.meta().name.clone().unwrap_or_default();
        let mut value = serde_json::to_value(object).unwrap();
        let mut store = self.store.lock().unwrap();
        store.stamp(&mut value);
        store.objects.insert(Self::path::<K>(&namespace, &name), value);
    }

    pub fn get<K: Resource<DynamicType = ()> + DeserializeOwned>(&self, namespace: &str, name: &str) -> Option<K> {
        let store = self.store.lock().unwrap();
        store
            .objects
            .get(&Self::path::<K>(namespace, name))
            .map(|value| serde_json::from_value(value.clone()).unwrap())
    }

    /// Makes every `method` request on `path` fail with `code`.
    pub fn fail(&self, method: &str, path: &str, code: u16) {
        self.store
            .lock()
            .unwrap()
            .failures
            .insert((method.to_string(), path.to_string()), code);
    }

    pub fn clear_failures(&self) {
        self.store.lock().unwrap().failures.clear();
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.store.lock().unwrap().requests.clone()
    }

    /// Mutating requests, in order, with collection paths as sent
    pub fn writes(&self) -> Vec<(String, String)> {
        self.requests().into_iter().filter(|(method, _)| method != "GET").collect()
    }
}

impl Service<Request<Body>> for ApiServer {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let store = self.store.clone();
        Box::pin(async move {
            let method = req.method().to_string();
            let path = req.uri().path().to_string();
            let bytes = req.into_body().collect_bytes().await?;
            let body = (!bytes.is_empty())
                .then(|| serde_json::from_slice::<Value>(&bytes))
                .transpose()?;

            let (code, response) = store.lock().unwrap().handle(&method, &path, body);
            Ok(Response::builder()
                .status(code)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&response)?))
                .unwrap())
        })
    }
}

/// Reconciler context wired to `client` with default operator configuration
pub fn context(client: Client) -> Arc<Context> {
    context_with_config(client, OperatorConfig::default())
}

pub fn context_with_config(client: Client, config: OperatorConfig) -> Arc<Context> {
    Arc::new(Context {
        client,
        diagnostics: Default::default(),
        metrics: Metrics::new().unwrap(),
        config,
        registry: OwnerRegistry::new().register::<CDTarget>(),
    })
}
