//! Placeholder secrets the user fills in by hand after the first reconciliation.
//!
//! They are only ever created, never owned and never rewritten.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use kube::ResourceExt;

use crate::api::v1alpha1::cdtarget::CDTarget;

pub const AZP_TOKEN: &str = "AZP_TOKEN";

pub const PROXY_KEYS: [&str; 7] = [
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "PROXY_USER",
    "PROXY_PW",
    "PROXY_URL",
    "FTP_PROXY",
    "NO_PROXY",
];

fn placeholder(target: &CDTarget, name: &str, keys: &[&str]) -> Secret {
    let string_data = (!keys.is_empty())
        .then(|| keys.iter().map(|k| (k.to_string(), String::new())).collect::<BTreeMap<_, _>>());

    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: target.namespace(),
            labels: Some(target.spec.additional_selector.clone()),
            ..ObjectMeta::default()
        },
        string_data,
        ..Secret::default()
    }
}

pub fn desired_token_secret(target: &CDTarget) -> Secret {
    placeholder(target, &target.spec.token_ref, &[AZP_TOKEN])
}

pub fn desired_proxy_secret(target: &CDTarget) -> Secret {
    placeholder(target, &target.spec.proxy_ref, &PROXY_KEYS)
}

pub fn desired_ca_secret(target: &CDTarget) -> Secret {
    placeholder(target, &target.spec.ca_cert_ref, &[])
}
