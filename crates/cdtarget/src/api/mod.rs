pub mod keda;
pub mod olm;
pub mod v1alpha1;
