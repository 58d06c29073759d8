use cdtarget::api::v1alpha1::cdtarget::CDTarget;
use kube::CustomResourceExt as _;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&CDTarget::crd())?);
    Ok(())
}
