use f5gc_operator::crd::Free5GC;
use kube::core::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crd = Free5GC::crd();
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
