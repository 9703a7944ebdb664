mod kubeconfig;
pub use kubeconfig::patch_for_container;

mod store;
pub use store::ClusterStore;
