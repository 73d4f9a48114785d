mod file_store;
mod install;
mod manifest;
mod state;
mod store;
mod transactions;
mod uninstall;

pub use file_store::FileKeyValueStore;
pub use install::{install_package, InstallChange};
pub use manifest::{ProjectManifest, VersionMapManifest};
pub use state::{InstallRecord, InstallState};
pub use store::{
    decode_install_state, encode_install_state, InstallStateStore, KeyValueStore,
    MemoryKeyValueStore, CURRENT_RELEASE_KEY, INSTALL_STATE_KEY,
};
pub use transactions::{install_with_manifest, uninstall_with_manifest};
pub use uninstall::{blocking_dependents, uninstall_package, UninstallChange};

#[cfg(test)]
mod tests;
