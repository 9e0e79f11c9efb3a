mod vault;

pub use vault::{LocalVault, VAULT_DIR};
