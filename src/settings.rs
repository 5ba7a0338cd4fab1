//! User settings: first-run seeding of the configuration directory and the
//! typed view over `config.json`.

pub mod store;
pub mod values;

pub use store::SettingsStore;
pub use values::Settings;
