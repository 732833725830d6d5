pub mod toml_loader;

pub use toml_loader::load_companies_from_toml;
