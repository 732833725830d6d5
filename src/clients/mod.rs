pub mod airtable_client;
pub mod company_directory;

pub use airtable_client::AirtableClient;
pub use company_directory::{company_directory, CompanyDirectory, TomlCompanyDirectory};
