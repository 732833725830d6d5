pub mod application_status;
pub mod company;
pub mod form_schema;
pub mod job_posting;
pub mod loaders;

pub use application_status::{ApplicationState, ApplicationStatus};
pub use company::Company;
pub use form_schema::{FormField, FormFieldSchema};
pub use job_posting::JobPosting;
pub use loaders::load_companies_from_toml;
