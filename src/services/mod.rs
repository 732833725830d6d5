pub mod form_schema;
pub mod form_submitter;
pub mod listing_discoverer;
pub mod llm_service;
pub mod warn_writer;

pub use form_schema::FormSchemaExtractor;
pub use form_submitter::{FormSubmitter, SubmissionStage};
pub use listing_discoverer::ListingDiscoverer;
pub use llm_service::{LlmService, ResponseGenerator};
pub use warn_writer::WarnWriter;
