// ballers-domain library entry point
pub mod error;
pub mod normalize;
pub mod record;
pub mod schema;
pub use error::DomainError;
pub use normalize::{normalize, normalize_parts, CanonicalKey};
pub use record::{attributes_hash, DomainRecord, ExternalRecord, FieldChange};
pub use schema::{HeaderMismatch, SheetSchema};
