//! Business logic services.
//!
//! Services orchestrate the content store, registry cache, and embedding
//! provider into the operations the request layer exposes.

mod enrollment;
mod identification;

pub use enrollment::{EnrollRequest, EnrollmentService};
pub use identification::IdentificationService;
