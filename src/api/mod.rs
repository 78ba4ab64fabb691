pub mod envelope;
pub mod link;
pub mod response;

pub use envelope::{Envelope, PageEnvelope, Pagination};
pub use response::{ApiResponse, ApiResult};
