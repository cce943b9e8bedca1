pub mod job_ctx;
pub mod scrape_job;

pub use job_ctx::JobCtx;
pub use scrape_job::{JobOutcome, ScrapeJob};
