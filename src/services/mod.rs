pub mod browser_source;
pub mod csv_sink;
pub mod failure_report;
pub mod media_downloader;
pub mod question_source;
pub mod result_sink;
pub mod sink_writer;

pub use browser_source::BrowserQuestionSource;
pub use csv_sink::CsvSink;
pub use failure_report::FailureReport;
pub use media_downloader::MediaDownloader;
pub use question_source::{ExtractRequest, Extracted, QuestionSource};
pub use result_sink::ResultSink;
pub use sink_writer::{spawn_sink_writer, SinkHandle};
