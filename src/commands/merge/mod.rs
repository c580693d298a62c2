mod assemble;
mod config;
mod dates;
mod delimited;
mod document;
mod line_classify;
mod range_eval;
mod reconcile;
mod run;
mod sections;
mod sink;
mod source_text;
mod types;

pub use run::run;

pub(crate) use config::MergeConfig;
pub(crate) use dates::DateScanner;
pub(crate) use source_text::is_supported_document;
