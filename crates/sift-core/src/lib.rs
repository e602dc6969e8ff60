pub mod domain;
pub mod error;
pub mod eval;
pub mod filter;
pub mod profile;
pub mod time;

pub use domain::*;
pub use error::CoreError;
pub use filter::{
    parse_filter, parse_filter_args, Filter, FilterError, FilterErrorKind, FilterParseError,
    FilterSettings, FilterSource, ParsedFilter, TaskSource,
};
