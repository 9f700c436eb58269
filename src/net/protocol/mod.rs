//! Implementation of the on-the-wire pixelflut protocol

mod compliant_parser;
mod dtypes;

pub use compliant_parser::{parse_request_bin, parse_request_str, parse_response_bin, parse_response_str, ParseErr};
pub use dtypes::{HelpTopic, Request, Response, StateEncodingAlgorithm};
