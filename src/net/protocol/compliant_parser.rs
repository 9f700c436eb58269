//! A pixelflut request parser implementation that is fully compliant to the wire protocol

use anyhow::anyhow;
use thiserror::Error;

use crate::canvas::{Color, ColorParseError};
use crate::net::protocol::{HelpTopic, Request, Response, StateEncodingAlgorithm};
use crate::state_encoding::EncodedState;

/// Errors that can occur while parsing a request line
///
/// The `Display` implementation of each variant is exactly the line that is sent back to a client.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ParseErr {
    /// The passed pixelflut command is unknown
    #[error("Unknown command. Send HELP for detailed usage information")]
    UnknownCommand,
    /// The request line is not a valid UTF-8 string
    #[error("Request is not a valid UTF-8 string. Send HELP for detailed usage information")]
    InvalidEncoding,
    /// The command is known but was invoked with the wrong number of arguments
    #[error("{command} command has invalid number of arguments. {expected}")]
    InvalidArgumentCount {
        /// The command that was invoked
        command: &'static str,
        /// A description of the valid argument counts
        expected: &'static str,
    },
    /// A coordinate argument is not a non-negative integer
    #[error("Argument {position} cannot be interpreted as coordinate: {token:?}")]
    InvalidCoordinate {
        /// Position of the offending argument (1 for x, 2 for y)
        position: u8,
        /// The offending token
        token: String,
    },
    /// The color argument of a `PX` command is not valid hex
    #[error(transparent)]
    InvalidColor(#[from] ColorParseError),
    /// `HELP` was requested for an unknown topic
    #[error("Unknown help topic {0:?}. Send HELP for a list of available subcommands")]
    UnknownHelpTopic(String),
    /// `STATE` was requested with an unknown encoding algorithm
    #[error("Unknown algorithm {0:?}. Send HELP STATE for information about available ones")]
    UnknownAlgorithm(String),
}

/// Parse a coordinate at the given argument position
#[inline(always)]
fn parse_coordinate(token: &str, position: u8) -> Result<usize, ParseErr> {
    token.parse().map_err(|_| ParseErr::InvalidCoordinate {
        position,
        token: token.to_owned(),
    })
}

/// Parse the arguments to a `PX` command which may either be a get or a set
#[inline(always)]
fn parse_px_args(args: &[&str]) -> Result<Request, ParseErr> {
    match *args {
        [x, y] => Ok(Request::GetPixel {
            x: parse_coordinate(x, 1)?,
            y: parse_coordinate(y, 2)?,
        }),
        [x, y, color] => Ok(Request::SetPixel {
            x: parse_coordinate(x, 1)?,
            y: parse_coordinate(y, 2)?,
            color: Color::from_hex(color)?,
        }),
        _ => Err(ParseErr::InvalidArgumentCount {
            command: "PX",
            expected: "Should either be 2 or 3.",
        }),
    }
}

/// Parse the arguments to a Help command
#[inline(always)]
fn parse_help_args(args: &[&str]) -> Result<Request, ParseErr> {
    match *args {
        [] => Ok(Request::Help(HelpTopic::General)),
        [topic] => parse_help_topic(topic)
            .map(Request::Help)
            .ok_or_else(|| ParseErr::UnknownHelpTopic(topic.to_owned())),
        _ => Err(ParseErr::InvalidArgumentCount {
            command: "HELP",
            expected: "Should either be 0 or 1.",
        }),
    }
}

#[inline(always)]
fn parse_help_topic(topic: &str) -> Option<HelpTopic> {
    const TOPICS: [(&str, HelpTopic); 5] = [
        ("help", HelpTopic::General),
        ("general", HelpTopic::General),
        ("size", HelpTopic::Size),
        ("px", HelpTopic::Px),
        ("state", HelpTopic::State),
    ];
    TOPICS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(topic))
        .map(|(_, topic)| *topic)
}

/// Parse the arguments to a State command
#[inline(always)]
fn parse_state_args(args: &[&str]) -> Result<Request, ParseErr> {
    match *args {
        [] => Ok(Request::GetState(StateEncodingAlgorithm::default())),
        [tag] => StateEncodingAlgorithm::from_tag(tag)
            .map(Request::GetState)
            .ok_or_else(|| ParseErr::UnknownAlgorithm(tag.to_owned())),
        _ => Err(ParseErr::InvalidArgumentCount {
            command: "STATE",
            expected: "Should either be 0 or 1.",
        }),
    }
}

/// A statically sized buffer containing input tokens.
///
/// This is useful during parsing because it can be allocated on the stack instead of the heap as a Vec would.
/// Lines with more than `MAX_TOKS` tokens are truncated which parsers detect as too many arguments as long as
/// `MAX_TOKS` is larger than the longest valid command.
struct TokBuf<'s, const MAX_TOKS: usize> {
    tokens: [&'s str; MAX_TOKS],
    /// How many tokens are actually present in the buffer
    len: usize,
}

impl<'s, const MAX_TOKS: usize> TokBuf<'s, MAX_TOKS> {
    #[inline(always)]
    fn tokens(&self) -> &[&'s str] {
        &self.tokens[..self.len]
    }
}

impl<'s, const MAX_TOKS: usize> FromIterator<&'s str> for TokBuf<'s, MAX_TOKS> {
    #[inline(always)]
    fn from_iter<T: IntoIterator<Item = &'s str>>(iter: T) -> Self {
        let mut this = Self {
            tokens: [""; MAX_TOKS],
            len: 0,
        };

        for (i, token) in iter.into_iter().take(MAX_TOKS).enumerate() {
            this.tokens[i] = token;
            this.len += 1;
        }

        this
    }
}

/// Try to parse a single pixelflut request
///
/// Command names are matched case-insensitively and the line may still carry its trailing newline.
#[inline(always)]
pub fn parse_request_str(line: &str) -> Result<Request, ParseErr> {
    let tokens: TokBuf<'_, 5> = line.split_whitespace().collect();
    let Some((command, args)) = tokens.tokens().split_first() else {
        return Err(ParseErr::UnknownCommand);
    };

    if command.eq_ignore_ascii_case("PX") {
        parse_px_args(args)
    } else if command.eq_ignore_ascii_case("SIZE") {
        match args {
            [] => Ok(Request::GetSize),
            _ => Err(ParseErr::InvalidArgumentCount {
                command: "SIZE",
                expected: "Should be 0.",
            }),
        }
    } else if command.eq_ignore_ascii_case("STATE") {
        parse_state_args(args)
    } else if command.eq_ignore_ascii_case("HELP") {
        parse_help_args(args)
    } else {
        Err(ParseErr::UnknownCommand)
    }
}

/// Parse a single request from a byte slice
#[inline(always)]
pub fn parse_request_bin(line: &[u8]) -> Result<Request, ParseErr> {
    match std::str::from_utf8(line) {
        Ok(line) => parse_request_str(line),
        Err(_) => Err(ParseErr::InvalidEncoding),
    }
}

/// Try to parse a single pixelflut response
///
/// Only single-line responses (`SIZE`, `PX` and `STATE`) can be parsed.
pub fn parse_response_str(line: &str) -> anyhow::Result<Response> {
    let tokens: TokBuf<'_, 5> = line.split_whitespace().collect();
    match *tokens.tokens() {
        ["SIZE", width, height] => Ok(Response::Size {
            width: width.parse()?,
            height: height.parse()?,
        }),
        ["PX", x, y, color] => Ok(Response::PxData {
            x: x.parse()?,
            y: y.parse()?,
            color: Color::from_hex(color)?,
        }),
        ["STATE", tag, payload] => {
            let alg = StateEncodingAlgorithm::from_tag(tag)
                .ok_or_else(|| anyhow!("server sent state with unknown algorithm {tag:?}"))?;
            Ok(Response::State(EncodedState::wrap(alg, payload.as_bytes())))
        }
        _ => Err(anyhow!("server sent unexpected response {:?}", line.trim_end())),
    }
}

/// Parse a single pixelflut response from a byte slice
#[inline(always)]
pub fn parse_response_bin(line: &[u8]) -> anyhow::Result<Response> {
    let line = std::str::from_utf8(line).map_err(|_| anyhow!("response is not a valid UTF-8 string"))?;
    parse_response_str(line)
}
