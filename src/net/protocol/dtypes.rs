//! Data types that describe all protocol interactions as safe-to-use structs

use crate::canvas::Color;
use crate::state_encoding::EncodedState;
use crate::texts;
use std::fmt::{Display, Formatter};
use std::io::Write;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// The encoding algorithms that the whole canvas can be encoded in
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StateEncodingAlgorithm {
    /// *RGB then Base64* encoding with 3 bytes per pixel
    Rgb64,
    /// *RGBA then Base64* encoding with 4 bytes per pixel and a constant alpha of 255
    Rgba64,
}

impl StateEncodingAlgorithm {
    /// All supported algorithms
    pub const ALL: [StateEncodingAlgorithm; 2] = [Self::Rgb64, Self::Rgba64];

    /// The tag with which this algorithm is identified on the wire
    pub const fn tag(&self) -> &'static str {
        match self {
            StateEncodingAlgorithm::Rgb64 => "rgb64",
            StateEncodingAlgorithm::Rgba64 => "rgba64",
        }
    }

    /// Find the algorithm that is identified by the given tag (case-insensitive)
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.tag().eq_ignore_ascii_case(tag))
    }
}

/// `STATE` requests without an explicit algorithm are answered with this one
impl Default for StateEncodingAlgorithm {
    fn default() -> Self {
        Self::Rgb64
    }
}

impl Display for StateEncodingAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// The help topics that can be requested from the server
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HelpTopic {
    /// Help about the general pixelflut protocol and links to further topics
    General,
    /// Help about the *SIZE* command
    Size,
    /// Help about the *PX* command (both set and get variants)
    Px,
    /// Help about the *STATE* command (including all encodings)
    State,
}

impl HelpTopic {
    /// The static help text that is sent in response to this topic
    pub fn text(&self) -> &'static str {
        match self {
            HelpTopic::General => texts::HELP_GENERAL,
            HelpTopic::Size => texts::HELP_SIZE,
            HelpTopic::Px => texts::HELP_PX,
            HelpTopic::State => texts::HELP_STATE,
        }
    }
}

/// A request to a pixelflut server
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Request {
    /// Request help about a specific topic
    Help(HelpTopic),
    /// Get the size of the canvas
    GetSize,
    /// Get the color of one pixel from the server
    GetPixel {
        /// The x coordinate of the pixel
        x: usize,
        /// The y coordinate of the pixel
        y: usize,
    },
    /// Set the color of one pixel
    SetPixel {
        /// The x coordinate of the pixel
        x: usize,
        /// The y coordinate of the pixel
        y: usize,
        /// The color to which the pixel should be set
        color: Color,
    },
    /// Get the complete canvas in a specific encoding
    GetState(StateEncodingAlgorithm),
}

impl Request {
    /// Write the wire representation of this request (including the trailing newline) into `writer`
    pub fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writeln!(writer, "{}", self)
    }

    /// Write the wire representation of this request (including the trailing newline) into `writer`
    pub async fn write_async(&self, writer: &mut (impl AsyncWrite + Unpin)) -> std::io::Result<()> {
        let mut buf = Vec::with_capacity(32);
        self.write(&mut buf)?;
        writer.write_all(&buf).await
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Request::Help(topic) => match topic {
                HelpTopic::General => f.write_str("HELP"),
                HelpTopic::State => f.write_str("HELP STATE"),
                HelpTopic::Size => f.write_str("HELP SIZE"),
                HelpTopic::Px => f.write_str("HELP PX"),
            },
            Request::GetSize => f.write_str("SIZE"),
            Request::GetPixel { x, y } => write!(f, "PX {} {}", x, y),
            Request::SetPixel { x, y, color } => write!(f, "PX {} {} {:X}", x, y, color),
            Request::GetState(alg) => write!(f, "STATE {}", alg),
        }
    }
}

/// The response of a pixelflut server
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Response {
    /// Help about a specific topic with more information about that topic
    Help(HelpTopic),
    /// Size information about the servers canvas
    Size {
        /// Width of the canvas in number of pixels
        width: usize,
        /// Height of the canvas in number of pixels
        height: usize,
    },
    /// Color data of a specific pixel
    PxData {
        /// X coordinate of the pixel
        x: usize,
        /// Y coordinate of the pixel
        y: usize,
        /// The color of the pixel
        color: Color,
    },
    /// State of the complete canvas in a specific encoding algorithm
    State(EncodedState),
}

impl Response {
    /// Write the wire representation of this response (including the trailing newline) into `writer`
    pub fn write(&self, writer: &mut impl Write) -> std::io::Result<()> {
        match self {
            Response::Help(topic) => writer.write_all(topic.text().as_bytes()),
            Response::Size { width, height } => writeln!(writer, "SIZE {} {}", width, height),
            Response::PxData { x, y, color } => writeln!(writer, "PX {} {} {:X}", x, y, color),
            Response::State(state) => writer.write_all(state.as_line()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        fn wire(request: Request) -> String {
            let mut buf = Vec::new();
            request.write(&mut buf).unwrap();
            String::from_utf8(buf).unwrap()
        }

        assert_eq!(wire(Request::Help(HelpTopic::Px)), "HELP PX\n");
        assert_eq!(wire(Request::GetSize), "SIZE\n");
        assert_eq!(wire(Request::GetPixel { x: 4, y: 2 }), "PX 4 2\n");
        assert_eq!(
            wire(Request::SetPixel {
                x: 4,
                y: 2,
                color: Color(0x0A, 0xBB, 0xCC)
            }),
            "PX 4 2 0ABBCC\n"
        );
        assert_eq!(wire(Request::GetState(StateEncodingAlgorithm::Rgba64)), "STATE rgba64\n");
    }

    #[test]
    fn test_response_wire_format() {
        fn wire(response: Response) -> String {
            let mut buf = Vec::new();
            response.write(&mut buf).unwrap();
            String::from_utf8(buf).unwrap()
        }

        assert_eq!(wire(Response::Size { width: 800, height: 600 }), "SIZE 800 600\n");
        assert_eq!(
            wire(Response::PxData {
                x: 0,
                y: 0,
                color: Color(0xAB, 0xCD, 0xEF)
            }),
            "PX 0 0 ABCDEF\n"
        );
        assert!(wire(Response::Help(HelpTopic::General)).ends_with('\n'));
        assert_eq!(
            wire(Response::State(EncodedState::wrap(StateEncodingAlgorithm::Rgb64, b"AAAA"))),
            "STATE rgb64 AAAA\n"
        );
    }

    #[test]
    fn test_algorithm_tags() {
        assert_eq!(StateEncodingAlgorithm::from_tag("RGB64"), Some(StateEncodingAlgorithm::Rgb64));
        assert_eq!(StateEncodingAlgorithm::from_tag("rgba64"), Some(StateEncodingAlgorithm::Rgba64));
        assert_eq!(StateEncodingAlgorithm::from_tag("custom_binary"), None);
        assert_eq!(StateEncodingAlgorithm::default(), StateEncodingAlgorithm::Rgb64);
    }
}
