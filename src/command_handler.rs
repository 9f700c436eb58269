//!
//! Transport independent handling of pixelflut requests
//!
//! Every server parses its input into lines and hands each of them to a [`CommandHandler`] which
//! executes the request against the shared canvas and produces exactly one response line.
//!

use bytes::{BufMut, Bytes, BytesMut};
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;

use crate::canvas::{InvalidCoordinatesError, SharedCanvas};
use crate::net::protocol::{parse_request_bin, ParseErr, Request, Response};
use crate::state_encoding::SharedStateCache;

/// Reasons why a request could not be answered successfully
///
/// Each of these is reported to the client as one line containing its `Display` output.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum RequestError {
    /// The request line could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseErr),
    /// The request addressed a pixel outside the canvas
    #[error(transparent)]
    Coordinates(#[from] InvalidCoordinatesError),
}

/// A [`CommandHandler`] that is shared between all servers
pub type SharedCommandHandler = Arc<CommandHandler>;

/// Executes pixelflut requests against a canvas and its cached encodings
///
/// The handler itself holds no per-client state so it can be shared freely between connections.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    canvas: SharedCanvas,
    states: SharedStateCache,
}

impl CommandHandler {
    /// Create a handler operating on *canvas* that serves `STATE` requests from *states*
    pub fn new(canvas: SharedCanvas, states: SharedStateCache) -> Self {
        Self { canvas, states }
    }

    /// The canvas on which requests are executed
    pub fn canvas(&self) -> &SharedCanvas {
        &self.canvas
    }

    /// Parse and execute a single request line
    pub fn handle_request(&self, line: &[u8]) -> Result<Response, RequestError> {
        tracing::trace!("Handling request {:?}", String::from_utf8_lossy(line).trim_end());

        match parse_request_bin(line)? {
            Request::Help(topic) => Ok(Response::Help(topic)),
            Request::GetSize => {
                let (width, height) = self.canvas.get_size();
                Ok(Response::Size { width, height })
            }
            Request::GetPixel { x, y } => {
                let color = self.canvas.get_pixel(x, y)?;
                Ok(Response::PxData { x, y, color })
            }
            Request::SetPixel { x, y, color } => {
                self.canvas.set_pixel(x, y, color)?;
                Ok(Response::PxData { x, y, color })
            }
            Request::GetState(alg) => Ok(Response::State(self.states.get_state(alg))),
        }
    }

    /// Execute a single request line and write the resulting response or error line into *writer*
    ///
    /// Only errors of *writer* itself are returned.
    pub fn handle_line(&self, line: &[u8], writer: &mut impl Write) -> std::io::Result<()> {
        write_outcome(&self.handle_request(line), writer)
    }

    /// Execute a single request line and return the newline terminated response
    ///
    /// This never fails; every error is turned into an error line.
    pub fn dispatch(&self, line: &[u8]) -> Bytes {
        match self.handle_request(line) {
            // cached state lines are shared instead of copied
            Ok(Response::State(state)) => state.as_line().clone(),
            outcome => {
                let mut buf = BytesMut::with_capacity(32).writer();
                write_outcome(&outcome, &mut buf).expect("writing into a BytesMut cannot fail");
                buf.into_inner().freeze()
            }
        }
    }
}

/// Write the result of [`CommandHandler::handle_request`] as one response or error line into *writer*
pub fn write_outcome(
    outcome: &Result<Response, RequestError>,
    writer: &mut impl Write,
) -> std::io::Result<()> {
    match outcome {
        Ok(response) => response.write(writer),
        Err(e) => writeln!(writer, "{}", e),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::canvas::{Canvas, Color};
    use crate::state_encoding::StateCache;

    fn handler(width: usize, height: usize) -> CommandHandler {
        let canvas = Arc::new(Canvas::new(width, height).unwrap());
        let states = Arc::new(StateCache::new(&canvas));
        CommandHandler::new(canvas, states)
    }

    #[test]
    fn test_size() {
        let handler = handler(800, 600);
        assert_eq!(handler.dispatch(b"SIZE\n").as_ref(), b"SIZE 800 600\n");
    }

    #[test]
    fn test_set_then_get_pixel() {
        let handler = handler(800, 600);
        assert_eq!(handler.dispatch(b"PX 0 0 ABCDEF\n").as_ref(), b"PX 0 0 ABCDEF\n");
        assert_eq!(handler.dispatch(b"PX 0 0\n").as_ref(), b"PX 0 0 ABCDEF\n");
        assert_eq!(handler.dispatch(b"px 0 0 abcdef").as_ref(), b"PX 0 0 ABCDEF\n");
        assert_eq!(handler.canvas().get_pixel(0, 0).unwrap(), Color(0xAB, 0xCD, 0xEF));
    }

    #[test]
    fn test_fresh_canvas_is_black() {
        let handler = handler(4, 4);
        assert_eq!(handler.dispatch(b"PX 3 3\n").as_ref(), b"PX 3 3 000000\n");
    }

    #[test]
    fn test_out_of_bounds_is_an_error_line() {
        let handler = handler(800, 600);
        let response = handler.dispatch(b"PX 9999 9999 000000\n");
        let response = std::str::from_utf8(&response).unwrap();
        assert!(response.ends_with('\n'));
        assert!(response.contains("not inside the canvas"), "{response}");
        assert!(matches!(
            handler.handle_request(b"PX 800 0"),
            Err(RequestError::Coordinates(_))
        ));
        assert!(matches!(
            handler.handle_request(b"PX 0 600 FFFFFF"),
            Err(RequestError::Coordinates(_))
        ));
    }

    #[test]
    fn test_every_response_is_one_terminated_line() {
        let handler = handler(8, 8);
        for line in [
            &b""[..],
            b"FOO",
            b"PX",
            b"PX a b",
            b"PX 1 1 GGGGGG",
            b"SIZE 1",
            b"STATE foo",
            b"HELP foo",
            b"\xff\xfe",
        ] {
            let response = handler.dispatch(line);
            assert!(response.ends_with(b"\n"), "{line:?}");
            assert_eq!(response.iter().filter(|&&b| b == b'\n').count(), 1, "{line:?}");
        }
    }

    #[test]
    fn test_dispatch_matches_handle_line() {
        let handler = handler(8, 8);
        for line in [
            &b"SIZE\n"[..],
            b"PX 1 2 ABCDEF\n",
            b"PX 1 2\n",
            b"PX 8 8\n",
            b"HELP px\n",
            b"STATE rgba64\n",
            b"UNKNOWN\n",
        ] {
            let mut written = Vec::new();
            handler.handle_line(line, &mut written).unwrap();
            assert_eq!(handler.dispatch(line).as_ref(), written.as_slice(), "{line:?}");
        }
    }

    #[test]
    fn test_help_is_served() {
        let handler = handler(8, 8);
        let general = handler.dispatch(b"HELP\n");
        assert!(general.starts_with(b"HELP GENERAL"));
        assert!(general.ends_with(b"\n"));
        assert!(handler.dispatch(b"help state\n").starts_with(b"HELP STATE"));
    }

    #[test]
    fn test_state_is_served_from_cache() {
        let canvas = Arc::new(Canvas::new(2, 1).unwrap());
        let states = Arc::new(StateCache::new(&canvas));
        let handler = CommandHandler::new(canvas.clone(), states.clone());

        assert_eq!(handler.dispatch(b"STATE\n").as_ref(), b"STATE rgb64 AAAAAAAA\n");
        handler.dispatch(b"PX 0 0 112233\n");
        handler.dispatch(b"PX 1 0 445566\n");
        assert_eq!(handler.dispatch(b"STATE rgb64\n").as_ref(), b"STATE rgb64 AAAAAAAA\n");

        states.refresh_if_dirty(&canvas);
        assert_eq!(handler.dispatch(b"STATE\n").as_ref(), b"STATE rgb64 ESIzRFVm\n");
        assert_eq!(
            handler.dispatch(b"state RGBA64\n").as_ref(),
            b"STATE rgba64 ESIz/0RVZv8=\n"
        );
    }
}
