//! `Content-Length` framing

use super::LspMessage;
use crate::error::BridgeError;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

const CONTENT_LENGTH: &str = "content-length";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Upper bound for one message body
const MAX_BODY_LEN: usize = 64 * 1024 * 1024;

/// Frames [`LspMessage`]s as `Content-Length: N\r\n\r\n<json>`
#[derive(Debug, Default, Clone)]
pub struct LspCodec {
    /// Body length of the frame currently being read
    pending_len: Option<usize>,
}

impl LspCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_headers(headers: &[u8]) -> Result<usize, BridgeError> {
        let text = std::str::from_utf8(headers)
            .map_err(|_| BridgeError::protocol("Message header is not valid UTF-8"))?;

        let mut length = None;
        for line in text.split("\r\n").filter(|l| !l.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| BridgeError::protocol(format!("Malformed header line: {}", line)))?;
            if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                let parsed = value.trim().parse::<usize>().map_err(|_| {
                    BridgeError::protocol(format!("Invalid Content-Length: {}", value.trim()))
                })?;
                length = Some(parsed);
            }
        }

        let length = length.ok_or_else(|| BridgeError::protocol("Missing Content-Length header"))?;
        if length > MAX_BODY_LEN {
            return Err(BridgeError::protocol(format!(
                "Message of {} bytes exceeds limit",
                length
            )));
        }
        Ok(length)
    }
}

impl Decoder for LspCodec {
    type Item = LspMessage;
    type Error = BridgeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let len = match self.pending_len {
            Some(len) => len,
            None => {
                let Some(end) = src.windows(HEADER_END.len()).position(|w| w == HEADER_END) else {
                    return Ok(None);
                };
                let len = Self::parse_headers(&src[..end])?;
                src.advance(end + HEADER_END.len());
                self.pending_len = Some(len);
                len
            }
        };

        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let body = src.split_to(len);
        self.pending_len = None;
        let message = serde_json::from_slice(&body)?;
        Ok(Some(message))
    }
}

impl Encoder<LspMessage> for LspCodec {
    type Error = BridgeError;

    fn encode(&mut self, item: LspMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(&item)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        dst.reserve(header.len() + body.len());
        dst.put_slice(header.as_bytes());
        dst.put_slice(&body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{LspNotification, methods};

    fn frame(body: &str) -> BytesMut {
        BytesMut::from(format!("Content-Length: {}\r\n\r\n{}", body.len(), body).as_str())
    }

    #[test]
    fn test_decode_single_frame() {
        let mut codec = LspCodec::new();
        let mut buf = frame(r#"{"jsonrpc":"2.0","method":"exit"}"#);

        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.method(), Some("exit"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_partial_body() {
        let mut codec = LspCodec::new();
        let full = frame(r#"{"jsonrpc":"2.0","id":1,"result":null}"#);
        let mut buf = BytesMut::from(&full[..full.len() - 5]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&full[full.len() - 5..]);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert!(msg.is_response());
    }

    #[test]
    fn test_decode_extra_headers_and_back_to_back_frames() {
        let mut codec = LspCodec::new();
        let body = r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#;
        let mut buf = BytesMut::from(
            format!(
                "content-length: {}\r\nContent-Type: application/vscode-jsonrpc; charset=utf-8\r\n\r\n{}",
                body.len(),
                body
            )
            .as_str(),
        );
        buf.extend_from_slice(&frame(r#"{"jsonrpc":"2.0","method":"exit"}"#));

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().method(), Some("initialized"));
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().method(), Some("exit"));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_missing_content_length_is_error() {
        let mut codec = LspCodec::new();
        let mut buf = BytesMut::from("Content-Type: x\r\n\r\n{}");
        let err = codec.decode(&mut buf).unwrap_err();
        assert_eq!(err.error_code(), "BRIDGE_PROTOCOL");
    }

    #[test]
    fn test_encode_writes_header() {
        let mut codec = LspCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(LspMessage::Notification(LspNotification::new(methods::EXIT)), &mut buf)
            .unwrap();

        let text = String::from_utf8(buf.to_vec()).unwrap();
        let (header, body) = text.split_once("\r\n\r\n").unwrap();
        assert_eq!(header, format!("Content-Length: {}", body.len()));
        assert!(body.contains("\"method\":\"exit\""));
    }
}
