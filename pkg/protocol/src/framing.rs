//! Length-prefixed JSON framing over an async byte stream.
//!
//! Each frame is a 4-byte big-endian length followed by that many bytes
//! of JSON. One frame per request, one frame per reply.

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame accepted, to keep a misbehaving peer from exhausting memory.
const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN}-byte limit")]
    TooLarge(u32),
}

pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(value)?;
    let len = u32::try_from(body.len()).map_err(|_| FramingError::TooLarge(u32::MAX))?;
    if len > MAX_FRAME_LEN {
        return Err(FramingError::TooLarge(len));
    }
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, FramingError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(FramingError::TooLarge(len));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(serde_json::from_slice(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, Response, ResponseBody};

    #[tokio::test]
    async fn round_trips_a_request_over_a_duplex_stream() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let req = Request::StartGuest {
            name: "guest0".into(),
            env: vec!["FOO=bar".into()],
        };
        write_frame(&mut a, &req).await.unwrap();
        let got: Request = read_frame(&mut b).await.unwrap();
        match got {
            Request::StartGuest { name, env } => {
                assert_eq!(name, "guest0");
                assert_eq!(env, vec!["FOO=bar".to_string()]);
            }
            _ => panic!("unexpected variant"),
        }
    }

    #[tokio::test]
    async fn round_trips_a_response_with_a_guest_list() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let resp = Response::Success(ResponseBody::Guests(vec![crate::GuestSummary {
            name: "guest0".into(),
            state: "running".into(),
        }]));
        write_frame(&mut a, &resp).await.unwrap();
        let got: Response = read_frame(&mut b).await.unwrap();
        assert!(got.is_success());
    }

    #[tokio::test]
    async fn rejects_a_frame_larger_than_the_limit() {
        let (mut a, mut b) = tokio::io::duplex(16);
        a.write_all(&(MAX_FRAME_LEN + 1).to_be_bytes()).await.unwrap();
        let err = read_frame::<_, Request>(&mut b).await.unwrap_err();
        assert!(matches!(err, FramingError::TooLarge(_)));
    }
}
