//! Reading the final response body.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty};
use reqwest::header::HeaderMap;

use super::decode::Decoder;
use crate::error_handling::FetchError;

/// Raw response body as produced by a transport: data frames, then
/// optionally a trailers frame.
pub type ResponseFrames = UnsyncBoxBody<Bytes, FetchError>;

/// An empty body, used once a body has been abandoned.
pub(crate) fn empty_frames() -> ResponseFrames {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Body reader with optional decompression and idle timeout.
pub(crate) struct ResponseBody {
    frames: ResponseFrames,
    decoder: Option<Decoder>,
    idle_timeout: Option<Duration>,
    finished: bool,
}

impl ResponseBody {
    pub(crate) fn new(
        frames: ResponseFrames,
        decoder: Option<Decoder>,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            frames,
            decoder,
            idle_timeout,
            finished: false,
        }
    }

    pub(crate) fn set_idle_timeout(&mut self, timeout: Option<Duration>) {
        self.idle_timeout = timeout;
    }

    /// Reads the next chunk of (decoded) data.
    ///
    /// Trailers found along the way are merged into `trailers`. Returns
    /// `Ok(None)` at end of body. Once an error has been returned the body
    /// is abandoned and further reads return `Ok(None)`.
    pub(crate) async fn next_chunk(
        &mut self,
        trailers: &mut HeaderMap,
    ) -> Result<Option<Bytes>, FetchError> {
        loop {
            if self.finished {
                return Ok(None);
            }

            let frame = match self.idle_timeout {
                Some(timeout) => match tokio::time::timeout(timeout, self.frames.frame()).await {
                    Ok(frame) => frame,
                    Err(_) => {
                        log::debug!("Response body idle for {:?}, closing connection", timeout);
                        self.abandon();
                        return Err(FetchError::Timeout(timeout));
                    }
                },
                None => self.frames.frame().await,
            };

            let frame = match frame {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    self.abandon();
                    return Err(e);
                }
                None => {
                    self.finished = true;
                    return match self.decoder.as_mut() {
                        Some(decoder) => {
                            let tail = decoder.finish()?;
                            Ok((!tail.is_empty()).then_some(tail))
                        }
                        None => Ok(None),
                    };
                }
            };

            match frame.into_data() {
                Ok(data) => {
                    let data = match self.decoder.as_mut() {
                        Some(decoder) => match decoder.decode(&data) {
                            Ok(decoded) => decoded,
                            Err(e) => {
                                self.abandon();
                                return Err(e);
                            }
                        },
                        None => data,
                    };
                    if !data.is_empty() {
                        return Ok(Some(data));
                    }
                }
                Err(frame) => {
                    if let Ok(frame_trailers) = frame.into_trailers() {
                        trailers.extend(frame_trailers);
                    }
                }
            }
        }
    }

    /// Drops the underlying body, releasing its connection.
    fn abandon(&mut self) {
        self.finished = true;
        self.frames = empty_frames();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use http_body::Frame;
    use http_body_util::StreamBody;
    use reqwest::header::HeaderValue;

    fn frames_from(items: Vec<Result<Frame<Bytes>, FetchError>>) -> ResponseFrames {
        StreamBody::new(stream::iter(items)).boxed_unsync()
    }

    #[tokio::test]
    async fn test_reads_data_then_trailers() {
        let mut trailer_map = HeaderMap::new();
        trailer_map.insert("x-checksum", HeaderValue::from_static("abc"));
        let frames = frames_from(vec![
            Ok(Frame::data(Bytes::from_static(b"hello "))),
            Ok(Frame::data(Bytes::from_static(b"world"))),
            Ok(Frame::trailers(trailer_map)),
        ]);
        let mut body = ResponseBody::new(frames, None, None);
        let mut trailers = HeaderMap::new();

        let mut collected = Vec::new();
        while let Some(chunk) = body.next_chunk(&mut trailers).await.unwrap() {
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, b"hello world");
        assert_eq!(trailers.get("x-checksum").unwrap(), "abc");
        assert!(body.next_chunk(&mut trailers).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_abandons_body() {
        let frames = frames_from(vec![
            Ok(Frame::data(Bytes::from_static(b"partial"))),
            Err(FetchError::connection(std::io::Error::other("reset"))),
            Ok(Frame::data(Bytes::from_static(b"never"))),
        ]);
        let mut body = ResponseBody::new(frames, None, None);
        let mut trailers = HeaderMap::new();
        assert!(body.next_chunk(&mut trailers).await.unwrap().is_some());
        assert!(matches!(
            body.next_chunk(&mut trailers).await,
            Err(FetchError::Connection(_))
        ));
        assert!(body.next_chunk(&mut trailers).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_idle_timeout_fires_between_chunks() {
        let pending = stream::pending::<Result<Frame<Bytes>, FetchError>>();
        let frames = StreamBody::new(pending).boxed_unsync();
        let mut body = ResponseBody::new(frames, None, Some(Duration::from_millis(20)));
        let mut trailers = HeaderMap::new();
        assert!(matches!(
            body.next_chunk(&mut trailers).await,
            Err(FetchError::Timeout(_))
        ));
    }
}
