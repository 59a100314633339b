//! Contract between the grid engine and the content-fetch collaborator
//!
//! The engine asks a [`ContentLoader`] for each newly bound tile. The loader
//! returns at once; the result comes back later through the request's
//! [`CompletionSink`] and is applied by the engine on its own thread via
//! [`GridEngine::apply_completions`](crate::GridEngine::apply_completions).
//!
//! Stale results are stopped twice: the sink drops results whose token was
//! cancelled, and the engine discards completions whose tile has since been
//! rebound or reset.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use tilegrid_scheduler::{CancellationToken, JobPriority};

use crate::coordinate::Coordinate;
use crate::error::LoadError;
use crate::pool::TileId;

/// Decoded tile image, RGBA8
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileContent {
    pub pixels: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
}

impl TileContent {
    pub fn new(pixels: impl Into<Arc<[u8]>>, width: u32, height: u32) -> Self {
        Self {
            pixels: pixels.into(),
            width,
            height,
        }
    }

    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// Smaller of width and height; what a cache compares against a request
    pub fn min_side(&self) -> u32 {
        self.width.min(self.height)
    }
}

/// Cancellable handle to an in-flight load
///
/// Held by the tile that issued the load. Dropping the handle does not cancel;
/// the tile cancels explicitly when it is rebound or reset.
#[derive(Debug, Clone)]
pub struct LoadHandle {
    token: CancellationToken,
}

impl LoadHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn issued(&self, token: &CancellationToken) -> bool {
        self.token.same_as(token)
    }
}

/// Result of one load, as delivered back to the engine
#[derive(Debug)]
pub struct LoadCompletion {
    pub tile: TileId,
    pub coordinate: Coordinate,
    pub result: Result<TileContent, LoadError>,
    pub(crate) token: CancellationToken,
}

impl LoadCompletion {
    /// Token of the load that produced this completion
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// One-shot channel end a loader uses to report a result
#[derive(Debug)]
pub struct CompletionSink {
    tile: TileId,
    coordinate: Coordinate,
    token: CancellationToken,
    sender: Sender<LoadCompletion>,
}

impl CompletionSink {
    pub fn new(
        tile: TileId,
        coordinate: Coordinate,
        token: CancellationToken,
        sender: Sender<LoadCompletion>,
    ) -> Self {
        Self {
            tile,
            coordinate,
            token,
            sender,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Deliver `result` to the engine
    ///
    /// Returns `false` without sending if the load was cancelled or the engine
    /// is gone.
    pub fn complete(self, result: Result<TileContent, LoadError>) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.sender
            .send(LoadCompletion {
                tile: self.tile,
                coordinate: self.coordinate,
                result,
                token: self.token,
            })
            .is_ok()
    }
}

/// A request for the content of one cell
#[derive(Debug)]
pub struct LoadRequest {
    /// Cache key, `coordinate.key()`
    pub key: String,
    pub coordinate: Coordinate,
    /// Edge length in pixels the tile will be drawn at
    pub pixel_size: u32,
    /// `Visible` when the tile overlaps the viewport, `Margin` for the buffer ring
    pub priority: JobPriority,
    pub sink: CompletionSink,
}

impl LoadRequest {
    /// Handle sharing this request's cancellation token
    pub fn handle(&self) -> LoadHandle {
        LoadHandle::new(self.sink.token.clone())
    }
}

/// Content-fetch collaborator
///
/// Implementations must return promptly and deliver the result through
/// `request.sink`. A load cancelled before it finishes must leave any cache
/// untouched. Repeated requests for the same key may be answered from cache.
pub trait ContentLoader {
    fn load(&self, request: LoadRequest) -> LoadHandle;
}

impl<L: ContentLoader + ?Sized> ContentLoader for Arc<L> {
    fn load(&self, request: LoadRequest) -> LoadHandle {
        (**self).load(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn request(
        tile: usize,
        token: &CancellationToken,
    ) -> (LoadRequest, mpsc::Receiver<LoadCompletion>) {
        let (tx, rx) = mpsc::channel();
        let coordinate = Coordinate::new(1, 2);
        let sink = CompletionSink::new(TileId::from_index(tile), coordinate, token.clone(), tx);
        let request = LoadRequest {
            key: coordinate.key(),
            coordinate,
            pixel_size: 100,
            priority: JobPriority::Visible,
            sink,
        };
        (request, rx)
    }

    #[test]
    fn test_sink_delivers_result() {
        let token = CancellationToken::new();
        let (request, rx) = request(0, &token);
        let content = TileContent::new(vec![0u8; 16], 2, 2);

        assert!(request.sink.complete(Ok(content.clone())));
        let completion = rx.try_recv().unwrap();
        assert_eq!(completion.coordinate, Coordinate::new(1, 2));
        assert_eq!(completion.result, Ok(content));
    }

    #[test]
    fn test_cancelled_sink_drops_result() {
        let token = CancellationToken::new();
        let (request, rx) = request(0, &token);
        let handle = request.handle();

        handle.cancel();
        assert!(request.sink.is_cancelled());
        assert!(!request.sink.complete(Err(LoadError::Cancelled)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_handle_shares_request_token() {
        let token = CancellationToken::new();
        let (request, _rx) = request(3, &token);
        let handle = request.handle();
        assert!(handle.issued(&token));
        assert!(!handle.issued(&CancellationToken::new()));
    }

    #[test]
    fn test_content_sizes() {
        let content = TileContent::new(vec![0u8; 4 * 8 * 4], 8, 4);
        assert_eq!(content.byte_size(), 128);
        assert_eq!(content.min_side(), 4);
    }
}
