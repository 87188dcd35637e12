//! Routing worker envelopes to host handlers.

use std::sync::Arc;
use std::task::{Context, Poll};

use workerbridge_blob_store::BlobStore;
use workerbridge_envelope::{CanvasCommand, Envelope, HostEvent, ProtocolError, WorkerCommand};

use crate::blob_proxy::BlobStoreProxy;
use crate::config::HostConfig;
use crate::context::HostContext;
use crate::error::Result;
use crate::frame::FrameRenderer;
use crate::image_loader::{FileImageDecoder, ImageDecoder, ImageLoader};
use crate::sink::{CustomHandler, LogSink, Stream, WindowHost};
use crate::surface::{GraphicsFactory, Surface};
use crate::transport::Outbound;

/// Routes each inbound envelope to exactly one handler.
///
/// Decoding happens before any handler runs, so an envelope with an unknown
/// category or operation is rejected without touching host state.
pub struct Dispatcher<S> {
    ctx: HostContext<S>,
}

impl<S: Surface> Dispatcher<S> {
    pub fn new(config: &HostConfig, surface: S, outbound: Outbound) -> Result<Self> {
        config.validate()?;
        let renderer = FrameRenderer::new(surface, config.settable_pairs()?);
        let decoder = match &config.image_root {
            Some(root) => FileImageDecoder::new(root),
            None => FileImageDecoder::default(),
        };
        let ctx = HostContext::new(
            outbound,
            renderer,
            config.open_blob_store()?,
            Arc::new(decoder),
        );
        Ok(Self { ctx })
    }

    /// Replace the blob store. Requests already pending keep the old one.
    pub fn set_blob_store(&mut self, store: Arc<dyn BlobStore>) {
        let old = std::mem::replace(&mut self.ctx.blobs, BlobStoreProxy::new(store));
        if !old.is_idle() {
            tracing::warn!(
                pending = old.pending_len(),
                "blob store replaced with requests in flight, dropping them"
            );
        }
    }

    pub fn set_image_decoder(&mut self, decoder: Arc<dyn ImageDecoder>) {
        self.ctx.images = ImageLoader::new(decoder);
    }

    pub fn set_custom_handler(&mut self, handler: impl CustomHandler + 'static) {
        self.ctx.custom = Some(Box::new(handler));
    }

    pub fn set_graphics_factory(&mut self, factory: GraphicsFactory) {
        self.ctx.renderer.set_graphics_factory(factory);
    }

    pub fn set_log_sink(&mut self, sink: impl LogSink + 'static) {
        self.ctx.sink = Box::new(sink);
    }

    pub fn set_window(&mut self, window: impl WindowHost + 'static) {
        self.ctx.window = Box::new(window);
    }

    pub fn context(&self) -> &HostContext<S> {
        &self.ctx
    }

    pub fn outbound(&self) -> &Outbound {
        &self.ctx.outbound
    }

    pub fn renderer(&self) -> &FrameRenderer<S> {
        &self.ctx.renderer
    }

    pub fn surface(&self) -> &S {
        self.ctx.renderer.surface()
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.ctx.renderer.surface_mut()
    }

    /// Handle one envelope from the worker.
    ///
    /// Protocol violations are returned as errors and are fatal to the
    /// session.
    pub fn handle(&mut self, envelope: Envelope) -> Result<()> {
        tracing::debug!(
            category = %envelope.category,
            operation = ?envelope.operation,
            id = ?envelope.id,
            "worker -> host"
        );

        let command = WorkerCommand::try_from(envelope)?;

        if !self.ctx.worker_responded {
            self.ctx.worker_responded = true;
            tracing::info!("worker responded");
        }

        match command {
            WorkerCommand::Stdout(text) => self.ctx.sink.write(Stream::Stdout, &text),
            WorkerCommand::Stderr(text) => self.ctx.sink.write(Stream::Stderr, &text),
            WorkerCommand::Window { method } => self.ctx.window.call(&method),
            WorkerCommand::Canvas(command) => self.handle_canvas(command)?,
            WorkerCommand::Graphics(payload) => self.ctx.renderer.graphics(payload)?,
            WorkerCommand::Tick { id } => self.ctx.ticks.on_tick(id, &self.ctx.outbound)?,
            WorkerCommand::Image { id, src } => self.ctx.images.request(id, src),
            WorkerCommand::Blob(request) => self.ctx.blobs.submit(request),
            WorkerCommand::Custom(data) => match self.ctx.custom.as_mut() {
                Some(handler) => handler.on_custom_message(data),
                None => return Err(ProtocolError::MissingCustomHandler.into()),
            },
            WorkerCommand::Deferred => self.ctx.outbound.post(HostEvent::Deferred)?,
        }
        Ok(())
    }

    fn handle_canvas(&mut self, command: CanvasCommand) -> Result<()> {
        let renderer = &mut self.ctx.renderer;
        match command {
            CanvasCommand::AcquireContext { kind, attributes } => {
                renderer.acquire_context(kind, attributes)?
            }
            CanvasCommand::Resize { width, height } => {
                renderer.resize(width, height, &self.ctx.outbound)?
            }
            CanvasCommand::Render { pixels } => {
                renderer.on_render(pixels);
            }
            CanvasCommand::SetProperty {
                object,
                property,
                value,
            } => renderer.set_property(object, property, value)?,
        }
        Ok(())
    }

    pub fn render_scheduled(&self) -> bool {
        self.ctx.renderer.render_scheduled()
    }

    /// Run the scheduled rendering pass, if any.
    pub fn execute_rendering_pass(&mut self) -> bool {
        self.ctx.renderer.execute_rendering_pass()
    }

    /// Whether blob or image work is still outstanding.
    pub fn has_pending(&self) -> bool {
        !self.ctx.blobs.is_idle() || !self.ctx.images.is_idle()
    }

    /// Drive outstanding blob and image work.
    ///
    /// `Ready(None)` means nothing is outstanding. Blob responses come out in
    /// request order; image responses in completion order.
    pub fn poll_completions(&mut self, cx: &mut Context<'_>) -> Poll<Option<HostEvent>> {
        let blobs_idle = match self.ctx.blobs.poll_front(cx) {
            Poll::Ready(Some(event)) => return Poll::Ready(Some(event)),
            Poll::Ready(None) => true,
            Poll::Pending => false,
        };

        match self.ctx.images.poll_next_loaded(cx) {
            Poll::Ready(Some(event)) => Poll::Ready(Some(event)),
            Poll::Ready(None) if blobs_idle => Poll::Ready(None),
            _ => Poll::Pending,
        }
    }

    /// Wait for the next finished blob or image operation.
    ///
    /// Cancel safe: outstanding work stays queued if this future is dropped.
    pub async fn next_completion(&mut self) -> Option<HostEvent> {
        futures::future::poll_fn(|cx| self.poll_completions(cx)).await
    }

    /// Wait for one operation and send its response to the worker.
    ///
    /// Returns `false` when nothing was outstanding.
    pub async fn complete_next(&mut self) -> Result<bool> {
        match self.next_completion().await {
            Some(event) => {
                self.ctx.outbound.post(event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Finish every outstanding operation, sending each response.
    pub async fn drain_completions(&mut self) -> Result<()> {
        while self.complete_next().await? {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CapturingSink;
    use crate::surface::MemorySurface;
    use crate::transport::ChannelTransport;
    use workerbridge_envelope::{canvas_op, Category, Value};

    fn dispatcher() -> (Dispatcher<MemorySurface>, ChannelTransport) {
        let (host, worker) = ChannelTransport::bidirectional(64);
        let dispatcher = Dispatcher::new(
            &HostConfig::default(),
            MemorySurface::new(1, 1),
            Outbound::new(host.sender()),
        )
        .unwrap();
        (dispatcher, worker)
    }

    #[test]
    fn unknown_category_is_rejected_before_any_effect() {
        let (mut dispatcher, mut worker) = dispatcher();

        let envelope = Envelope {
            category: "telemetry".to_string(),
            operation: None,
            id: None,
            payload: Value::Null,
            pre_main: false,
        };
        let err = dispatcher.handle(envelope).unwrap_err();

        assert!(err.is_protocol());
        assert!(!dispatcher.context().worker_responded());
        assert!(worker.try_recv().is_none());
    }

    #[test]
    fn unknown_canvas_operation_is_fatal() {
        let (mut dispatcher, _worker) = dispatcher();
        let envelope = Envelope::new(Category::Canvas).with_operation("rotate");
        assert!(dispatcher.handle(envelope).unwrap_err().is_protocol());
    }

    #[test]
    fn stdout_and_stderr_reach_the_sink() {
        let (mut dispatcher, _worker) = dispatcher();
        let sink = CapturingSink::new();
        dispatcher.set_log_sink(sink.clone());

        dispatcher
            .handle(Envelope::new(Category::Stdout).with_payload("ready"))
            .unwrap();
        dispatcher
            .handle(Envelope::new(Category::Stderr).with_payload("careful"))
            .unwrap();

        assert_eq!(
            sink.lines(),
            vec![
                (Stream::Stdout, "ready".to_string()),
                (Stream::Stderr, "careful".to_string())
            ]
        );
        assert!(dispatcher.context().worker_responded());
    }

    #[test]
    fn custom_without_handler_is_fatal() {
        let (mut dispatcher, _worker) = dispatcher();
        let err = dispatcher
            .handle(Envelope::new(Category::Custom).with_payload(1))
            .unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn custom_reaches_handler() {
        let (mut dispatcher, _worker) = dispatcher();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = seen.clone();
        dispatcher.set_custom_handler(move |data: Value| log.lock().unwrap().push(data));

        dispatcher
            .handle(Envelope::new(Category::Custom).with_payload("hello"))
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Value::from("hello")]);
    }

    #[test]
    fn deferred_is_echoed() {
        let (mut dispatcher, mut worker) = dispatcher();
        dispatcher.handle(Envelope::new(Category::Deferred)).unwrap();

        let echo = worker.try_recv().unwrap();
        assert_eq!(echo.category, "deferred");
        assert!(echo.payload.is_null());
    }

    #[test]
    fn render_is_deferred_to_the_pass() {
        let (mut dispatcher, _worker) = dispatcher();
        dispatcher
            .handle(
                Envelope::new(Category::Canvas)
                    .with_operation(canvas_op::ACQUIRE_CONTEXT)
                    .with_payload(Value::map().with("kind", "2d")),
            )
            .unwrap();
        dispatcher
            .handle(
                Envelope::new(Category::Canvas)
                    .with_operation(canvas_op::RENDER)
                    .with_payload(Value::map().with("pixels", vec![7u8; 4])),
            )
            .unwrap();

        assert!(dispatcher.render_scheduled());
        assert!(dispatcher.surface().presented_frames().is_empty());

        assert!(dispatcher.execute_rendering_pass());
        assert_eq!(dispatcher.surface().last_frame(), Some(&[7u8; 4][..]));
    }

    #[test]
    fn operation_on_tick_is_rejected_without_tock() {
        let (mut dispatcher, mut worker) = dispatcher();

        let tick = Envelope::new(Category::Tick).with_id(1).with_operation("bogus");
        assert!(dispatcher.handle(tick).unwrap_err().is_protocol());

        let deferred = Envelope::new(Category::Deferred).with_operation("explode");
        assert!(dispatcher.handle(deferred).unwrap_err().is_protocol());

        assert!(worker.try_recv().is_none());
        assert!(!dispatcher.context().worker_responded());
        assert_eq!(dispatcher.context().ticks().current_tick_id(), None);
    }

    #[test]
    fn oversize_resize_is_fatal_and_leaves_surface() {
        let (mut dispatcher, mut worker) = dispatcher();
        dispatcher
            .handle(
                Envelope::new(Category::Canvas)
                    .with_operation(canvas_op::ACQUIRE_CONTEXT)
                    .with_payload(Value::map().with("kind", "2d")),
            )
            .unwrap();

        let resize = Envelope::new(Category::Canvas)
            .with_operation(canvas_op::RESIZE)
            .with_payload(
                Value::map()
                    .with("width", u32::MAX)
                    .with("height", u32::MAX),
            );
        let err = dispatcher.handle(resize).unwrap_err();

        assert!(matches!(
            err,
            crate::error::ProxyError::Protocol(ProtocolError::InvalidField { field: "width", .. })
        ));
        assert_eq!(dispatcher.surface().size(), (1, 1));
        assert!(worker.try_recv().is_none());
    }

    #[tokio::test]
    async fn replaced_blob_store_serves_later_requests() {
        let (mut dispatcher, mut worker) = dispatcher();
        let store = workerbridge_blob_store::InMemoryBlobStore::new();
        store.store("saves", "slot1", vec![4, 2]).await.unwrap();
        dispatcher.set_blob_store(Arc::new(store));

        let load = WorkerCommand::Blob(workerbridge_envelope::BlobRequest::Load {
            store: "saves".into(),
            blob: "slot1".into(),
        });
        dispatcher.handle(load.into()).unwrap();
        dispatcher.drain_completions().await.unwrap();

        let response = HostEvent::try_from(worker.try_recv().unwrap()).unwrap();
        assert_eq!(
            response,
            HostEvent::BlobLoaded {
                blob: Some(vec![4, 2])
            }
        );
    }

    struct SolidDecoder;

    #[async_trait::async_trait]
    impl ImageDecoder for SolidDecoder {
        async fn decode(
            &self,
            src: &str,
        ) -> std::result::Result<crate::image_loader::DecodedImage, crate::image_loader::ImageError>
        {
            match src {
                "solid" => Ok(crate::image_loader::DecodedImage {
                    width: 1,
                    height: 1,
                    rgba: vec![255, 0, 0, 255],
                }),
                other => Err(crate::image_loader::ImageError::UnsupportedSource(
                    other.to_string(),
                )),
            }
        }
    }

    #[tokio::test]
    async fn custom_image_decoder_is_used() {
        let (mut dispatcher, mut worker) = dispatcher();
        dispatcher.set_image_decoder(Arc::new(SolidDecoder));

        let image = WorkerCommand::Image {
            id: 5,
            src: "solid".into(),
        };
        dispatcher.handle(image.into()).unwrap();
        dispatcher.drain_completions().await.unwrap();

        let response = HostEvent::try_from(worker.try_recv().unwrap()).unwrap();
        assert_eq!(
            response,
            HostEvent::ImageLoaded {
                id: 5,
                width: 1,
                height: 1,
                data: vec![255, 0, 0, 255],
            }
        );
    }

    #[tokio::test]
    async fn blob_responses_follow_request_order() {
        let (mut dispatcher, mut worker) = dispatcher();

        let store = WorkerCommand::Blob(workerbridge_envelope::BlobRequest::Store {
            store: "s".into(),
            blob: "b".into(),
            bytes: vec![1, 2],
        });
        let load = WorkerCommand::Blob(workerbridge_envelope::BlobRequest::Load {
            store: "s".into(),
            blob: "b".into(),
        });
        dispatcher.handle(store.into()).unwrap();
        dispatcher.handle(load.into()).unwrap();
        assert!(dispatcher.has_pending());

        dispatcher.drain_completions().await.unwrap();
        assert!(!dispatcher.has_pending());

        let responses: Vec<HostEvent> = worker
            .drain()
            .into_iter()
            .map(|e| HostEvent::try_from(e).unwrap())
            .collect();
        assert_eq!(
            responses,
            vec![
                HostEvent::BlobStored { error: false },
                HostEvent::BlobLoaded {
                    blob: Some(vec![1, 2])
                },
            ]
        );
    }
}
