use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use workerbridge_blob_store::{BlobStore, LocalDiskBlobStore};
use workerbridge_envelope::{
    canvas_op, BlobRequest, CanvasCommand, Category, ContextKind, Envelope, EventSource,
    HostEvent, Value, WorkerCommand,
};
use workerbridge_host::{
    ChannelSender, ChannelTransport, HostConfig, HostProxy, MemorySurface, ProxyError,
    RecordingWindow, Surface, Transport, MAX_SURFACE_SIDE,
};

struct Session {
    host: HostProxy<MemorySurface>,
    worker_tx: Option<ChannelSender>,
    worker_rx: mpsc::Receiver<Envelope>,
}

impl Session {
    fn new(config: HostConfig) -> Self {
        let surface = MemorySurface::new(config.width, config.height);
        let (host_end, worker_end) = ChannelTransport::bidirectional(config.channel_capacity);
        let (worker_tx, worker_rx) = worker_end.into_parts();
        let host = HostProxy::new(config, surface, host_end).unwrap();
        Self {
            host,
            worker_tx: Some(worker_tx),
            worker_rx,
        }
    }

    fn send(&self, envelope: impl Into<Envelope>) {
        self.worker_tx
            .as_ref()
            .expect("worker already hung up")
            .send(envelope.into())
            .unwrap();
    }

    /// Hang up the worker side and run the host to completion.
    async fn finish(&mut self) -> Result<(), ProxyError> {
        self.worker_tx.take();
        self.host.run().await
    }

    fn received(&mut self) -> Vec<Envelope> {
        std::iter::from_fn(|| self.worker_rx.try_recv().ok()).collect()
    }

    /// Everything the worker received after `worker-init`, decoded.
    fn events(&mut self) -> Vec<HostEvent> {
        let mut received = self.received();
        assert_eq!(received.remove(0).category, "worker-init");
        received
            .into_iter()
            .map(|e| HostEvent::try_from(e).unwrap())
            .collect()
    }
}

fn canvas(command: CanvasCommand) -> WorkerCommand {
    WorkerCommand::Canvas(command)
}

fn acquire_2d() -> WorkerCommand {
    canvas(CanvasCommand::AcquireContext {
        kind: ContextKind::Bitmap,
        attributes: Value::Null,
    })
}

fn small_config() -> HostConfig {
    HostConfig {
        width: 1,
        height: 1,
        ..HostConfig::default()
    }
}

#[tokio::test]
async fn test_worker_init_is_first() {
    let mut session = Session::new(HostConfig {
        document_url: "https://game.example/".to_string(),
        ..HostConfig::default()
    });
    session.send(WorkerCommand::Deferred);
    session.finish().await.unwrap();

    let received = session.received();
    assert_eq!(received[0].category, "worker-init");
    assert_eq!(
        received[0].payload.get("URL"),
        Some(&Value::from("https://game.example/"))
    );
    assert_eq!(received[1].category, "deferred");
    assert_eq!(received.len(), 2);
}

#[tokio::test]
async fn test_renders_coalesce_to_last_frame() {
    let mut session = Session::new(small_config());
    session.send(acquire_2d());
    for shade in 1..=5u8 {
        session.send(canvas(CanvasCommand::Render {
            pixels: vec![shade; 4],
        }));
    }
    session.finish().await.unwrap();

    let renderer = session.host.dispatcher().renderer();
    assert_eq!(renderer.passes(), 1);
    assert_eq!(renderer.coalesced(), 4);
    assert_eq!(session.host.surface().presented_frames(), &[vec![5u8; 4]]);
}

#[tokio::test]
async fn test_every_tick_gets_one_tock() {
    let mut session = Session::new(HostConfig::default());
    for id in [10, 11, 12, 12, 40] {
        session.send(WorkerCommand::Tick { id });
    }
    session.finish().await.unwrap();

    let ids: Vec<u64> = session
        .events()
        .into_iter()
        .map(|event| match event {
            HostEvent::Tock { id } => id,
            other => panic!("expected tock, got {:?}", other),
        })
        .collect();
    assert_eq!(ids, vec![10, 11, 12, 12, 40]);
    assert_eq!(
        session.host.dispatcher().context().ticks().current_tick_id(),
        Some(40)
    );
}

#[tokio::test]
async fn test_blob_round_trip_and_missing_blob() {
    let mut session = Session::new(HostConfig::default());
    session.send(WorkerCommand::Blob(BlobRequest::Store {
        store: "saves".into(),
        blob: "slot1".into(),
        bytes: b"level 3".to_vec(),
    }));
    session.send(WorkerCommand::Blob(BlobRequest::Load {
        store: "saves".into(),
        blob: "slot1".into(),
    }));
    session.send(WorkerCommand::Blob(BlobRequest::Load {
        store: "saves".into(),
        blob: "slot2".into(),
    }));
    session.finish().await.unwrap();

    assert_eq!(
        session.events(),
        vec![
            HostEvent::BlobStored { error: false },
            HostEvent::BlobLoaded {
                blob: Some(b"level 3".to_vec())
            },
            HostEvent::BlobLoaded { blob: None },
        ]
    );
}

#[tokio::test]
async fn test_missing_blob_response_has_null_payload() {
    let mut session = Session::new(HostConfig::default());
    session.send(WorkerCommand::Blob(BlobRequest::Load {
        store: "saves".into(),
        blob: "nothing".into(),
    }));
    session.finish().await.unwrap();

    let received = session.received();
    let response = &received[1];
    assert_eq!(response.category, "blobstore");
    assert_eq!(response.operation(), Some("response"));
    assert_eq!(response.payload.get("blob"), Some(&Value::Null));
}

#[tokio::test]
async fn test_blobs_persist_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(HostConfig {
        blob_root: Some(dir.path().to_path_buf()),
        ..HostConfig::default()
    });
    session.send(WorkerCommand::Blob(BlobRequest::Store {
        store: "saves".into(),
        blob: "slot1".into(),
        bytes: vec![1, 2, 3],
    }));
    session.finish().await.unwrap();

    let store = LocalDiskBlobStore::new(dir.path()).unwrap();
    assert_eq!(store.load("saves", "slot1").await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_forwarded_events_are_sanitized() {
    let mut session = Session::new(HostConfig::default());

    let event = Value::map()
        .with("type", "keydown")
        .with("keyCode", 65)
        .with("KEY_EVENT_CONSTANT", 3)
        .with("repeat", false)
        .with("view", Value::map().with("name", "top"))
        .with("path", Value::Array(vec![Value::from("body")]));
    session.host.start().unwrap();
    let disposition = session
        .host
        .forward_event(EventSource::Document, &event)
        .unwrap();
    assert!(!disposition.prevent_default);

    session.finish().await.unwrap();

    assert_eq!(
        session.events(),
        vec![HostEvent::Input {
            source: EventSource::Document,
            event: Value::map().with("type", "keydown").with("keyCode", 65),
        }]
    );
}

#[tokio::test]
async fn test_unknown_category_is_fatal_without_side_effects() {
    let mut session = Session::new(HostConfig::default());
    session.send(WorkerCommand::Tick { id: 1 });
    session.send(Envelope {
        category: "telemetry".to_string(),
        operation: None,
        id: Some(2),
        payload: Value::Null,
        pre_main: false,
    });
    session.send(WorkerCommand::Tick { id: 3 });

    let err = session.finish().await.unwrap_err();
    assert!(err.is_protocol());

    assert_eq!(session.events(), vec![HostEvent::Tock { id: 1 }]);
    assert_eq!(
        session.host.dispatcher().context().ticks().current_tick_id(),
        Some(1)
    );
}

#[tokio::test]
async fn test_resize_geometry_precedes_later_renders() {
    let mut session = Session::new(small_config());
    session.send(acquire_2d());
    session.send(canvas(CanvasCommand::Resize {
        width: 2,
        height: 1,
    }));
    session.send(canvas(CanvasCommand::Render {
        pixels: vec![9; 8],
    }));
    session.finish().await.unwrap();

    let events = session.events();
    match &events[0] {
        HostEvent::Geometry(rect) => {
            assert_eq!(rect.width, 2.0);
            assert_eq!(rect.height, 1.0);
        }
        other => panic!("expected geometry, got {:?}", other),
    }

    assert_eq!(session.host.surface().size(), (2, 1));
    assert_eq!(session.host.surface().last_frame(), Some(&[9u8; 8][..]));
}

#[tokio::test]
async fn test_custom_without_handler_is_fatal() {
    let mut session = Session::new(HostConfig::default());
    session.send(WorkerCommand::Custom(Value::from("ping")));

    let err = session.finish().await.unwrap_err();
    assert!(matches!(
        err,
        ProxyError::Protocol(workerbridge_envelope::ProtocolError::MissingCustomHandler)
    ));
}

#[tokio::test]
async fn test_custom_messages_both_ways() {
    let mut session = Session::new(HostConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    session
        .host
        .dispatcher_mut()
        .set_custom_handler(move |data: Value| log.lock().unwrap().push(data));

    session.host.start().unwrap();
    session.host.post_custom(Value::from("early"), true).unwrap();
    session.send(WorkerCommand::Custom(Value::map().with("score", 12)));
    session.finish().await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Value::map().with("score", 12)]
    );
    assert_eq!(
        session.events(),
        vec![HostEvent::Custom {
            data: Value::from("early"),
            pre_main: true,
        }]
    );
}

#[tokio::test]
async fn test_disallowed_set_property_is_fatal() {
    let mut session = Session::new(HostConfig::default());
    session.send(canvas(CanvasCommand::SetProperty {
        object: "style".into(),
        property: "cursor".into(),
        value: Value::from("crosshair"),
    }));
    session.send(
        Envelope::new(Category::Canvas)
            .with_operation(canvas_op::SET_PROPERTY)
            .with_payload(
                Value::map()
                    .with("object", "style")
                    .with("property", "position")
                    .with("value", "fixed"),
            ),
    );

    let err = session.finish().await.unwrap_err();
    assert!(err.is_protocol());

    let surface = session.host.surface();
    assert_eq!(
        surface.property("style", "cursor"),
        Some(&Value::from("crosshair"))
    );
    assert_eq!(surface.property("style", "position"), None);
}

#[tokio::test]
async fn test_image_load_and_failure() {
    let dir = tempfile::tempdir().unwrap();
    image::RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4]))
        .save(dir.path().join("tile.png"))
        .unwrap();

    let mut session = Session::new(HostConfig {
        image_root: Some(dir.path().to_path_buf()),
        ..HostConfig::default()
    });
    session.send(WorkerCommand::Image {
        id: 1,
        src: "tile.png".into(),
    });
    session.send(WorkerCommand::Image {
        id: 2,
        src: "missing.png".into(),
    });
    session.finish().await.unwrap();

    let mut events = session.events();
    events.sort_by_key(|event| match event {
        HostEvent::ImageLoaded { id, .. } | HostEvent::ImageFailed { id } => *id,
        _ => u64::MAX,
    });

    assert_eq!(
        events,
        vec![
            HostEvent::ImageLoaded {
                id: 1,
                width: 3,
                height: 2,
                data: [1, 2, 3, 4].repeat(6),
            },
            HostEvent::ImageFailed { id: 2 },
        ]
    );
}

#[tokio::test]
async fn test_graphics_before_context_is_fatal() {
    let mut session = Session::new(HostConfig::default());
    session.send(WorkerCommand::Graphics(Value::from("clear")));

    let err = session.finish().await.unwrap_err();
    assert!(err.is_protocol());
}

#[tokio::test]
async fn test_graphics_commands_reach_replay() {
    let recorder = workerbridge_host::RecordingGraphics::new();
    let mut session = Session::new(HostConfig::default());
    session
        .host
        .dispatcher_mut()
        .set_graphics_factory(recorder.factory());

    session.send(canvas(CanvasCommand::AcquireContext {
        kind: ContextKind::parse("webgl"),
        attributes: Value::map().with("alpha", false),
    }));
    session.send(WorkerCommand::Graphics(Value::from("clear")));
    session.send(WorkerCommand::Graphics(Value::from("draw")));
    session.finish().await.unwrap();

    assert_eq!(
        recorder.messages(),
        vec![Value::from("clear"), Value::from("draw")]
    );
    assert_eq!(
        session.host.surface().context_kind(),
        Some(&ContextKind::parse("webgl"))
    );
}

#[tokio::test]
async fn test_window_methods_reach_the_host_window() {
    let window = RecordingWindow::new();
    let mut session = Session::new(HostConfig::default());
    session.host.dispatcher_mut().set_window(window.clone());

    session.send(WorkerCommand::Window {
        method: "focus".into(),
    });
    session.send(Envelope::new(Category::Window).with_operation("scrollTo"));
    session.finish().await.unwrap();

    assert_eq!(window.calls(), vec!["focus".to_string(), "scrollTo".to_string()]);
}

#[tokio::test]
async fn test_window_without_method_is_fatal() {
    let window = RecordingWindow::new();
    let mut session = Session::new(HostConfig::default());
    session.host.dispatcher_mut().set_window(window.clone());

    session.send(Envelope::new(Category::Window));

    let err = session.finish().await.unwrap_err();
    assert!(matches!(
        err,
        ProxyError::Protocol(workerbridge_envelope::ProtocolError::UnknownOperation {
            category: "window",
            operation: None,
        })
    ));
    assert!(window.calls().is_empty());
}

#[tokio::test]
async fn test_oversize_resize_is_fatal_and_keeps_surface() {
    let mut session = Session::new(small_config());
    session.send(acquire_2d());
    session.send(canvas(CanvasCommand::Resize {
        width: MAX_SURFACE_SIDE + 1,
        height: 1,
    }));

    let err = session.finish().await.unwrap_err();
    assert!(matches!(
        err,
        ProxyError::Protocol(workerbridge_envelope::ProtocolError::InvalidField {
            field: "width",
            ..
        })
    ));
    assert_eq!(session.host.surface().size(), (1, 1));
    assert!(session.events().is_empty());
}

#[tokio::test]
async fn test_operation_on_tick_is_fatal_without_tock() {
    let mut session = Session::new(HostConfig::default());
    session.send(Envelope::new(Category::Tick).with_id(1).with_operation("bogus"));

    let err = session.finish().await.unwrap_err();
    assert!(err.is_protocol());
    assert!(session.events().is_empty());
}
