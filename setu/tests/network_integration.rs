//! TCP endpoint tests.
//!
//! Sensor frames go in through the sensor server, transforms come out of
//! the stream publisher, and queries round-trip through the service port.

use std::io::Write;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use setu::SetuConfig;
use setu::core::types::{ImageFrame, Point3D};
use setu::daemon::Daemon;
use setu::engine::{MockEngine, MockEngineConfig};
use setu::io::streaming::{
    Message, Payload, SensorServer, Serializer, ServiceReply, ServiceServer, StreamPublisher,
    WireFormat,
};
use setu::state::{QueryRequest, QueryResponse};

fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

fn image(topic: &str, timestamp_us: u64) -> Message {
    Message::new(
        topic,
        timestamp_us,
        Payload::Image(ImageFrame::new(timestamp_us, 4, 2, "mono8", vec![7; 8])),
    )
}

#[test]
fn test_sensor_frames_drive_tracking_and_transform_stream() {
    let engine = Arc::new(MockEngine::with_landmarks(
        MockEngineConfig {
            init_frames: 0,
            ..Default::default()
        },
        vec![Point3D::new(1.0, 0.0, 0.0)],
    ));
    let running = Arc::new(AtomicBool::new(true));
    let serializer = Serializer::new(WireFormat::Postcard);

    let publisher = Arc::new(StreamPublisher::new("127.0.0.1:0", serializer.clone(), 64).unwrap());
    let mut subscriber = TcpStream::connect(publisher.local_addr()).unwrap();
    // Let the publisher accept before anything is broadcast
    thread::sleep(Duration::from_millis(100));

    let config = SetuConfig::default();
    let daemon = Daemon::spawn(&config, engine.clone(), publisher.clone(), running.clone()).unwrap();
    let sensors = SensorServer::spawn(
        "127.0.0.1:0",
        serializer.clone(),
        daemon.router(),
        running.clone(),
    )
    .unwrap();

    let mut client = TcpStream::connect(sensors.local_addr()).unwrap();
    serializer
        .write_frame(&mut client, &image("left/image_raw", 1_000_000))
        .unwrap();
    serializer
        .write_frame(&mut client, &image("right/image_raw", 1_000_400))
        .unwrap();

    wait_until(|| engine.call_count() == 1);
    assert_eq!(engine.tracked_calls(), vec![1_000_000]);

    subscriber
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let transform = loop {
        let message: Message = serializer.read_frame(&mut subscriber).unwrap();
        if let Payload::Transform(t) = message.payload {
            assert_eq!(message.topic, "tf");
            break t;
        }
    };
    assert_eq!(transform.parent_frame, "map");
    assert_eq!(transform.child_frame, "base_link");
    assert_eq!(transform.timestamp_us, 1_000_000);

    drop(client);
    running.store(false, Ordering::Relaxed);
    sensors.join().unwrap();
    let summary = daemon.join();
    assert_eq!(summary.images_received, 2);
    assert_eq!(summary.pairs, 1);
    publisher.stop();
}

#[test]
fn test_sensor_frame_split_by_long_pause_still_tracked() {
    let engine = Arc::new(MockEngine::with_landmarks(
        MockEngineConfig {
            init_frames: 0,
            ..Default::default()
        },
        Vec::new(),
    ));
    let running = Arc::new(AtomicBool::new(true));
    let serializer = Serializer::new(WireFormat::Postcard);
    let (sink, _rx) = setu::io::ChannelSink::new();

    let daemon = Daemon::spawn(
        &SetuConfig::default(),
        engine.clone(),
        Arc::new(sink),
        running.clone(),
    )
    .unwrap();
    let sensors = SensorServer::spawn(
        "127.0.0.1:0",
        serializer.clone(),
        daemon.router(),
        running.clone(),
    )
    .unwrap();

    let mut client = TcpStream::connect(sensors.local_addr()).unwrap();
    let mut left = Vec::new();
    serializer
        .encode_frame(&image("left/image_raw", 2_000_000), &mut left)
        .unwrap();
    let (head, tail) = left.split_at(left.len() / 2);

    client.write_all(head).unwrap();
    client.flush().unwrap();
    // Longer than the server's per-connection read timeout
    thread::sleep(Duration::from_millis(800));
    client.write_all(tail).unwrap();
    serializer
        .write_frame(&mut client, &image("right/image_raw", 2_000_300))
        .unwrap();

    wait_until(|| engine.call_count() == 1);
    assert_eq!(engine.tracked_calls(), vec![2_000_000]);

    drop(client);
    running.store(false, Ordering::Relaxed);
    sensors.join().unwrap();
    let summary = daemon.join();
    assert_eq!(summary.images_received, 2);
}

#[test]
fn test_service_answers_queries_over_tcp() {
    let points: Vec<Point3D> = (0..10)
        .map(|i| Point3D::new(1.0 + i as f64 * 0.1, 0.0, 0.0))
        .collect();
    let engine = Arc::new(MockEngine::with_landmarks(
        MockEngineConfig::default(),
        points.clone(),
    ));
    let running = Arc::new(AtomicBool::new(true));
    let (sink, _rx) = setu::io::ChannelSink::new();

    let config = SetuConfig::default();
    let daemon = Daemon::spawn(&config, engine, Arc::new(sink), running.clone()).unwrap();
    let serializer = Serializer::new(WireFormat::Json);
    let service = ServiceServer::spawn(
        "127.0.0.1:0",
        serializer.clone(),
        daemon.query_sender(),
        config.query.timeout_ms,
        running.clone(),
    )
    .unwrap();

    let mut client = TcpStream::connect(service.local_addr()).unwrap();
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    serializer
        .write_frame(
            &mut client,
            &QueryRequest::LandmarksInView {
                pose: Default::default(),
            },
        )
        .unwrap();
    let reply: ServiceReply = serializer.read_frame(&mut client).unwrap();
    assert_eq!(
        reply,
        ServiceReply::Ok(QueryResponse::LandmarksInView(points.clone()))
    );

    // Same connection serves further requests
    serializer
        .write_frame(
            &mut client,
            &QueryRequest::MapData {
                tracked_points: false,
                keyframe_id: None,
            },
        )
        .unwrap();
    let reply: ServiceReply = serializer.read_frame(&mut client).unwrap();
    match reply {
        ServiceReply::Ok(QueryResponse::MapData(snapshot)) => {
            assert!(snapshot.keyframes.is_empty());
        }
        other => panic!("unexpected reply {:?}", other),
    }

    drop(client);
    running.store(false, Ordering::Relaxed);
    service.join().unwrap();
    daemon.join();
}
