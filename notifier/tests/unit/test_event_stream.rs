//! Event stream worker tests

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nomad_models::Deployment;
use notifier::errors::NotifierError;
use notifier::nomad::stream::{EventFeed, FeedConnection};
use notifier::workers::event_stream::{self, DeploymentConsumer};
use tokio::sync::oneshot;
use tokio::time::Instant;

type Chunk = Result<Option<Vec<u8>>, NotifierError>;

/// One scripted connection attempt
enum Script {
    Refuse,
    Chunks(Vec<Chunk>),
    /// Chunks, then silence without the server closing the stream
    Stall(Vec<Chunk>),
}

/// Feed replaying scripted connections, then hanging forever
#[derive(Default)]
struct ScriptedFeed {
    scripts: Mutex<VecDeque<Script>>,
    indexes: Mutex<Vec<u64>>,
}

impl ScriptedFeed {
    fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            indexes: Mutex::new(Vec::new()),
        }
    }

    fn indexes(&self) -> Vec<u64> {
        self.indexes.lock().unwrap().clone()
    }
}

struct ScriptedConnection {
    chunks: VecDeque<Chunk>,
    hang: bool,
}

#[async_trait]
impl FeedConnection for ScriptedConnection {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, NotifierError> {
        match self.chunks.pop_front() {
            Some(chunk) => chunk,
            None if self.hang => std::future::pending().await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl EventFeed for ScriptedFeed {
    type Connection = ScriptedConnection;

    async fn connect(&self, index: u64) -> Result<ScriptedConnection, NotifierError> {
        self.indexes.lock().unwrap().push(index);
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Refuse) => Err(NotifierError::StreamError("connection refused".to_string())),
            Some(Script::Chunks(chunks)) => Ok(ScriptedConnection {
                chunks: chunks.into(),
                hang: false,
            }),
            Some(Script::Stall(chunks)) => Ok(ScriptedConnection {
                chunks: chunks.into(),
                hang: true,
            }),
            None => Ok(ScriptedConnection {
                chunks: VecDeque::new(),
                hang: true,
            }),
        }
    }
}

/// Consumer recording deployment ids, failing for selected ones
#[derive(Default)]
struct RecordingConsumer {
    seen: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

impl RecordingConsumer {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeploymentConsumer for RecordingConsumer {
    async fn consume(&self, deployment: Deployment) -> Result<(), NotifierError> {
        self.seen.lock().unwrap().push(deployment.id.clone());
        if self.failing.contains(&deployment.id) {
            return Err(NotifierError::SlackError("channel_not_found".to_string()));
        }
        Ok(())
    }
}

fn frame(index: u64, id: &str) -> String {
    format!(
        concat!(
            r#"{{"Index":{index},"Events":[{{"Topic":"Deployment","Type":"DeploymentStatusUpdate","#,
            r#""Key":"{id}","Index":{index},"Payload":{{"Deployment":{{"ID":"{id}","JobID":"web","#,
            r#""Status":"running","StatusDescription":"Deployment is running"}}}}}}]}}"#,
            "\n"
        ),
        index = index,
        id = id
    )
}

fn chunk(text: &str) -> Chunk {
    Ok(Some(text.as_bytes().to_vec()))
}

/// Run the worker until the consumer has seen `expected` deployments
async fn run_until(
    feed: Arc<ScriptedFeed>,
    consumer: Arc<RecordingConsumer>,
    expected: usize,
) -> Vec<String> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let worker = {
        let feed = feed.clone();
        let consumer = consumer.clone();
        tokio::spawn(async move {
            event_stream::run(
                &event_stream::Options::default(),
                feed.as_ref(),
                consumer.as_ref(),
                |_| std::future::ready(()),
                Box::pin(async move {
                    let _ = shutdown_rx.await;
                }),
            )
            .await;
        })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while consumer.seen().len() < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("consumer did not receive the expected deployments");

    let _ = shutdown_tx.send(());
    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker did not stop")
        .unwrap();

    consumer.seen()
}

#[tokio::test]
async fn test_delivers_in_arrival_order() {
    let first = frame(3, "d1");
    let (head, tail) = first.split_at(40);
    let feed = Arc::new(ScriptedFeed::new(vec![Script::Chunks(vec![
        chunk(head),
        chunk(&format!("{}{{}}\n", tail)),
        chunk("garbage that is not json\n"),
        chunk(&format!("{}{}", frame(4, "d2"), frame(5, "d1"))),
    ])]));
    let consumer = Arc::new(RecordingConsumer::default());

    let seen = run_until(feed, consumer, 3).await;
    assert_eq!(seen, vec!["d1", "d2", "d1"]);
}

#[tokio::test]
async fn test_consumer_errors_do_not_stop_delivery() {
    let feed = Arc::new(ScriptedFeed::new(vec![Script::Chunks(vec![chunk(&format!(
        "{}{}",
        frame(1, "a"),
        frame(2, "b")
    ))])]));
    let consumer = Arc::new(RecordingConsumer {
        failing: HashSet::from(["a".to_string()]),
        ..Default::default()
    });

    let seen = run_until(feed, consumer, 2).await;
    assert_eq!(seen, vec!["a", "b"]);
}

#[tokio::test]
async fn test_reconnects_from_last_index() {
    let feed = Arc::new(ScriptedFeed::new(vec![
        Script::Chunks(vec![
            chunk(&frame(7, "d1")),
            Err(NotifierError::StreamError("connection reset".to_string())),
        ]),
        Script::Refuse,
        Script::Chunks(vec![chunk(&frame(8, "d1")), Ok(None)]),
    ]));
    let consumer = Arc::new(RecordingConsumer::default());

    let seen = run_until(feed.clone(), consumer, 2).await;
    assert_eq!(seen, vec!["d1", "d1"]);

    let indexes = feed.indexes();
    assert_eq!(&indexes[..3], &[0, 8, 8]);
}

#[tokio::test]
async fn test_shutdown_while_waiting() {
    let feed = Arc::new(ScriptedFeed::default());
    let consumer = Arc::new(RecordingConsumer::default());
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let worker = {
        let feed = feed.clone();
        let consumer = consumer.clone();
        tokio::spawn(async move {
            event_stream::run(
                &event_stream::Options::default(),
                feed.as_ref(),
                consumer.as_ref(),
                |_| std::future::ready(()),
                Box::pin(async move {
                    let _ = shutdown_rx.await;
                }),
            )
            .await;
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown_tx.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker did not stop")
        .unwrap();
    assert!(consumer.seen().is_empty());
    assert_eq!(feed.indexes(), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn test_silent_stream_reconnects() {
    let feed = Arc::new(ScriptedFeed::new(vec![Script::Stall(vec![chunk(&frame(7, "d1"))])]));
    let consumer = Arc::new(RecordingConsumer::default());
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let options = event_stream::Options::default();

    let worker = {
        let feed = feed.clone();
        let consumer = consumer.clone();
        let options = options.clone();
        tokio::spawn(async move {
            event_stream::run(
                &options,
                feed.as_ref(),
                consumer.as_ref(),
                |_| std::future::ready(()),
                Box::pin(async move {
                    let _ = shutdown_rx.await;
                }),
            )
            .await;
        })
    };

    // No heartbeat ever arrives, the open stream must be given up on
    let started = Instant::now();
    tokio::time::sleep(options.idle_timeout * 3 + Duration::from_secs(5)).await;

    let indexes = feed.indexes();
    assert!(indexes.len() >= 3, "connects after {:?}: {:?}", started.elapsed(), indexes);
    assert_eq!(&indexes[..3], &[0, 8, 8]);
    assert_eq!(consumer.seen(), vec!["d1"]);

    shutdown_tx.send(()).unwrap();
    worker.await.unwrap();
}

/// Consumer that requests shutdown while handling its first deployment
struct StoppingConsumer {
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl DeploymentConsumer for StoppingConsumer {
    async fn consume(&self, deployment: Deployment) -> Result<(), NotifierError> {
        self.started.lock().unwrap().push(deployment.id.clone());
        let stop = self.stop.lock().unwrap().take();
        if let Some(stop) = stop {
            let _ = stop.send(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.finished.lock().unwrap().push(deployment.id);
        Ok(())
    }
}

#[tokio::test]
async fn test_shutdown_lets_inflight_delivery_finish() {
    let feed = ScriptedFeed::new(vec![Script::Stall(vec![chunk(&format!(
        "{}{}{}",
        frame(1, "d1"),
        frame(2, "d2"),
        frame(3, "d3")
    ))])]);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let consumer = StoppingConsumer {
        started: Mutex::new(Vec::new()),
        finished: Mutex::new(Vec::new()),
        stop: Mutex::new(Some(shutdown_tx)),
    };

    tokio::time::timeout(
        Duration::from_secs(5),
        event_stream::run(
            &event_stream::Options::default(),
            &feed,
            &consumer,
            |_| std::future::ready(()),
            Box::pin(async move {
                let _ = shutdown_rx.await;
            }),
        ),
    )
    .await
    .expect("worker did not stop");

    assert_eq!(*consumer.started.lock().unwrap(), vec!["d1"]);
    assert_eq!(*consumer.finished.lock().unwrap(), vec!["d1"]);
}
