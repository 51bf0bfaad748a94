//! End-to-end tests over real WebSocket connections.

use futures_util::{SinkExt, StreamExt};
use place_server::{PlaceServer, ServerConfig};
use place_storage::{InMemoryPlacementStore, LocalDirectory, PlacementStore, UserDirectory};
use place_testkit::{test_directory, SMALL_CANVAS, TEST_SECRET};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    store: Arc<InMemoryPlacementStore>,
    directory: Arc<LocalDirectory>,
    tokens: place_server::TokenValidator,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    async fn start(config: ServerConfig) -> Self {
        let store = Arc::new(InMemoryPlacementStore::new());
        let directory = Arc::new(test_directory());
        let server = PlaceServer::bind_with(
            config
                .with_canvas(SMALL_CANVAS)
                .with_auth_secret(TEST_SECRET.to_vec()),
            store.clone(),
            directory.clone(),
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        let tokens = server.context().auth.validator().clone();

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        Self {
            addr,
            store,
            directory,
            tokens,
            _shutdown: tx,
        }
    }

    async fn connect(&self) -> Client {
        let (socket, _) = connect_async(format!("ws://{}", self.addr)).await.unwrap();
        let mut client = Client { socket };
        let colors = client.binary().await;
        assert_eq!(colors.len(), SMALL_CANVAS.pixel_count());
        let users = client.text().await;
        assert!(users.starts_with("USERS "));
        client
    }

    async fn login(&self, name: &str) -> Client {
        let mut client = self.connect().await;
        let user = self.directory.find_by_name(name).unwrap().unwrap();
        let token = self.tokens.create_token(user.id).unwrap();
        client.send(&format!("AUTH {token}")).await;
        assert_eq!(client.text().await, "AUTHENTICATION SUCCESS");
        client
    }
}

fn config() -> ServerConfig {
    ServerConfig::new("127.0.0.1:0".parse().unwrap())
}

struct Client {
    socket: Socket,
}

impl Client {
    async fn send(&mut self, line: &str) {
        self.socket.send(Message::Text(line.to_string())).await.unwrap();
    }

    async fn next(&mut self) -> Message {
        loop {
            let message = timeout(Duration::from_secs(5), self.socket.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("connection closed")
                .unwrap();
            if !matches!(message, Message::Ping(_) | Message::Pong(_)) {
                return message;
            }
        }
    }

    async fn text(&mut self) -> String {
        match self.next().await {
            Message::Text(text) => text,
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    async fn binary(&mut self) -> Vec<u8> {
        match self.next().await {
            Message::Binary(bytes) => bytes,
            other => panic!("expected binary frame, got {other:?}"),
        }
    }

    async fn request(&mut self, line: &str) -> String {
        self.send(line).await;
        self.text().await
    }

    async fn assert_silent(&mut self) {
        let waited = timeout(Duration::from_millis(150), self.socket.next()).await;
        assert!(waited.is_err(), "unexpected frame: {waited:?}");
    }
}

#[tokio::test]
async fn snapshot_on_connect_reflects_history() {
    let server = TestServer::start(config()).await;
    server
        .store
        .append(&place_storage::Placement::at(1.0, "bob", 2, 1, 5))
        .unwrap();

    let (mut socket, _) = connect_async(format!("ws://{}", server.addr)).await.unwrap();
    let Some(Ok(Message::Binary(colors))) = socket.next().await else {
        panic!("expected color frame");
    };
    assert_eq!(colors[16 + 2], 5);
    let Some(Ok(Message::Text(users))) = socket.next().await else {
        panic!("expected users line");
    };
    let painters: Vec<&str> = users["USERS ".len()..].split(' ').collect();
    assert_eq!(painters.len(), SMALL_CANVAS.pixel_count());
    assert_eq!(painters[16 + 2], "bob");
}

#[tokio::test]
async fn ping_and_errors() {
    let server = TestServer::start(config()).await;
    let mut client = server.connect().await;

    assert_eq!(client.request("PING").await, "PONG");
    assert_eq!(client.request("ping with args").await, "PONG");
    assert_eq!(client.request("HELLO").await, "INVALID");
    assert_eq!(client.request("PLACE 1 2").await, "FORBIDDEN");
    assert_eq!(client.request("AUTH nope").await, "AUTHENTICATION FAILED");

    // Binary frames are ignored
    client.socket.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
    assert_eq!(client.request("PING").await, "PONG");
}

#[tokio::test]
async fn place_and_clear_scenario() {
    let server = TestServer::start(config()).await;
    let mut alice = server.login("alice").await;
    let mut moderator = server.login("mod").await;
    let mut viewer = server.connect().await;

    assert_eq!(alice.request("PLACE 5 5 3").await, "PLACE alice 5 5 3");
    assert_eq!(moderator.text().await, "PLACE alice 5 5 3");
    assert_eq!(viewer.text().await, "PLACE alice 5 5 3");

    let mut late = server.connect().await;
    late.assert_silent().await;

    assert_eq!(moderator.request("CLEAR 0 0 9 9").await, "CLEAR 0 0 9 9");
    assert_eq!(alice.text().await, "CLEAR 0 0 9 9");
    assert_eq!(viewer.text().await, "CLEAR 0 0 9 9");
    assert_eq!(late.text().await, "CLEAR 0 0 9 9");

    let fresh = timeout(Duration::from_secs(5), async {
        let (mut socket, _) = connect_async(format!("ws://{}", server.addr)).await.unwrap();
        match socket.next().await {
            Some(Ok(Message::Binary(colors))) => colors,
            other => panic!("expected color frame, got {other:?}"),
        }
    })
    .await
    .unwrap();
    assert_eq!(fresh[5 * 16 + 5], 0);
}

#[tokio::test]
async fn out_of_range_place_is_invalid_and_silent() {
    let server = TestServer::start(config()).await;
    let mut alice = server.login("alice").await;
    let mut viewer = server.connect().await;

    assert_eq!(alice.request("PLACE 999999 0 0").await, "INVALID");
    assert_eq!(alice.request("PLACE 0 0 8").await, "INVALID");
    viewer.assert_silent().await;
    assert_eq!(server.store.len().unwrap(), 0);
}

#[tokio::test]
async fn cooldown_across_sessions() {
    let server = TestServer::start(config().with_cooldown(60)).await;
    let mut first = server.login("bob").await;
    let mut second = server.login("bob").await;

    assert_eq!(first.request("PLACE 1 1 1").await, "PLACE bob 1 1 1");
    assert!(first.text().await.starts_with("COOLDOWN "));
    assert!(second.text().await.starts_with("COOLDOWN "));
    assert_eq!(second.text().await, "PLACE bob 1 1 1");

    assert_eq!(second.request("PLACE 2 2 2").await, "FORBIDDEN");
    assert_eq!(server.store.len().unwrap(), 1);
}

#[tokio::test]
async fn ban_reaches_both_sessions() {
    let server = TestServer::start(config()).await;
    let mut first = server.login("bob").await;
    let mut second = server.login("bob").await;
    let mut moderator = server.login("mod").await;

    moderator.send("BAN bob").await;
    assert_eq!(first.text().await, "BANNED");
    assert_eq!(second.text().await, "BANNED");
    moderator.assert_silent().await;

    assert_eq!(first.request("PLACE 1 1 1").await, "FORBIDDEN");
    assert_eq!(moderator.request("BAN mod").await, "FORBIDDEN");
    assert_eq!(moderator.request("BAN nobody").await, "INVALID");
}

#[tokio::test]
async fn repeated_place_is_suppressed_for_last_placer() {
    let server = TestServer::start(config()).await;
    let mut alice = server.login("alice").await;

    assert_eq!(alice.request("PLACE 3 3 1").await, "PLACE alice 3 3 1");
    // Identical retry from the latest placer is dropped without a reply
    alice.send("place 3  3 1").await;
    alice.assert_silent().await;
    assert_eq!(alice.request("PLACE 3 3 2").await, "PLACE alice 3 3 2");
    assert_eq!(server.store.len().unwrap(), 2);
}

#[tokio::test]
async fn clear_user_pushes_new_canvas() {
    let server = TestServer::start(config()).await;
    let mut alice = server.login("alice").await;
    let mut moderator = server.login("mod").await;

    assert_eq!(alice.request("PLACE 4 4 6").await, "PLACE alice 4 4 6");
    assert_eq!(moderator.text().await, "PLACE alice 4 4 6");

    moderator.send("CLEARUSER alice").await;
    for client in [&mut alice, &mut moderator] {
        let colors = client.binary().await;
        assert_eq!(colors[4 * 16 + 4], 0);
        assert!(client.text().await.starts_with("USERS "));
    }
    assert_eq!(server.store.len().unwrap(), 0);
}

#[tokio::test]
async fn disconnect_unregisters() {
    let store: Arc<dyn PlacementStore> = Arc::new(InMemoryPlacementStore::new());
    let server = PlaceServer::bind_with(
        config()
            .with_canvas(SMALL_CANVAS)
            .with_auth_secret(TEST_SECRET.to_vec()),
        store,
        Arc::new(test_directory()),
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let registry = Arc::clone(&server.context().registry);
    tokio::spawn(server.run());

    let (mut socket, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    socket.next().await.unwrap().unwrap();
    socket.next().await.unwrap().unwrap();
    assert_eq!(registry.len(), 1);

    socket.close(None).await.unwrap();
    drop(socket);
    for _ in 0..50 {
        if registry.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(registry.is_empty());
}
