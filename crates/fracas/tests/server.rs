//! Integration tests for the Fracas server over real WebSocket connections.

use std::time::Duration;

use fracas::prelude::*;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

type ClientWs = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// =========================================================================
// Helpers
// =========================================================================

/// Starts a server on a random port and returns its address.
async fn start_server() -> String {
    start_server_with(FracasServer::builder()).await
}

async fn start_server_with(builder: FracasServerBuilder) -> String {
    let server = builder.bind("127.0.0.1:0").build().await.expect("build server");
    let addr = server.local_addr().expect("local addr").to_string();
    tokio::spawn(server.run());
    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let url = format!("ws://{addr}");
    let (ws, _) = tokio_tungstenite::connect_async(&url).await.expect("connect");
    ws
}

async fn send(ws: &mut ClientWs, rpc: ClientRpc) {
    let bytes = serde_json::to_vec(&Envelope::new(0, 0, rpc)).expect("encode");
    ws.send(Message::Binary(bytes.into())).await.expect("send");
}

/// Next envelope from the server, skipping heartbeat pings.
async fn recv(ws: &mut ClientWs) -> Envelope<ServerMessage> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for server")
            .expect("stream ended")
            .expect("recv");
        let env: Envelope<ServerMessage> = serde_json::from_slice(&msg.into_data()).expect("decode");
        if !matches!(env.body, ServerMessage::GameStatePing { .. }) {
            return env;
        }
    }
}

async fn create_game(ws: &mut ClientWs, name: &str) -> (GameId, ClientId) {
    send(
        ws,
        ClientRpc::CreateGame {
            name: name.into(),
            owner_name: "host".into(),
            is_self_hosted: false,
        },
    )
    .await;
    match recv(ws).await.body {
        ServerMessage::CreateGameResponse { game_id, owner_id } => (game_id, owner_id),
        other => panic!("expected CreateGameResponse, got {other:?}"),
    }
}

async fn join_game(ws: &mut ClientWs, game_id: GameId, name: &str) {
    send(
        ws,
        ClientRpc::JoinGame {
            game_id,
            player_name: name.into(),
        },
    )
    .await;
    match recv(ws).await.body {
        ServerMessage::JoinGameResponse { game } => assert_eq!(game.id, game_id),
        other => panic!("expected JoinGameResponse, got {other:?}"),
    }
}

// =========================================================================
// Lobby management
// =========================================================================

#[tokio::test]
async fn test_create_game_returns_ids() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        ClientRpc::CreateGame {
            name: "friday night".into(),
            owner_name: "host".into(),
            is_self_hosted: true,
        },
    )
    .await;

    let env = recv(&mut ws).await;
    assert_eq!(env.seq, 0);
    assert!(matches!(env.body, ServerMessage::CreateGameResponse { .. }));
}

#[tokio::test]
async fn test_list_games_shows_other_clients_lobby() {
    let addr = start_server().await;
    let mut host = connect(&addr).await;
    let mut guest = connect(&addr).await;
    let (game_id, _) = create_game(&mut host, "open table").await;

    send(&mut guest, ClientRpc::ListGames).await;

    match recv(&mut guest).await.body {
        ServerMessage::ListGamesResponse { games } => {
            assert_eq!(games.len(), 1);
            assert_eq!(games[0].id, game_id);
            assert_eq!(games[0].name, "open table");
            assert_eq!(games[0].owner, "host");
            assert_eq!(games[0].num_players, 1);
        }
        other => panic!("expected ListGamesResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn test_seq_increments_per_connection() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, ClientRpc::ListGames).await;
    send(&mut ws, ClientRpc::ListGames).await;

    assert_eq!(recv(&mut ws).await.seq, 0);
    assert_eq!(recv(&mut ws).await.seq, 1);
}

#[tokio::test]
async fn test_malformed_frame_is_skipped() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Binary(b"not json".to_vec().into())).await.expect("send");
    ws.send(Message::Text(r#"{"seq":0,"timestamp":0,"body":{"type":"Dance"}}"#.into()))
        .await
        .expect("send");
    send(&mut ws, ClientRpc::ListGames).await;

    let env = recv(&mut ws).await;
    assert!(matches!(env.body, ServerMessage::ListGamesResponse { .. }));
}

#[tokio::test]
async fn test_text_frame_is_accepted() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Text(r#"{"seq":0,"timestamp":0,"body":{"type":"ListGames"}}"#.into()))
        .await
        .expect("send");

    let env = recv(&mut ws).await;
    assert!(matches!(env.body, ServerMessage::ListGamesResponse { .. }));
}

#[tokio::test]
async fn test_get_unknown_game_returns_404() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, ClientRpc::GetGame { game_id: GameId(99) }).await;

    match recv(&mut ws).await.body {
        ServerMessage::Error { code, .. } => assert_eq!(code, 404),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_full_refuses_connection() {
    let limits = ServerLimits {
        max_clients: 1,
        ..ServerLimits::default()
    };
    let addr = start_server_with(FracasServer::builder().limits(limits)).await;
    let mut first = connect(&addr).await;
    send(&mut first, ClientRpc::ListGames).await;
    recv(&mut first).await;

    let mut second = connect(&addr).await;

    match recv(&mut second).await.body {
        ServerMessage::Error { code, .. } => assert_eq!(code, 503),
        other => panic!("expected Error 503, got {other:?}"),
    }
}

// =========================================================================
// Game flow
// =========================================================================

#[tokio::test]
async fn test_start_and_ready_begins_first_round() {
    let addr = start_server().await;
    let mut host = connect(&addr).await;
    let mut guest = connect(&addr).await;
    let (game_id, host_id) = create_game(&mut host, "duel").await;
    join_game(&mut guest, game_id, "guest").await;

    send(&mut host, ClientRpc::StartGame { game_id }).await;

    match recv(&mut host).await.body {
        ServerMessage::GameStarted { game_id: started, your_id } => {
            assert_eq!(started, game_id);
            assert_eq!(your_id, host_id);
        }
        other => panic!("expected GameStarted, got {other:?}"),
    }
    assert_eq!(recv(&mut host).await.body, ServerMessage::StartGameResponse);
    assert!(matches!(recv(&mut guest).await.body, ServerMessage::GameStarted { .. }));

    send(&mut host, ClientRpc::InGameReady).await;
    send(&mut guest, ClientRpc::InGameReady).await;

    assert_eq!(recv(&mut host).await.body, ServerMessage::InGameStartRound { round: 0 });
    assert_eq!(recv(&mut guest).await.body, ServerMessage::InGameStartRound { round: 0 });
}

#[tokio::test]
async fn test_owner_disconnect_ends_game_for_others() {
    let addr = start_server().await;
    let mut host = connect(&addr).await;
    let mut guest = connect(&addr).await;
    let (game_id, host_id) = create_game(&mut host, "short").await;
    join_game(&mut guest, game_id, "guest").await;
    send(&mut host, ClientRpc::StartGame { game_id }).await;
    assert!(matches!(recv(&mut guest).await.body, ServerMessage::GameStarted { .. }));

    host.close(None).await.expect("close");

    assert_eq!(recv(&mut guest).await.body, ServerMessage::PlayerLeft { user_id: host_id });
    match recv(&mut guest).await.body {
        ServerMessage::InGameEndGame { game_winner, .. } => assert_eq!(game_winner, None),
        other => panic!("expected InGameEndGame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_in_game_action_outside_game_gets_no_reply() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, ClientRpc::InGameBuzz).await;
    send(&mut ws, ClientRpc::ListGames).await;

    // the buzz is dropped, so the first reply is the listing
    let env = recv(&mut ws).await;
    assert_eq!(env.seq, 0);
    assert!(matches!(env.body, ServerMessage::ListGamesResponse { .. }));
}
