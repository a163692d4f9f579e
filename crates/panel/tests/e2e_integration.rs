//! End-to-end integration tests for the CraftPanel file core.
//!
//! These tests drive the message router the way the panel does:
//! - Browsing and editing server files
//! - Uploads, downloads and archives
//! - Rejection of paths that leave the server root

use std::fs;
use std::io::{Cursor, Read};

use futures_util::StreamExt;
use panel::config::Config;
use panel::files::{ByteStream, FileManager};
use panel::router::{MessageRouter, Principal, RouterOutput};
use protocol::messages::{
    ArchiveDownloadRequest, DirectoryCreateRequest, FileDeleteRequest, FileDownloadRequest,
    FileListRequest, FileReadRequest, FileRenameRequest, FileUploadRequest, FileWriteRequest,
    UploadFile, WriteContent,
};
use protocol::{Envelope, ErrorCode, Message};
use tempfile::TempDir;

/// Create a router over a temporary servers directory with one server.
fn create_test_router() -> (MessageRouter, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("survival/mc-data")).unwrap();

    let mut config = Config::default();
    config.files.servers_dir = temp_dir.path().to_path_buf();
    config.validate().unwrap();

    let files = FileManager::from_config(&config.files).unwrap();
    (MessageRouter::new(files), temp_dir)
}

fn admin() -> Principal {
    Principal::new("admin")
}

async fn reply(router: &MessageRouter, message: Message) -> Message {
    router
        .handle(message, &admin())
        .await
        .into_reply()
        .expect("expected a reply message")
}

async fn collect(mut stream: ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

fn error_code(message: &Message) -> Option<ErrorCode> {
    match message {
        Message::Error(err) => Some(err.code),
        _ => None,
    }
}

// =============================================================================
// Browsing and Editing
// =============================================================================

#[tokio::test]
async fn test_edit_config_flow() {
    let (router, temp_dir) = create_test_router();

    let written = reply(
        &router,
        Message::FileWriteRequest(FileWriteRequest {
            server_id: "survival".to_string(),
            path: "config/paper-global.yml".to_string(),
            content: WriteContent::Text("chunk-loading:\n  autoconfig: true\n".to_string()),
        }),
    )
    .await;
    assert!(matches!(written, Message::OperationComplete(_)));

    let listing = reply(
        &router,
        Message::FileListRequest(FileListRequest {
            server_id: "survival".to_string(),
            path: String::new(),
        }),
    )
    .await;
    match listing {
        Message::FileListResponse(resp) => {
            assert_eq!(resp.entries.len(), 1);
            assert_eq!(resp.entries[0].name, "config");
            assert!(resp.entries[0].is_directory);
        }
        other => panic!("unexpected reply {other:?}"),
    }

    let read = reply(
        &router,
        Message::FileReadRequest(FileReadRequest {
            server_id: "survival".to_string(),
            path: "/config/paper-global.yml".to_string(),
        }),
    )
    .await;
    match read {
        Message::FileReadResponse(resp) => {
            assert_eq!(resp.content, "chunk-loading:\n  autoconfig: true\n");
            assert_eq!(resp.encoding, "utf-8");
        }
        other => panic!("unexpected reply {other:?}"),
    }

    assert!(temp_dir
        .path()
        .join("survival/mc-data/config/paper-global.yml")
        .is_file());
}

#[tokio::test]
async fn test_listing_order() {
    let (router, temp_dir) = create_test_router();
    let data = temp_dir.path().join("survival/mc-data");
    fs::write(data.join("b.txt"), "b").unwrap();
    fs::create_dir(data.join("A")).unwrap();
    fs::write(data.join("a.txt"), "a").unwrap();

    let listing = reply(
        &router,
        Message::FileListRequest(FileListRequest {
            server_id: "survival".to_string(),
            path: String::new(),
        }),
    )
    .await;

    match listing {
        Message::FileListResponse(resp) => {
            let names: Vec<_> = resp.entries.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, vec!["A", "a.txt", "b.txt"]);
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[tokio::test]
async fn test_mkdir_rename_delete_flow() {
    let (router, temp_dir) = create_test_router();
    let data = temp_dir.path().join("survival/mc-data");

    let created = reply(
        &router,
        Message::DirectoryCreateRequest(DirectoryCreateRequest {
            server_id: "survival".to_string(),
            path: "backups/2024".to_string(),
        }),
    )
    .await;
    assert!(matches!(created, Message::OperationComplete(_)));

    let renamed = reply(
        &router,
        Message::FileRenameRequest(FileRenameRequest {
            server_id: "survival".to_string(),
            path: "backups/2024".to_string(),
            new_name: "2025".to_string(),
        }),
    )
    .await;
    match renamed {
        Message::OperationComplete(done) => assert_eq!(done.path, "backups/2025"),
        other => panic!("unexpected reply {other:?}"),
    }
    assert!(data.join("backups/2025").is_dir());

    let deleted = reply(
        &router,
        Message::FileDeleteRequest(FileDeleteRequest {
            server_id: "survival".to_string(),
            path: "backups".to_string(),
        }),
    )
    .await;
    assert!(matches!(deleted, Message::OperationComplete(_)));
    assert!(!data.join("backups").exists());
    assert!(data.is_dir());
}

// =============================================================================
// Confinement
// =============================================================================

#[tokio::test]
async fn test_escapes_rejected() {
    let (router, temp_dir) = create_test_router();
    fs::create_dir_all(temp_dir.path().join("survival2/mc-data")).unwrap();
    fs::write(temp_dir.path().join("survival2/mc-data/secret.txt"), "s").unwrap();

    for path in [
        "../../etc/passwd",
        "..\\..\\etc\\passwd",
        "config/../../..",
        "../../survival2/mc-data/secret.txt",
    ] {
        let message = reply(
            &router,
            Message::FileReadRequest(FileReadRequest {
                server_id: "survival".to_string(),
                path: path.to_string(),
            }),
        )
        .await;
        assert_eq!(error_code(&message), Some(ErrorCode::InvalidPath), "{path}");
    }

    let bad_server = reply(
        &router,
        Message::FileListRequest(FileListRequest {
            server_id: "../survival".to_string(),
            path: String::new(),
        }),
    )
    .await;
    assert_eq!(error_code(&bad_server), Some(ErrorCode::InvalidPath));
}

#[tokio::test]
async fn test_global_server_browses_all() {
    let (router, temp_dir) = create_test_router();
    fs::create_dir_all(temp_dir.path().join("creative/mc-data")).unwrap();

    let listing = reply(
        &router,
        Message::FileListRequest(FileListRequest {
            server_id: "__global__".to_string(),
            path: String::new(),
        }),
    )
    .await;

    match listing {
        Message::FileListResponse(resp) => {
            let names: Vec<_> = resp.entries.iter().map(|e| e.name.as_str()).collect();
            assert_eq!(names, vec!["creative", "survival"]);
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

// =============================================================================
// Transfers
// =============================================================================

#[tokio::test]
async fn test_upload_batch_with_one_escape() {
    let (router, temp_dir) = create_test_router();

    let files = (1..=5)
        .map(|i| UploadFile {
            relative_path: (i == 3).then(|| "../../../../escape.txt".to_string()),
            file_name: format!("file{i}.txt"),
            data: format!("content {i}").into_bytes(),
        })
        .collect();

    let message = reply(
        &router,
        Message::FileUploadRequest(FileUploadRequest {
            server_id: "survival".to_string(),
            destination: "uploads".to_string(),
            files,
        }),
    )
    .await;

    match message {
        Message::FileUploadResponse(resp) => {
            assert_eq!(resp.uploaded, 4);
            assert_eq!(resp.errors, 1);
        }
        other => panic!("unexpected reply {other:?}"),
    }

    let uploads = temp_dir.path().join("survival/mc-data/uploads");
    for i in [1, 2, 4, 5] {
        assert!(uploads.join(format!("file{i}.txt")).is_file());
    }
    assert!(!temp_dir.path().join("escape.txt").exists());
}

#[tokio::test]
async fn test_download_resume() {
    let (router, temp_dir) = create_test_router();
    let log = "[12:00:00] [Server thread/INFO]: Done (3.2s)!\n";
    fs::create_dir_all(temp_dir.path().join("survival/mc-data/logs")).unwrap();
    fs::write(temp_dir.path().join("survival/mc-data/logs/latest.log"), log).unwrap();

    let output = router
        .route(
            Message::FileDownloadRequest(FileDownloadRequest {
                server_id: "survival".to_string(),
                path: "logs/latest.log".to_string(),
                offset: 11,
            }),
            &admin(),
        )
        .await
        .unwrap();

    match output {
        RouterOutput::Stream {
            file_name,
            length,
            stream,
        } => {
            assert_eq!(file_name, "latest.log");
            assert_eq!(length, Some(log.len() as u64 - 11));
            assert_eq!(collect(stream).await, log.as_bytes()[11..].to_vec());
        }
        other => panic!("expected stream, got {other:?}"),
    }
}

#[tokio::test]
async fn test_download_bad_offset() {
    let (router, temp_dir) = create_test_router();
    fs::write(temp_dir.path().join("survival/mc-data/eula.txt"), "eula=true").unwrap();

    let message = reply(
        &router,
        Message::FileDownloadRequest(FileDownloadRequest {
            server_id: "survival".to_string(),
            path: "eula.txt".to_string(),
            offset: 100,
        }),
    )
    .await;
    assert_eq!(error_code(&message), Some(ErrorCode::InvalidRequest));
}

#[tokio::test]
async fn test_archive_download() {
    let (router, temp_dir) = create_test_router();
    let world = temp_dir.path().join("survival/mc-data/world");
    fs::create_dir_all(&world).unwrap();
    fs::write(world.join("level.dat"), vec![1u8; 2048]).unwrap();
    fs::write(world.join("session.lock"), "lock").unwrap();

    let output = router
        .route(
            Message::ArchiveDownloadRequest(ArchiveDownloadRequest {
                server_id: "survival".to_string(),
                path: "world".to_string(),
            }),
            &admin(),
        )
        .await
        .unwrap();

    let (file_name, stream) = match output {
        RouterOutput::Stream {
            file_name, stream, ..
        } => (file_name, stream),
        other => panic!("expected stream, got {other:?}"),
    };
    assert_eq!(file_name, "world.zip");

    let bytes = collect(stream).await;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

    assert!(archive.by_name("world/").unwrap().is_dir());
    assert_eq!(archive.by_name("world/level.dat").unwrap().size(), 2048);

    let mut lock = String::new();
    archive
        .by_name("world/session.lock")
        .unwrap()
        .read_to_string(&mut lock)
        .unwrap();
    assert_eq!(lock, "lock");
}

// =============================================================================
// Wire Encoding
// =============================================================================

#[tokio::test]
async fn test_request_over_msgpack() {
    let (router, temp_dir) = create_test_router();
    fs::write(temp_dir.path().join("survival/mc-data/ops.json"), "[]").unwrap();

    let request = Envelope::new(
        7,
        Message::FileReadRequest(FileReadRequest {
            server_id: "survival".to_string(),
            path: "ops.json".to_string(),
        }),
    );
    let bytes = request.to_msgpack().unwrap();

    let decoded = Envelope::from_msgpack(&bytes).unwrap();
    decoded.check_version().unwrap();
    let response = decoded.reply_to(reply(&router, decoded.payload.clone()).await);

    assert_eq!(response.sequence, 7);
    match response.payload {
        Message::FileReadResponse(resp) => assert_eq!(resp.content, "[]"),
        other => panic!("unexpected reply {other:?}"),
    }
}
