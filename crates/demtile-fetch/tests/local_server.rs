//! Downloads against a throwaway HTTP server on localhost.

use demtile_fetch::{
    download_to, harvest_area_links, http_client, link_file_name, FetchError, TileCoord,
    TileFetcher,
};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Serves `200 tile-bytes:{path}` for paths ending in `.tif` or `.zip`, `404`
/// otherwise. Tile responses are delayed so concurrent requests overlap.
struct Server {
    base_url: String,
    requests: Arc<AtomicUsize>,
}

fn start_server() -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let mut header = String::new();
                while reader.read_line(&mut header).unwrap() > 2 {
                    header.clear();
                }
                counter.fetch_add(1, Ordering::SeqCst);

                let path = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();
                let response = if path.ends_with(".tif") || path.ends_with(".zip") {
                    thread::sleep(Duration::from_millis(150));
                    let body = format!("tile-bytes:{}", path);
                    format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    )
                } else {
                    "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        .to_string()
                };
                let _ = stream.write_all(response.as_bytes());
            });
        }
    });

    Server { base_url, requests }
}

#[test]
fn test_concurrent_requests_share_one_download() {
    let server = start_server();
    let cache = TempDir::new().unwrap();
    let fetcher = TileFetcher::new(cache.path())
        .unwrap()
        .with_base_url(&server.base_url);
    let coord = TileCoord::new(10, 512, 300).unwrap();

    let paths: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| fetcher.fetch_tile(&coord))).collect();
        handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect()
    });

    assert!(paths.iter().all(|p| *p == coord.cache_path(cache.path())));
    assert_eq!(server.requests.load(Ordering::SeqCst), 1);
    assert_eq!(fetcher.download_stats().tiles_downloaded, 1);
    assert_eq!(
        std::fs::read_to_string(&paths[0]).unwrap(),
        "tile-bytes:/10/512/300.tif"
    );

    // Served from disk afterwards.
    fetcher.fetch_tile(&coord).unwrap();
    assert_eq!(server.requests.load(Ordering::SeqCst), 1);
}

#[test]
fn test_http_error_is_download_failure() {
    let server = start_server();
    let dir = TempDir::new().unwrap();
    let client = http_client(Duration::from_secs(5)).unwrap();
    let dest = dir.path().join("missing.bin");

    let err = download_to(&client, &format!("{}/missing.bin", server.base_url), &dest).unwrap_err();

    match err {
        FetchError::DownloadFailed { reason, .. } => assert!(reason.contains("404"), "{}", reason),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!dest.exists());
    assert!(!dir.path().join("missing.bin.part").exists());
}

#[test]
fn test_harvested_links_download_with_index_names() {
    let server = start_server();
    let dir = TempDir::new().unwrap();
    let client = http_client(Duration::from_secs(5)).unwrap();
    let page = r#"<map><area href="data/srtm_38_01.zip"><area href="data/srtm_39_01.zip"></map>"#;

    let links = harvest_area_links(page, &format!("{}/coverage.html", server.base_url)).unwrap();
    for (i, url) in links.iter().enumerate() {
        let dest = dir.path().join(link_file_name(i, url));
        download_to(&client, url, &dest).unwrap();
    }

    assert!(dir.path().join("0-srtm_38_01.zip").exists());
    assert!(dir.path().join("1-srtm_39_01.zip").exists());
}
