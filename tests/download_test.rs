use exeggutor::core::fetch::{download, download_into, Downloader};
use exeggutor::ExeggutorError;
use httpmock::prelude::*;
use tempfile::TempDir;

#[tokio::test]
async fn test_download_into_directory_uses_remote_file_name() {
    let temp_dir = TempDir::new().unwrap();

    let server = MockServer::start();
    let fasta = ">contig_1\nACGTACGTAC\n>contig_2\nTTGA\n";
    let file_mock = server.mock(|when, then| {
        when.method(GET).path("/genomes/assembly.fa");
        then.status(200)
            .header("Content-Type", "text/plain")
            .body(fasta);
    });

    let saved = download(&server.url("/genomes/assembly.fa"), temp_dir.path())
        .await
        .unwrap();

    file_mock.assert();
    assert_eq!(saved, temp_dir.path().join("assembly.fa"));
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), fasta);
}

#[tokio::test]
async fn test_download_to_explicit_file_creates_parents() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("refs").join("hg38").join("chrM.fa");

    let server = MockServer::start();
    let file_mock = server.mock(|when, then| {
        when.method(GET).path("/chrM");
        then.status(200).body(">chrM\nGATCACAGGT\n");
    });

    let saved = Downloader::new()
        .fetch(&server.url("/chrM"), &target)
        .await
        .unwrap();

    file_mock.assert();
    assert_eq!(saved, target);
    assert_eq!(std::fs::read_to_string(&target).unwrap(), ">chrM\nGATCACAGGT\n");
}

#[tokio::test]
async fn test_download_into_directory_that_does_not_exist_yet() {
    let temp_dir = TempDir::new().unwrap();
    let downloads = temp_dir.path().join("downloads");

    let server = MockServer::start();
    let file_mock = server.mock(|when, then| {
        when.method(GET).path("/g/genome.fa");
        then.status(200).body(">g\nACGT\n");
    });

    let saved = download_into(&server.url("/g/genome.fa"), &downloads)
        .await
        .unwrap();

    file_mock.assert();
    assert!(downloads.is_dir());
    assert_eq!(saved, downloads.join("genome.fa"));
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), ">g\nACGT\n");
}

#[tokio::test]
async fn test_missing_remote_file_is_reported() {
    let temp_dir = TempDir::new().unwrap();

    let server = MockServer::start();
    let missing_mock = server.mock(|when, then| {
        when.method(GET).path("/genomes/absent.fa");
        then.status(404);
    });

    let result = download(&server.url("/genomes/absent.fa"), temp_dir.path()).await;

    missing_mock.assert();
    match result {
        Err(ExeggutorError::DownloadFailed { url, status }) => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/genomes/absent.fa"));
        }
        other => panic!("expected DownloadFailed, got {:?}", other),
    }
    assert!(!temp_dir.path().join("absent.fa").exists());
}
