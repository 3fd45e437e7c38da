//! Tests against a real sshd. Ignored by default; set RSCP_TEST_HOST,
//! RSCP_TEST_USER and RSCP_TEST_PASSWORD (or RSCP_TEST_KEY) and run with
//! `--ignored`.

use std::fs;

use rscp::scp::ScpFile;

use crate::test_utils;

#[test]
#[ignore] // needs a real server
fn connect_and_authenticate() {
    let session = test_utils::connect();
    assert!(session.is_ok(), "{:?}", session.err());
}

#[test]
#[ignore]
fn upload_then_download_round_trips() {
    let mut session = test_utils::connect().unwrap();

    let dir = std::env::temp_dir().join("rscp-live-test");
    fs::create_dir_all(&dir).unwrap();
    let local = dir.join("upload.txt");
    fs::write(&local, b"round trip payload").unwrap();

    let mut remote = ScpFile::new(&mut session, "/tmp/rscp-live-test.txt");
    remote.copy_from_local(&local).unwrap();

    let downloaded = dir.join("download.txt");
    let entry = remote.copy_to_local(&downloaded).unwrap();
    assert_eq!(entry.size(), 18);
    assert_eq!(fs::read(&downloaded).unwrap(), b"round trip payload");

    session.disconnect().unwrap();
}

#[test]
#[ignore]
fn download_missing_file_reports_remote_error() {
    let mut session = test_utils::connect().unwrap();
    let target = std::env::temp_dir().join("rscp-missing.txt");

    let mut remote = ScpFile::new(&mut session, "/nonexistent/rscp-no-such-file");
    let err = remote.copy_to_local(&target).unwrap_err();
    assert!(matches!(err, rscp::ScpError::Remote(_) | rscp::ScpError::Protocol(_)));
}
