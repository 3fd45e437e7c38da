//! Push and pull connections are exact protocol complements: every byte one
//! side writes is what the other expects to read. Running one of each over
//! a socket pair exercises the real lock-step exchange end to end.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::thread;

use rscp::scp::{
    CopyMode, Direction, EntryKind, ScpConnection, ScpEntry, ScpFileInputStream,
    ScpFileOutputStream, ScpInputStream,
};

#[test]
fn single_file_push_pull() {
    let (push_end, pull_end) = UnixStream::pair().unwrap();

    let pusher = thread::spawn(move || -> rscp::Result<()> {
        let entry = ScpEntry::file_with_mode("hello.txt", 5, "644")?;
        let mut output = ScpFileOutputStream::create(push_end, &entry)?;
        output.write_all(b"world").map_err(rscp::ScpError::from)?;
        output.finish()
    });

    let mut input = ScpFileInputStream::open(pull_end).unwrap();
    assert_eq!(input.name(), "hello.txt");
    assert_eq!(input.size(), 5);
    assert_eq!(input.mode(), "0644");

    let mut content = Vec::new();
    input.read_to_end(&mut content).unwrap();
    assert_eq!(content, b"world");
    input.finish().unwrap();

    pusher.join().unwrap().unwrap();
}

#[test]
fn recursive_tree_push_pull() {
    let (push_end, pull_end) = UnixStream::pair().unwrap();

    let pusher = thread::spawn(move || -> rscp::Result<()> {
        let mut conn = ScpConnection::new(push_end, Direction::To, CopyMode::Recursive)?;
        conn.put_entry(&ScpEntry::directory("project")?)?;
        conn.put_entry(&ScpEntry::file("readme.md", 5)?)?;
        conn.write_data(b"hello")?;
        conn.put_entry(&ScpEntry::file_with_mode("run.sh", 3, "755")?)?;
        conn.write_data(b"ok\n")?;
        conn.put_entry(&ScpEntry::end_of_directory())?;
        conn.finish()
    });

    let mut input = ScpInputStream::new(pull_end, CopyMode::Recursive).unwrap();
    let mut seen = Vec::new();
    let mut payloads = Vec::new();
    while let Some(entry) = input.next_entry().unwrap() {
        if entry.kind() == EntryKind::File {
            let mut content = Vec::new();
            input.read_to_end(&mut content).unwrap();
            payloads.push(content);
        }
        seen.push(entry);
    }
    input.finish().unwrap();

    assert_eq!(
        seen,
        vec![
            ScpEntry::directory("project").unwrap(),
            ScpEntry::file("readme.md", 5).unwrap(),
            ScpEntry::file_with_mode("run.sh", 3, "755").unwrap(),
            ScpEntry::end_of_directory(),
        ]
    );
    assert_eq!(payloads, vec![b"hello".to_vec(), b"ok\n".to_vec()]);

    pusher.join().unwrap().unwrap();
}

#[test]
fn pull_side_reports_short_read_on_close() {
    let (push_end, pull_end) = UnixStream::pair().unwrap();

    let pusher = thread::spawn(move || {
        let mut conn =
            ScpConnection::new(push_end, Direction::To, CopyMode::FileOnly).unwrap();
        conn.put_entry(&ScpEntry::file("f", 4).unwrap()).unwrap();
        conn.write_data(b"data").unwrap();
        // The puller abandons the entry, so completion may fail midway.
        let _ = conn.finish();
    });

    let mut conn = ScpConnection::new(pull_end, Direction::From, CopyMode::FileOnly).unwrap();
    conn.next_entry().unwrap().expect("file entry");
    let mut buf = [0u8; 2];
    conn.read_data(&mut buf).unwrap();
    let err = conn.finish().unwrap_err();
    assert!(matches!(
        err,
        rscp::ScpError::ShortTransfer {
            expected: 4,
            actual: 2
        }
    ));

    // Closing our end unblocks the pusher's wait for the completion ack.
    drop(conn);
    pusher.join().unwrap();
}
