//! Host-glue tests: the core running against real files via FsStorage.

use tortuga_cli::host::{FsStorage, StdPlatform};
use tortuga_heap::Outcome;
use tortuga_reader::ReadSession;
use tortuga_runtime::io::{SharedWriter, SliceReader};
use tortuga_runtime::{Interp, InterpConfig};

fn interp_in(dir: &std::path::Path) -> (Interp, SharedWriter) {
    let out = SharedWriter::new();
    let it = Interp::new(
        InterpConfig::default(),
        Box::new(SliceReader::new("")),
        Box::new(out.clone()),
        Box::new(FsStorage::new(dir)),
        Box::new(StdPlatform::new()),
    );
    (it, out)
}

fn feed(it: &mut Interp, source: &str) -> Vec<Outcome> {
    let mut session = ReadSession::new();
    let mut outcomes = Vec::new();
    for line in source.lines() {
        match it.feed_line(&mut session, line) {
            Ok(None) => {}
            Ok(Some(out)) => outcomes.push(out),
            Err(e) => outcomes.push(Outcome::Error(Box::new(e))),
        }
    }
    outcomes
}

fn assert_clean(outcomes: &[Outcome]) {
    for out in outcomes {
        assert!(
            matches!(out, Outcome::None | Outcome::Value(_)),
            "unexpected outcome {out:?}"
        );
    }
}

#[test]
fn test_save_then_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let (mut it, _) = interp_in(dir.path());
    let outcomes = feed(
        &mut it,
        "to double :n\noutput sum :n :n\nend\nmake \"x 21\nsave \"ws.lg",
    );
    assert_clean(&outcomes);
    assert!(dir.path().join("ws.lg").exists());

    // A fresh interpreter loads the same workspace back.
    let (mut it2, out2) = interp_in(dir.path());
    let outcomes = feed(&mut it2, "load \"ws.lg\nprint double :x");
    assert_clean(&outcomes);
    assert_eq!(out2.contents(), "42\n");
}

#[test]
fn test_file_streams_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let (mut it, out) = interp_in(dir.path());
    let outcomes = feed(
        &mut it,
        "openwrite \"data.txt\n\
         setwrite \"data.txt\n\
         print \"first\n\
         setwrite []\n\
         close \"data.txt\n\
         openread \"data.txt\n\
         setread \"data.txt\n\
         print readword\n\
         setread []\n\
         close \"data.txt\n\
         erasefile \"data.txt",
    );
    assert_clean(&outcomes);
    assert_eq!(out.contents(), "first\n");
    assert!(!dir.path().join("data.txt").exists());
}

#[test]
fn test_load_missing_file_is_a_logo_error() {
    let dir = tempfile::tempdir().unwrap();
    let (mut it, _) = interp_in(dir.path());
    let outcomes = feed(&mut it, "load \"nothing.lg");
    match outcomes.as_slice() {
        [Outcome::Error(info)] => {
            assert_eq!(
                info.code,
                tortuga_common::errors::ErrorCode::FileNotFound
            );
        }
        other => panic!("expected error, got {other:?}"),
    }
}
