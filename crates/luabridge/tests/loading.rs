//! Chunk loading from memory and from files

use luabridge::{Error, LuaType, State, StateOptions};
use std::fs;
use std::pin::Pin;

fn new_state() -> Pin<Box<State>> {
    State::new(StateOptions::default()).expect("failed to create state")
}

#[test]
fn test_load_string_leaves_function() {
    let state = new_state();

    state.load_string("return 1").unwrap();
    assert_eq!(state.top(), 1);
    assert_eq!(state.type_of(-1), LuaType::Function);
}

#[test]
fn test_do_string_result_count() {
    let state = new_state();

    assert_eq!(state.do_string("local x = 1").unwrap(), 0);
    assert_eq!(state.do_string("return 1, 2, 3").unwrap(), 3);
    assert_eq!(state.top(), 3);
}

#[test]
fn test_syntax_error() {
    let state = new_state();

    match state.load_string("return +") {
        Err(Error::Syntax(err)) => assert!(err.message().starts_with("chunk:1:"), "got {}", err),
        other => panic!("expected a syntax error, got {:?}", other),
    }
    assert_eq!(state.top(), 0);
}

#[test]
fn test_custom_chunk_name() {
    let state = State::new(StateOptions::default().with_chunk_name("=init")).unwrap();

    let err = state.do_string("error('bad')").unwrap_err();
    assert!(err.to_string().starts_with("init:1:"), "got {}", err);
}

#[test]
fn test_load_buffer_named() {
    let state = new_state();

    let err = state.load_buffer(b"local = 1", "=buffer").unwrap_err();
    assert!(matches!(err, Error::Syntax(_)));
    assert!(err.to_string().contains("buffer:1:"), "got {}", err);

    state.load_buffer(b"return 'ok'", "=buffer").unwrap();
    state.call(0, 1, 0).unwrap();
    assert_eq!(state.to_string(-1).unwrap(), "ok");
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let state = new_state();

    match state.load_file(dir.path().join("missing.lua")) {
        Err(Error::File(err)) => assert!(err.message().contains("cannot open"), "got {}", err),
        other => panic!("expected a file error, got {:?}", other),
    }
    assert_eq!(state.top(), 0);
}

#[test]
fn test_do_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("script.lua");
    fs::write(&path, "local a = 20\nreturn a + 22\n").unwrap();
    let state = new_state();

    state.load_file(&path).unwrap();
    assert_eq!(state.type_of(-1), LuaType::Function);
    state.pop(1);

    assert_eq!(state.do_file(&path).unwrap(), 1);
    assert_eq!(state.to_integer(-1), Some(42));
}

#[test]
fn test_file_syntax_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.lua");
    fs::write(&path, "function (\n").unwrap();
    let state = new_state();

    let err = state.do_file(&path).unwrap_err();
    assert!(matches!(err, Error::Syntax(_)), "got {:?}", err);
}

#[test]
fn test_file_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fails.lua");
    fs::write(&path, "error('from file', 0)\n").unwrap();
    let state = new_state();

    let err = state.do_file(&path).unwrap_err();
    assert!(matches!(err, Error::Runtime(_)));
    assert_eq!(err.to_string(), "from file");
}
