//! Unit tests for the clap root commander

use std::sync::{Arc, Mutex};

use clap::{Arg, Command};
use portico::ClapRootCommander;
use portico_plugin_api::Error;
use portico_plugin_api::core_services::RootCommandDispatcher;

fn commander_with_echo(seen: &Arc<Mutex<Vec<String>>>) -> ClapRootCommander {
    let commander = ClapRootCommander::new("portico");
    let seen = Arc::clone(seen);
    commander
        .add_command(
            Command::new("echo").arg(Arg::new("text").required(true)),
            move |matches| {
                let text = matches.get_one::<String>("text").cloned().unwrap_or_default();
                seen.lock().unwrap().push(text);
                async { Ok(()) }
            },
        )
        .unwrap();
    commander
}

/// Test that arguments reach the matching command handler
#[tokio::test]
async fn test_dispatch_runs_handler() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let commander = commander_with_echo(&seen);

    commander
        .dispatch(vec!["echo".into(), "hello".into()])
        .await
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec!["hello"]);
}

/// Test that usage errors carry clap's non-zero exit code
#[tokio::test]
async fn test_unknown_command_is_usage_error() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let commander = commander_with_echo(&seen);

    let err = commander.dispatch(vec!["frobnicate".into()]).await.unwrap_err();
    assert_eq!(err.exit_code, 2);
    assert!(seen.lock().unwrap().is_empty());
}

/// Test that a bare invocation is a help exit listing the commands
#[tokio::test]
async fn test_no_args_shows_help() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let commander = commander_with_echo(&seen);

    let err = commander.dispatch(Vec::new()).await.unwrap_err();
    assert_eq!(err.exit_code, 0);
    assert!(err.message.contains("echo"));
    assert!(seen.lock().unwrap().is_empty());
}

/// Test that help output is a regular exit
#[tokio::test]
async fn test_help_exits_with_zero() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let commander = commander_with_echo(&seen);

    let err = commander.dispatch(vec!["--help".into()]).await.unwrap_err();
    assert_eq!(err.exit_code, 0);
}

/// Test that handler failures map to exit code 1
#[tokio::test]
async fn test_handler_failure() {
    let commander = ClapRootCommander::new("portico");
    commander
        .add_command(Command::new("fail"), |_| async { Err(Error::init("disk full")) })
        .unwrap();

    let err = commander.dispatch(vec!["fail".into()]).await.unwrap_err();
    assert_eq!(err.exit_code, 1);
    assert_eq!(err.message, "Command 'fail' failed: disk full");
}

/// Test that command names are unique
#[test]
fn test_duplicate_command_rejected() {
    let commander = ClapRootCommander::new("portico");
    commander.add_command(Command::new("sync"), |_| async { Ok(()) }).unwrap();
    let err = commander
        .add_command(Command::new("sync"), |_| async { Ok(()) })
        .unwrap_err();

    assert!(matches!(err, Error::Registration { .. }));
    assert_eq!(commander.command_names(), vec!["sync"]);
}
