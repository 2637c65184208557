//! Operator commands run through the command handler.

mod common;

use std::time::Duration;

use acfunlive::commands::CommandHandler;
use common::{Harness, wait_until};

const WAIT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_add_and_delete_danmu_leaves_no_state() {
    let h = Harness::new(Vec::new());
    h.client.set_name(100, "Frank");
    let handler = CommandHandler::new(h.services.clone());

    assert_eq!(handler.handle("adddanmu", &["100"]).await, "true");
    let frank = h.services.registry.get(100).unwrap();
    assert_eq!(frank.name, "Frank");
    assert!(frank.danmu);

    assert_eq!(handler.handle("deldanmu", &["100"]).await, "true");
    assert!(!h.services.registry.contains(100));
    assert!(h.services.states.is_empty());
}

#[tokio::test]
async fn test_add_unknown_uid_is_rejected() {
    let h = Harness::new(Vec::new());
    let handler = CommandHandler::new(h.services.clone());

    assert_eq!(handler.handle("addrecord", &["404"]).await, "false");
    assert!(h.services.registry.is_empty());
}

#[tokio::test]
async fn test_malformed_arguments_are_rejected() {
    let h = Harness::new(Vec::new());
    let handler = CommandHandler::new(h.services.clone());

    assert_eq!(handler.handle("adddanmu", &["abc"]).await, "");
    assert_eq!(handler.handle("adddanmu", &["0"]).await, "");
    assert_eq!(handler.handle("nosuchcommand", &[]).await, "");
    assert!(handler.handle("help", &[]).await.contains("startdanmu"));
}

#[tokio::test]
async fn test_startdanmu_names_file_and_stops() {
    let h = Harness::new(Vec::new());
    h.client.set_name(7, "Grace");
    h.client.set_live(7, "g-1", "Evening Stream");
    h.client.hold_feeds(true);
    let handler = CommandHandler::new(h.services.clone());

    assert_eq!(handler.handle("startdanmu", &["7"]).await, "true");
    assert_eq!(handler.handle("startdanmu", &["7"]).await, "false");

    let states = h.services.states.clone();
    assert!(
        wait_until(WAIT, || {
            states
                .get(7)
                .and_then(|s| s.danmu)
                .is_some_and(|d| d.info.path.is_some())
        })
        .await
    );
    let path = states.get(7).unwrap().danmu.unwrap().info.path.unwrap();
    let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.ends_with(" Grace Evening Stream.ass"), "{file_name}");
    assert!(file_name.chars().next().unwrap().is_ascii_digit());

    let listed = handler.handle("listdanmu", &[]).await;
    assert!(listed.contains("Evening Stream"));

    assert_eq!(handler.handle("stopdanmu", &["7"]).await, "true");
    assert!(wait_until(WAIT, || !states.contains(7)).await);
    assert_eq!(handler.handle("stopdanmu", &["7"]).await, "false");
    assert!(path.exists());
}

#[tokio::test]
async fn test_startrecord_requires_live_stream() {
    let h = Harness::new(Vec::new());
    h.client.set_name(8, "Heidi");
    let handler = CommandHandler::new(h.services.clone());

    assert_eq!(handler.handle("startrecord", &["8"]).await, "false");
    assert!(h.launcher.launches().is_empty());

    h.client.set_live(8, "h-1", "Now live");
    assert_eq!(handler.handle("startrecord", &["8"]).await, "true");
    let launcher = h.launcher.clone();
    assert!(wait_until(WAIT, || launcher.launches().len() == 1).await);
    assert_eq!(launcher.launches()[0].0, "https://flv.example/h-1.flv");

    let listed = handler.handle("listrecord", &[]).await;
    assert!(listed.contains("Heidi"));

    assert_eq!(handler.handle("stoprecord", &["8"]).await, "true");
    let states = h.services.states.clone();
    assert!(wait_until(WAIT, || !states.contains(8)).await);
    assert_eq!(launcher.quit_bytes(), 1);
}

#[tokio::test]
async fn test_getdlurl_returns_both_urls() {
    let h = Harness::new(Vec::new());
    h.client.set_name(11, "Ivan");
    let handler = CommandHandler::new(h.services.clone());

    let offline: Vec<String> = serde_json::from_str(&handler.handle("getdlurl", &["11"]).await).unwrap();
    assert_eq!(offline, vec![String::new(), String::new()]);

    h.client.set_live(11, "i-1", "Ivan live");
    let live: Vec<String> = serde_json::from_str(&handler.handle("getdlurl", &["11"]).await).unwrap();
    assert_eq!(live, vec!["https://hls.example/i-1.m3u8", "https://flv.example/i-1.flv"]);
}

#[tokio::test]
async fn test_quit_command_reaches_the_bus() {
    let mut h = Harness::new(Vec::new());
    let handler = CommandHandler::new(h.services.clone());

    assert_eq!(handler.handle("quit", &[]).await, "true");
    let msg = h.receiver.as_mut().unwrap().recv().await.unwrap();
    assert_eq!(msg, acfunlive::control::ControlMessage::quit());
}
