use std::sync::mpsc;

use presence_rs::{CardSession, PcscSubsystem, SessionConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let subsystem = PcscSubsystem::new().expect("card service unavailable");
    let (sink, events) = mpsc::channel();
    let session =
        CardSession::start(subsystem, sink, SessionConfig::default()).expect("session start");

    println!("watching {:?}", session.reader_name());
    for event in events {
        println!("{:?}", event);
        println!("current user: {:?}", session.current_user());
    }
}
