//! `presence-listener` watches a smart-card reader and toggles user logins as
//! identity cards are tapped. Each card carries a user token; tapping a card
//! logs its user in, tapping it again logs them out. The listener keeps
//! itself armed: if the reader disappears or no reader is attached yet, it
//! waits and tries again.

mod config;
mod flow;
mod log;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread,
};

use clap::Parser;
use presence_rs::{CardEvent, CardSession, PcscSubsystem, StartError};
use tracing::{debug, info, warn};

use crate::{
    config::{Config, EVENT_PUMP_INTERVAL, REARM_INTERVAL},
    flow::{FlowState, LogNotifier},
};

fn main() -> color_eyre::Result<()> {
    let _ = dotenvy::dotenv();
    let config = Config::parse();
    log::setup(&config)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler({
        let shutdown = Arc::clone(&shutdown);
        move || shutdown.store(true, Ordering::SeqCst)
    })?;

    let mut flow = FlowState::new(LogNotifier);
    while !shutdown.load(Ordering::SeqCst) {
        if let Err(e) = listen(&config, &mut flow, &shutdown) {
            warn!("could not start listening: {e}");
        }
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        thread::sleep(REARM_INTERVAL);
    }

    flow.logout();
    info!("exiting");
    Ok(())
}

/// Runs one card session until the reader goes away or shutdown is
/// requested, feeding card taps to the login flow.
fn listen(
    config: &Config,
    flow: &mut FlowState<LogNotifier>,
    shutdown: &AtomicBool,
) -> Result<(), StartError> {
    let subsystem = PcscSubsystem::new()?;
    let (sink, events) = mpsc::channel();
    let session = CardSession::start(subsystem, sink, config.session_config())?;
    info!(reader = session.reader_name(), "listening for cards");

    loop {
        if shutdown.load(Ordering::SeqCst) {
            session.stop();
            return Ok(());
        }
        match events.recv_timeout(EVENT_PUMP_INTERVAL) {
            Ok(CardEvent::CardArrived { identity }) => {
                info!(identity = %identity, "card arrived");
                flow.card_tapped(&identity);
            }
            Ok(CardEvent::CardRemoved) => debug!("card removed"),
            Ok(CardEvent::ReaderStopped) => {
                warn!(reader = session.reader_name(), "reader stopped");
                return Ok(());
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}
