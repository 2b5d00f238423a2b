//! Card session polling.
//!
//! A [`CardSession`] owns one background worker thread that repeatedly
//! connects to a single reader, identifies whatever card shows up, reports
//! arrival and removal to an [`EventSink`], and watches for the reader
//! itself disappearing. The worker is stopped cooperatively: on shutdown it
//! finishes the poll it is in and exits at the next loop head.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc, Mutex,
    },
    thread,
    time::Duration,
};

use tracing::{debug, trace, warn, Level};

use crate::{
    atr::CardKind,
    mifare::{self, AuthResult},
    reader::{self, StartError},
    subsystem::{CardConnection, CardFault, CardSubsystem},
};

/// Identity reported for a readable card whose record is empty.
pub const GUEST_IDENTITY: &str = "GUEST";

/// What the worker observed at the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardEvent {
    /// A card was connected and its identity record decoded.
    CardArrived { identity: String },
    /// The connected card left the reader.
    CardRemoved,
    /// The reader itself went away; the worker has shut down.
    ReaderStopped,
}

/// Receives worker events. Calls arrive on the worker thread, so
/// implementations should hand off rather than block.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink {
    fn on_card_arrived(&self, identity: &str);
    fn on_card_removed(&self);
    fn on_reader_stopped(&self);
}

impl EventSink for mpsc::Sender<CardEvent> {
    fn on_card_arrived(&self, identity: &str) {
        let _ = self.send(CardEvent::CardArrived {
            identity: identity.to_owned(),
        });
    }

    fn on_card_removed(&self) {
        let _ = self.send(CardEvent::CardRemoved);
    }

    fn on_reader_stopped(&self) {
        let _ = self.send(CardEvent::ReaderStopped);
    }
}

/// Session tuning. The defaults match the polling cadence the listener has
/// always used; tests shrink the intervals to zero.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Reader to poll. Empty selects the first reader enumerated.
    pub reader_name: String,
    /// Delay before each connect attempt and between card status polls.
    pub poll_interval: Duration,
    /// Pause after reading a card and after losing one, so a human tap
    /// registers once rather than repeatedly.
    pub settle_delay: Duration,
    /// Longest identity record the session will decode, in bytes.
    pub max_record_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reader_name: String::new(),
            poll_interval: Duration::from_millis(250),
            settle_delay: Duration::from_millis(1500),
            max_record_len: 256,
        }
    }
}

/// A running poll of one reader.
///
/// Dropping the session stops the worker and waits for it to exit.
pub struct CardSession {
    reader_name: String,
    polling: Arc<AtomicBool>,
    current_user: Arc<Mutex<Option<String>>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl CardSession {
    /// Resolves the configured reader and spawns the polling worker.
    ///
    /// Fails when no readers are attached, when the named reader is not
    /// among them, or when the thread cannot be spawned. The subsystem and
    /// sink move to the worker and are released when it exits.
    pub fn start<S, E>(subsystem: S, sink: E, config: SessionConfig) -> Result<Self, StartError>
    where
        S: CardSubsystem + Send + 'static,
        E: EventSink + Send + 'static,
    {
        let names = subsystem
            .reader_names()
            .map_err(|_| StartError::NoReadersFound)?;
        let reader_name = reader::select_reader(&names, &config.reader_name)?;
        debug!(reader = %reader_name, "starting card session");

        let polling = Arc::new(AtomicBool::new(true));
        let current_user = Arc::new(Mutex::new(None));

        let worker = Worker {
            subsystem,
            sink,
            config,
            reader_name: reader_name.clone(),
            polling: Arc::clone(&polling),
            current_user: Arc::clone(&current_user),
        };
        let worker = thread::Builder::new()
            .name("card-session".to_owned())
            .spawn(move || worker.run())
            .map_err(|_| StartError::PollingThreadFailed)?;

        Ok(Self {
            reader_name,
            polling,
            current_user,
            worker: Some(worker),
        })
    }

    /// The reader this session polls.
    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    /// Identity of the card currently announced, if any.
    pub fn current_user(&self) -> Option<String> {
        lock_user(&self.current_user).clone()
    }

    /// Whether the worker is still polling.
    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::SeqCst)
    }

    /// Stops the worker and waits for it to exit. The worker finishes the
    /// poll it is in, so this can take up to one poll interval.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.polling.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("card session worker panicked");
            }
        }
    }
}

impl Drop for CardSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for CardSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardSession")
            .field("reader_name", &self.reader_name)
            .field("polling", &self.is_polling())
            .finish()
    }
}

fn lock_user(user: &Mutex<Option<String>>) -> std::sync::MutexGuard<'_, Option<String>> {
    user.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

struct Worker<S: CardSubsystem, E> {
    subsystem: S,
    sink: E,
    config: SessionConfig,
    reader_name: String,
    polling: Arc<AtomicBool>,
    current_user: Arc<Mutex<Option<String>>>,
}

impl<S: CardSubsystem, E: EventSink> Worker<S, E> {
    fn run(self) {
        while self.polling.load(Ordering::SeqCst) {
            let Some(mut card) = self.connect_card() else {
                continue;
            };

            if let Some(identity) = self.read_identity(&mut card) {
                self.set_user(Some(identity.clone()));
                self.sink.on_card_arrived(&identity);
            }
            self.pause(self.config.settle_delay);

            self.watch_card(&card);
            drop(card);
            self.pause(self.config.settle_delay);
        }
        debug!(reader = %self.reader_name, "card session worker exiting");
    }

    /// Waits for a card, one connect attempt per poll interval. Returns
    /// `None` when polling was stopped or the reader went away.
    fn connect_card(&self) -> Option<S::Card> {
        loop {
            self.pause(self.config.poll_interval);
            if !self.polling.load(Ordering::SeqCst) {
                return None;
            }
            match self.subsystem.connect(&self.reader_name) {
                Ok(card) => {
                    debug!(
                        reader = %self.reader_name,
                        protocol = ?card.protocol(),
                        "card connected"
                    );
                    return Some(card);
                }
                Err(CardFault::ReaderGone) => {
                    self.stop_with_reader_gone();
                    return None;
                }
                Err(fault) => trace!(reader = %self.reader_name, "no card yet: {fault}"),
            }
        }
    }

    /// Identifies the card and decodes its record. Classic cards must pass
    /// sector authentication first; NTAG tags are read directly. Returns
    /// `None` for unrecognized or unreadable cards.
    fn read_identity(&self, card: &mut S::Card) -> Option<String> {
        let atr = match card.atr() {
            Ok(atr) => atr,
            Err(fault) => {
                debug!(reader = %self.reader_name, "could not fetch ATR: {fault}");
                return None;
            }
        };

        let readable = match CardKind::from_atr(&atr) {
            CardKind::MifareClassic1k => match mifare::authenticate(card) {
                AuthResult::Authenticated(key) => {
                    trace!("sector authenticated with {key:?}");
                    true
                }
                AuthResult::Failed => {
                    debug!("card refused sector authentication");
                    false
                }
            },
            CardKind::Ntag203 => true,
            CardKind::Unspecified => {
                debug!(atr = %hex::encode(&atr), "unrecognized card");
                false
            }
        };
        if !readable {
            return None;
        }

        if tracing::enabled!(Level::TRACE) {
            mifare::dump_card(card);
        }

        let record = mifare::read_record(card, self.config.max_record_len);
        if record.is_empty() {
            Some(GUEST_IDENTITY.to_owned())
        } else {
            Some(record)
        }
    }

    /// Polls the connected card until it is removed, the reader goes away,
    /// or polling stops. Transient faults reconnect without an event.
    fn watch_card(&self, card: &S::Card) {
        while self.polling.load(Ordering::SeqCst) {
            self.pause(self.config.poll_interval);
            match card.status() {
                Ok(()) => {}
                Err(CardFault::Removed) => {
                    self.set_user(None);
                    self.sink.on_card_removed();
                    return;
                }
                Err(CardFault::ReaderGone) => {
                    self.stop_with_reader_gone();
                    return;
                }
                Err(fault) => {
                    debug!(reader = %self.reader_name, "card status failed: {fault}");
                    self.set_user(None);
                    return;
                }
            }
        }
    }

    fn stop_with_reader_gone(&self) {
        warn!(reader = %self.reader_name, "reader is gone, stopping session");
        self.set_user(None);
        self.polling.store(false, Ordering::SeqCst);
        self.sink.on_reader_stopped();
    }

    fn set_user(&self, identity: Option<String>) {
        *lock_user(&self.current_user) = identity;
    }

    /// Sleeps unless polling has already stopped, keeping worst-case
    /// shutdown latency to one interval.
    fn pause(&self, interval: Duration) {
        if self.polling.load(Ordering::SeqCst) {
            thread::sleep(interval);
        }
    }
}
