//! Console control channel
//!
//! Two background threads keep the console away from the playback loop:
//!
//! - the input thread blocks on line reads and publishes every completed line
//!   through the input pair (mutex + condvar)
//! - the output thread writes text handed over through the output pair, one
//!   message at a time
//!
//! The foreground only ever takes the input lock for a snapshot, so
//! [`ControlSignalChannel::key_toggled`] never waits on the console.
//!
//! While the channel is not `Ready` every operation talks to the console
//! directly instead (degraded mode).

use super::console::{LineSource, StdinLines};
use super::{lock, wait};
use crate::error::{Error, Result};
use crate::playback::ToggleSource;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Lifecycle of the background threads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    NotReady,
    Starting,
    Ready,
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ControlState::NotReady => "console channel is not ready",
            ControlState::Starting => "console channel is starting",
            ControlState::Ready => "console channel is ready",
        };
        f.write_str(text)
    }
}

/// Last line read by the input thread
#[derive(Default)]
struct InputSlot {
    text: String,
    /// Consumed by `key_toggled`
    key_pending: bool,
    /// Consumed by `read_line`
    line_pending: bool,
    /// Input reached end of file or failed
    closed: bool,
}

/// Text waiting for the output thread
#[derive(Default)]
struct OutputSlot {
    text: String,
    changed: bool,
}

struct SharedChannelState {
    input: Mutex<InputSlot>,
    input_cond: Condvar,
    output: Mutex<OutputSlot>,
    output_cond: Condvar,
    stop_flag: AtomicBool,
    /// Bumped on every open; a detached input thread from an earlier
    /// session exits once it notices the change
    generation: AtomicU64,
}

type SharedReader = Arc<Mutex<Box<dyn LineSource>>>;
type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Launches a named background thread
type Spawner = fn(&str, Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>>;

fn spawn_named(name: &str, body: Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name(name.to_string()).spawn(body)
}

/// Non-blocking key detection plus serialized console output.
///
/// One instance lives for the whole process and is shared by `Arc`.
pub struct ControlSignalChannel {
    state: Mutex<ControlState>,
    last_error: Mutex<Option<String>>,
    shared: Arc<SharedChannelState>,
    reader: SharedReader,
    writer: SharedWriter,
    output_thread: Mutex<Option<JoinHandle<()>>>,
    spawner: Spawner,
}

impl ControlSignalChannel {
    /// Channel on the process's stdin / stdout
    pub fn new() -> Self {
        Self::with_io(Box::new(StdinLines), Box::new(io::stdout()))
    }

    /// Channel on arbitrary line input and text output
    pub fn with_io(reader: Box<dyn LineSource>, writer: Box<dyn Write + Send>) -> Self {
        Self {
            state: Mutex::new(ControlState::NotReady),
            last_error: Mutex::new(None),
            shared: Arc::new(SharedChannelState {
                input: Mutex::new(InputSlot::default()),
                input_cond: Condvar::new(),
                output: Mutex::new(OutputSlot::default()),
                output_cond: Condvar::new(),
                stop_flag: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
            output_thread: Mutex::new(None),
            spawner: spawn_named,
        }
    }

    #[cfg(test)]
    fn with_spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn state(&self) -> ControlState {
        *lock(&self.state)
    }

    /// Reason of the last failed `open()`
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    /// Start both background threads.
    ///
    /// No-op unless the channel is `NotReady`.
    ///
    /// # Errors
    /// `ThreadStart` if a thread cannot be spawned; anything already started
    /// is torn down again and the channel stays `NotReady`.
    pub fn open(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if *state != ControlState::NotReady {
            debug!("open() ignored: {}", *state);
            return Ok(());
        }
        *state = ControlState::Starting;

        self.shared.stop_flag.store(false, Ordering::SeqCst);
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut slot = lock(&self.shared.output);
            slot.changed = false;
            slot.text.clear();
        }
        lock(&self.shared.input).closed = false;

        let (ready_tx, ready_rx) = mpsc::channel::<()>();

        let output_handle = {
            let shared = Arc::clone(&self.shared);
            let writer = Arc::clone(&self.writer);
            let ready = ready_tx.clone();
            (self.spawner)(
                "console-output",
                Box::new(move || {
                    let _ = ready.send(());
                    output_loop(shared, writer);
                }),
            )
        };
        let output_handle = match output_handle {
            Ok(handle) => handle,
            Err(e) => {
                *state = ControlState::NotReady;
                return Err(self.start_failed(format!("output thread could not start: {}", e)));
            }
        };

        let input_handle = {
            let shared = Arc::clone(&self.shared);
            let reader = Arc::clone(&self.reader);
            (self.spawner)(
                "console-input",
                Box::new(move || {
                    let _ = ready_tx.send(());
                    input_loop(shared, reader, generation);
                }),
            )
        };
        if let Err(e) = input_handle {
            self.stop_output_thread(output_handle);
            *state = ControlState::NotReady;
            return Err(self.start_failed(format!("input thread could not start: {}", e)));
        }
        // The input thread stays detached: it is parked in a blocking read
        // that nothing can interrupt.

        for _ in 0..2 {
            if ready_rx.recv().is_err() {
                self.stop_output_thread(output_handle);
                *state = ControlState::NotReady;
                return Err(self.start_failed("console thread exited during startup".to_string()));
            }
        }

        *lock(&self.output_thread) = Some(output_handle);
        *lock(&self.last_error) = None;
        *state = ControlState::Ready;
        info!("Console channel ready");
        Ok(())
    }

    /// Stop the output thread, flushing pending text. Idempotent.
    pub fn close(&self) {
        let mut state = lock(&self.state);
        if *state == ControlState::NotReady {
            return;
        }

        if let Some(handle) = lock(&self.output_thread).take() {
            self.stop_output_thread(handle);
        } else {
            self.raise_stop_flag();
        }
        {
            // Under the lock, so a `read_line` about to wait cannot miss it
            let _slot = lock(&self.shared.input);
            self.shared.input_cond.notify_all();
        }

        let pending = {
            let mut slot = lock(&self.shared.output);
            if slot.changed {
                slot.changed = false;
                Some(std::mem::take(&mut slot.text))
            } else {
                None
            }
        };
        if let Some(text) = pending {
            if let Err(e) = self.write_direct(&text) {
                warn!("Failed to flush console output on close: {}", e);
            }
        }

        *state = ControlState::NotReady;
        info!("Console channel closed");
    }

    /// `true` if a line was completed since the previous call. Never waits
    /// while `Ready`; in degraded mode blocks for one line and reports it.
    pub fn key_toggled(&self) -> bool {
        if self.state() != ControlState::Ready {
            return match self.read_direct() {
                Ok(Some(_)) => true,
                Ok(None) => false,
                Err(e) => {
                    warn!("Console read failed: {}", e);
                    false
                }
            };
        }

        let mut slot = lock(&self.shared.input);
        std::mem::take(&mut slot.key_pending)
    }

    /// Block until the next line is available.
    ///
    /// # Errors
    /// `Io` if the console input is closed or cannot be read.
    pub fn read_line(&self) -> Result<String> {
        if self.state() == ControlState::Ready {
            let mut slot = lock(&self.shared.input);
            while !slot.line_pending && !slot.closed && !self.shared.stop_flag.load(Ordering::SeqCst) {
                slot = wait(&self.shared.input_cond, slot);
            }
            if slot.line_pending {
                slot.line_pending = false;
                slot.key_pending = false;
                return Ok(std::mem::take(&mut slot.text));
            }
            if slot.closed {
                return Err(input_closed());
            }
        }

        self.read_direct()?.ok_or_else(input_closed)
    }

    /// Read a line and parse it as a number.
    ///
    /// # Errors
    /// `InvalidInput` if the line is not a number, plus the `read_line` errors.
    pub fn read_number(&self) -> Result<f64> {
        let line = self.read_line()?;
        let trimmed = line.trim();
        trimmed
            .parse::<f64>()
            .map_err(|_| Error::InvalidInput(format!("'{}' is not a number", trimmed)))
    }

    /// Hand `text` to the output thread, waiting while a previous message is
    /// still being written.
    pub fn write_text(&self, text: &str) -> Result<()> {
        if self.state() == ControlState::Ready {
            let mut slot = lock(&self.shared.output);
            while slot.changed && !self.shared.stop_flag.load(Ordering::SeqCst) {
                slot = wait(&self.shared.output_cond, slot);
            }
            if !self.shared.stop_flag.load(Ordering::SeqCst) {
                slot.text.clear();
                slot.text.push_str(text);
                slot.changed = true;
                self.shared.output_cond.notify_all();
                return Ok(());
            }
        }

        self.write_direct(text)
    }

    fn start_failed(&self, message: String) -> Error {
        error!("{}", message);
        *lock(&self.last_error) = Some(message.clone());
        Error::ThreadStart(message)
    }

    /// Set the stop flag while holding the output lock; the output thread
    /// checks it under the same lock before it waits
    fn raise_stop_flag(&self) {
        let _slot = lock(&self.shared.output);
        self.shared.stop_flag.store(true, Ordering::SeqCst);
        self.shared.output_cond.notify_all();
    }

    fn stop_output_thread(&self, handle: JoinHandle<()>) {
        self.raise_stop_flag();
        if handle.join().is_err() {
            error!("Console output thread panicked");
        }
    }

    /// A line the input thread already picked up wins over a fresh read.
    ///
    /// After `close()` the detached input thread may still sit in a read
    /// holding the reader; the line it publishes before letting go is taken
    /// here instead of blocking for another one.
    fn read_direct(&self) -> io::Result<Option<String>> {
        if let Some(text) = self.take_pending_line() {
            return Ok(Some(text));
        }
        let mut reader = lock(&self.reader);
        if let Some(text) = self.take_pending_line() {
            return Ok(Some(text));
        }
        reader.read_line()
    }

    fn take_pending_line(&self) -> Option<String> {
        let mut slot = lock(&self.shared.input);
        if !slot.line_pending {
            return None;
        }
        slot.line_pending = false;
        slot.key_pending = false;
        Some(std::mem::take(&mut slot.text))
    }

    fn write_direct(&self, text: &str) -> Result<()> {
        let mut writer = lock(&self.writer);
        writer.write_all(text.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

impl Default for ControlSignalChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ControlSignalChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl ToggleSource for ControlSignalChannel {
    fn key_toggled(&self) -> bool {
        ControlSignalChannel::key_toggled(self)
    }
}

fn input_closed() -> Error {
    Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "console input closed"))
}

fn input_loop(shared: Arc<SharedChannelState>, reader: SharedReader, generation: u64) {
    debug!("Console input thread started");

    loop {
        // The reader stays locked until the line is published, so a direct
        // read waiting for it finds the line in the slot
        let mut source = lock(&reader);
        let line = source.read_line();
        let mut slot = lock(&shared.input);
        match line {
            Ok(Some(text)) => {
                slot.text = text;
                slot.key_pending = true;
                slot.line_pending = true;
                shared.input_cond.notify_all();
            }
            Ok(None) => {
                debug!("Console input reached end of file");
                slot.closed = true;
                shared.input_cond.notify_all();
                break;
            }
            Err(e) => {
                warn!("Console input failed: {}", e);
                slot.closed = true;
                shared.input_cond.notify_all();
                break;
            }
        }
        drop(slot);
        drop(source);

        if shared.stop_flag.load(Ordering::SeqCst) || shared.generation.load(Ordering::SeqCst) != generation {
            break;
        }
    }

    debug!("Console input thread terminated");
}

fn output_loop(shared: Arc<SharedChannelState>, writer: SharedWriter) {
    debug!("Console output thread started");

    loop {
        let mut slot = lock(&shared.output);
        while !slot.changed && !shared.stop_flag.load(Ordering::SeqCst) {
            slot = wait(&shared.output_cond, slot);
        }
        if !slot.changed {
            break;
        }

        {
            let mut out = lock(&writer);
            if let Err(e) = out.write_all(slot.text.as_bytes()).and_then(|_| out.flush()) {
                warn!("Console output failed: {}", e);
            }
        }
        slot.changed = false;
        slot.text.clear();
        shared.output_cond.notify_all();
    }

    debug!("Console output thread terminated");
}
