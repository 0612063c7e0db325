// crates/bridge/src/device.rs
//! Reads the receiver's line stream and feeds it through the decoder.
//!
//! The serial port is opened as a plain file (or stdin with `-`), so line
//! settings such as the baud rate must be configured beforehand, e.g.
//! `stty -F /dev/ttyUSB0 9600 raw`.
//!
//! Reads happen on a dedicated OS thread that forwards lines over a channel.
//! A read blocked on an idle port therefore never holds up runtime shutdown;
//! the thread is simply abandoned when the process exits.

use std::io::{self, BufRead, BufReader};
use std::time::Duration;

use anyhow::Context;
use porchlight_core::decoder::{ButtonCallback, Dispatch};
use porchlight_core::EventDecoder;
use tokio::sync::{mpsc, watch};

use crate::bridge::DomainEvent;

/// Lines buffered between the reader thread and the device loop.
const LINE_BUFFER: usize = 64;

/// Line stream from the receiver, filled by a background reader thread.
pub struct DeviceLines {
    rx: mpsc::Receiver<io::Result<String>>,
}

impl DeviceLines {
    /// Start a reader thread over `reader`. The thread stops at EOF, on the
    /// first read error, or once the receiving side is gone.
    pub fn from_reader<R>(reader: R) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        std::thread::Builder::new()
            .name("device-reader".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    let failed = line.is_err();
                    if tx.blocking_send(line).is_err() || failed {
                        break;
                    }
                }
            })?;
        Ok(Self { rx })
    }

    /// Next line; `Ok(None)` once the stream has ended. Cancel-safe.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.rx.recv().await.transpose()
    }
}

/// Open `port`; `-` means stdin.
pub fn open_device(port: &str) -> anyhow::Result<DeviceLines> {
    if port == "-" {
        return DeviceLines::from_reader(BufReader::new(io::stdin()))
            .context("starting stdin reader");
    }
    let file = std::fs::File::open(port).with_context(|| format!("opening device {port}"))?;
    DeviceLines::from_reader(BufReader::new(file))
        .with_context(|| format!("starting reader for {port}"))
}

fn emit(tx: &mpsc::UnboundedSender<DomainEvent>, event: DomainEvent) -> ButtonCallback {
    let tx = tx.clone();
    Box::new(move || {
        if tx.send(event).is_err() {
            tracing::warn!(?event, "Event worker gone, press ignored");
        }
    })
}

/// Button 1 adds, button 2 is reserved, button 3 undoes.
pub fn button_decoder(tx: &mpsc::UnboundedSender<DomainEvent>) -> EventDecoder {
    EventDecoder::new()
        .with_buttons(vec![
            Some(emit(tx, DomainEvent::AddOne)),
            None,
            Some(emit(tx, DomainEvent::UndoLast)),
        ])
        .with_heartbeat(Box::new(|id| tracing::debug!(id, "Receiver heartbeat")))
}

/// Read lines until EOF, a read error, or `stop` turns true. The stop flag
/// is checked at least every `poll_interval`.
pub async fn run_device_loop(
    mut lines: DeviceLines,
    mut decoder: EventDecoder,
    stop: watch::Receiver<bool>,
    poll_interval: Duration,
) -> usize {
    let mut handled = 0;
    loop {
        if *stop.borrow() {
            tracing::info!("Device loop stopping");
            break;
        }
        match tokio::time::timeout(poll_interval, lines.next_line()).await {
            Err(_) => continue,
            Ok(Ok(Some(line))) => {
                if matches!(decoder.handle_line(&line), Dispatch::Button { .. }) {
                    handled += 1;
                }
            }
            Ok(Ok(None)) => {
                tracing::warn!("Device stream closed");
                break;
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Device read failed");
                break;
            }
        }
    }
    handled
}
