//! Shared utilities for endpoint integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use receive_endpoint::pipeline::{PipeError, ReceiveContext, SharedPipe};
use receive_endpoint::{Deadline, InputAddress, ReceiveTransport, TransportError, TransportHandle};

pub const BIND_ADDRESS: &str = "127.0.0.1:1";

/// What the recording transport saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(u32),
    StartFailed,
    /// `stopping_observed` is whether the receive pipe already rejected new work.
    StopCalled { id: u32, stopping_observed: bool },
    StopFinished(u32),
    StopTimedOut(u32),
    Disposed(u32),
}

/// Knobs for the recording transport.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    pub fail_start: bool,
    pub stop_delay: Duration,
    pub stop_error: bool,
    /// Finish the stop cleanly when the deadline expires instead of failing.
    pub yield_on_deadline: bool,
    pub dispose_error: bool,
}

/// Transport double recording every call it receives.
pub struct RecordingTransport {
    address: InputAddress,
    behavior: Behavior,
    log: Arc<Mutex<Vec<Event>>>,
    pipes: Mutex<Vec<SharedPipe>>,
    next_id: AtomicU32,
}

impl RecordingTransport {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            address: address(),
            behavior,
            log: Arc::new(Mutex::new(Vec::new())),
            pipes: Mutex::new(Vec::new()),
            next_id: AtomicU32::new(0),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.log.lock().unwrap().iter().filter(|e| pred(e)).count()
    }

    /// The receive pipe handed to the `n`th start.
    pub fn pipe(&self, n: usize) -> SharedPipe {
        self.pipes.lock().unwrap()[n].clone()
    }

    /// Push a message through the `n`th receive pipe, as the receive loop would.
    pub async fn deliver(&self, n: usize, body: &str) -> Result<(), PipeError> {
        let pipe = self.pipe(n);
        let mut ctx = ReceiveContext::new(self.address.clone(), body);
        pipe.send(&mut ctx).await
    }
}

impl ReceiveTransport for RecordingTransport {
    type Handle = RecordingHandle;

    fn input_address(&self) -> &InputAddress {
        &self.address
    }

    async fn start(&self, pipe: SharedPipe) -> Result<RecordingHandle, TransportError> {
        if self.behavior.fail_start {
            self.log.lock().unwrap().push(Event::StartFailed);
            return Err(TransportError::Bind {
                address: BIND_ADDRESS.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(Event::Started(id));
        self.pipes.lock().unwrap().push(pipe.clone());

        Ok(RecordingHandle {
            id,
            address: self.address.clone(),
            pipe,
            behavior: self.behavior.clone(),
            log: Arc::clone(&self.log),
        })
    }
}

pub struct RecordingHandle {
    id: u32,
    address: InputAddress,
    pipe: SharedPipe,
    behavior: Behavior,
    log: Arc<Mutex<Vec<Event>>>,
}

impl RecordingHandle {
    fn record(&self, event: Event) {
        self.log.lock().unwrap().push(event);
    }
}

impl TransportHandle for RecordingHandle {
    async fn stop(&mut self, deadline: Deadline) -> Result<(), TransportError> {
        let mut sample = ReceiveContext::new(self.address.clone(), "sample");
        let stopping_observed = matches!(self.pipe.send(&mut sample).await, Err(PipeError::Stopping(_)));
        self.record(Event::StopCalled {
            id: self.id,
            stopping_observed,
        });

        tokio::select! {
            _ = tokio::time::sleep(self.behavior.stop_delay) => {}
            _ = deadline.expired() => {
                self.record(Event::StopTimedOut(self.id));
                if self.behavior.yield_on_deadline {
                    return Ok(());
                }
                return Err(TransportError::DeadlineExpired { in_flight: 1 });
            }
        }

        if self.behavior.stop_error {
            return Err(TransportError::Release("queue delete failed".into()));
        }

        self.record(Event::StopFinished(self.id));
        Ok(())
    }

    fn dispose(&mut self) -> Result<(), TransportError> {
        self.record(Event::Disposed(self.id));
        if self.behavior.dispose_error {
            return Err(TransportError::Release("consumer cancel rejected".into()));
        }
        Ok(())
    }
}

pub fn address() -> InputAddress {
    InputAddress::parse("loopback://localhost/orders").unwrap()
}
