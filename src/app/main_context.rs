// SPDX-License-Identifier: GPL-3.0-only

//! Serial execution context for everything the host can observe
//!
//! Observer callbacks, overlay replacement and result-driven state changes
//! all run as tasks on one dedicated thread, in the order they were posted.
//! Background workers never touch that state directly; they post a task.

use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Task),
    Shutdown,
}

/// Owner of the main context thread
pub struct MainContext {
    handle: MainContextHandle,
    thread: Option<JoinHandle<()>>,
}

/// Cheap, cloneable handle for posting tasks
#[derive(Clone)]
pub struct MainContextHandle {
    sender: mpsc::UnboundedSender<Message>,
    thread_id: Option<ThreadId>,
}

impl MainContext {
    pub fn new(name: &str) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Message>();
        let thread_name = name.to_string();

        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!(name = %thread_name, "Main context started");
                while let Some(message) = receiver.blocking_recv() {
                    match message {
                        Message::Run(task) => task(),
                        Message::Shutdown => break,
                    }
                }
                debug!(name = %thread_name, "Main context exiting");
            });

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(name, error = %e, "Failed to spawn main context thread");
                None
            }
        };

        let thread_id = thread.as_ref().map(|h| h.thread().id());
        Self {
            handle: MainContextHandle { sender, thread_id },
            thread,
        }
    }

    pub fn handle(&self) -> MainContextHandle {
        self.handle.clone()
    }

    /// Run the tasks already queued, then stop the thread
    pub fn shutdown(&mut self) {
        let _ = self.handle.sender.send(Message::Shutdown);
        if let Some(thread) = self.thread.take() {
            if self.handle.is_current() {
                return;
            }
            if thread.join().is_err() {
                warn!("Main context thread panicked");
            }
        }
    }
}

impl Drop for MainContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl MainContextHandle {
    /// Queue a task; tasks posted after shutdown are dropped
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Message::Run(Box::new(task))).is_err() {
            trace!("Main context gone, dropping task");
        }
    }

    /// Whether the caller is running on the main context thread
    pub fn is_current(&self) -> bool {
        self.thread_id == Some(thread::current().id())
    }

    /// Block until every task posted before this call has run
    ///
    /// Returns immediately when called from the main context itself.
    pub fn flush(&self) {
        if self.is_current() {
            return;
        }
        // std channel: tokio's blocking_recv panics inside a runtime
        let (done_tx, done_rx) = std_mpsc::channel();
        self.post(move || {
            let _ = done_tx.send(());
        });
        let _ = done_rx.recv();
    }
}
