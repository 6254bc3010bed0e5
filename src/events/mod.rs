//! # Events Module
//!
//! Progress reporting for front ends that want to show what a run is doing.
//!
//! ## Design
//! The core library emits events through channels, so a CLI (or anything
//! else) can subscribe and display progress while the engine runs.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Engine(EngineEvent::Output { line }) = event {
//!             eprintln!("{line}");
//!         }
//!     }
//! });
//!
//! let result = pipeline.run_with_events(&request, &sender);
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
