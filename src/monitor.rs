//! Resource-usage probe wrapped around each model call.
//!
//! The probe is observational only; adapters log its summary and never act on it.

use std::time::{Duration, Instant};

pub trait ResourceProbe: Send + Sync {
    /// Begin measuring one call.
    fn start(&self) -> Box<dyn ActiveProbe>;
}

pub trait ActiveProbe: Send {
    fn stop(&mut self);
    fn summarize(&self) -> String;
}

/// Measures wall-clock time of a call.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElapsedProbe;

impl ResourceProbe for ElapsedProbe {
    fn start(&self) -> Box<dyn ActiveProbe> {
        Box::new(ElapsedRun {
            started: Instant::now(),
            elapsed: None,
        })
    }
}

struct ElapsedRun {
    started: Instant,
    elapsed: Option<Duration>,
}

impl ActiveProbe for ElapsedRun {
    fn stop(&mut self) {
        if self.elapsed.is_none() {
            self.elapsed = Some(self.started.elapsed());
        }
    }

    fn summarize(&self) -> String {
        let elapsed = self.elapsed.unwrap_or_else(|| self.started.elapsed());
        format!("Response time: {:.2}s", elapsed.as_secs_f64())
    }
}

/// Probe that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProbe;

impl ResourceProbe for NoopProbe {
    fn start(&self) -> Box<dyn ActiveProbe> {
        Box::new(NoopRun)
    }
}

struct NoopRun;

impl ActiveProbe for NoopRun {
    fn stop(&mut self) {}

    fn summarize(&self) -> String {
        String::new()
    }
}
