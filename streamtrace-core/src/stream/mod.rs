//! Host-side view of an in-flight stream
//!
//! The trace filter never owns these types; the host pipeline hands them to
//! the hooks by reference on every event.

pub mod analyzer;
pub mod channel;

pub use analyzer::{AnalyzerMask, AnalyzerPhase};
pub use channel::{Channel, Direction};

use std::fmt;

/// Protocol a proxy section runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    Tcp,
    Http,
}

/// A frontend or backend section of the proxy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    pub id: String,
    pub mode: ProxyMode,
}

impl Proxy {
    pub fn new(id: impl Into<String>, mode: ProxyMode) -> Self {
        Self { id: id.into(), mode }
    }
}

/// How the stream's data is carried through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// Raw byte stream
    Tcp,
    /// HTTP kept as a contiguous buffer plus header index
    LegacyHttp,
    /// HTTP carried as a typed block list
    Http,
}

impl PipelineMode {
    pub fn label(self) -> &'static str {
        match self {
            PipelineMode::Tcp => "TCP",
            PipelineMode::LegacyHttp => "HTTP-RAW",
            PipelineMode::Http => "HTTP",
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// An in-flight stream: identity, routing state and both channels
#[derive(Debug, Clone)]
pub struct Stream {
    pub uniq_id: u32,
    pub frontend: Proxy,
    pub backend: Option<Proxy>,
    /// Whether HTTP traffic uses the structured block representation
    pub structured: bool,
    pub req: Channel,
    pub res: Channel,
}

impl Stream {
    pub fn new(uniq_id: u32, frontend: Proxy, structured: bool, capacity: usize) -> Self {
        Self {
            uniq_id,
            frontend,
            backend: None,
            structured,
            req: Channel::new(Direction::Request, capacity),
            res: Channel::new(Direction::Response, capacity),
        }
    }

    pub fn channel(&self, direction: Direction) -> &Channel {
        match direction {
            Direction::Request => &self.req,
            Direction::Response => &self.res,
        }
    }

    pub fn channel_mut(&mut self, direction: Direction) -> &mut Channel {
        match direction {
            Direction::Request => &mut self.req,
            Direction::Response => &mut self.res,
        }
    }

    pub fn set_backend(&mut self, backend: Proxy) {
        self.backend = Some(backend);
    }

    pub fn backend_assigned(&self) -> bool {
        self.backend.is_some()
    }

    /// The proxy currently in charge: the backend once assigned
    pub fn active_proxy(&self) -> &Proxy {
        self.backend.as_ref().unwrap_or(&self.frontend)
    }

    pub fn mode(&self) -> PipelineMode {
        match (self.active_proxy().mode, self.structured) {
            (ProxyMode::Tcp, _) => PipelineMode::Tcp,
            (ProxyMode::Http, true) => PipelineMode::Http,
            (ProxyMode::Http, false) => PipelineMode::LegacyHttp,
        }
    }

    /// `frontend` until a backend is assigned, `backend` afterwards
    pub fn position(&self) -> &'static str {
        if self.backend_assigned() {
            "backend"
        } else {
            "frontend"
        }
    }
}
