//! Client Registry
//!
//! Tracks the application instances currently open under the agent's
//! scope. Activation claims them; notification interactions focus an
//! existing instance or open a new one.

use alloc::string::String;
use alloc::vec::Vec;

/// One open application instance.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    /// Registry-assigned ID.
    pub id: u64,
    /// URL the instance is showing.
    pub url: String,
    /// Origin of the instance.
    pub origin: String,
    /// Whether this instance is in the foreground.
    pub focused: bool,
    /// Whether the agent controls this instance.
    pub controlled: bool,
}

/// Registry of open application instances.
pub struct ClientRegistry {
    clients: Vec<ClientHandle>,
    next_id: u64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: Vec::new(),
            next_id: 1,
        }
    }

    /// Register a newly opened instance. Returns its ID.
    pub fn add(&mut self, url: impl Into<String>, origin: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.clients.push(ClientHandle {
            id,
            url: url.into(),
            origin: origin.into(),
            focused: false,
            controlled: false,
        });
        id
    }

    /// Remove an instance that closed.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.clients.len();
        self.clients.retain(|c| c.id != id);
        self.clients.len() != before
    }

    /// Look up an instance by ID.
    pub fn get(&self, id: u64) -> Option<&ClientHandle> {
        self.clients.iter().find(|c| c.id == id)
    }

    /// First instance matching an origin.
    pub fn find_origin(&self, origin: &str) -> Option<&ClientHandle> {
        self.clients.iter().find(|c| c.origin == origin)
    }

    /// Bring an instance to the foreground.
    pub fn focus(&mut self, id: u64) -> bool {
        if !self.clients.iter().any(|c| c.id == id) {
            return false;
        }
        for client in &mut self.clients {
            client.focused = client.id == id;
        }
        true
    }

    /// Open a new instance at a URL, focused. Returns its ID.
    pub fn open_window(&mut self, url: impl Into<String>, origin: impl Into<String>) -> u64 {
        let id = self.add(url, origin);
        self.focus(id);
        id
    }

    /// Take control of every instance. Returns how many were claimed.
    pub fn claim(&mut self) -> usize {
        for client in &mut self.clients {
            client.controlled = true;
        }
        self.clients.len()
    }

    /// Number of open instances.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no instances are open.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
