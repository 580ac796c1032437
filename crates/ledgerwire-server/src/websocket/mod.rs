//! WebSocket connections, per-session state, and backend event relaying.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `connection` | Ordered outbound queue, socket writer task, per-connection read loop |
//! | `handler` | Inbound text frame → request → dispatcher → reply |
//! | `session` | Per-connection session: registry, bridge, snapshot gate |
//! | `sessions` | Live session tracking and shutdown |
//! | `event_bridge` | Backend subscriptions → client pushes |
//! | `transition` | Baseline/Draining/Live state and the transition buffer |
//! | `snapshot` | WorldState export: history walk and account dump |
//!
//! ## Data Flow
//!
//! `connection` → `handler` → `session` (dispatch) → reply on the outbound queue.
//! `event_bridge` → `transition` (buffer or deliver) → outbound queue.
//! `snapshot` → outbound queue, then `transition` drains and flips to Live.

pub mod connection;
pub mod event_bridge;
pub mod handler;
pub mod session;
pub mod sessions;
pub mod snapshot;
pub mod transition;
