//! Slack integration - HTTP Events API bot interface
//!
//! This crate provides the Slack interface for skelly:
//! - **Request signing** (`signature`) - `X-Slack-Signature` verification
//! - **Slash Commands** (`commands`) - `/skelly add`, `/skelly list`, etc.
//! - **Events** (`events`) - emoji reactions and channel messages
//! - **Interactions** (`interactions`) - modal submissions
//! - **Block Kit** (`blocks`) - message and modal builders
//! - **Web API** (`api`) - `SlackWebClient`, the outbound side of every port
//!
//! # Architecture
//!
//! ```text
//! Slack HTTP → SignatureVerifier → EventDispatcher → TriggerService → Dispatcher
//!                                → CommandRouter   → ReactionCommandService
//!                                → SubmissionRouter → SubmissionService
//!                                       ↓
//!                             SlackWebClient ← Block Kit replies
//! ```

pub mod api;
pub mod blocks;
pub mod commands;
pub mod events;
pub mod interactions;
pub mod signature;
