//! Remote control client for Spotifice media servers and renderers.
//!
//! The client connects to a media server and a media renderer, binds the
//! renderer to the server, and then sends playback commands to the renderer.
//!
//! * [`proxy`] turns service references into verified, typed proxies,
//!   riding out endpoints that are still starting up
//! * [`session`] establishes the bound session, with or without credentials
//! * [`controller`] sends playback commands and turns failures into status
//!   messages
//! * [`remote`] is the remote-object substrate the rest is written against,
//!   and [`loopback`] an in-process implementation of it
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod config;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod loopback;
pub mod player;
pub mod proxy;
pub mod remote;
pub mod session;
pub mod signal;
pub mod status;
pub mod token;
pub mod track;
