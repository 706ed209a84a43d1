// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chairside: client core for a barbershop booking service.
//!
//! The interesting part is the token lifecycle: [`session::SessionManager`]
//! keeps the access token fresh with a cancellable periodic cycle, and
//! [`gateway::Gateway`] wraps every API call with bearer auth and a
//! single-flight 401 recovery. Everything else is a thin typed surface
//! over the booking backend.

pub mod api;
pub mod config;
pub mod gateway;
pub mod jwt;
pub mod session;
pub mod store;
